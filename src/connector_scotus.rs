//! Supreme Court slip opinions from a local directory of text files.
//!
//! Walks `root` with include/exclude globs and derives opinion metadata
//! from the text: caption, docket number, U.S. Reports cite, decision
//! date, and authorship.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Datelike;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use civitas_core::authors::{
    extract_authors, extract_case_name, extract_decided_date, extract_docket, extract_us_cite,
    lead_author,
};
use civitas_core::models::{Opinion, SourceRecord};

use crate::activity::ActivityError;
use crate::config::ScotusConfig;
use crate::traits::Connector;

pub struct ScotusConnector {
    config: ScotusConfig,
}

impl ScotusConnector {
    pub fn new(config: ScotusConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for ScotusConnector {
    fn name(&self) -> &str {
        "scotus"
    }

    fn description(&self) -> &str {
        "Supreme Court opinions from local slip-opinion text files"
    }

    async fn scan(&self, since: Option<i64>) -> Result<Vec<SourceRecord>> {
        let config = self.config.clone();
        let opinions =
            tokio::task::spawn_blocking(move || scan_opinions(&config, since)).await??;
        Ok(opinions.into_iter().map(SourceRecord::Opinion).collect())
    }
}

pub fn scan_opinions(config: &ScotusConfig, since: Option<i64>) -> Result<Vec<Opinion>> {
    let root = &config.root;
    if !root.exists() {
        return Err(ActivityError::non_retryable(
            "missing_source",
            format!("scotus connector root does not exist: {}", root.display()),
        )
        .into());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut opinions = Vec::new();

    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let modified = modified_secs(path);
        if since.is_some_and(|s| modified < s) {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "scotus: skipping unreadable file");
                continue;
            }
        };

        let source_url = match &config.url_prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), rel_str),
            None => format!("file://{}", path.display()),
        };

        opinions.push(parse_opinion(&text, path, source_url, modified));
    }

    // Sort for deterministic ordering
    opinions.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(opinions)
}

/// Build an opinion from slip-opinion text.
pub fn parse_opinion(text: &str, path: &Path, source_url: String, updated_at: i64) -> Opinion {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let docket = extract_docket(text);
    let id = match &docket {
        Some(d) => Opinion::make_id(d),
        None => Opinion::make_id(&stem),
    };
    let decided_date = extract_decided_date(text);
    let authors = extract_authors(text);

    Opinion {
        id,
        case_name: extract_case_name(text).unwrap_or_else(|| stem.clone()),
        docket,
        us_cite: extract_us_cite(text),
        term: decided_date.as_deref().and_then(term_of),
        decided_date,
        author: lead_author(&authors),
        authors,
        body: text.to_string(),
        source: "scotus".to_string(),
        source_url: Some(source_url),
        updated_at,
    }
}

/// October Term: decisions before October belong to the previous year's term.
fn term_of(decided: &str) -> Option<String> {
    let date = chrono::NaiveDate::parse_from_str(decided, "%Y-%m-%d").ok()?;
    let year = if date.month() >= 10 {
        date.year()
    } else {
        date.year() - 1
    };
    Some(year.to_string())
}

fn modified_secs(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
