//! Search frontend over the SQLite store.
//!
//! Ranking lives in [`civitas_core::search`]; this module opens the pool,
//! applies config defaults, and prints results for `civ search`.

use anyhow::Result;

use civitas_core::models::RecordKind;
use civitas_core::search::{search, SearchHit, SearchRequest};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Query parameters shared by the CLI and `GET /api/search`.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    pub kinds: Vec<RecordKind>,
    pub jurisdiction: Option<String>,
    /// `YYYY-MM-DD`; only records updated on or after this date.
    pub since: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
    pub explain: bool,
}

/// Run a search and return structured hits (used by CLI and server).
pub async fn search_records(config: &Config, q: &SearchQuery) -> Result<Vec<SearchHit>> {
    if q.query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let req = SearchRequest {
        query: &q.query,
        kinds: (!q.kinds.is_empty()).then_some(q.kinds.as_slice()),
        jurisdiction: q.jurisdiction.as_deref(),
        since: q.since.as_deref(),
        limit: q.limit,
        offset: q.offset,
        params: config.search.params(),
        explain: q.explain,
    };
    let hits = search(&store, &req).await;
    pool.close().await;
    hits
}

/// CLI entry point for `civ search`.
pub async fn run_search(config: &Config, q: &SearchQuery) -> Result<()> {
    let hits = search_records(config, q).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let date = hit.updated_at.get(..10).unwrap_or(&hit.updated_at);
        println!("{}. [{:.2}] {} / {}", i + 1, hit.score, hit.kind, hit.title);
        println!("    updated: {}", date);
        println!("    jurisdiction: {}", hit.jurisdiction);
        if let Some(ref url) = hit.source_url {
            println!("    url: {}", url);
        }
        if let Some(ref cite) = hit.matched_citation {
            println!("    citation: {}", cite);
        }
        if !hit.snippet.is_empty() {
            println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " ").trim());
        }
        if let Some(ref explain) = hit.explain {
            println!(
                "    explain: keyword={:.3} weight={:.2} citation={} (candidates={}, citation_hits={})",
                explain.keyword_score,
                explain.kind_weight,
                explain.citation_match,
                explain.keyword_candidates,
                explain.citation_hits
            );
        }
        println!("    id: {}", hit.id);
        println!();
    }

    Ok(())
}
