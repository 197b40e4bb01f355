//! Plain-language summaries.
//!
//! Defines the [`Summarizer`] trait and its providers:
//! - **[`DisabledSummarizer`]**: returns errors; used when summaries are not configured.
//! - **[`ExtractiveSummarizer`]**: leading sentences of the body, no network.
//! - **[`OpenAISummarizer`]**: chat completions, retried through the activity runner.
//!
//! Summaries are stored in `summaries` keyed by `(kind, record_id)` with the
//! hash of the body they were generated from. A summary whose hash no longer
//! matches the record body is stale and is regenerated by
//! [`run_summarize_pending`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use sqlx::{Row, SqlitePool};

use civitas_core::models::{content_hash, format_ts_iso, RecordKind, RecordRef, SourceRecord};
use civitas_core::retry::RetryPolicy;
use civitas_core::summary::{build_prompt, extractive_summary, SYSTEM_PROMPT};

use crate::config::{Config, SummarizerConfig};
use crate::db;
use crate::http::{api_key_from_env, build_client, post_json};
use crate::sqlite_store::SqliteStore;

/// A backend that turns a record into a plain-language summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Model identifier stored alongside each summary.
    fn model_name(&self) -> &str;

    async fn summarize(&self, kind: RecordKind, title: &str, body: &str) -> Result<String>;
}

/// A stored summary.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub model: String,
    pub summary: String,
    pub created_at: String,
    /// The record body changed after this summary was written.
    pub stale: bool,
}

/// Instantiate the provider named by `summarizer.provider`.
pub fn create_summarizer(config: &Config) -> Result<Box<dyn Summarizer>> {
    let cfg = &config.summarizer;
    match cfg.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledSummarizer)),
        "extractive" => Ok(Box::new(ExtractiveSummarizer {
            max_sentences: cfg.max_sentences,
            max_chars: cfg.max_summary_chars,
        })),
        "openai" => Ok(Box::new(OpenAISummarizer::new(cfg, config.retry.clone())?)),
        other => bail!("Unknown summarizer provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// Used when `summarizer.provider = "disabled"`. Every call fails.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn summarize(&self, _kind: RecordKind, _title: &str, _body: &str) -> Result<String> {
        bail!("Summaries are disabled. Set [summarizer] provider in the config.")
    }
}

// ============ Extractive Provider ============

pub struct ExtractiveSummarizer {
    pub max_sentences: usize,
    pub max_chars: usize,
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    fn model_name(&self) -> &str {
        "extractive"
    }

    async fn summarize(&self, _kind: RecordKind, title: &str, body: &str) -> Result<String> {
        let summary = extractive_summary(body, self.max_sentences, self.max_chars);
        if summary.is_empty() {
            return Ok(title.to_string());
        }
        Ok(summary)
    }
}

// ============ OpenAI Provider ============

/// Chat-completions summarizer. The API key is read from the environment
/// variable named by `summarizer.api_key_env` at call time.
pub struct OpenAISummarizer {
    model: String,
    base_url: String,
    api_key_env: String,
    max_input_chars: usize,
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl OpenAISummarizer {
    pub fn new(config: &SummarizerConfig, policy: RetryPolicy) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("summarizer.model required for openai provider"))?;
        Ok(Self {
            model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            max_input_chars: config.max_input_chars,
            client: build_client(config.timeout_secs)?,
            policy,
        })
    }
}

#[async_trait]
impl Summarizer for OpenAISummarizer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, kind: RecordKind, title: &str, body: &str) -> Result<String> {
        let api_key = api_key_from_env(&self.api_key_env)?;
        let request = json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(kind, title, body, self.max_input_chars) },
            ],
        });
        let url = format!("{}/chat/completions", self.base_url);
        let headers = [("Authorization", format!("Bearer {}", api_key))];

        let response = post_json(&self.client, &url, &headers, &request, &self.policy).await?;
        parse_chat_completion(&response)
    }
}

/// Text of the first choice in a chat-completions response.
pub fn parse_chat_completion(response: &serde_json::Value) -> Result<String> {
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or_default();
    if content.is_empty() {
        bail!("Empty summary in chat completion response");
    }
    Ok(content.to_string())
}

// ============ Storage ============

pub async fn load_summary(
    pool: &SqlitePool,
    record: &RecordRef,
    body: &str,
) -> Result<Option<SummaryResponse>> {
    let row = sqlx::query(
        "SELECT model, summary, content_hash, created_at FROM summaries WHERE kind = ? AND record_id = ?",
    )
    .bind(record.kind.as_str())
    .bind(&record.id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let hash: String = row.get("content_hash");
        SummaryResponse {
            model: row.get("model"),
            summary: row.get("summary"),
            created_at: format_ts_iso(row.get("created_at")),
            stale: hash != content_hash(body),
        }
    }))
}

async fn save_summary(
    pool: &SqlitePool,
    record: &SourceRecord,
    model: &str,
    summary: &str,
) -> Result<i64> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO summaries (kind, record_id, model, summary, content_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(kind, record_id) DO UPDATE SET
            model = excluded.model,
            summary = excluded.summary,
            content_hash = excluded.content_hash,
            created_at = excluded.created_at
        "#,
    )
    .bind(record.kind().as_str())
    .bind(record.id())
    .bind(model)
    .bind(summary)
    .bind(content_hash(record.body()))
    .bind(now)
    .execute(pool)
    .await?;
    Ok(now)
}

/// Summarize `record` and store the result.
pub async fn summarize_and_store(
    pool: &SqlitePool,
    summarizer: &dyn Summarizer,
    record: &SourceRecord,
) -> Result<SummaryResponse> {
    let summary = summarizer
        .summarize(record.kind(), &record.title(), record.body())
        .await?;
    let created_at = save_summary(pool, record, summarizer.model_name(), &summary).await?;
    Ok(SummaryResponse {
        model: summarizer.model_name().to_string(),
        summary,
        created_at: format_ts_iso(created_at),
        stale: false,
    })
}

/// Records of `kinds` with no summary or a stale one, most recently
/// updated first.
pub async fn pending_records(
    pool: &SqlitePool,
    kinds: &[RecordKind],
    limit: Option<usize>,
) -> Result<Vec<RecordRef>> {
    let mut pending = Vec::new();
    for kind in kinds {
        let sql = format!(
            r#"
            SELECT r.id, r.body, s.content_hash
            FROM {} r
            LEFT JOIN summaries s ON s.kind = ? AND s.record_id = r.id
            ORDER BY r.updated_at DESC, r.id
            "#,
            kind.table()
        );
        let rows = sqlx::query(&sql).bind(kind.as_str()).fetch_all(pool).await?;
        for row in &rows {
            let body: String = row.get("body");
            let stored: Option<String> = row.get("content_hash");
            if stored.as_deref() != Some(content_hash(&body).as_str()) {
                pending.push(RecordRef::new(*kind, row.get::<String, _>("id")));
            }
        }
    }
    if let Some(limit) = limit {
        pending.truncate(limit);
    }
    Ok(pending)
}

/// CLI entry point for `civ summarize pending`.
pub async fn run_summarize_pending(
    config: &Config,
    kind: Option<RecordKind>,
    limit: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let kinds: Vec<RecordKind> = match kind {
        Some(k) => vec![k],
        None => RecordKind::ALL.to_vec(),
    };

    let pool = db::connect(config).await?;
    let pending = pending_records(&pool, &kinds, limit).await?;

    if dry_run {
        println!("summarize pending (dry-run)");
        println!("  records pending: {}", pending.len());
        for kind in &kinds {
            let n = pending.iter().filter(|r| r.kind == *kind).count();
            println!("    {}: {}", kind, n);
        }
        pool.close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("No summaries pending.");
        pool.close().await;
        return Ok(());
    }

    let summarizer = create_summarizer(config)?;
    if summarizer.model_name() == "disabled" {
        pool.close().await;
        bail!("Summaries are disabled. Set [summarizer] provider in the config.");
    }

    let store = SqliteStore::new(pool.clone());
    let mut written = 0u64;
    let mut failed = 0u64;
    for record_ref in &pending {
        let Some(record) = store.load_record(record_ref).await? else {
            continue;
        };
        match summarize_and_store(&pool, summarizer.as_ref(), &record).await {
            Ok(_) => written += 1,
            Err(e) => {
                tracing::warn!(record = %record_ref, "summary failed: {:#}", e);
                failed += 1;
            }
        }
    }

    println!("summarize pending");
    println!("  model: {}", summarizer.model_name());
    println!("  summaries written: {}", written);
    if failed > 0 {
        println!("  failed: {}", failed);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Summarize a single stored record (used by `POST /api/{kind}/{id}/summarize`).
pub async fn summarize_record(config: &Config, record: &RecordRef) -> Result<SummaryResponse> {
    let summarizer = create_summarizer(config)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let result = match store.load_record(record).await? {
        Some(r) => summarize_and_store(&pool, summarizer.as_ref(), &r).await,
        None => Err(anyhow::anyhow!("{} not found: {}", record.kind, record.id)),
    };
    pool.close().await;
    result
}
