//! Ingestion pipeline orchestration.
//!
//! Coordinates the sync flow: connector scan (as a retried activity) →
//! checkpoint filter → upsert with dedup → citation indexing → checkpoint
//! and run log. Supports incremental sync via checkpoints and relinks
//! citations that were unresolved before this sync.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use civitas_core::models::SourceRecord;
use civitas_core::store::Store;

use crate::activity::run_activity;
use crate::citations::{index_record_citations, relink_citations};
use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;
use crate::traits::{Connector, ConnectorRegistry, BUILTIN_CONNECTORS};

/// Flags for a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Ignore the checkpoint and re-process every scanned record.
    pub full: bool,
    /// Scan and report counts without writing anything.
    pub dry_run: bool,
    pub limit: Option<usize>,
}

/// Counts for one connector's sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub connector: String,
    pub fetched: usize,
    pub upserted: usize,
    pub unchanged: usize,
    pub citations: usize,
    pub attempts: u32,
    pub checkpoint: i64,
}

/// Sync `spec` (`all` or a connector name) using the connectors configured
/// under `[sources.*]`.
pub async fn run_sync(config: &Config, spec: &str, opts: &SyncOptions) -> Result<()> {
    run_sync_with_extensions(config, spec, opts, ConnectorRegistry::new()).await
}

/// Like [`run_sync`], with extra connectors registered alongside the
/// built-ins.
pub async fn run_sync_with_extensions(
    config: &Config,
    spec: &str,
    opts: &SyncOptions,
    extensions: ConnectorRegistry,
) -> Result<()> {
    let mut registry = ConnectorRegistry::from_config(config)?;
    for connector in extensions.into_connectors() {
        registry.register(connector);
    }

    let selected: Vec<&dyn Connector> = if spec == "all" {
        for name in BUILTIN_CONNECTORS {
            if registry.find(name).is_none() {
                println!("skip {} (not configured)", name);
            }
        }
        registry.connectors().iter().map(|c| c.as_ref()).collect()
    } else {
        match registry.find(spec) {
            Some(c) => vec![c],
            None if BUILTIN_CONNECTORS.contains(&spec) => bail!(
                "Connector '{}' is not configured. Add a [sources.{}] section to the config.",
                spec,
                spec
            ),
            None => {
                let available: Vec<&str> =
                    registry.connectors().iter().map(|c| c.name()).collect();
                bail!(
                    "Unknown connector: '{}'. Available: {}",
                    spec,
                    if available.is_empty() {
                        "(none configured)".to_string()
                    } else {
                        available.join(", ")
                    }
                )
            }
        }
    };

    if selected.is_empty() {
        println!("No connectors configured.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let mut failures = Vec::new();
    for connector in selected {
        match sync_connector(config, &store, connector, opts).await {
            Ok(Some(report)) => print_report(&report),
            Ok(None) => {}
            Err(e) => {
                println!("sync {}", connector.name());
                println!("  failed: {:#}", e);
                failures.push(connector.name().to_string());
            }
        }
    }

    if !opts.dry_run {
        let linked = relink_citations(&store).await?;
        if linked > 0 {
            println!("relinked citations: {}", linked);
        }
    }

    pool.close().await;

    if !failures.is_empty() {
        bail!("sync failed for: {}", failures.join(", "));
    }
    Ok(())
}

/// Sync one connector. Returns `None` for a dry run (counts are printed).
pub async fn sync_connector(
    config: &Config,
    store: &SqliteStore,
    connector: &dyn Connector,
    opts: &SyncOptions,
) -> Result<Option<SyncReport>> {
    let name = connector.name();
    let pool = store.pool();
    let started_at = chrono::Utc::now().timestamp();

    let checkpoint = if opts.full {
        None
    } else {
        get_checkpoint(pool, name).await?
    };

    let activity = format!("scan:{}", name);
    let scanned = run_activity(&activity, &config.retry, |attempt| {
        tracing::debug!(connector = name, attempt, "scanning");
        connector.scan(checkpoint)
    })
    .await;

    let outcome = match scanned {
        Ok(outcome) => outcome,
        Err(failure) => {
            let message = failure.to_string();
            if !opts.dry_run {
                log_sync_run(pool, name, started_at, failure.attempts, 0, "failed", Some(&message))
                    .await?;
            }
            return Err(failure.into());
        }
    };

    let mut records = outcome.value;
    if let Some(cp) = checkpoint {
        records.retain(|r| r.updated_at() > cp);
    }
    // Oldest first, so a limited run only moves the checkpoint past
    // records it actually processed.
    records.sort_by_key(|r| r.updated_at());
    let mut checkpoint_ceiling = None;
    if let Some(limit) = opts.limit {
        if let Some(first_skipped) = records.get(limit) {
            checkpoint_ceiling = Some(first_skipped.updated_at() - 1);
        }
        records.truncate(limit);
    }

    if opts.dry_run {
        println!("sync {} (dry-run)", name);
        println!("  records found: {}", records.len());
        for kind in civitas_core::models::RecordKind::ALL {
            let n = records.iter().filter(|r| r.kind() == kind).count();
            if n > 0 {
                println!("    {}: {}", kind, n);
            }
        }
        return Ok(None);
    }

    let mut report = SyncReport {
        connector: name.to_string(),
        fetched: records.len(),
        attempts: outcome.attempts,
        checkpoint: checkpoint.unwrap_or(0),
        ..SyncReport::default()
    };

    for record in &records {
        if upsert_if_changed(store, record).await? {
            report.upserted += 1;
            report.citations += index_record_citations(store, record).await?.len();
        } else {
            report.unchanged += 1;
        }
        report.checkpoint = report.checkpoint.max(record.updated_at());
    }
    if let Some(ceiling) = checkpoint_ceiling {
        report.checkpoint = report.checkpoint.min(ceiling);
    }

    set_checkpoint(pool, name, report.checkpoint).await?;
    log_sync_run(
        pool,
        name,
        started_at,
        report.attempts,
        report.upserted as i64,
        "ok",
        None,
    )
    .await?;

    tracing::info!(
        connector = name,
        fetched = report.fetched,
        upserted = report.upserted,
        unchanged = report.unchanged,
        "sync complete"
    );
    Ok(Some(report))
}

/// Write `record` unless the stored copy has the same dedup hash.
async fn upsert_if_changed(store: &SqliteStore, record: &SourceRecord) -> Result<bool> {
    let hash = record.dedup_hash();
    if store.stored_hash(&record.record_ref()).await?.as_deref() == Some(hash.as_str()) {
        return Ok(false);
    }
    store.upsert_record(record).await?;
    Ok(true)
}

fn print_report(report: &SyncReport) {
    println!("sync {}", report.connector);
    println!("  fetched: {} records", report.fetched);
    println!("  upserted: {}", report.upserted);
    println!("  skipped unchanged: {}", report.unchanged);
    println!("  citations indexed: {}", report.citations);
    if report.attempts > 1 {
        println!("  attempts: {}", report.attempts);
    }
    println!("  checkpoint: {}", report.checkpoint);
    println!("ok");
}

pub async fn get_checkpoint(pool: &SqlitePool, source: &str) -> Result<Option<i64>> {
    let result: Option<String> =
        sqlx::query_scalar("SELECT cursor FROM checkpoints WHERE source = ?")
            .bind(source)
            .fetch_optional(pool)
            .await?;

    Ok(result.and_then(|s| s.parse::<i64>().ok()))
}

async fn set_checkpoint(pool: &SqlitePool, source: &str, cursor_val: i64) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO checkpoints (source, cursor, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(source) DO UPDATE SET cursor = excluded.cursor, updated_at = excluded.updated_at
        "#,
    )
    .bind(source)
    .bind(cursor_val.to_string())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

async fn log_sync_run(
    pool: &SqlitePool,
    connector: &str,
    started_at: i64,
    attempts: u32,
    records: i64,
    status: &str,
    error: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_runs (connector, started_at, finished_at, attempts, records, status, error)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(connector)
    .bind(started_at)
    .bind(chrono::Utc::now().timestamp())
    .bind(attempts as i64)
    .bind(records)
    .bind(status)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}
