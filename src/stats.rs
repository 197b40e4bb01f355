//! Database statistics and health overview.
//!
//! Record counts per kind and jurisdiction, citation link coverage, summary
//! coverage, and the last sync run of each connector. Used by `civ stats`
//! and `GET /api/stats`.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use civitas_core::models::{format_ts_iso, RecordKind};

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub records: Vec<KindCount>,
    pub citations: CitationStats,
    pub summaries: i64,
    pub syncs: Vec<SyncRunStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindCount {
    pub kind: RecordKind,
    pub jurisdiction: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitationStats {
    pub total: i64,
    pub resolved: i64,
}

/// Latest sync run of one connector.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRunStats {
    pub connector: String,
    pub finished_at: String,
    pub status: String,
    pub records: i64,
    pub attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Stats {
    pub fn total_records(&self) -> i64 {
        self.records.iter().map(|c| c.count).sum()
    }
}

pub async fn get_stats(config: &Config) -> Result<Stats> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await;
    pool.close().await;
    stats
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<Stats> {
    let mut records = Vec::new();
    for kind in RecordKind::ALL {
        let jurisdiction_expr = match kind {
            RecordKind::Bill => "jurisdiction",
            _ => "'us'",
        };
        let sql = format!(
            "SELECT {} AS jurisdiction, COUNT(*) AS n FROM {} GROUP BY 1 ORDER BY 1",
            jurisdiction_expr,
            kind.table()
        );
        for row in sqlx::query(&sql).fetch_all(pool).await? {
            records.push(KindCount {
                kind,
                jurisdiction: row.get("jurisdiction"),
                count: row.get("n"),
            });
        }
    }

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM citations")
        .fetch_one(pool)
        .await?;
    let resolved: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM citations WHERE target_id IS NOT NULL")
            .fetch_one(pool)
            .await?;
    let summaries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summaries")
        .fetch_one(pool)
        .await?;

    // Latest run per connector (highest id wins).
    let sync_rows = sqlx::query(
        r#"
        SELECT connector, finished_at, status, records, attempts, error
        FROM sync_runs
        WHERE id IN (SELECT MAX(id) FROM sync_runs GROUP BY connector)
        ORDER BY connector
        "#,
    )
    .fetch_all(pool)
    .await?;
    let syncs = sync_rows
        .iter()
        .map(|row| SyncRunStats {
            connector: row.get("connector"),
            finished_at: format_ts_iso(row.get("finished_at")),
            status: row.get("status"),
            records: row.get("records"),
            attempts: row.get("attempts"),
            error: row.get("error"),
        })
        .collect();

    Ok(Stats {
        records,
        citations: CitationStats { total, resolved },
        summaries,
        syncs,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let stats = get_stats(config).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let total = stats.total_records();

    println!("Civitas — Database Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Records:     {}", total);
    println!(
        "  Citations:   {} ({} linked)",
        stats.citations.total, stats.citations.resolved
    );
    println!(
        "  Summaries:   {} / {} ({}%)",
        stats.summaries,
        total,
        if total > 0 {
            (stats.summaries * 100) / total
        } else {
            0
        }
    );

    if !stats.records.is_empty() {
        println!();
        println!("  By kind:");
        println!("  {:<18} {:<14} {:>8}", "KIND", "JURISDICTION", "RECORDS");
        println!("  {}", "-".repeat(42));
        for c in &stats.records {
            println!("  {:<18} {:<14} {:>8}", c.kind, c.jurisdiction, c.count);
        }
    }

    if !stats.syncs.is_empty() {
        println!();
        println!("  Last sync:");
        println!(
            "  {:<18} {:<8} {:>8}   {}",
            "CONNECTOR", "STATUS", "RECORDS", "FINISHED"
        );
        println!("  {}", "-".repeat(60));
        for s in &stats.syncs {
            println!(
                "  {:<18} {:<8} {:>8}   {}",
                s.connector, s.status, s.records, s.finished_at
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
