use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS bills (
        id TEXT PRIMARY KEY,
        jurisdiction TEXT NOT NULL,
        session TEXT NOT NULL,
        bill_type TEXT NOT NULL,
        number INTEGER NOT NULL,
        title TEXT NOT NULL,
        summary_text TEXT,
        sponsor TEXT,
        introduced_date TEXT,
        latest_action TEXT,
        latest_action_date TEXT,
        public_law TEXT,
        body TEXT NOT NULL,
        source TEXT NOT NULL,
        source_url TEXT,
        updated_at INTEGER NOT NULL,
        dedup_hash TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS opinions (
        id TEXT PRIMARY KEY,
        case_name TEXT NOT NULL,
        docket TEXT,
        us_cite TEXT,
        decided_date TEXT,
        term TEXT,
        author TEXT,
        authors_json TEXT NOT NULL DEFAULT '[]',
        body TEXT NOT NULL,
        source TEXT NOT NULL,
        source_url TEXT,
        updated_at INTEGER NOT NULL,
        dedup_hash TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS executive_orders (
        id TEXT PRIMARY KEY,
        eo_number INTEGER NOT NULL,
        title TEXT NOT NULL,
        president TEXT,
        signing_date TEXT,
        publication_date TEXT,
        fr_citation TEXT,
        document_number TEXT,
        body TEXT NOT NULL,
        source TEXT NOT NULL,
        source_url TEXT,
        updated_at INTEGER NOT NULL,
        dedup_hash TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS citations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_kind TEXT NOT NULL,
        source_id TEXT NOT NULL,
        ordinal INTEGER NOT NULL,
        cite_type TEXT NOT NULL,
        raw TEXT NOT NULL,
        normalized TEXT NOT NULL,
        lookup_key TEXT,
        target_kind TEXT,
        target_id TEXT,
        UNIQUE(source_kind, source_id, ordinal)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS summaries (
        kind TEXT NOT NULL,
        record_id TEXT NOT NULL,
        model TEXT NOT NULL,
        summary TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (kind, record_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS checkpoints (
        source TEXT PRIMARY KEY,
        cursor TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        connector TEXT NOT NULL,
        started_at INTEGER NOT NULL,
        finished_at INTEGER NOT NULL,
        attempts INTEGER NOT NULL,
        records INTEGER NOT NULL,
        status TEXT NOT NULL,
        error TEXT
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_bills_lookup ON bills(jurisdiction, bill_type, number)",
    "CREATE INDEX IF NOT EXISTS idx_bills_public_law ON bills(public_law)",
    "CREATE INDEX IF NOT EXISTS idx_bills_updated_at ON bills(updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_opinions_us_cite ON opinions(us_cite)",
    "CREATE INDEX IF NOT EXISTS idx_opinions_updated_at ON opinions(updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_eo_number ON executive_orders(eo_number)",
    "CREATE INDEX IF NOT EXISTS idx_eo_fr_citation ON executive_orders(fr_citation)",
    "CREATE INDEX IF NOT EXISTS idx_citations_target ON citations(target_kind, target_id)",
    "CREATE INDEX IF NOT EXISTS idx_citations_source ON citations(source_kind, source_id)",
    "CREATE INDEX IF NOT EXISTS idx_citations_lookup ON citations(lookup_key) WHERE target_id IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_sync_runs_connector ON sync_runs(connector, started_at DESC)",
];

/// Create all tables, the FTS5 index, and secondary indexes. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='records_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE records_fts USING fts5(
                kind UNINDEXED,
                record_id UNINDEXED,
                jurisdiction UNINDEXED,
                updated_at UNINDEXED,
                title,
                body
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}
