//! Citation indexing and citation-graph queries.
//!
//! Every ingested record's body is scanned for citations; each is stored
//! in `citations` with its link target when one is in the database.
//! Unlinked citations keep their lookup key so [`relink_citations`] can
//! attach them once the cited record arrives in a later sync.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use civitas_core::citation::extract_citations;
use civitas_core::models::{RecordKind, RecordRef, SourceRecord};
use civitas_core::store::{resolve_citations, CitationLookup, ResolvedCitation, Store};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// A record that cites another.
#[derive(Debug, Clone, Serialize)]
pub struct CitingRecord {
    pub kind: RecordKind,
    pub id: String,
    pub title: String,
    pub raw: String,
    pub normalized: String,
}

/// Extract, resolve, and store the outgoing citations of `record`.
pub async fn index_record_citations<S: Store + ?Sized>(
    store: &S,
    record: &SourceRecord,
) -> Result<Vec<ResolvedCitation>> {
    let source = record.record_ref();
    let citations = extract_citations(record.body());
    let resolved = resolve_citations(store, Some(&source), &citations).await?;
    store.replace_citations(&source, &resolved).await?;
    Ok(resolved)
}

/// Link stored citations whose target was missing when they were indexed.
/// Returns the number of rows linked.
pub async fn relink_citations(store: &SqliteStore) -> Result<u64> {
    let keys: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT lookup_key FROM citations WHERE target_id IS NULL AND lookup_key IS NOT NULL",
    )
    .fetch_all(store.pool())
    .await?;

    let mut linked = 0u64;
    for key in keys {
        let Some(lookup) = CitationLookup::from_key(&key) else {
            continue;
        };
        let Some(target) = store.lookup(&lookup).await? else {
            continue;
        };
        let result = sqlx::query(
            r#"
            UPDATE citations SET target_kind = ?, target_id = ?
            WHERE target_id IS NULL AND lookup_key = ?
              AND NOT (source_kind = ? AND source_id = ?)
            "#,
        )
        .bind(target.kind.as_str())
        .bind(&target.id)
        .bind(&key)
        .bind(target.kind.as_str())
        .bind(&target.id)
        .execute(store.pool())
        .await?;
        linked += result.rows_affected();
    }

    if linked > 0 {
        tracing::info!(linked, "relinked citations");
    }
    Ok(linked)
}

/// Parse citations out of free text and resolve them against `store`.
pub async fn resolve_text_with<S: Store + ?Sized>(
    store: &S,
    text: &str,
) -> Result<Vec<ResolvedCitation>> {
    let citations = extract_citations(text);
    resolve_citations(store, None, &citations).await
}

/// Parse citations out of free text and resolve them against the database.
pub async fn resolve_text(config: &Config, text: &str) -> Result<Vec<ResolvedCitation>> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let resolved = resolve_text_with(&store, text).await;
    pool.close().await;
    resolved
}

/// Stored outgoing citations of `record`, in text order.
pub async fn citations_from(pool: &SqlitePool, record: &RecordRef) -> Result<Vec<ResolvedCitation>> {
    let rows = sqlx::query(
        r#"
        SELECT ordinal, cite_type, raw, normalized, lookup_key, target_kind, target_id
        FROM citations
        WHERE source_kind = ? AND source_id = ?
        ORDER BY ordinal
        "#,
    )
    .bind(record.kind.as_str())
    .bind(&record.id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let target_kind: Option<String> = row.get("target_kind");
        let target_id: Option<String> = row.get("target_id");
        let target = match (target_kind, target_id) {
            (Some(kind), Some(id)) => Some(RecordRef::new(kind.parse()?, id)),
            _ => None,
        };
        let lookup_key: Option<String> = row.get("lookup_key");
        out.push(ResolvedCitation {
            ordinal: row.get("ordinal"),
            cite_type: row.get("cite_type"),
            raw: row.get("raw"),
            normalized: row.get("normalized"),
            target,
            lookup: lookup_key.as_deref().and_then(CitationLookup::from_key),
        });
    }
    Ok(out)
}

/// Records whose stored citations link to `record`.
pub async fn cited_by(store: &SqliteStore, record: &RecordRef) -> Result<Vec<CitingRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT source_kind, source_id, MIN(ordinal) AS ordinal, raw, normalized
        FROM citations
        WHERE target_kind = ? AND target_id = ?
        GROUP BY source_kind, source_id
        ORDER BY source_kind, source_id
        "#,
    )
    .bind(record.kind.as_str())
    .bind(&record.id)
    .fetch_all(store.pool())
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let kind: String = row.get("source_kind");
        let source = RecordRef::new(kind.parse()?, row.get::<String, _>("source_id"));
        let title = store
            .record_meta(&source)
            .await?
            .map(|m| m.title)
            .unwrap_or_default();
        out.push(CitingRecord {
            kind: source.kind,
            id: source.id,
            title,
            raw: row.get("raw"),
            normalized: row.get("normalized"),
        });
    }
    Ok(out)
}

/// CLI entry point for `civ cite`.
pub async fn run_cite(config: &Config, text: &str) -> Result<()> {
    let resolved = resolve_text(config, text).await?;

    if resolved.is_empty() {
        println!("No citations found.");
        return Ok(());
    }

    println!("citations: {}", resolved.len());
    for c in &resolved {
        let link = match &c.target {
            Some(target) => format!("→ {}", target),
            None => "(not in database)".to_string(),
        };
        println!("  [{}] {:<28} {}", c.cite_type, c.normalized, link);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use civitas_core::models::{Bill, Opinion};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn opinion(docket: &str, name: &str, cite: &str, body: &str) -> SourceRecord {
        SourceRecord::Opinion(Opinion {
            id: Opinion::make_id(docket),
            case_name: name.into(),
            docket: Some(docket.into()),
            us_cite: Some(cite.into()),
            decided_date: None,
            term: None,
            author: None,
            authors: Vec::new(),
            body: body.into(),
            source: "scotus".into(),
            source_url: None,
            updated_at: 100,
        })
    }

    fn bill(body: &str) -> SourceRecord {
        SourceRecord::Bill(Bill {
            id: Bill::make_id("ca", "20232024", "ab", 5),
            jurisdiction: "ca".into(),
            session: "20232024".into(),
            bill_type: "ab".into(),
            number: 5,
            title: "Worker status: employees and independent contractors".into(),
            summary_text: None,
            sponsor: None,
            introduced_date: None,
            latest_action: None,
            latest_action_date: None,
            public_law: None,
            body: body.into(),
            source: "california".into(),
            source_url: None,
            updated_at: 200,
        })
    }

    #[tokio::test]
    async fn test_self_citation_is_dropped() {
        let store = memory_store().await;
        let roe = opinion(
            "70-18",
            "Roe v. Wade",
            "410 U.S. 113",
            "ROE v. WADE, 410 U.S. 113. The Court's holding in 410 U.S. 113 stands.",
        );
        store.upsert_record(&roe).await.unwrap();
        let resolved = index_record_citations(&store, &roe).await.unwrap();

        assert!(resolved.is_empty());
        assert!(citations_from(store.pool(), &roe.record_ref()).await.unwrap().is_empty());
        assert_eq!(relink_citations(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_relink_after_target_arrives() {
        let store = memory_store().await;
        let ab5 = bill("Codifies the ABC test. See Roe v. Wade, 410 U.S. 113, 153; id. at 160.");
        store.upsert_record(&ab5).await.unwrap();
        index_record_citations(&store, &ab5).await.unwrap();

        let source = ab5.record_ref();
        let before = citations_from(store.pool(), &source).await.unwrap();
        assert_eq!(before.len(), 2);
        assert!(before.iter().all(|c| c.target.is_none() && c.lookup.is_some()));

        let roe = opinion("70-18", "Roe v. Wade", "410 U.S. 113", "Opinion text.");
        store.upsert_record(&roe).await.unwrap();
        assert_eq!(relink_citations(&store).await.unwrap(), 2);

        let after = citations_from(store.pool(), &source).await.unwrap();
        let roe_ref = roe.record_ref();
        assert!(after.iter().all(|c| c.target.as_ref() == Some(&roe_ref)));

        let citing = cited_by(&store, &roe_ref).await.unwrap();
        assert_eq!(citing.len(), 1);
        assert_eq!(citing[0].id, "ca-20232024-ab5");
        assert_eq!(citing[0].title, "Worker status: employees and independent contractors");
        assert_eq!(citing[0].normalized, "410 U.S. 113");
    }

    #[tokio::test]
    async fn test_resolve_text_without_database_matches() {
        let store = memory_store().await;
        let resolved = resolve_text_with(&store, "Cal. Penal Code § 187 and 42 U.S.C. § 1983")
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|c| c.target.is_none()));
        assert!(resolve_text_with(&store, "no citations here")
            .await
            .unwrap()
            .is_empty());
    }
}
