//! Record retrieval and listing.
//!
//! Fetches a full record with its summary and citation links, or pages
//! through the records of one kind. Used by both `civ get` and the
//! `/api/{kind}` endpoints.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::{QueryBuilder, Row, Sqlite};

use civitas_core::models::{format_ts_iso, RecordKind, RecordRef, SourceRecord};
use civitas_core::store::ResolvedCitation;

use crate::citations::{cited_by, citations_from, CitingRecord};
use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;
use crate::summarize::{load_summary, SummaryResponse};

/// Full record response for `civ get` and `GET /api/{kind}/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    pub kind: RecordKind,
    pub id: String,
    pub title: String,
    /// Typed fields of the record.
    pub record: serde_json::Value,
    pub summary: Option<SummaryResponse>,
    pub citations: Vec<ResolvedCitation>,
    pub cited_by: Vec<CitingRecord>,
}

/// One row of a record listing.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub kind: RecordKind,
    pub id: String,
    pub title: String,
    pub jurisdiction: String,
    pub updated_at: String,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub jurisdiction: Option<String>,
    /// Bills only; ignored for other kinds.
    pub session: Option<String>,
}

fn record_fields(record: &SourceRecord) -> Result<serde_json::Value> {
    Ok(match record {
        SourceRecord::Bill(b) => serde_json::to_value(b)?,
        SourceRecord::Opinion(o) => serde_json::to_value(o)?,
        SourceRecord::ExecutiveOrder(e) => serde_json::to_value(e)?,
    })
}

/// Core get function returning structured data (used by CLI and server).
pub async fn get_record(config: &Config, kind: RecordKind, id: &str) -> Result<RecordResponse> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let result = load_record_response(&store, &RecordRef::new(kind, id)).await;
    pool.close().await;
    result
}

pub async fn load_record_response(store: &SqliteStore, key: &RecordRef) -> Result<RecordResponse> {
    let Some(record) = store.load_record(key).await? else {
        bail!("{} not found: {}", key.kind, key.id);
    };

    let summary = load_summary(store.pool(), key, record.body()).await?;
    let citations = citations_from(store.pool(), key).await?;
    let cited_by = cited_by(store, key).await?;

    Ok(RecordResponse {
        kind: key.kind,
        id: key.id.clone(),
        title: record.title(),
        record: record_fields(&record)?,
        summary,
        citations,
        cited_by,
    })
}

/// Records of `kind`, most recently updated first.
pub async fn list_records(
    config: &Config,
    kind: RecordKind,
    filter: &ListFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<RecordSummary>> {
    let pool = db::connect(config).await?;
    let records = list_records_in(&pool, kind, filter, limit, offset).await;
    pool.close().await;
    records
}

pub async fn list_records_in(
    pool: &sqlx::SqlitePool,
    kind: RecordKind,
    filter: &ListFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<RecordSummary>> {
    let title_expr = match kind {
        RecordKind::Bill | RecordKind::ExecutiveOrder => "title",
        RecordKind::Opinion => "case_name",
    };
    let jurisdiction_expr = match kind {
        RecordKind::Bill => "jurisdiction",
        _ => "'us'",
    };

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT id, {} AS title, {} AS jurisdiction, updated_at, source_url FROM {} WHERE 1 = 1",
        title_expr,
        jurisdiction_expr,
        kind.table()
    ));
    if let Some(j) = &filter.jurisdiction {
        qb.push(format!(" AND lower({}) = lower(", jurisdiction_expr));
        qb.push_bind(j.clone());
        qb.push(")");
    }
    if let (RecordKind::Bill, Some(session)) = (kind, &filter.session) {
        qb.push(" AND session = ");
        qb.push_bind(session.clone());
    }
    qb.push(" ORDER BY updated_at DESC, id LIMIT ");
    qb.push_bind(limit.max(0));
    qb.push(" OFFSET ");
    qb.push_bind(offset.max(0));

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| RecordSummary {
            kind,
            id: row.get("id"),
            title: row.get("title"),
            jurisdiction: row.get("jurisdiction"),
            updated_at: format_ts_iso(row.get("updated_at")),
            source_url: row.get("source_url"),
        })
        .collect())
}

/// CLI entry point: calls get_record and prints to stdout.
pub async fn run_get(config: &Config, kind: RecordKind, id: &str) -> Result<()> {
    let rec = match get_record(config, kind, id).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("--- {} ---", rec.kind);
    println!("id:           {}", rec.id);
    println!("title:        {}", rec.title);
    if let serde_json::Value::Object(fields) = &rec.record {
        for (name, value) in fields {
            if matches!(name.as_str(), "id" | "title" | "body" | "case_name") || value.is_null() {
                continue;
            }
            let shown = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("{:<13} {}", format!("{}:", name), shown);
        }
    }
    println!();

    if let Some(ref summary) = rec.summary {
        let stale = if summary.stale { ", stale" } else { "" };
        println!("--- Summary ({}{}) ---", summary.model, stale);
        println!("{}", summary.summary);
        println!();
    }

    println!("--- Body ---");
    if let Some(body) = rec.record.get("body").and_then(|b| b.as_str()) {
        println!("{}", body);
    }
    println!();

    println!("--- Citations ({}) ---", rec.citations.len());
    for c in &rec.citations {
        match &c.target {
            Some(target) => println!("[{}] {} → {}", c.cite_type, c.normalized, target),
            None => println!("[{}] {}", c.cite_type, c.normalized),
        }
    }
    println!();

    println!("--- Cited by ({}) ---", rec.cited_by.len());
    for c in &rec.cited_by {
        println!("{}/{}  {}", c.kind, c.id, c.title);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citations::index_record_citations;
    use crate::migrate::migrate_pool;
    use civitas_core::models::{Bill, Opinion};
    use civitas_core::store::Store;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn bill(jurisdiction: &str, session: &str, number: i64, body: &str, updated_at: i64) -> Bill {
        Bill {
            id: Bill::make_id(jurisdiction, session, "sb", number),
            jurisdiction: jurisdiction.into(),
            session: session.into(),
            bill_type: "sb".into(),
            number,
            title: format!("Bill {}", number),
            summary_text: None,
            sponsor: None,
            introduced_date: None,
            latest_action: None,
            latest_action_date: None,
            public_law: None,
            body: body.into(),
            source: "fixture".into(),
            source_url: None,
            updated_at,
        }
    }

    #[tokio::test]
    async fn test_list_records_filters_and_pages() {
        let store = test_store().await;
        for (j, s, n, ts) in [("ca", "20232024", 1, 10), ("ca", "20212022", 2, 20), ("tx", "88", 3, 30)] {
            store
                .upsert_record(&SourceRecord::Bill(bill(j, s, n, "", ts)))
                .await
                .unwrap();
        }
        let pool = store.pool();

        let all = list_records_in(pool, RecordKind::Bill, &ListFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(all.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), [
            "tx-88-sb3",
            "ca-20212022-sb2",
            "ca-20232024-sb1"
        ]);

        let ca = ListFilter {
            jurisdiction: Some("CA".into()),
            session: Some("20232024".into()),
        };
        let rows = list_records_in(pool, RecordKind::Bill, &ca, 10, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "ca-20232024-sb1");

        let page = list_records_in(pool, RecordKind::Bill, &ListFilter::default(), 1, 1)
            .await
            .unwrap();
        assert_eq!(page[0].id, "ca-20212022-sb2");

        let none = list_records_in(pool, RecordKind::Opinion, &ListFilter::default(), 10, 0)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_record_response_includes_citation_links() {
        let store = test_store().await;
        let opinion = SourceRecord::Opinion(Opinion {
            id: "scotus-70-18".into(),
            case_name: "Roe v. Wade".into(),
            docket: Some("70-18".into()),
            us_cite: Some("410 U.S. 113".into()),
            decided_date: Some("1973-01-22".into()),
            term: Some("1972".into()),
            author: Some("Blackmun".into()),
            authors: Vec::new(),
            body: "Opinion of the Court.".into(),
            source: "fixture".into(),
            source_url: None,
            updated_at: 5,
        });
        let citing = SourceRecord::Bill(bill(
            "ca",
            "20232024",
            9,
            "Codifies Roe v. Wade, 410 U.S. 113 (1973), under 42 U.S.C. § 1983.",
            6,
        ));
        store.upsert_record(&opinion).await.unwrap();
        store.upsert_record(&citing).await.unwrap();
        index_record_citations(&store, &citing).await.unwrap();

        let bill_view = load_record_response(&store, &citing.record_ref()).await.unwrap();
        assert_eq!(bill_view.citations.len(), 2);
        assert_eq!(
            bill_view.citations[0].target,
            Some(RecordRef::new(RecordKind::Opinion, "scotus-70-18"))
        );
        assert!(bill_view.citations[1].target.is_none());
        assert_eq!(bill_view.record["session"], "20232024");

        let opinion_view = load_record_response(&store, &opinion.record_ref()).await.unwrap();
        assert_eq!(opinion_view.title, "Roe v. Wade, 410 U.S. 113");
        assert_eq!(opinion_view.cited_by.len(), 1);
        assert_eq!(opinion_view.cited_by[0].id, "ca-20232024-sb9");
        assert!(opinion_view.summary.is_none());

        let err = load_record_response(&store, &RecordRef::new(RecordKind::Bill, "nope"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
