//! SQLite-backed [`Store`] implementation.
//!
//! Each record kind has its own table; all kinds share one FTS5 table,
//! `records_fts`, whose `title` column is weighted 10x over `body` in
//! `bm25()`. Citation rows live in `citations`, keyed by source record and
//! ordinal.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use civitas_core::models::{Bill, ExecutiveOrder, Opinion, RecordKind, RecordRef, SourceRecord};
use civitas_core::store::{
    Candidate, CitationLookup, RecordMeta, ResolvedCitation, SearchFilter, Store,
};

const BILL_COLUMNS: &[&str] = &[
    "id",
    "jurisdiction",
    "session",
    "bill_type",
    "number",
    "title",
    "summary_text",
    "sponsor",
    "introduced_date",
    "latest_action",
    "latest_action_date",
    "public_law",
    "body",
    "source",
    "source_url",
    "updated_at",
];

const OPINION_COLUMNS: &[&str] = &[
    "id",
    "case_name",
    "docket",
    "us_cite",
    "decided_date",
    "term",
    "author",
    "authors_json",
    "body",
    "source",
    "source_url",
    "updated_at",
];

const EO_COLUMNS: &[&str] = &[
    "id",
    "eo_number",
    "title",
    "president",
    "signing_date",
    "publication_date",
    "fr_citation",
    "document_number",
    "body",
    "source",
    "source_url",
    "updated_at",
];

fn columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Bill => BILL_COLUMNS,
        RecordKind::Opinion => OPINION_COLUMNS,
        RecordKind::ExecutiveOrder => EO_COLUMNS,
    }
}

/// `SELECT` list for a kind's table. Without the body, large text columns
/// are replaced by empty literals so the row still maps to a full record.
pub(crate) fn select_list(kind: RecordKind, with_body: bool) -> String {
    columns(kind)
        .iter()
        .map(|c| match *c {
            "body" if !with_body => "'' AS body".to_string(),
            "authors_json" if !with_body => "'[]' AS authors_json".to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map a row selected with [`select_list`] into a [`SourceRecord`].
pub(crate) fn record_from_row(kind: RecordKind, row: &SqliteRow) -> SourceRecord {
    match kind {
        RecordKind::Bill => SourceRecord::Bill(Bill {
            id: row.get("id"),
            jurisdiction: row.get("jurisdiction"),
            session: row.get("session"),
            bill_type: row.get("bill_type"),
            number: row.get("number"),
            title: row.get("title"),
            summary_text: row.get("summary_text"),
            sponsor: row.get("sponsor"),
            introduced_date: row.get("introduced_date"),
            latest_action: row.get("latest_action"),
            latest_action_date: row.get("latest_action_date"),
            public_law: row.get("public_law"),
            body: row.get("body"),
            source: row.get("source"),
            source_url: row.get("source_url"),
            updated_at: row.get("updated_at"),
        }),
        RecordKind::Opinion => {
            let authors_json: String = row.get("authors_json");
            SourceRecord::Opinion(Opinion {
                id: row.get("id"),
                case_name: row.get("case_name"),
                docket: row.get("docket"),
                us_cite: row.get("us_cite"),
                decided_date: row.get("decided_date"),
                term: row.get("term"),
                author: row.get("author"),
                authors: serde_json::from_str(&authors_json).unwrap_or_default(),
                body: row.get("body"),
                source: row.get("source"),
                source_url: row.get("source_url"),
                updated_at: row.get("updated_at"),
            })
        }
        RecordKind::ExecutiveOrder => SourceRecord::ExecutiveOrder(ExecutiveOrder {
            id: row.get("id"),
            eo_number: row.get("eo_number"),
            title: row.get("title"),
            president: row.get("president"),
            signing_date: row.get("signing_date"),
            publication_date: row.get("publication_date"),
            fr_citation: row.get("fr_citation"),
            document_number: row.get("document_number"),
            body: row.get("body"),
            source: row.get("source"),
            source_url: row.get("source_url"),
            updated_at: row.get("updated_at"),
        }),
    }
}

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load a full record, body included.
    pub async fn load_record(&self, record: &RecordRef) -> Result<Option<SourceRecord>> {
        self.fetch(record, true).await
    }

    /// Dedup hash of the stored row, if the record exists.
    pub async fn stored_hash(&self, record: &RecordRef) -> Result<Option<String>> {
        let sql = format!("SELECT dedup_hash FROM {} WHERE id = ?", record.kind.table());
        let hash: Option<String> = sqlx::query_scalar(&sql)
            .bind(&record.id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    async fn fetch(&self, record: &RecordRef, with_body: bool) -> Result<Option<SourceRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            select_list(record.kind, with_body),
            record.kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(&record.id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| record_from_row(record.kind, &r)))
    }

    async fn first_id(&self, sql: &str, bind: &str) -> Result<Option<String>> {
        let id: Option<String> = sqlx::query_scalar(sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_record(&self, record: &SourceRecord) -> Result<()> {
        let dedup_hash = record.dedup_hash();
        let mut tx = self.pool.begin().await?;

        match record {
            SourceRecord::Bill(b) => {
                sqlx::query(
                    r#"
                    INSERT INTO bills (id, jurisdiction, session, bill_type, number, title,
                                       summary_text, sponsor, introduced_date, latest_action,
                                       latest_action_date, public_law, body, source,
                                       source_url, updated_at, dedup_hash)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        summary_text = excluded.summary_text,
                        sponsor = excluded.sponsor,
                        introduced_date = excluded.introduced_date,
                        latest_action = excluded.latest_action,
                        latest_action_date = excluded.latest_action_date,
                        public_law = excluded.public_law,
                        body = excluded.body,
                        source = excluded.source,
                        source_url = excluded.source_url,
                        updated_at = excluded.updated_at,
                        dedup_hash = excluded.dedup_hash
                    "#,
                )
                .bind(&b.id)
                .bind(&b.jurisdiction)
                .bind(&b.session)
                .bind(&b.bill_type)
                .bind(b.number)
                .bind(&b.title)
                .bind(&b.summary_text)
                .bind(&b.sponsor)
                .bind(&b.introduced_date)
                .bind(&b.latest_action)
                .bind(&b.latest_action_date)
                .bind(&b.public_law)
                .bind(&b.body)
                .bind(&b.source)
                .bind(&b.source_url)
                .bind(b.updated_at)
                .bind(&dedup_hash)
                .execute(&mut *tx)
                .await?;
            }
            SourceRecord::Opinion(o) => {
                let authors_json = serde_json::to_string(&o.authors)?;
                sqlx::query(
                    r#"
                    INSERT INTO opinions (id, case_name, docket, us_cite, decided_date, term,
                                          author, authors_json, body, source, source_url,
                                          updated_at, dedup_hash)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        case_name = excluded.case_name,
                        docket = excluded.docket,
                        us_cite = excluded.us_cite,
                        decided_date = excluded.decided_date,
                        term = excluded.term,
                        author = excluded.author,
                        authors_json = excluded.authors_json,
                        body = excluded.body,
                        source = excluded.source,
                        source_url = excluded.source_url,
                        updated_at = excluded.updated_at,
                        dedup_hash = excluded.dedup_hash
                    "#,
                )
                .bind(&o.id)
                .bind(&o.case_name)
                .bind(&o.docket)
                .bind(&o.us_cite)
                .bind(&o.decided_date)
                .bind(&o.term)
                .bind(&o.author)
                .bind(&authors_json)
                .bind(&o.body)
                .bind(&o.source)
                .bind(&o.source_url)
                .bind(o.updated_at)
                .bind(&dedup_hash)
                .execute(&mut *tx)
                .await?;
            }
            SourceRecord::ExecutiveOrder(e) => {
                sqlx::query(
                    r#"
                    INSERT INTO executive_orders (id, eo_number, title, president, signing_date,
                                                  publication_date, fr_citation, document_number,
                                                  body, source, source_url, updated_at, dedup_hash)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        president = excluded.president,
                        signing_date = excluded.signing_date,
                        publication_date = excluded.publication_date,
                        fr_citation = excluded.fr_citation,
                        document_number = excluded.document_number,
                        body = excluded.body,
                        source = excluded.source,
                        source_url = excluded.source_url,
                        updated_at = excluded.updated_at,
                        dedup_hash = excluded.dedup_hash
                    "#,
                )
                .bind(&e.id)
                .bind(e.eo_number)
                .bind(&e.title)
                .bind(&e.president)
                .bind(&e.signing_date)
                .bind(&e.publication_date)
                .bind(&e.fr_citation)
                .bind(&e.document_number)
                .bind(&e.body)
                .bind(&e.source)
                .bind(&e.source_url)
                .bind(e.updated_at)
                .bind(&dedup_hash)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("DELETE FROM records_fts WHERE kind = ? AND record_id = ?")
            .bind(record.kind().as_str())
            .bind(record.id())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO records_fts (kind, record_id, jurisdiction, updated_at, title, body) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.kind().as_str())
        .bind(record.id())
        .bind(record.jurisdiction())
        .bind(record.updated_at())
        .bind(record.title())
        .bind(record.body())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn replace_citations(
        &self,
        source: &RecordRef,
        citations: &[ResolvedCitation],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM citations WHERE source_kind = ? AND source_id = ?")
            .bind(source.kind.as_str())
            .bind(&source.id)
            .execute(&mut *tx)
            .await?;

        for c in citations {
            sqlx::query(
                r#"
                INSERT INTO citations (source_kind, source_id, ordinal, cite_type, raw,
                                       normalized, lookup_key, target_kind, target_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(source.kind.as_str())
            .bind(&source.id)
            .bind(c.ordinal)
            .bind(&c.cite_type)
            .bind(&c.raw)
            .bind(&c.normalized)
            .bind(c.lookup.as_ref().map(CitationLookup::key))
            .bind(c.target.as_ref().map(|t| t.kind.as_str()))
            .bind(c.target.as_ref().map(|t| t.id.as_str()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn keyword_search(
        &self,
        match_expr: &str,
        filter: &SearchFilter,
        limit: i64,
    ) -> Result<Vec<Candidate>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT kind, record_id,
                   bm25(records_fts, 0.0, 0.0, 0.0, 0.0, 10.0, 1.0) AS rank,
                   snippet(records_fts, 5, '>>>', '<<<', '...', 32) AS snippet
            FROM records_fts
            WHERE records_fts MATCH "#,
        );
        qb.push_bind(match_expr);

        if let Some(kinds) = filter.kinds.as_ref().filter(|k| !k.is_empty()) {
            qb.push(" AND kind IN (");
            let mut sep = qb.separated(", ");
            for kind in kinds {
                sep.push_bind(kind.as_str());
            }
            qb.push(")");
        }
        if let Some(jurisdiction) = &filter.jurisdiction {
            qb.push(" AND lower(jurisdiction) = lower(");
            qb.push_bind(jurisdiction.as_str());
            qb.push(")");
        }
        if let Some(since) = filter.since_ts {
            qb.push(" AND CAST(updated_at AS INTEGER) >= ");
            qb.push_bind(since);
        }
        qb.push(" ORDER BY rank LIMIT ");
        qb.push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind: String = row.get("kind");
            let rank: f64 = row.get("rank");
            candidates.push(Candidate {
                kind: kind.parse()?,
                id: row.get("record_id"),
                raw_score: -rank,
                snippet: row.get("snippet"),
            });
        }
        Ok(candidates)
    }

    async fn record_meta(&self, record: &RecordRef) -> Result<Option<RecordMeta>> {
        let found = self.fetch(record, false).await?;
        Ok(found.map(|r| RecordMeta {
            kind: r.kind(),
            id: r.id().to_string(),
            title: r.title(),
            jurisdiction: r.jurisdiction().to_string(),
            source: r.source().to_string(),
            source_url: r.source_url().map(str::to_string),
            updated_at: r.updated_at(),
        }))
    }

    async fn lookup(&self, lookup: &CitationLookup) -> Result<Option<RecordRef>> {
        let found = match lookup {
            CitationLookup::UsReports(cite) => self
                .first_id(
                    "SELECT id FROM opinions WHERE us_cite = ? ORDER BY updated_at DESC, id LIMIT 1",
                    cite,
                )
                .await?
                .map(|id| RecordRef::new(RecordKind::Opinion, id)),
            CitationLookup::PublicLaw(law) => self
                .first_id(
                    "SELECT id FROM bills WHERE jurisdiction = 'us' AND public_law = ? ORDER BY updated_at DESC, id LIMIT 1",
                    law,
                )
                .await?
                .map(|id| RecordRef::new(RecordKind::Bill, id)),
            CitationLookup::Bill {
                jurisdiction,
                bill_type,
                number,
                session,
            } => {
                let id: Option<String> = sqlx::query_scalar(
                    r#"
                    SELECT id FROM bills
                    WHERE jurisdiction = ? AND bill_type = ? AND number = ?
                    ORDER BY (session = ?) DESC, updated_at DESC, id
                    LIMIT 1
                    "#,
                )
                .bind(jurisdiction)
                .bind(bill_type)
                .bind(number)
                .bind(session.as_deref().unwrap_or(""))
                .fetch_optional(&self.pool)
                .await?;
                id.map(|id| RecordRef::new(RecordKind::Bill, id))
            }
            CitationLookup::ExecutiveOrder(number) => {
                let id: Option<String> = sqlx::query_scalar(
                    "SELECT id FROM executive_orders WHERE eo_number = ? ORDER BY updated_at DESC, id LIMIT 1",
                )
                .bind(number)
                .fetch_optional(&self.pool)
                .await?;
                id.map(|id| RecordRef::new(RecordKind::ExecutiveOrder, id))
            }
            CitationLookup::FederalRegister(cite) => self
                .first_id(
                    "SELECT id FROM executive_orders WHERE fr_citation = ? ORDER BY updated_at DESC, id LIMIT 1",
                    cite,
                )
                .await?
                .map(|id| RecordRef::new(RecordKind::ExecutiveOrder, id)),
        };
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use civitas_core::authors::{AuthorRole, OpinionAuthor};
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

    fn roe() -> SourceRecord {
        SourceRecord::Opinion(Opinion {
            id: Opinion::make_id("70-18"),
            case_name: "Roe v. Wade".into(),
            docket: Some("70-18".into()),
            us_cite: Some("410 U.S. 113".into()),
            decided_date: Some("1973-01-22".into()),
            term: Some("1972".into()),
            author: Some("Blackmun".into()),
            authors: vec![OpinionAuthor {
                name: "Blackmun".into(),
                role: AuthorRole::Majority,
            }],
            body: "The right of personal privacy includes the abortion decision.".into(),
            source: "scotus".into(),
            source_url: None,
            updated_at: 100,
        })
    }

    fn ca_bill(number: i64, title: &str, body: &str) -> SourceRecord {
        SourceRecord::Bill(Bill {
            id: Bill::make_id("ca", "20232024", "sb", number),
            jurisdiction: "ca".into(),
            session: "20232024".into(),
            bill_type: "sb".into(),
            number,
            title: title.into(),
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
    async fn test_upsert_replaces_fts_row() {
        let store = memory_store().await;
        store
            .upsert_record(&ca_bill(1, "Water", "Groundwater basins."))
            .await
            .unwrap();
        store
            .upsert_record(&ca_bill(1, "Water", "Desalination plants."))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records_fts")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        let old = store
            .keyword_search("\"groundwater\"", &SearchFilter::default(), 10)
            .await
            .unwrap();
        assert!(old.is_empty());
        let new = store
            .keyword_search("\"desalination\"", &SearchFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(new.len(), 1);
        assert!(new[0].snippet.contains(">>>Desalination<<<"));
    }

    #[tokio::test]
    async fn test_keyword_search_filters() {
        let store = memory_store().await;
        store.upsert_record(&roe()).await.unwrap();
        store
            .upsert_record(&ca_bill(2, "Privacy", "Consumer privacy rights."))
            .await
            .unwrap();

        let all = store
            .keyword_search("\"privacy\"", &SearchFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        // Title hit outranks a body-only hit.
        assert_eq!(all[0].kind, RecordKind::Bill);

        let opinions = store
            .keyword_search(
                "\"privacy\"",
                &SearchFilter {
                    kinds: Some(vec![RecordKind::Opinion]),
                    ..SearchFilter::default()
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(opinions.len(), 1);

        let ca = store
            .keyword_search(
                "\"privacy\"",
                &SearchFilter {
                    jurisdiction: Some("CA".into()),
                    since_ts: Some(150),
                    ..SearchFilter::default()
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(ca.len(), 1);
        assert_eq!(ca[0].id, "ca-20232024-sb2");
    }

    #[tokio::test]
    async fn test_round_trip_and_lookup() {
        let store = memory_store().await;
        store.upsert_record(&roe()).await.unwrap();

        let loaded = store
            .load_record(&RecordRef::new(RecordKind::Opinion, "scotus-70-18"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, roe());

        let meta = store
            .record_meta(&loaded.record_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.title, "Roe v. Wade, 410 U.S. 113");

        let found = store
            .lookup(&CitationLookup::UsReports("410 U.S. 113".into()))
            .await
            .unwrap();
        assert_eq!(found, Some(loaded.record_ref()));
        assert_eq!(
            store.stored_hash(&loaded.record_ref()).await.unwrap(),
            Some(roe().dedup_hash())
        );
    }

    #[tokio::test]
    async fn test_replace_citations() {
        let store = memory_store().await;
        let source = RecordRef::new(RecordKind::Bill, "ca-20232024-sb2");
        let cite = |ordinal: i64| ResolvedCitation {
            ordinal,
            cite_type: "case".into(),
            raw: "410 U.S. 113".into(),
            normalized: "410 U.S. 113".into(),
            target: Some(RecordRef::new(RecordKind::Opinion, "scotus-70-18")),
            lookup: Some(CitationLookup::UsReports("410 U.S. 113".into())),
        };
        store
            .replace_citations(&source, &[cite(0), cite(1)])
            .await
            .unwrap();
        store.replace_citations(&source, &[cite(0)]).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM citations")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
