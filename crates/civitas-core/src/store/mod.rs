//! Storage abstraction for Civitas.
//!
//! The [`Store`] trait defines the operations the search and citation
//! pipeline needs, so the same ranking and linking code runs against SQLite
//! (`civitas::sqlite_store::SqliteStore`) and the [`InMemoryStore`] used in
//! tests.
//!
//! Citation resolution rules are shared: both backends turn a parsed
//! [`Citation`] into a [`CitationLookup`] and match it against their rows.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::citation::{Citation, CitationKind};
use crate::models::{RecordKind, RecordRef, SourceRecord};

pub use memory::InMemoryStore;

/// A candidate record returned from keyword search.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub kind: RecordKind,
    pub id: String,
    /// Higher is better (`-bm25` for SQLite).
    pub raw_score: f64,
    pub snippet: String,
}

/// Filters applied inside the store query.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict to these kinds; `None` means all.
    pub kinds: Option<Vec<RecordKind>>,
    pub jurisdiction: Option<String>,
    /// Only records with `updated_at >= since_ts`.
    pub since_ts: Option<i64>,
}

impl SearchFilter {
    pub fn allows(&self, kind: RecordKind, jurisdiction: &str, updated_at: i64) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&kind) {
                return false;
            }
        }
        if let Some(j) = &self.jurisdiction {
            if !j.eq_ignore_ascii_case(jurisdiction) {
                return false;
            }
        }
        match self.since_ts {
            Some(since) => updated_at >= since,
            None => true,
        }
    }
}

/// Lightweight record metadata for search result enrichment.
#[derive(Debug, Clone)]
pub struct RecordMeta {
    pub kind: RecordKind,
    pub id: String,
    pub title: String,
    pub jurisdiction: String,
    pub source: String,
    pub source_url: Option<String>,
    pub updated_at: i64,
}

/// A citation found in a record body, with its link target if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCitation {
    /// Position of the citation within its source text.
    pub ordinal: i64,
    pub cite_type: String,
    pub raw: String,
    pub normalized: String,
    pub target: Option<RecordRef>,
    /// How the citation is matched against records; `None` when it never
    /// links (statutes, other reporters, unresolved short forms).
    #[serde(skip)]
    pub lookup: Option<CitationLookup>,
}

/// What a citation should be matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationLookup {
    /// `opinions.us_cite`, normalized (`410 U.S. 113`).
    UsReports(String),
    /// `bills.public_law` (`117-58`) among federal bills.
    PublicLaw(String),
    Bill {
        jurisdiction: String,
        bill_type: String,
        number: i64,
        /// Preferred session; otherwise the most recently updated match.
        session: Option<String>,
    },
    ExecutiveOrder(i64),
    /// `executive_orders.fr_citation` (`87 FR 14143`).
    FederalRegister(String),
}

impl CitationLookup {
    /// The lookup for `citation`, following short forms to their antecedent
    /// in `all`. Statutes and non-U.S. Reports cases have no lookup.
    pub fn for_citation(citation: &Citation, all: &[Citation]) -> Option<CitationLookup> {
        let target = citation.target(all)?;
        match &target.kind {
            CitationKind::Case { reporter, .. } if reporter == "U.S." => {
                Some(CitationLookup::UsReports(target.normalized()))
            }
            CitationKind::PublicLaw { congress, number } => {
                Some(CitationLookup::PublicLaw(format!("{}-{}", congress, number)))
            }
            CitationKind::Bill {
                jurisdiction,
                bill_type,
                number,
                congress,
            } => Some(CitationLookup::Bill {
                jurisdiction: jurisdiction.clone(),
                bill_type: bill_type.clone(),
                number: *number,
                session: congress.map(|c| c.to_string()),
            }),
            CitationKind::ExecutiveOrder { number } => {
                Some(CitationLookup::ExecutiveOrder(*number))
            }
            CitationKind::FederalRegister { .. } => {
                Some(CitationLookup::FederalRegister(target.normalized()))
            }
            _ => None,
        }
    }

    /// Stable text form, stored beside unresolved citations so they can be
    /// linked again once the target record is ingested.
    pub fn key(&self) -> String {
        match self {
            CitationLookup::UsReports(cite) => format!("us_reports|{}", cite),
            CitationLookup::PublicLaw(law) => format!("public_law|{}", law),
            CitationLookup::Bill {
                jurisdiction,
                bill_type,
                number,
                session,
            } => format!(
                "bill|{}|{}|{}|{}",
                jurisdiction,
                bill_type,
                number,
                session.as_deref().unwrap_or("")
            ),
            CitationLookup::ExecutiveOrder(number) => format!("executive_order|{}", number),
            CitationLookup::FederalRegister(cite) => format!("federal_register|{}", cite),
        }
    }

    /// Inverse of [`key`](CitationLookup::key).
    pub fn from_key(key: &str) -> Option<CitationLookup> {
        let parts: Vec<&str> = key.split('|').collect();
        match parts.as_slice() {
            ["us_reports", cite] => Some(CitationLookup::UsReports(cite.to_string())),
            ["public_law", law] => Some(CitationLookup::PublicLaw(law.to_string())),
            ["bill", jurisdiction, bill_type, number, session] => Some(CitationLookup::Bill {
                jurisdiction: jurisdiction.to_string(),
                bill_type: bill_type.to_string(),
                number: number.parse().ok()?,
                session: (!session.is_empty()).then(|| session.to_string()),
            }),
            ["executive_order", number] => {
                Some(CitationLookup::ExecutiveOrder(number.parse().ok()?))
            }
            ["federal_register", cite] => Some(CitationLookup::FederalRegister(cite.to_string())),
            _ => None,
        }
    }
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_record`](Store::upsert_record) | Insert or update a record and its FTS row |
/// | [`replace_citations`](Store::replace_citations) | Replace a record's outgoing citations |
/// | [`keyword_search`](Store::keyword_search) | Full-text search over all kinds |
/// | [`record_meta`](Store::record_meta) | Lightweight metadata for a record |
/// | [`lookup`](Store::lookup) | Find the record a citation lookup points at |
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_record(&self, record: &SourceRecord) -> Result<()>;

    async fn replace_citations(
        &self,
        source: &RecordRef,
        citations: &[ResolvedCitation],
    ) -> Result<()>;

    /// Full-text search with an FTS5 `MATCH` expression built by
    /// [`crate::fts::build_match_query`].
    async fn keyword_search(
        &self,
        match_expr: &str,
        filter: &SearchFilter,
        limit: i64,
    ) -> Result<Vec<Candidate>>;

    async fn record_meta(&self, record: &RecordRef) -> Result<Option<RecordMeta>>;

    async fn lookup(&self, lookup: &CitationLookup) -> Result<Option<RecordRef>>;

    /// Resolve `citation` (an element of `all`) to a stored record.
    async fn resolve_citation(
        &self,
        citation: &Citation,
        all: &[Citation],
    ) -> Result<Option<RecordRef>> {
        match CitationLookup::for_citation(citation, all) {
            Some(lookup) => self.lookup(&lookup).await,
            None => Ok(None),
        }
    }
}

/// Resolve every citation in `citations` against `store`.
///
/// Citations that resolve to `source` itself are dropped: an opinion's own
/// U.S. Reports cite in its header is not an outgoing citation.
pub async fn resolve_citations<S: Store + ?Sized>(
    store: &S,
    source: Option<&RecordRef>,
    citations: &[Citation],
) -> Result<Vec<ResolvedCitation>> {
    let mut out = Vec::with_capacity(citations.len());
    for (i, citation) in citations.iter().enumerate() {
        let lookup = CitationLookup::for_citation(citation, citations);
        let target = match &lookup {
            Some(l) => store.lookup(l).await?,
            None => None,
        };
        if target.is_some() && target.as_ref() == source {
            continue;
        }
        out.push(ResolvedCitation {
            ordinal: i as i64,
            cite_type: citation.kind.type_name().to_string(),
            raw: citation.raw.clone(),
            normalized: citation.normalized(),
            target,
            lookup,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::extract_citations;

    #[test]
    fn test_lookup_follows_short_forms() {
        let cites = extract_citations("Roe v. Wade, 410 U.S. 113 (1973). Id. at 150.");
        assert_eq!(
            CitationLookup::for_citation(&cites[1], &cites),
            Some(CitationLookup::UsReports("410 U.S. 113".into()))
        );
    }

    #[test]
    fn test_statutes_and_other_reporters_have_no_lookup() {
        let cites = extract_citations("42 U.S.C. § 1983; 5 F.3d 1234; 93 S. Ct. 705");
        assert_eq!(cites.len(), 3);
        for c in &cites {
            assert_eq!(CitationLookup::for_citation(c, &cites), None);
        }
    }

    #[test]
    fn test_bill_lookup_carries_congress_as_session() {
        let cites = extract_citations("H.R. 3684 (117th Cong.) became Pub. L. No. 117-58.");
        assert_eq!(
            CitationLookup::for_citation(&cites[0], &cites),
            Some(CitationLookup::Bill {
                jurisdiction: "us".into(),
                bill_type: "hr".into(),
                number: 3684,
                session: Some("117".into()),
            })
        );
        assert_eq!(
            CitationLookup::for_citation(&cites[1], &cites),
            Some(CitationLookup::PublicLaw("117-58".into()))
        );
    }

    #[test]
    fn test_lookup_key_round_trips() {
        let lookups = [
            CitationLookup::UsReports("410 U.S. 113".into()),
            CitationLookup::PublicLaw("117-58".into()),
            CitationLookup::Bill {
                jurisdiction: "ca".into(),
                bill_type: "sb".into(),
                number: 1047,
                session: None,
            },
            CitationLookup::Bill {
                jurisdiction: "us".into(),
                bill_type: "hr".into(),
                number: 3684,
                session: Some("117".into()),
            },
            CitationLookup::ExecutiveOrder(14067),
            CitationLookup::FederalRegister("87 FR 14143".into()),
        ];
        for lookup in lookups {
            assert_eq!(CitationLookup::from_key(&lookup.key()), Some(lookup));
        }
        assert_eq!(CitationLookup::from_key("statute|42"), None);
    }

    #[tokio::test]
    async fn test_resolve_citations_drops_self_cites() {
        use crate::models::{Opinion, SourceRecord};

        let store = InMemoryStore::new();
        let roe = SourceRecord::Opinion(Opinion {
            id: "scotus-70-18".into(),
            case_name: "Roe v. Wade".into(),
            docket: Some("70-18".into()),
            us_cite: Some("410 U.S. 113".into()),
            decided_date: None,
            term: None,
            author: None,
            authors: vec![],
            body: String::new(),
            source: "test".into(),
            source_url: None,
            updated_at: 0,
        });
        store.upsert_record(&roe).await.unwrap();

        let cites = extract_citations("410 U.S. 113; 42 U.S.C. § 1983; E.O. 14067");
        let source = roe.record_ref();
        let resolved = resolve_citations(&store, Some(&source), &cites).await.unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].cite_type, "statute");
        assert!(resolved[0].lookup.is_none());
        assert_eq!(resolved[1].lookup, Some(CitationLookup::ExecutiveOrder(14067)));
        assert!(resolved[1].target.is_none());

        let from_elsewhere = resolve_citations(&store, None, &cites).await.unwrap();
        assert_eq!(from_elsewhere[0].target, Some(source));
    }

    #[test]
    fn test_filter_allows() {
        let filter = SearchFilter {
            kinds: Some(vec![RecordKind::Bill]),
            jurisdiction: Some("CA".into()),
            since_ts: Some(100),
        };
        assert!(filter.allows(RecordKind::Bill, "ca", 100));
        assert!(!filter.allows(RecordKind::Opinion, "ca", 100));
        assert!(!filter.allows(RecordKind::Bill, "us", 100));
        assert!(!filter.allows(RecordKind::Bill, "ca", 99));
        assert!(SearchFilter::default().allows(RecordKind::Opinion, "us", 0));
    }
}
