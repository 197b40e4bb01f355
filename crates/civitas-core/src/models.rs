//! Core data models shared by connectors, the store, and the API.
//!
//! Three record kinds flow through the system: bills (Congress, California,
//! and other state legislatures, distinguished by `jurisdiction`), Supreme
//! Court opinions, and presidential executive orders.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::authors::OpinionAuthor;

/// The kind of a stored record. Each kind has its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Bill,
    Opinion,
    ExecutiveOrder,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Bill,
        RecordKind::Opinion,
        RecordKind::ExecutiveOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Bill => "bill",
            RecordKind::Opinion => "opinion",
            RecordKind::ExecutiveOrder => "executive_order",
        }
    }

    /// Plural path segment used by the HTTP API (`/api/executive-orders`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            RecordKind::Bill => "bills",
            RecordKind::Opinion => "opinions",
            RecordKind::ExecutiveOrder => "executive-orders",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<RecordKind> {
        RecordKind::ALL
            .into_iter()
            .find(|k| k.path_segment() == segment)
    }

    /// SQL table holding records of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Bill => "bills",
            RecordKind::Opinion => "opinions",
            RecordKind::ExecutiveOrder => "executive_orders",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bill" | "bills" => Ok(RecordKind::Bill),
            "opinion" | "opinions" => Ok(RecordKind::Opinion),
            "executive_order" | "executive_orders" | "eo" => Ok(RecordKind::ExecutiveOrder),
            other => bail!(
                "invalid record kind: '{}'. Use bill, opinion, or executive_order.",
                other
            ),
        }
    }
}

/// Pointer to a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: String,
}

impl RecordRef {
    pub fn new(kind: RecordKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A bill or resolution from Congress or a state legislature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    /// `us` for Congress, otherwise a lowercase state code (`ca`, `ny`, ...).
    pub jurisdiction: String,
    /// Congress number (`118`) or legislative session (`20232024`).
    pub session: String,
    /// Lowercase bill type without punctuation: `hr`, `s`, `hjres`, `ab`, `sb`.
    pub bill_type: String,
    pub number: i64,
    pub title: String,
    pub summary_text: Option<String>,
    pub sponsor: Option<String>,
    pub introduced_date: Option<String>,
    pub latest_action: Option<String>,
    pub latest_action_date: Option<String>,
    /// Public law number once enacted, e.g. `117-58`.
    pub public_law: Option<String>,
    pub body: String,
    pub source: String,
    pub source_url: Option<String>,
    pub updated_at: i64,
}

impl Bill {
    /// Deterministic id: `{jurisdiction}-{session}-{type}{number}`.
    pub fn make_id(jurisdiction: &str, session: &str, bill_type: &str, number: i64) -> String {
        format!(
            "{}-{}-{}{}",
            jurisdiction.to_ascii_lowercase(),
            session,
            normalize_bill_type(bill_type),
            number
        )
    }

    /// Human form of the bill designation (`H.R. 1234`, `SB 1047`).
    pub fn designation(&self) -> String {
        bill_designation(&self.jurisdiction, &self.bill_type, self.number)
    }
}

/// Lowercase and strip punctuation/whitespace: `H.J.Res.` -> `hjres`.
pub fn normalize_bill_type(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// `H.R. 1234` for federal bill types, `SB 1047` for everything else.
pub fn bill_designation(jurisdiction: &str, bill_type: &str, number: i64) -> String {
    let federal = match bill_type {
        "hr" => Some("H.R."),
        "s" => Some("S."),
        "hjres" => Some("H.J.Res."),
        "sjres" => Some("S.J.Res."),
        "hconres" => Some("H.Con.Res."),
        "sconres" => Some("S.Con.Res."),
        "hres" => Some("H.Res."),
        "sres" => Some("S.Res."),
        _ => None,
    };
    match federal {
        Some(prefix) if jurisdiction == "us" => format!("{} {}", prefix, number),
        _ => format!("{} {}", bill_type.to_ascii_uppercase(), number),
    }
}

/// A Supreme Court opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub id: String,
    pub case_name: String,
    pub docket: Option<String>,
    /// Normalized U.S. Reports cite, e.g. `410 U.S. 113`.
    pub us_cite: Option<String>,
    pub decided_date: Option<String>,
    pub term: Option<String>,
    /// Author of the opinion of the Court, or `Per Curiam`.
    pub author: Option<String>,
    pub authors: Vec<OpinionAuthor>,
    pub body: String,
    pub source: String,
    pub source_url: Option<String>,
    pub updated_at: i64,
}

impl Opinion {
    pub fn make_id(docket: &str) -> String {
        format!("scotus-{}", docket.trim().to_ascii_lowercase())
    }
}

/// A presidential executive order as published in the Federal Register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveOrder {
    pub id: String,
    pub eo_number: i64,
    pub title: String,
    pub president: Option<String>,
    pub signing_date: Option<String>,
    pub publication_date: Option<String>,
    /// Federal Register cite, e.g. `87 FR 14143`.
    pub fr_citation: Option<String>,
    pub document_number: Option<String>,
    pub body: String,
    pub source: String,
    pub source_url: Option<String>,
    pub updated_at: i64,
}

impl ExecutiveOrder {
    pub fn make_id(number: i64) -> String {
        format!("eo-{}", number)
    }
}

/// A record produced by a connector, ready for the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRecord {
    Bill(Bill),
    Opinion(Opinion),
    ExecutiveOrder(ExecutiveOrder),
}

impl SourceRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            SourceRecord::Bill(_) => RecordKind::Bill,
            SourceRecord::Opinion(_) => RecordKind::Opinion,
            SourceRecord::ExecutiveOrder(_) => RecordKind::ExecutiveOrder,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SourceRecord::Bill(b) => &b.id,
            SourceRecord::Opinion(o) => &o.id,
            SourceRecord::ExecutiveOrder(e) => &e.id,
        }
    }

    pub fn record_ref(&self) -> RecordRef {
        RecordRef::new(self.kind(), self.id())
    }

    /// Display title used for the FTS title column.
    pub fn title(&self) -> String {
        match self {
            SourceRecord::Bill(b) => format!("{}: {}", b.designation(), b.title),
            SourceRecord::Opinion(o) => match &o.us_cite {
                Some(cite) => format!("{}, {}", o.case_name, cite),
                None => o.case_name.clone(),
            },
            SourceRecord::ExecutiveOrder(e) => {
                format!("Executive Order {}: {}", e.eo_number, e.title)
            }
        }
    }

    /// Text indexed for full-text search and scanned for citations.
    pub fn body(&self) -> &str {
        match self {
            SourceRecord::Bill(b) => &b.body,
            SourceRecord::Opinion(o) => &o.body,
            SourceRecord::ExecutiveOrder(e) => &e.body,
        }
    }

    pub fn jurisdiction(&self) -> &str {
        match self {
            SourceRecord::Bill(b) => &b.jurisdiction,
            SourceRecord::Opinion(_) | SourceRecord::ExecutiveOrder(_) => "us",
        }
    }

    pub fn source(&self) -> &str {
        match self {
            SourceRecord::Bill(b) => &b.source,
            SourceRecord::Opinion(o) => &o.source,
            SourceRecord::ExecutiveOrder(e) => &e.source,
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        match self {
            SourceRecord::Bill(b) => b.source_url.as_deref(),
            SourceRecord::Opinion(o) => o.source_url.as_deref(),
            SourceRecord::ExecutiveOrder(e) => e.source_url.as_deref(),
        }
    }

    pub fn updated_at(&self) -> i64 {
        match self {
            SourceRecord::Bill(b) => b.updated_at,
            SourceRecord::Opinion(o) => o.updated_at,
            SourceRecord::ExecutiveOrder(e) => e.updated_at,
        }
    }

    /// Hash over kind, id, `updated_at`, title and body; unchanged hashes
    /// skip writes.
    pub fn dedup_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind().as_str().as_bytes());
        hasher.update(self.id().as_bytes());
        hasher.update(self.updated_at().to_le_bytes());
        hasher.update(self.title().as_bytes());
        hasher.update(self.body().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// SHA-256 of a record body, used to detect stale summaries.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Format a unix timestamp as ISO 8601 (`2024-01-31T00:00:00Z`).
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Parse `YYYY-MM-DD` into a unix timestamp at midnight UTC.
pub fn parse_date_ts(date: &str) -> Result<i64> {
    let d = chrono::NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")?;
    Ok(d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp())
}

/// Parse the timestamp shapes the upstream APIs use: RFC 3339,
/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    parse_date_ts(raw).ok()
}
