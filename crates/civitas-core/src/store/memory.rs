//! In-memory [`Store`] implementation for tests.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. Keyword search
//! approximates FTS5: the quoted terms of the `MATCH` expression are
//! matched case-insensitively as substrings, title hits count double, and
//! any `NOT` term excludes the record.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{RecordRef, SourceRecord};

use super::{Candidate, CitationLookup, RecordMeta, ResolvedCitation, SearchFilter, Store};

const SNIPPET_RADIUS: usize = 60;

/// In-memory store for tests.
pub struct InMemoryStore {
    records: RwLock<HashMap<RecordRef, SourceRecord>>,
    citations: RwLock<HashMap<RecordRef, Vec<ResolvedCitation>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            citations: RwLock::new(HashMap::new()),
        }
    }

    /// Stored outgoing citations for `source`.
    pub fn citations_for(&self, source: &RecordRef) -> Vec<ResolvedCitation> {
        self.citations
            .read()
            .unwrap()
            .get(source)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Positive and negated terms of a `MATCH` expression, lowercased.
/// A trailing `*` is dropped: substring matching already covers prefixes.
fn parse_match_terms(expr: &str) -> (Vec<String>, Vec<String>) {
    let mut positive = Vec::new();
    let mut negative = Vec::new();
    let mut negate_next = false;
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let mut term = String::new();
                while let Some(c) = chars.next() {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            term.push('"');
                            continue;
                        }
                        break;
                    }
                    term.push(c);
                }
                let term = term.to_lowercase();
                if negate_next {
                    negative.push(term);
                } else {
                    positive.push(term);
                }
                negate_next = false;
            }
            'N' if expr_keyword(&mut chars, "OT") => negate_next = true,
            _ => {}
        }
    }
    (positive, negative)
}

fn expr_keyword(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, rest: &str) -> bool {
    let ahead: String = chars.clone().take(rest.len()).collect();
    if ahead == rest {
        for _ in 0..rest.len() {
            chars.next();
        }
        true
    } else {
        false
    }
}

fn snippet_around(body: &str, needle: &str) -> String {
    let lower = body.to_lowercase();
    // Lowercasing can shift byte offsets for non-ASCII text; offsets are
    // clamped to char boundaries of the original.
    let pos = lower.find(needle).unwrap_or(0);
    let mut start = pos.saturating_sub(SNIPPET_RADIUS);
    while !body.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (pos + needle.len() + SNIPPET_RADIUS).min(body.len());
    while !body.is_char_boundary(end) {
        end += 1;
    }
    body[start..end].trim().to_string()
}

fn meta_of(record: &SourceRecord) -> RecordMeta {
    RecordMeta {
        kind: record.kind(),
        id: record.id().to_string(),
        title: record.title(),
        jurisdiction: record.jurisdiction().to_string(),
        source: record.source().to_string(),
        source_url: record.source_url().map(str::to_string),
        updated_at: record.updated_at(),
    }
}

fn matches_lookup(record: &SourceRecord, lookup: &CitationLookup) -> bool {
    match (record, lookup) {
        (SourceRecord::Opinion(o), CitationLookup::UsReports(cite)) => {
            o.us_cite.as_deref() == Some(cite.as_str())
        }
        (SourceRecord::Bill(b), CitationLookup::PublicLaw(law)) => {
            b.jurisdiction == "us" && b.public_law.as_deref() == Some(law.as_str())
        }
        (
            SourceRecord::Bill(b),
            CitationLookup::Bill {
                jurisdiction,
                bill_type,
                number,
                ..
            },
        ) => &b.jurisdiction == jurisdiction && &b.bill_type == bill_type && b.number == *number,
        (SourceRecord::ExecutiveOrder(e), CitationLookup::ExecutiveOrder(n)) => e.eo_number == *n,
        (SourceRecord::ExecutiveOrder(e), CitationLookup::FederalRegister(cite)) => {
            e.fr_citation.as_deref() == Some(cite.as_str())
        }
        _ => false,
    }
}

fn session_of(record: &SourceRecord) -> Option<&str> {
    match record {
        SourceRecord::Bill(b) => Some(&b.session),
        _ => None,
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_record(&self, record: &SourceRecord) -> Result<()> {
        self.records
            .write()
            .unwrap()
            .insert(record.record_ref(), record.clone());
        Ok(())
    }

    async fn replace_citations(
        &self,
        source: &RecordRef,
        citations: &[ResolvedCitation],
    ) -> Result<()> {
        self.citations
            .write()
            .unwrap()
            .insert(source.clone(), citations.to_vec());
        Ok(())
    }

    async fn keyword_search(
        &self,
        match_expr: &str,
        filter: &SearchFilter,
        limit: i64,
    ) -> Result<Vec<Candidate>> {
        let (positive, negative) = parse_match_terms(match_expr);
        if positive.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.records.read().unwrap();
        let mut candidates: Vec<Candidate> = Vec::new();

        for record in records.values() {
            if !filter.allows(record.kind(), record.jurisdiction(), record.updated_at()) {
                continue;
            }
            let title = record.title().to_lowercase();
            let body = record.body().to_lowercase();

            if negative
                .iter()
                .any(|t| title.contains(t.as_str()) || body.contains(t.as_str()))
            {
                continue;
            }

            let mut score = 0.0;
            let mut first_hit: Option<&str> = None;
            for term in &positive {
                let in_title = title.matches(term.as_str()).count();
                let in_body = body.matches(term.as_str()).count();
                if in_title + in_body > 0 && first_hit.is_none() {
                    first_hit = Some(term);
                }
                score += 2.0 * in_title as f64 + in_body as f64;
            }

            if let Some(term) = first_hit {
                candidates.push(Candidate {
                    kind: record.kind(),
                    id: record.id().to_string(),
                    raw_score: score,
                    snippet: snippet_around(record.body(), term),
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        candidates.truncate(limit.max(0) as usize);
        Ok(candidates)
    }

    async fn record_meta(&self, record: &RecordRef) -> Result<Option<RecordMeta>> {
        Ok(self.records.read().unwrap().get(record).map(meta_of))
    }

    async fn lookup(&self, lookup: &CitationLookup) -> Result<Option<RecordRef>> {
        let records = self.records.read().unwrap();
        let mut matches: Vec<&SourceRecord> = records
            .values()
            .filter(|r| matches_lookup(r, lookup))
            .collect();

        if let CitationLookup::Bill {
            session: Some(session),
            ..
        } = lookup
        {
            if let Some(exact) = matches.iter().find(|r| session_of(r) == Some(session.as_str())) {
                return Ok(Some(exact.record_ref()));
            }
        }

        matches.sort_by(|a, b| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then(a.id().cmp(b.id()))
        });
        Ok(matches.first().map(|r| r.record_ref()))
    }
}
