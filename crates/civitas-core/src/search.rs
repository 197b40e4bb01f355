//! Ranked search across bills, opinions, and executive orders.
//!
//! The algorithm operates entirely through the [`Store`] trait; the calling
//! application builds [`SearchParams`] from its configuration.
//!
//! # Scoring
//!
//! 1. Build an FTS5 `MATCH` expression from the query.
//! 2. Fetch `candidate_k` keyword candidates (`-bm25`, title weighted).
//! 3. Min-max normalize to `[0, 1]`, multiply by the per-kind weight, clamp.
//! 4. Every citation in the query that resolves to a stored record is a hit
//!    with score `1.0`.
//! 5. Merge by `(kind, id)` keeping the MAX score.
//! 6. Sort by score (desc), updated_at (desc), kind (asc), id (asc).
//! 7. Apply `offset`, then `limit`.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashMap;

use crate::citation::extract_citations;
use crate::fts::build_match_query;
use crate::models::{format_ts_iso, parse_date_ts, RecordKind, RecordRef};
use crate::store::{Candidate, SearchFilter, Store};

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Number of keyword candidates to fetch.
    pub candidate_k: i64,
    /// Default page size when the request has no limit.
    pub final_limit: i64,
    /// Multipliers applied to normalized keyword scores, per kind.
    pub kind_weights: HashMap<RecordKind, f64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            candidate_k: 200,
            final_limit: 20,
            kind_weights: HashMap::new(),
        }
    }
}

impl SearchParams {
    pub fn weight(&self, kind: RecordKind) -> f64 {
        self.kind_weights.get(&kind).copied().unwrap_or(1.0)
    }
}

/// Bundles all inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    /// Restrict to these kinds; `None` or empty means all.
    pub kinds: Option<&'a [RecordKind]>,
    pub jurisdiction: Option<&'a str>,
    /// Only records updated on or after this date (`YYYY-MM-DD`).
    pub since: Option<&'a str>,
    pub limit: Option<i64>,
    pub offset: i64,
    pub params: SearchParams,
    /// If true, populate [`ScoreExplanation`] on each hit.
    pub explain: bool,
}

/// A single search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub kind: RecordKind,
    pub id: String,
    pub title: String,
    /// Relevance score in `[0.0, 1.0]`.
    pub score: f64,
    pub snippet: String,
    pub jurisdiction: String,
    /// Last modification timestamp (ISO 8601).
    pub updated_at: String,
    pub source_url: Option<String>,
    /// The query citation that resolved to this record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_citation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreExplanation>,
}

/// Scoring breakdown for a search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreExplanation {
    /// Normalized keyword score before the kind weight (0.0 if absent).
    pub keyword_score: f64,
    pub kind_weight: f64,
    pub citation_match: bool,
    pub keyword_candidates: usize,
    pub citation_hits: usize,
}

struct Merged {
    score: f64,
    keyword_score: f64,
    snippet: String,
    matched_citation: Option<String>,
}

/// Run a search against a [`Store`] backend.
///
/// This is the function the CLI and HTTP frontends delegate to.
pub async fn search<S: Store + ?Sized>(store: &S, req: &SearchRequest<'_>) -> Result<Vec<SearchHit>> {
    if req.query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let since_ts = match req.since {
        Some(s) => match parse_date_ts(s) {
            Ok(ts) => Some(ts),
            Err(_) => bail!("invalid since date '{}': expected YYYY-MM-DD", s),
        },
        None => None,
    };

    let filter = SearchFilter {
        kinds: req.kinds.filter(|k| !k.is_empty()).map(<[RecordKind]>::to_vec),
        jurisdiction: req.jurisdiction.map(|j| j.to_ascii_lowercase()),
        since_ts,
    };

    let keyword_candidates = match build_match_query(req.query) {
        Some(expr) => {
            store
                .keyword_search(&expr, &filter, req.params.candidate_k)
                .await?
        }
        None => Vec::new(),
    };

    let mut merged: HashMap<RecordRef, Merged> = HashMap::new();

    for (cand, norm) in normalize_scores(&keyword_candidates) {
        let score = (norm * req.params.weight(cand.kind)).clamp(0.0, 1.0);
        let key = RecordRef::new(cand.kind, cand.id.clone());
        let entry = merged.entry(key).or_insert_with(|| Merged {
            score,
            keyword_score: norm,
            snippet: cand.snippet.clone(),
            matched_citation: None,
        });
        if score > entry.score {
            entry.score = score;
            entry.keyword_score = norm;
            entry.snippet = cand.snippet.clone();
        }
    }

    let citations = extract_citations(req.query);
    let mut citation_hits = 0;
    for citation in &citations {
        let Some(target) = store.resolve_citation(citation, &citations).await? else {
            continue;
        };
        let Some(meta) = store.record_meta(&target).await? else {
            continue;
        };
        if !filter.allows(meta.kind, &meta.jurisdiction, meta.updated_at) {
            continue;
        }
        citation_hits += 1;
        let normalized = citation
            .lookup_key(&citations)
            .unwrap_or_else(|| citation.normalized());
        let entry = merged.entry(target).or_insert_with(|| Merged {
            score: 0.0,
            keyword_score: 0.0,
            snippet: String::new(),
            matched_citation: None,
        });
        entry.score = 1.0;
        entry.matched_citation.get_or_insert(normalized);
    }

    struct Ranked {
        hit: SearchHit,
        updated_ts: i64,
    }

    let mut ranked: Vec<Ranked> = Vec::with_capacity(merged.len());
    for (key, m) in merged {
        let Some(meta) = store.record_meta(&key).await? else {
            continue;
        };
        let explain = req.explain.then(|| ScoreExplanation {
            keyword_score: m.keyword_score,
            kind_weight: req.params.weight(key.kind),
            citation_match: m.matched_citation.is_some(),
            keyword_candidates: keyword_candidates.len(),
            citation_hits,
        });
        ranked.push(Ranked {
            updated_ts: meta.updated_at,
            hit: SearchHit {
                kind: meta.kind,
                id: meta.id,
                title: meta.title,
                score: m.score,
                snippet: m.snippet,
                jurisdiction: meta.jurisdiction,
                updated_at: format_ts_iso(meta.updated_at),
                source_url: meta.source_url,
                matched_citation: m.matched_citation,
                explain,
            },
        });
    }

    ranked.sort_by(|a, b| {
        b.hit
            .score
            .partial_cmp(&a.hit.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.updated_ts.cmp(&a.updated_ts))
            .then(a.hit.kind.as_str().cmp(b.hit.kind.as_str()))
            .then(a.hit.id.cmp(&b.hit.id))
    });

    let limit = req.limit.unwrap_or(req.params.final_limit).max(0) as usize;
    Ok(ranked
        .into_iter()
        .skip(req.offset.max(0) as usize)
        .take(limit)
        .map(|r| r.hit)
        .collect())
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(candidates: &[Candidate]) -> Vec<(&Candidate, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            (c, norm)
        })
        .collect()
}
