//! Opinion authorship and header metadata from slip-opinion text.
//!
//! Supreme Court slip opinions announce authorship in a small number of
//! fixed phrasings, in the syllabus and at the top of each writing:
//!
//! ```text
//! ROBERTS, C. J., delivered the opinion of the Court ...
//! JUSTICE KAGAN delivered the opinion of the Court.
//! THOMAS, J., filed a concurring opinion.
//! SOTOMAYOR, J., concurring in part and dissenting in part.
//! PER CURIAM.
//! ```
//!
//! [`extract_authors`] finds these, title-cases the names, and keeps the
//! first role seen for each justice.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::citation::{extract_citations, CitationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    Majority,
    PerCuriam,
    Concurrence,
    Dissent,
    ConcurrenceAndDissent,
    ConcurringInJudgment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionAuthor {
    pub name: String,
    pub role: AuthorRole,
}

const PER_CURIAM: &str = "Per Curiam";

fn majority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:(?:CHIEF\s+)?JUSTICE\s+(?P<n1>[A-Z][A-Z'’\-]+)\s+delivered|(?P<n2>[A-Z][A-Z'’\-]+),\s+(?:C\.\s?J\.|J\.),\s+delivered)\s+the\s+opinion\s+of\s+the\s+Court",
        )
        .expect("valid majority author regex")
    })
}

fn separate_writing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:(?:CHIEF\s+)?JUSTICE\s+(?P<n1>[A-Z][A-Z'’\-]+),|(?P<n2>[A-Z][A-Z'’\-]+),\s+(?:C\.\s?J\.|J\.),)\s+(?:filed\s+an?\s+)?(?P<role>concurring\s+in\s+part\s+and\s+dissenting\s+in\s+part|dissenting\s+in\s+part\s+and\s+concurring\s+in\s+part|concurring\s+in\s+the\s+judgment|concurring|dissenting)",
        )
        .expect("valid separate writing regex")
    })
}

fn per_curiam_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bPER\s+CURIAM\b").expect("valid per curiam regex"))
}

fn docket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bNo(?:s)?\.\s+(?P<docket>\d{1,3}[-–]\d{1,5}|\d{1,3}A\d{1,4}|\d{1,3},\s*Orig\.)")
            .expect("valid docket regex")
    })
}

fn decided_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bDecided\s+(?P<date>[A-Z][a-z]+\s+\d{1,2},\s+\d{4})")
            .expect("valid decided date regex")
    })
}

/// `SOTOMAYOR` -> `Sotomayor`, `O'CONNOR` -> `O'Connor`.
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper_next = matches!(c, '\'' | '’' | '-');
    }
    out
}

/// Extract opinion authors in order of first appearance.
pub fn extract_authors(text: &str) -> Vec<OpinionAuthor> {
    let mut found: Vec<(usize, OpinionAuthor)> = Vec::new();

    for caps in majority_re().captures_iter(text) {
        if let Some(m) = caps.name("n1").or_else(|| caps.name("n2")) {
            found.push((
                m.start(),
                OpinionAuthor {
                    name: title_case(m.as_str()),
                    role: AuthorRole::Majority,
                },
            ));
        }
    }

    if let Some(m) = per_curiam_re().find(text) {
        found.push((
            m.start(),
            OpinionAuthor {
                name: PER_CURIAM.to_string(),
                role: AuthorRole::PerCuriam,
            },
        ));
    }

    for caps in separate_writing_re().captures_iter(text) {
        let (Some(m), Some(role)) = (caps.name("n1").or_else(|| caps.name("n2")), caps.name("role"))
        else {
            continue;
        };
        let role_text = role.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        let role = match role_text.as_str() {
            "concurring" => AuthorRole::Concurrence,
            "dissenting" => AuthorRole::Dissent,
            "concurring in the judgment" => AuthorRole::ConcurringInJudgment,
            _ => AuthorRole::ConcurrenceAndDissent,
        };
        found.push((
            m.start(),
            OpinionAuthor {
                name: title_case(m.as_str()),
                role,
            },
        ));
    }

    found.sort_by_key(|(pos, _)| *pos);

    let mut authors: Vec<OpinionAuthor> = Vec::new();
    for (_, author) in found {
        if !authors.iter().any(|a| a.name == author.name) {
            authors.push(author);
        }
    }
    authors
}

/// The author of the opinion of the Court, or `Per Curiam`.
pub fn lead_author(authors: &[OpinionAuthor]) -> Option<String> {
    authors
        .iter()
        .find(|a| a.role == AuthorRole::Majority)
        .or_else(|| authors.iter().find(|a| a.role == AuthorRole::PerCuriam))
        .map(|a| a.name.clone())
}

/// The caption (`X v. Y`) from the opinion header.
///
/// Captions in slip opinions often wrap across several lines, so the
/// first header paragraph mentioning ` v. ` is joined back together. The
/// Reporter's NOTE and cites introduced by `See` are not captions.
pub fn extract_case_name(text: &str) -> Option<String> {
    header_paragraphs(text)
        .into_iter()
        .map(|lines| {
            lines
                .into_iter()
                .filter(|line| !line.chars().any(|c| c.is_ascii_digit()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .find(|caption| caption.contains(" v. ") && caption.len() < 400)
        .map(|caption| {
            caption
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .trim_end_matches(['.', ',', ';'])
                .to_string()
        })
}

pub fn extract_docket(text: &str) -> Option<String> {
    docket_re()
        .captures(text)
        .and_then(|c| c.name("docket"))
        .map(|m| m.as_str().replace('–', "-").replace(", ", ","))
}

/// The opinion's own U.S. Reports cite.
///
/// A `Cite as: 597 U. S. 215 (2022)` running head wins. Slip opinions
/// carry `Cite as: 597 U. S. ____`, which has no page and yields nothing
/// from that line. Otherwise the cite must appear in the header
/// paragraphs before the docket line.
pub fn extract_us_cite(text: &str) -> Option<String> {
    let cite_as = text
        .lines()
        .map(str::trim_start)
        .filter_map(|line| line.strip_prefix("Cite as:"))
        .find_map(first_us_cite);
    if cite_as.is_some() {
        return cite_as;
    }

    header_paragraphs(text)
        .into_iter()
        .flatten()
        .find_map(first_us_cite)
}

fn first_us_cite(text: &str) -> Option<String> {
    extract_citations(text)
        .into_iter()
        .find(|c| matches!(&c.kind, CitationKind::Case { reporter, .. } if reporter == "U.S."))
        .map(|c| c.normalized())
}

/// Header text before the docket line, split into paragraphs of trimmed
/// lines. The Reporter's NOTE paragraph and lines opening with a `See`
/// signal are left out.
fn header_paragraphs(text: &str) -> Vec<Vec<&str>> {
    let head = head_of(text, 4000);
    let head = match docket_re().find(head) {
        Some(m) => &head[..m.start()],
        None => head,
    };

    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_note = false;
    for line in head.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            in_note = false;
            continue;
        }
        if line.starts_with("NOTE:") {
            in_note = true;
        }
        if in_note || line.starts_with("See ") || line.starts_with("Cite as:") {
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

/// `Decided June 24, 2022` -> `2022-06-24`.
pub fn extract_decided_date(text: &str) -> Option<String> {
    let raw = decided_re().captures(text)?.name("date")?.as_str().to_string();
    let raw = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    chrono::NaiveDate::parse_from_str(&raw, "%B %d, %Y")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn head_of(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
