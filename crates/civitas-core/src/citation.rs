//! Legal citation extraction and short-form resolution.
//!
//! Recognizes the citation forms that appear in bills, opinions, and
//! executive orders:
//!
//! | Kind | Examples |
//! |------|----------|
//! | Case | `410 U.S. 113, 153 (1973)`, `5 F.3d 1234`, `12 Cal. App. 5th 99` |
//! | Short case | `410 U.S. at 120` |
//! | Id. | `Id.`, `id. at 5`, `Ibid.` |
//! | Statute | `42 U.S.C. § 1983`, `Cal. Penal Code § 187` |
//! | Public law | `Pub. L. No. 117-58`, `P.L. 117-58` |
//! | Bill | `H.R. 1234`, `S.J.Res. 3`, `SB 1047` |
//! | Executive order | `Executive Order 14067`, `E.O. 14067` |
//! | Federal Register | `87 FR 14143`, `87 Fed. Reg. 14143` |
//!
//! Extraction runs every pattern over the text and then removes overlaps
//! (earliest start wins, then longest match), so `410 U.S. 113` is never
//! also reported as the bill `S. 113`.
//!
//! Short forms are linked back to their full citation with
//! [`resolve_short_forms`].

use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::OnceLock;

use crate::models::{bill_designation, normalize_bill_type};

/// Canonical reporter abbreviations, matched with flexible spacing.
const REPORTERS: &[&str] = &[
    "U.S.",
    "S. Ct.",
    "L. Ed.",
    "L. Ed. 2d",
    "F.",
    "F.2d",
    "F.3d",
    "F.4th",
    "F. Supp.",
    "F. Supp. 2d",
    "F. Supp. 3d",
    "F. App'x",
    "Cal.",
    "Cal. 2d",
    "Cal. 3d",
    "Cal. 4th",
    "Cal. 5th",
    "Cal. App.",
    "Cal. App. 2d",
    "Cal. App. 3d",
    "Cal. App. 4th",
    "Cal. App. 5th",
    "Cal. Rptr.",
    "Cal. Rptr. 2d",
    "Cal. Rptr. 3d",
    "P.2d",
    "P.3d",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CitationKind {
    Case {
        volume: u32,
        reporter: String,
        page: u32,
        pin: Option<String>,
        year: Option<u16>,
    },
    ShortCase {
        volume: u32,
        reporter: String,
        pin: String,
    },
    Id {
        pin: Option<String>,
    },
    Statute {
        /// U.S. Code title; `None` for state codes.
        title: Option<u32>,
        /// `U.S.C.` or the California code name (`Penal`, `Gov.`).
        code: String,
        section: String,
    },
    PublicLaw {
        congress: u32,
        number: u32,
    },
    Bill {
        /// `us` or `ca`.
        jurisdiction: String,
        /// Normalized bill type (`hr`, `sjres`, `sb`).
        bill_type: String,
        number: i64,
        congress: Option<u32>,
    },
    ExecutiveOrder {
        number: i64,
    },
    FederalRegister {
        volume: u32,
        page: u32,
    },
}

impl CitationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            CitationKind::Case { .. } => "case",
            CitationKind::ShortCase { .. } => "short_case",
            CitationKind::Id { .. } => "id",
            CitationKind::Statute { .. } => "statute",
            CitationKind::PublicLaw { .. } => "public_law",
            CitationKind::Bill { .. } => "bill",
            CitationKind::ExecutiveOrder { .. } => "executive_order",
            CitationKind::FederalRegister { .. } => "federal_register",
        }
    }

    pub fn is_short_form(&self) -> bool {
        matches!(self, CitationKind::ShortCase { .. } | CitationKind::Id { .. })
    }

    /// Canonical text form of the citation.
    pub fn normalized(&self) -> String {
        match self {
            CitationKind::Case {
                volume,
                reporter,
                page,
                ..
            } => format!("{} {} {}", volume, reporter, page),
            CitationKind::ShortCase {
                volume,
                reporter,
                pin,
            } => format!("{} {} at {}", volume, reporter, pin),
            CitationKind::Id { pin: Some(pin) } => format!("Id. at {}", pin),
            CitationKind::Id { pin: None } => "Id.".to_string(),
            CitationKind::Statute {
                title: Some(title),
                code,
                section,
            } => format!("{} {} § {}", title, code, section),
            CitationKind::Statute {
                title: None,
                code,
                section,
            } => format!("Cal. {} Code § {}", code, section),
            CitationKind::PublicLaw { congress, number } => {
                format!("Pub. L. {}-{}", congress, number)
            }
            CitationKind::Bill {
                jurisdiction,
                bill_type,
                number,
                ..
            } => bill_designation(jurisdiction, bill_type, *number),
            CitationKind::ExecutiveOrder { number } => format!("E.O. {}", number),
            CitationKind::FederalRegister { volume, page } => format!("{} FR {}", volume, page),
        }
    }
}

/// A citation found in text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    #[serde(flatten)]
    pub kind: CitationKind,
    /// The matched text, verbatim.
    pub raw: String,
    /// Byte offset of the match start.
    pub start: usize,
    /// Byte offset one past the match end.
    pub end: usize,
    /// For short forms: index of the full citation this one refers to.
    pub antecedent: Option<usize>,
}

impl Citation {
    pub fn normalized(&self) -> String {
        self.kind.normalized()
    }

    /// The full citation this one stands for: itself, or its antecedent for
    /// short forms. `None` for an unresolved short form.
    pub fn target<'a>(&'a self, all: &'a [Citation]) -> Option<&'a Citation> {
        if !self.kind.is_short_form() {
            return Some(self);
        }
        self.antecedent.and_then(|i| all.get(i))
    }

    /// Canonical form of the cited authority: the antecedent's for short
    /// forms, `None` if a short form could not be resolved.
    pub fn lookup_key(&self, all: &[Citation]) -> Option<String> {
        self.target(all).map(Citation::normalized)
    }
}

// ============ Patterns ============

/// Turn a canonical reporter into a regex tolerant of spacing variants:
/// `S. Ct.` also matches `S.Ct.`, `F.3d` also matches `F. 3d`.
fn reporter_pattern(canonical: &str) -> String {
    let mut out = String::new();
    let mut chars = canonical.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                out.push_str(r"\.");
                if chars.peek() == Some(&' ') {
                    chars.next();
                }
                if chars.peek().is_some() {
                    out.push_str(r"\s?");
                }
            }
            ' ' => out.push_str(r"\s+"),
            '\'' => out.push_str("['’]"),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out
}

fn reporter_alternation() -> String {
    let mut reporters: Vec<&str> = REPORTERS.to_vec();
    // Longest first so `F. Supp. 2d` wins over `F.`.
    reporters.sort_by_key(|r| std::cmp::Reverse(r.len()));
    reporters
        .iter()
        .map(|r| reporter_pattern(r))
        .collect::<Vec<_>>()
        .join("|")
}

fn case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"\b(?P<vol>\d{{1,4}})\s+(?P<rep>{})\s+(?P<page>\d{{1,5}})\b(?:,\s*(?P<pin>\d{{1,5}}(?:[-–]\d{{1,5}})?))?(?:\s*\((?P<court>[^()]{{0,40}}?)\s*(?P<year>\d{{4}})\))?",
            reporter_alternation()
        );
        Regex::new(&pattern).expect("valid case citation regex")
    })
}

fn short_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"\b(?P<vol>\d{{1,4}})\s+(?P<rep>{})\s+at\s+(?P<pin>\d{{1,5}}(?:[-–]\d{{1,5}})?)",
            reporter_alternation()
        );
        Regex::new(&pattern).expect("valid short case regex")
    })
}

fn id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:[Ii]d\.|Ibid\.)(?:,?\s+at\s+(?P<pin>\d{1,5}(?:[-–]\d{1,5})?))?")
            .expect("valid id regex")
    })
}

const SECTION: &str = r"(?P<section>\d+[A-Za-z0-9]*(?:[-.]\d+[A-Za-z0-9]*)*(?:\([A-Za-z0-9]{1,4}\))*)";

fn usc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"\b(?P<title>\d{{1,2}})\s+U\.?\s?S\.?\s?C\.?(?:\s?A\.)?\s*(?:§§?|[Ss]ec(?:tion|\.)?)?\s*{}",
            SECTION
        );
        Regex::new(&pattern).expect("valid U.S.C. regex")
    })
}

fn cal_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"\bCal(?:ifornia|\.)?\s+(?P<code>Penal|Gov(?:ernment|t\.|\.)?|Civ(?:il|\.)?|Bus(?:iness|\.)?\s*(?:&|and)\s*Prof(?:essions|\.)?|Health\s*(?:&|and)\s*Saf(?:ety|\.)?|Lab(?:or|\.)?|Veh(?:icle|\.)?|Welf(?:are|\.)?\s*(?:&|and)\s*Inst(?:itutions|\.)?|Educ(?:ation|\.)?|Fam(?:ily|\.)?|Evid(?:ence|\.)?|Ins(?:urance|\.)?|Elec(?:tions|\.)?)\s+Code,?\s*(?:§§?|[Ss]ec(?:tion|\.)?)\s*{}",
            SECTION
        );
        Regex::new(&pattern).expect("valid California code regex")
    })
}

fn public_law_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:Pub(?:lic|\.)?\s*L(?:aw|\.)?|P\.\s?L\.)\s*(?:No\.\s*)?(?P<congress>\d{1,3})[-–](?P<number>\d{1,4})\b",
        )
        .expect("valid public law regex")
    })
}

fn federal_bill_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?P<type>H\.\s?J\.\s?Res\.|S\.\s?J\.\s?Res\.|H\.\s?Con\.\s?Res\.|S\.\s?Con\.\s?Res\.|H\.\s?Res\.|S\.\s?Res\.|H\.\s?R\.|S\.)\s?(?P<number>\d{1,5})\b(?:\s*\((?P<c1>\d{2,3})(?:st|nd|rd|th)\s+Cong\.?\)|,\s+(?P<c2>\d{2,3})(?:st|nd|rd|th)\s+Congress)?",
        )
        .expect("valid federal bill regex")
    })
}

fn california_bill_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?P<type>A\.?\s?C\.?\s?R\.|S\.?\s?C\.?\s?R\.|A\.?\s?J\.?\s?R\.|S\.?\s?J\.?\s?R\.|ACR|SCR|AJR|SJR|A\.\s?B\.|S\.\s?B\.|AB|SB)\s?(?P<number>\d{1,4})\b",
        )
        .expect("valid California bill regex")
    })
}

fn executive_order_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:Executive\s+Order|Exec\.\s*Order|E\.\s?O\.)\s*(?:No\.?\s*)?(?P<number>\d{4,5})\b",
        )
        .expect("valid executive order regex")
    })
}

fn federal_register_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?P<vol>\d{1,3})\s+(?:FR|Fed\.\s?Reg\.)\s+(?P<page>\d{1,6})\b")
            .expect("valid Federal Register regex")
    })
}

/// Map a matched reporter (any spacing) to its canonical abbreviation.
pub fn normalize_reporter(raw: &str) -> Option<&'static str> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '’' { '\'' } else { c })
        .collect();
    REPORTERS
        .iter()
        .copied()
        .find(|r| r.replace(' ', "") == compact)
}

fn normalize_cal_code(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let name = [
        ("penal", "Penal"),
        ("gov", "Gov."),
        ("civ", "Civ."),
        ("bus", "Bus. & Prof."),
        ("health", "Health & Saf."),
        ("lab", "Lab."),
        ("veh", "Veh."),
        ("welf", "Welf. & Inst."),
        ("educ", "Educ."),
        ("fam", "Fam."),
        ("evid", "Evid."),
        ("ins", "Ins."),
        ("elec", "Elec."),
    ]
    .iter()
    .find(|(prefix, _)| lower.starts_with(prefix))
    .map(|(_, name)| *name);
    name.map(str::to_string).unwrap_or_else(|| raw.to_string())
}

fn num<T: std::str::FromStr>(caps: &Captures<'_>, name: &str) -> Option<T> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

fn text_of(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().replace('–', "-"))
}

// ============ Extraction ============

/// Extract all citations from `text`, in order of appearance, with
/// overlapping matches removed. Short forms are resolved before returning.
pub fn extract_citations(text: &str) -> Vec<Citation> {
    let mut found: Vec<Citation> = Vec::new();

    // Manual iteration: a parallel cite shortens the match, and the next
    // search has to resume at the shortened end.
    let mut pos = 0;
    while let Some(caps) = case_re().captures_at(text, pos) {
        let whole = caps.get(0).expect("group 0 always present");
        pos = whole.end();
        let Some(reporter) = caps.name("rep").and_then(|m| normalize_reporter(m.as_str())) else {
            continue;
        };
        let (Some(volume), Some(page)) = (num(&caps, "vol"), num(&caps, "page")) else {
            continue;
        };

        let mut end = whole.end();
        let mut pin = text_of(&caps, "pin");
        let mut year = num::<u16>(&caps, "year");

        // `410 U.S. 113, 93 S. Ct. 705`: the "pin" is really the next
        // parallel cite's volume.
        if let Some(pin_match) = caps.name("pin") {
            let parallel = case_re()
                .find_at(text, pin_match.start())
                .map(|m| m.start() == pin_match.start())
                .unwrap_or(false);
            if parallel {
                pin = None;
                year = None;
                end = caps.name("page").map(|m| m.end()).unwrap_or(end);
                pos = end;
            }
        }

        found.push(Citation {
            kind: CitationKind::Case {
                volume,
                reporter: reporter.to_string(),
                page,
                pin,
                year,
            },
            raw: text[whole.start()..end].to_string(),
            start: whole.start(),
            end,
            antecedent: None,
        });
    }

    for caps in short_case_re().captures_iter(text) {
        let Some(reporter) = caps.name("rep").and_then(|m| normalize_reporter(m.as_str())) else {
            continue;
        };
        let (Some(volume), Some(pin)) = (num(&caps, "vol"), text_of(&caps, "pin")) else {
            continue;
        };
        found.push(make(
            CitationKind::ShortCase {
                volume,
                reporter: reporter.to_string(),
                pin,
            },
            &caps,
        ));
    }

    for caps in id_re().captures_iter(text) {
        found.push(make(
            CitationKind::Id {
                pin: text_of(&caps, "pin"),
            },
            &caps,
        ));
    }

    for caps in usc_re().captures_iter(text) {
        let (Some(title), Some(section)) = (num(&caps, "title"), text_of(&caps, "section")) else {
            continue;
        };
        found.push(make(
            CitationKind::Statute {
                title: Some(title),
                code: "U.S.C.".to_string(),
                section,
            },
            &caps,
        ));
    }

    for caps in cal_code_re().captures_iter(text) {
        let (Some(code), Some(section)) = (text_of(&caps, "code"), text_of(&caps, "section"))
        else {
            continue;
        };
        found.push(make(
            CitationKind::Statute {
                title: None,
                code: normalize_cal_code(&code),
                section,
            },
            &caps,
        ));
    }

    for caps in public_law_re().captures_iter(text) {
        let (Some(congress), Some(number)) = (num(&caps, "congress"), num(&caps, "number")) else {
            continue;
        };
        found.push(make(CitationKind::PublicLaw { congress, number }, &caps));
    }

    for caps in federal_bill_re().captures_iter(text) {
        let (Some(raw_type), Some(number)) = (text_of(&caps, "type"), num(&caps, "number")) else {
            continue;
        };
        let congress = num(&caps, "c1").or_else(|| num(&caps, "c2"));
        found.push(make(
            CitationKind::Bill {
                jurisdiction: "us".to_string(),
                bill_type: normalize_bill_type(&raw_type),
                number,
                congress,
            },
            &caps,
        ));
    }

    for caps in california_bill_re().captures_iter(text) {
        let (Some(raw_type), Some(number)) = (text_of(&caps, "type"), num(&caps, "number")) else {
            continue;
        };
        found.push(make(
            CitationKind::Bill {
                jurisdiction: "ca".to_string(),
                bill_type: normalize_bill_type(&raw_type),
                number,
                congress: None,
            },
            &caps,
        ));
    }

    for caps in executive_order_re().captures_iter(text) {
        let Some(number) = num(&caps, "number") else {
            continue;
        };
        found.push(make(CitationKind::ExecutiveOrder { number }, &caps));
    }

    for caps in federal_register_re().captures_iter(text) {
        let (Some(volume), Some(page)) = (num(&caps, "vol"), num(&caps, "page")) else {
            continue;
        };
        found.push(make(CitationKind::FederalRegister { volume, page }, &caps));
    }

    let mut citations = remove_overlaps(found);
    resolve_short_forms(&mut citations);
    citations
}

fn make(kind: CitationKind, caps: &Captures<'_>) -> Citation {
    let whole = caps.get(0).expect("group 0 always present");
    Citation {
        kind,
        raw: whole.as_str().to_string(),
        start: whole.start(),
        end: whole.end(),
        antecedent: None,
    }
}

/// Keep the earliest, then longest, of any overlapping matches.
fn remove_overlaps(mut found: Vec<Citation>) -> Vec<Citation> {
    found.sort_by(|a, b| a.start.cmp(&b.start).then((b.end - b.start).cmp(&(a.end - a.start))));

    let mut kept: Vec<Citation> = Vec::with_capacity(found.len());
    for c in found {
        match kept.last() {
            Some(last) if c.start < last.end => continue,
            _ => kept.push(c),
        }
    }
    kept
}

/// Link short forms to the full citations they abbreviate.
///
/// * `Id.` refers to the immediately preceding citation. If that one is
///   itself a short form, its antecedent is inherited so chains of `Id.`
///   land on the full cite.
/// * `410 U.S. at 120` refers to the most recent preceding full case cite
///   with the same volume and reporter.
pub fn resolve_short_forms(citations: &mut [Citation]) {
    for i in 0..citations.len() {
        let antecedent = match &citations[i].kind {
            CitationKind::Id { .. } => match i.checked_sub(1) {
                Some(prev) if citations[prev].kind.is_short_form() => citations[prev].antecedent,
                Some(prev) => Some(prev),
                None => None,
            },
            CitationKind::ShortCase {
                volume, reporter, ..
            } => (0..i).rev().find(|&j| {
                matches!(
                    &citations[j].kind,
                    CitationKind::Case { volume: v, reporter: r, .. } if v == volume && r == reporter
                )
            }),
            _ => continue,
        };
        citations[i].antecedent = antecedent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<String> {
        extract_citations(text)
            .iter()
            .map(|c| c.normalized())
            .collect()
    }

    #[test]
    fn test_full_case_cite_with_pin_and_year() {
        let cites = extract_citations("See Roe v. Wade, 410 U.S. 113, 153 (1973).");
        assert_eq!(cites.len(), 1);
        match &cites[0].kind {
            CitationKind::Case {
                volume,
                reporter,
                page,
                pin,
                year,
            } => {
                assert_eq!(*volume, 410);
                assert_eq!(reporter, "U.S.");
                assert_eq!(*page, 113);
                assert_eq!(pin.as_deref(), Some("153"));
                assert_eq!(*year, Some(1973));
            }
            other => panic!("expected case cite, got {:?}", other),
        }
        assert_eq!(cites[0].raw, "410 U.S. 113, 153 (1973)");
    }

    #[test]
    fn test_reporter_spacing_variants_normalize() {
        assert_eq!(normalize_reporter("U. S."), Some("U.S."));
        assert_eq!(normalize_reporter("S.Ct."), Some("S. Ct."));
        assert_eq!(normalize_reporter("F. 3d"), Some("F.3d"));
        assert_eq!(normalize_reporter("Cal.App.4th"), Some("Cal. App. 4th"));
        assert_eq!(normalize_reporter("Wash."), None);
        assert_eq!(kinds("93 S.Ct. 705"), vec!["93 S. Ct. 705"]);
        assert_eq!(kinds("12 F. Supp. 2d 345"), vec!["12 F. Supp. 2d 345"]);
    }

    #[test]
    fn test_parallel_cites_are_separate() {
        let cites = extract_citations("410 U.S. 113, 93 S. Ct. 705, 35 L. Ed. 2d 147 (1973)");
        let norm: Vec<String> = cites.iter().map(|c| c.normalized()).collect();
        assert_eq!(norm, vec!["410 U.S. 113", "93 S. Ct. 705", "35 L. Ed. 2d 147"]);
        match &cites[0].kind {
            CitationKind::Case { pin, .. } => assert!(pin.is_none()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_case_cite_is_not_also_a_senate_bill() {
        let cites = extract_citations("410 U.S. 113");
        assert_eq!(cites.len(), 1);
        assert_eq!(cites[0].kind.type_name(), "case");
    }

    #[test]
    fn test_short_form_resolves_to_matching_case() {
        let text = "Roe, 410 U.S. 113; Casey, 505 U.S. 833. Later, 410 U.S. at 120.";
        let cites = extract_citations(text);
        assert_eq!(cites.len(), 3);
        assert_eq!(cites[2].kind.type_name(), "short_case");
        assert_eq!(cites[2].antecedent, Some(0));
        assert_eq!(cites[2].target(&cites).unwrap().normalized(), "410 U.S. 113");
        assert_eq!(cites[2].lookup_key(&cites).as_deref(), Some("410 U.S. 113"));
    }

    #[test]
    fn test_short_form_without_antecedent_stays_unresolved() {
        let cites = extract_citations("As noted, 999 U.S. at 4.");
        assert_eq!(cites.len(), 1);
        assert_eq!(cites[0].antecedent, None);
        assert!(cites[0].target(&cites).is_none());
    }

    #[test]
    fn test_id_chains_follow_to_full_cite() {
        let text = "42 U.S.C. § 1983. Id. at 4. Id.";
        let cites = extract_citations(text);
        assert_eq!(cites.len(), 3);
        assert_eq!(cites[1].antecedent, Some(0));
        assert_eq!(cites[2].antecedent, Some(0));
        assert_eq!(cites[1].normalized(), "Id. at 4");
    }

    #[test]
    fn test_leading_id_is_unresolved() {
        let cites = extract_citations("Id. at 7.");
        assert_eq!(cites.len(), 1);
        assert_eq!(cites[0].antecedent, None);
    }

    #[test]
    fn test_statutes() {
        assert_eq!(kinds("under 42 U.S.C. § 1983,"), vec!["42 U.S.C. § 1983"]);
        assert_eq!(kinds("18 USC 1030"), vec!["18 U.S.C. § 1030"]);
        assert_eq!(kinds("42 U.S.C. §§ 2000e-2(a)"), vec!["42 U.S.C. § 2000e-2(a)"]);
        assert_eq!(
            kinds("Cal. Penal Code § 187 and Cal. Civ. Code § 1798.100."),
            vec!["Cal. Penal Code § 187", "Cal. Civ. Code § 1798.100"]
        );
        assert_eq!(
            kinds("California Government Code section 11135"),
            vec!["Cal. Gov. Code § 11135"]
        );
    }

    #[test]
    fn test_public_laws() {
        assert_eq!(
            kinds("Pub. L. No. 117-58, P.L. 116-136, and Public Law 115-97"),
            vec!["Pub. L. 117-58", "Pub. L. 116-136", "Pub. L. 115-97"]
        );
    }

    #[test]
    fn test_bills() {
        assert_eq!(
            kinds("H.R. 1234 (118th Cong.), S. 567, H.J.Res. 7, and S.Res. 4"),
            vec!["H.R. 1234", "S. 567", "H.J.Res. 7", "S.Res. 4"]
        );
        let cites = extract_citations("H.R. 3684, 117th Congress");
        match &cites[0].kind {
            CitationKind::Bill { congress, .. } => assert_eq!(*congress, Some(117)),
            _ => unreachable!(),
        }
        assert_eq!(kinds("SB 1047 and A.B. 5"), vec!["SB 1047", "AB 5"]);
    }

    #[test]
    fn test_executive_orders_and_federal_register() {
        assert_eq!(
            kinds("Executive Order 14067, published at 87 FR 14143; see also E.O. 13985 and Exec. Order No. 14110."),
            vec!["E.O. 14067", "87 FR 14143", "E.O. 13985", "E.O. 14110"]
        );
        assert_eq!(kinds("86 Fed. Reg. 7009"), vec!["86 FR 7009"]);
    }

    #[test]
    fn test_no_citations_in_plain_prose() {
        assert!(extract_citations("The committee met on Tuesday to discuss the budget.").is_empty());
        assert!(extract_citations("").is_empty());
    }

    #[test]
    fn test_spans_are_ordered_and_disjoint() {
        let text = "42 U.S.C. § 1983; 410 U.S. 113; Id.; H.R. 5; E.O. 14067";
        let cites = extract_citations(text);
        for pair in cites.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        for c in &cites {
            assert_eq!(&text[c.start..c.end], c.raw);
        }
    }
}
