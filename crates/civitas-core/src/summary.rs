//! Plain-language summary helpers.
//!
//! Provides the prompt sent to LLM summarizers and an offline extractive
//! summarizer (leading sentences) used when no model is configured or in
//! tests. Sentence splitting knows about legal abbreviations so that
//! `410 U.S. 113` or `H.R. 5` do not end a sentence.

use crate::models::RecordKind;

/// Abbreviations that end in a period but do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "u.s", "v", "vs", "no", "nos", "h.r", "s", "j", "jj", "c.j", "id", "inc", "co", "corp", "sec",
    "secs", "e.g", "i.e", "etc", "mr", "mrs", "ms", "dr", "st", "pub", "l", "stat", "fed", "reg",
    "cal", "app", "supp", "ct", "ed", "art", "amend", "cong", "res", "e.o", "exec", "u.s.c",
];

pub const SYSTEM_PROMPT: &str = "You write plain-language summaries of U.S. laws, bills, court \
opinions, and executive orders for a general audience. Explain what the document does, who it \
affects, and its current status if stated. Avoid legal jargon, do not speculate beyond the text, \
and keep the summary under 200 words.";

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// User message for an LLM summarizer.
pub fn build_prompt(kind: RecordKind, title: &str, body: &str, max_input_chars: usize) -> String {
    let label = match kind {
        RecordKind::Bill => "legislative bill",
        RecordKind::Opinion => "Supreme Court opinion",
        RecordKind::ExecutiveOrder => "executive order",
    };
    let excerpt = truncate_chars(body.trim(), max_input_chars);
    let truncated = if excerpt.len() < body.trim().len() {
        "\n\n[Text truncated]"
    } else {
        ""
    };
    format!(
        "Summarize this {} in plain language.\n\nTitle: {}\n\nText:\n{}{}",
        label, title, excerpt, truncated
    )
}

fn is_abbreviation(word: &str) -> bool {
    let w = word
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if w.is_empty() {
        return false;
    }
    // Single letters are initials (`John G. Roberts`).
    if w.chars().count() == 1 && w.chars().all(|c| c.is_alphabetic()) {
        return true;
    }
    ABBREVIATIONS.contains(&w.as_str())
}

/// Split text into sentences, keeping terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut sentences = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        current.push(word);
        let trimmed = word.trim_end_matches(['"', '\'', ')', '”', '’']);
        let ends = trimmed.ends_with('.') || trimmed.ends_with('?') || trimmed.ends_with('!');
        if !ends {
            continue;
        }
        if trimmed.ends_with('.') && is_abbreviation(trimmed) {
            continue;
        }
        let next_starts_sentence = match words.get(i + 1) {
            Some(next) => next
                .chars()
                .next()
                .map(|c| c.is_uppercase() || c.is_ascii_digit() || matches!(c, '"' | '“' | '('))
                .unwrap_or(false),
            None => true,
        };
        if next_starts_sentence {
            sentences.push(current.join(" "));
            current.clear();
        }
    }

    if !current.is_empty() {
        sentences.push(current.join(" "));
    }
    sentences
}

/// Leading sentences of `body`, up to `max_sentences` and `max_chars`.
pub fn extractive_summary(body: &str, max_sentences: usize, max_chars: usize) -> String {
    let mut out = String::new();
    for sentence in split_sentences(body).into_iter().take(max_sentences) {
        let candidate_len = out.chars().count() + sentence.chars().count() + 1;
        if !out.is_empty() && candidate_len > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&sentence);
    }

    if out.chars().count() > max_chars {
        let cut = truncate_chars(&out, max_chars.saturating_sub(1));
        let cut = match cut.rfind(' ') {
            Some(pos) if pos > 0 => &cut[..pos],
            _ => cut,
        };
        return format!("{}…", cut.trim_end());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_split_respects_legal_abbreviations() {
        let text = "The Court relied on Roe v. Wade, 410 U.S. 113. It also cited H.R. 5 and 42 U.S.C. § 1983. Justice John G. Roberts wrote separately.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 3, "{:?}", sentences);
        assert!(sentences[0].ends_with("410 U.S. 113."));
        assert!(sentences[2].starts_with("Justice John G. Roberts"));
    }

    #[test]
    fn test_extractive_summary_limits() {
        let text = "First sentence here. Second sentence here. Third sentence here.";
        assert_eq!(
            extractive_summary(text, 2, 1000),
            "First sentence here. Second sentence here."
        );
        assert_eq!(extractive_summary(text, 5, 25), "First sentence here.");
        assert_eq!(extractive_summary("", 3, 100), "");
    }

    #[test]
    fn test_overlong_single_sentence_is_cut_on_word_boundary() {
        let text = "This extraordinarily long sentence keeps going without any terminal punctuation at all";
        let summary = extractive_summary(text, 1, 30);
        assert!(summary.ends_with('…'));
        assert!(summary.chars().count() <= 30);
        assert!(summary.starts_with("This extraordinarily long"));
    }

    #[test]
    fn test_truncate_chars_is_boundary_safe() {
        assert_eq!(truncate_chars("§§§§", 2), "§§");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_prompt_marks_truncation() {
        let prompt = build_prompt(RecordKind::Bill, "H.R. 1: Test", "abcdef", 3);
        assert!(prompt.contains("legislative bill"));
        assert!(prompt.contains("Text:\nabc"));
        assert!(prompt.ends_with("[Text truncated]"));
        let full = build_prompt(RecordKind::Opinion, "X v. Y", "short", 100);
        assert!(!full.contains("[Text truncated]"));
    }
}
