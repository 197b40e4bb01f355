//! SQLite FTS5 `MATCH` expression builder.
//!
//! User queries are never passed to FTS5 verbatim: stray quotes, colons,
//! parentheses, or a bare `NOT` all make `MATCH` fail with a syntax error.
//! [`build_match_query`] parses a small grammar and re-emits every term as a
//! quoted FTS5 string.
//!
//! | Input | Output |
//! |-------|--------|
//! | `clean water` | `"clean" "water"` |
//! | `"due process" liberty` | `"due process" "liberty"` |
//! | `tax*` | `"tax"*` |
//! | `abortion OR contraception` | `"abortion" OR "contraception"` |
//! | `privacy -data` | `"privacy" NOT "data"` |

use crate::citation::extract_citations;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Term { text: String, prefix: bool, negated: bool },
    Or,
}

/// Keep letters, digits, and in-word `'`, `-`, `.`; a term with no
/// alphanumerics would tokenize to nothing and match no rows.
fn clean_bare_term(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '\'' | '-' | '.'))
        .collect();
    if !cleaned.chars().any(char::is_alphanumeric) {
        return String::new();
    }
    cleaned
        .trim_matches(|c| c == '.' || c == '-' || c == '\'')
        .to_string()
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn tokenize(query: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let negated = c == '-';
        if negated {
            chars.next();
        }

        if chars.peek() == Some(&'"') {
            chars.next();
            let mut phrase = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                phrase.push(c);
            }
            let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
            let prefix = chars.peek() == Some(&'*');
            if prefix {
                chars.next();
            }
            if !phrase.is_empty() {
                tokens.push(Token::Term {
                    text: phrase,
                    prefix,
                    negated,
                });
            }
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            word.push(c);
            chars.next();
        }

        if word == "OR" && !negated {
            tokens.push(Token::Or);
            continue;
        }

        let prefix = word.ends_with('*');
        let text = clean_bare_term(&word);
        if !text.is_empty() {
            tokens.push(Token::Term {
                text,
                prefix,
                negated,
            });
        }
    }

    tokens
}

/// Build an FTS5 `MATCH` expression, or `None` if no positive term remains.
pub fn build_match_query(query: &str) -> Option<String> {
    let tokens = tokenize(query);

    let mut positive: Vec<String> = Vec::new();
    let mut negative: Vec<String> = Vec::new();
    let mut pending_or = false;

    for token in tokens {
        match token {
            Token::Or => pending_or = !positive.is_empty(),
            Token::Term {
                text,
                prefix,
                negated,
            } => {
                let mut term = quote(&text);
                if prefix {
                    term.push('*');
                }
                if negated {
                    negative.push(term);
                } else {
                    if pending_or {
                        positive.push("OR".to_string());
                    }
                    positive.push(term);
                }
                pending_or = false;
            }
        }
    }

    if positive.is_empty() {
        return None;
    }

    let mut expr = positive.join(" ");
    if !negative.is_empty() {
        if positive.len() > 1 {
            expr = format!("({})", expr);
        }
        for term in negative {
            expr.push_str(" NOT ");
            expr.push_str(&term);
        }
    }
    Some(expr)
}

/// Whether the query contains a recognizable legal citation.
pub fn looks_like_citation(query: &str) -> bool {
    !extract_citations(query).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_terms_are_quoted() {
        assert_eq!(
            build_match_query("clean water").as_deref(),
            Some("\"clean\" \"water\"")
        );
    }

    #[test]
    fn test_phrase_prefix_and_or() {
        assert_eq!(
            build_match_query("\"due  process\" liberty").as_deref(),
            Some("\"due process\" \"liberty\"")
        );
        assert_eq!(build_match_query("tax*").as_deref(), Some("\"tax\"*"));
        assert_eq!(
            build_match_query("abortion OR contraception").as_deref(),
            Some("\"abortion\" OR \"contraception\"")
        );
    }

    #[test]
    fn test_negation_goes_last() {
        assert_eq!(
            build_match_query("-data privacy").as_deref(),
            Some("\"privacy\" NOT \"data\"")
        );
        assert_eq!(
            build_match_query("privacy OR speech -data").as_deref(),
            Some("(\"privacy\" OR \"speech\") NOT \"data\"")
        );
    }

    #[test]
    fn test_only_negated_terms_yield_none() {
        assert_eq!(build_match_query("-data"), None);
        assert_eq!(build_match_query("   "), None);
        assert_eq!(build_match_query("OR"), None);
        assert_eq!(build_match_query("():*"), None);
    }

    #[test]
    fn test_fts_syntax_is_neutralized() {
        assert_eq!(
            build_match_query("title:water (NEAR)").as_deref(),
            Some("\"titlewater\" \"NEAR\"")
        );
        assert_eq!(
            build_match_query("\"unterminated phrase").as_deref(),
            Some("\"unterminated phrase\"")
        );
        assert_eq!(
            build_match_query("dangling OR").as_deref(),
            Some("\"dangling\"")
        );
    }

    #[test]
    fn test_citation_terms_survive() {
        assert_eq!(
            build_match_query("§ 1983").as_deref(),
            Some("\"1983\"")
        );
        assert!(looks_like_citation("410 U.S. 113"));
        assert!(looks_like_citation("what did E.O. 14067 require"));
        assert!(!looks_like_citation("water rights"));
    }
}
