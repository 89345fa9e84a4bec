//! Evaluation of MySQL boolean-mode full-text queries.
//!
//! The document stores use this module as their native match operator:
//! `BooleanQuery::parse` reads a query in the syntax accepted by
//! `MATCH (...) AGAINST (... IN BOOLEAN MODE)` and `score` returns the
//! relevance of a text, or `None` when the text does not match.
//!
//! Supported syntax:
//! - `+word` must be present, `-word` must be absent, a bare word is
//!   optional and only contributes to relevance.
//! - `"some phrase"` matches consecutive words.
//! - `( ... )` nests a sub-query that is evaluated as a unit.
//! - `word*` matches any word starting with `word`.
//! - `field:value` is matched on `value`; documents carry a single
//!   text column.
//! - `~`, `<` and `>` are accepted and treated as optional markers.
//!
//! Matching is case-insensitive on words made of alphanumeric
//! characters and `_`. Relevance is the sum of the occurrence counts
//! of every matched non-excluded clause.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Required,
    Excluded,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Word { text: String, prefix: bool },
    Phrase(Vec<String>),
    Group(Vec<Clause>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    modifier: Modifier,
    node: Node,
}

/// A parsed boolean-mode query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanQuery {
    clauses: Vec<Clause>,
}

impl BooleanQuery {
    /// Parse a native query string.
    ///
    /// Parsing is lenient, as in MySQL: stray operators and unbalanced
    /// delimiters are skipped rather than rejected.
    pub fn parse(query: &str) -> Self {
        let mut chars = query.chars().peekable();
        Self {
            clauses: parse_level(&mut chars, 0),
        }
    }

    /// Whether the query holds no clause at all.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Relevance of `text` for this query, `None` when it does not match.
    pub fn score(&self, text: &str) -> Option<f64> {
        let words = normalize_words(text);
        eval_level(&self.clauses, &words)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.score(text).is_some()
    }
}

/// Split `text` into lowercase words.
pub fn normalize_words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn parse_level(chars: &mut Peekable<Chars<'_>>, depth: usize) -> Vec<Clause> {
    let mut clauses = Vec::new();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let Some(&ch) = chars.peek() else {
            break;
        };

        if ch == ')' {
            chars.next();
            if depth > 0 {
                break;
            }
            continue;
        }

        let modifier = match ch {
            '+' => Modifier::Required,
            '-' => Modifier::Excluded,
            _ => Modifier::Optional,
        };
        if matches!(ch, '+' | '-' | '~' | '<' | '>') {
            chars.next();
        }

        let node = match chars.peek() {
            Some('(') => {
                chars.next();
                let inner = parse_level(chars, depth + 1);
                if inner.is_empty() {
                    None
                } else {
                    Some(Node::Group(inner))
                }
            }
            Some('"') => {
                chars.next();
                let mut phrase = String::new();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    phrase.push(c);
                }
                let words = normalize_words(&phrase);
                if words.is_empty() {
                    None
                } else {
                    Some(Node::Phrase(words))
                }
            }
            Some(c) if c.is_whitespace() => None,
            Some(_) => {
                let mut raw = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"') {
                        break;
                    }
                    raw.push(c);
                    chars.next();
                }
                word_node(&raw)
            }
            None => None,
        };

        if let Some(node) = node {
            clauses.push(Clause { modifier, node });
        }
    }

    clauses
}

fn word_node(raw: &str) -> Option<Node> {
    let value = raw.rsplit(':').next().unwrap_or(raw);
    let (value, prefix) = match value.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (value, false),
    };

    let mut words = normalize_words(value);
    match words.len() {
        0 => None,
        1 => Some(Node::Word {
            text: words.remove(0),
            prefix,
        }),
        _ => Some(Node::Phrase(words)),
    }
}

fn eval_level(clauses: &[Clause], words: &[String]) -> Option<f64> {
    let mut score = 0.0;
    let mut has_required = false;
    let mut optional_matched = false;

    for clause in clauses {
        let hit = eval_node(&clause.node, words);
        match clause.modifier {
            Modifier::Excluded => {
                if hit.is_some() {
                    return None;
                }
            }
            Modifier::Required => {
                has_required = true;
                score += hit?;
            }
            Modifier::Optional => {
                if let Some(value) = hit {
                    optional_matched = true;
                    score += value;
                }
            }
        }
    }

    if has_required || optional_matched {
        Some(score)
    } else {
        None
    }
}

fn eval_node(node: &Node, words: &[String]) -> Option<f64> {
    let count = match node {
        Node::Word { text, prefix } => words
            .iter()
            .filter(|w| {
                if *prefix {
                    w.starts_with(text.as_str())
                } else {
                    *w == text
                }
            })
            .count(),
        Node::Phrase(phrase) => {
            if phrase.len() > words.len() {
                0
            } else {
                words
                    .windows(phrase.len())
                    .filter(|window| window == &phrase.as_slice())
                    .count()
            }
        }
        Node::Group(clauses) => return eval_level(clauses, words),
    };

    if count == 0 {
        None
    } else {
        Some(count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_and_excluded_terms() {
        let query = BooleanQuery::parse("+rust -unsafe");
        assert!(query.matches("Rust makes systems programming pleasant"));
        assert!(!query.matches("unsafe Rust is still Rust"));
        assert!(!query.matches("golang"));
    }

    #[test]
    fn optional_terms_need_at_least_one_hit() {
        let query = BooleanQuery::parse("rust golang");
        assert!(query.matches("a golang service"));
        assert!(!query.matches("a python service"));
    }

    #[test]
    fn optional_terms_raise_relevance() {
        let query = BooleanQuery::parse("+rust cli");
        let plain = query.score("rust library").expect("match");
        let boosted = query.score("rust cli tool").expect("match");
        assert!(boosted > plain);
    }

    #[test]
    fn phrases_match_consecutive_words() {
        let query = BooleanQuery::parse(r#"+"error handling""#);
        assert!(query.matches("Notes on error handling in Rust"));
        assert!(!query.matches("handling an error"));
    }

    #[test]
    fn groups_are_evaluated_as_a_unit() {
        let query = BooleanQuery::parse("+web +(rust golang) -(java kotlin)");
        assert!(query.matches("web services in golang"));
        assert!(!query.matches("web services in python"));
        assert!(!query.matches("web services in golang and kotlin"));
    }

    #[test]
    fn prefix_and_field_syntax() {
        assert!(BooleanQuery::parse("+optim*").matches("optimizing compilers"));
        assert!(BooleanQuery::parse("+title:guide").matches("the guide"));
    }

    #[test]
    fn only_excluded_terms_match_nothing() {
        let query = BooleanQuery::parse("-rust");
        assert!(!query.matches("golang"));
        assert!(BooleanQuery::parse("").is_empty());
        assert!(!BooleanQuery::parse("").matches("anything"));
    }

    #[test]
    fn relevance_counts_occurrences() {
        let query = BooleanQuery::parse("+rust");
        assert_eq!(query.score("rust rust rust"), Some(3.0));
        assert_eq!(query.score("Rust"), Some(1.0));
    }
}
