//! Conversion of `QueryExpr` trees into a backend's boolean syntax.
//!
//! One algorithm serves every backend: each backend contributes a
//! `Symbols` table (quotes, grouping delimiters, AND/OR/NOT tokens
//! and separators) and the converter substitutes its tokens while
//! walking the tree.
//!
//! Prefixing rules:
//! - A term, phrase or fielded value outside a phrase, a negation and
//!   a disjunction carries the AND token (it is required).
//! - Negation suppresses the AND token regardless of any enclosing
//!   disjunction.
//! - Disjunction siblings are joined by the OR token; a negated
//!   disjunction is grouped so the negation covers every alternative.
//! - A group carries the AND token unless it is negated or is itself
//!   an alternative of a disjunction, and its contents are converted
//!   in a fresh scope.
//!
//! The scope is passed by value through the recursion, so leaving a
//! subtree restores the enclosing state automatically.

use serde::{Deserialize, Serialize};

use crate::models::Dialect;
use crate::query::ast::QueryExpr;

/// How quote characters found inside a value are neutralized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteRule {
    /// Remove them.
    Strip,
    /// Prefix them (and the escape character itself) with the given
    /// character.
    Escape(char),
}

/// Token table for one backend syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbols {
    /// Opening and closing phrase quotes.
    pub quotes: (char, char),
    /// Opening and closing grouping delimiters.
    pub groupers: (char, char),
    /// Prefix marking a required clause.
    pub and: &'static str,
    /// Separator joining the alternatives of a disjunction.
    pub or: &'static str,
    /// Prefix marking an excluded clause.
    pub not: &'static str,
    /// Separator emitted after each clause.
    pub separator: &'static str,
    /// Token between a field name and its value.
    pub field_separator: &'static str,
    pub quote_rule: QuoteRule,
}

impl Symbols {
    /// MySQL `MATCH ... AGAINST (... IN BOOLEAN MODE)` syntax.
    pub const MYSQL_BOOLEAN: Self = Self {
        quotes: ('"', '"'),
        groupers: ('(', ')'),
        and: "+",
        or: " ",
        not: "-",
        separator: " ",
        field_separator: ":",
        quote_rule: QuoteRule::Strip,
    };

    /// Lucene classic query parser syntax.
    pub const LUCENE: Self = Self {
        quotes: ('"', '"'),
        groupers: ('(', ')'),
        and: "+",
        or: " OR ",
        not: "-",
        separator: " ",
        field_separator: ":",
        quote_rule: QuoteRule::Escape('\\'),
    };

    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::MysqlBoolean => Self::MYSQL_BOOLEAN,
            Dialect::Lucene => Self::LUCENE,
        }
    }
}

/// Result of a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedQuery {
    /// Native query string; empty when the expression had no positive
    /// terms.
    pub query: String,
    /// Field names referenced by fielded terms, in first-seen order.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ConvertedQuery {
    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }
}

/// Serializes query trees using a fixed symbol table.
#[derive(Debug, Clone, Copy)]
pub struct QueryConverter {
    symbols: Symbols,
}

impl QueryConverter {
    pub fn new(symbols: Symbols) -> Self {
        Self { symbols }
    }

    pub fn for_dialect(dialect: Dialect) -> Self {
        Self::new(Symbols::for_dialect(dialect))
    }

    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    /// Convert `expr` into the backend's native syntax.
    ///
    /// Returns an empty query when nothing but negated (or no) terms
    /// remain; such a query cannot select any document.
    pub fn convert(&self, expr: &QueryExpr) -> ConvertedQuery {
        let mut out = Output {
            symbols: &self.symbols,
            buf: String::new(),
            fields: Vec::new(),
            positive_terms: 0,
        };

        let root = Scope {
            separator: self.symbols.separator,
            in_phrase: false,
            in_not: false,
            in_or: false,
            negated: false,
        };
        out.emit(expr, root);
        out.trim_trailing(self.symbols.separator);

        if out.positive_terms == 0 {
            return ConvertedQuery::default();
        }

        ConvertedQuery {
            query: out.buf.trim().to_string(),
            fields: out.fields,
        }
    }
}

/// Conversion context for one subtree.
#[derive(Debug, Clone, Copy)]
struct Scope {
    separator: &'static str,
    in_phrase: bool,
    in_not: bool,
    in_or: bool,
    /// Some ancestor is a negation; unlike `in_not` this survives
    /// entering a group.
    negated: bool,
}

impl Scope {
    fn requires_and(&self) -> bool {
        !self.in_phrase && !self.in_not && !self.in_or
    }
}

struct Output<'s> {
    symbols: &'s Symbols,
    buf: String,
    fields: Vec<String>,
    positive_terms: usize,
}

impl Output<'_> {
    fn emit(&mut self, expr: &QueryExpr, scope: Scope) {
        match expr {
            QueryExpr::Term(value) => {
                let value = self.clean(value);
                if value.split_whitespace().nth(1).is_some() {
                    self.emit_phrase(&value, scope);
                } else {
                    let word = self.bare_word(&value);
                    if !word.is_empty() {
                        self.emit_prefix(scope);
                        self.emit_word(&word, scope);
                        self.write_sep(scope.separator);
                    }
                }
            }
            QueryExpr::Phrase(value) => {
                let value = self.clean(value);
                self.emit_phrase(&value, scope);
            }
            QueryExpr::Field { name, value } => self.emit_field(name, value, scope),
            QueryExpr::Not(inner) => {
                if let QueryExpr::Not(twice) = inner.as_ref() {
                    // Double negation cancels out.
                    self.emit(twice, scope);
                    return;
                }
                if !inner.has_terms() {
                    return;
                }
                let start = self.buf.len();
                self.buf.push_str(self.symbols.not);
                let negated = Scope {
                    in_not: true,
                    negated: true,
                    ..scope
                };
                self.emit(inner, negated);
                // Every value sanitized away; drop the dangling token.
                if self.buf.len() == start + self.symbols.not.len() {
                    self.buf.truncate(start);
                }
            }
            QueryExpr::Or(alternatives) => {
                let live: Vec<&QueryExpr> =
                    alternatives.iter().filter(|e| e.has_terms()).collect();
                match live.as_slice() {
                    [] => {}
                    [only] => self.emit(only, scope),
                    // Negating bare alternatives would only exclude the
                    // first of them.
                    _ if scope.in_not => self.emit_group(expr, scope),
                    _ => {
                        let disjunction = Scope {
                            separator: self.symbols.or,
                            in_or: true,
                            ..scope
                        };
                        for alternative in &live {
                            self.emit(alternative, disjunction);
                        }
                        self.trim_trailing(self.symbols.or);
                        self.write_sep(scope.separator);
                    }
                }
            }
            QueryExpr::Group(inner) => self.emit_group(inner, scope),
            QueryExpr::And(clauses) => {
                if scope.in_not || scope.in_or {
                    // A conjunction can only be negated or offered as an
                    // alternative as a whole.
                    self.emit_group(expr, scope);
                } else {
                    for clause in clauses {
                        self.emit(clause, scope);
                    }
                }
            }
        }
    }

    fn emit_group(&mut self, inner: &QueryExpr, scope: Scope) {
        if !inner.has_terms() {
            return;
        }

        if !scope.in_not && !scope.in_or {
            self.buf.push_str(self.symbols.and);
        }
        self.buf.push(self.symbols.groupers.0);

        let fresh = Scope {
            separator: self.symbols.separator,
            in_phrase: false,
            in_not: false,
            in_or: false,
            negated: scope.negated,
        };
        self.emit(inner, fresh);
        self.trim_trailing(self.symbols.separator);

        self.buf.push(self.symbols.groupers.1);
        self.write_sep(scope.separator);
    }

    fn emit_phrase(&mut self, value: &str, scope: Scope) {
        if value.trim().is_empty() {
            return;
        }

        self.emit_prefix(scope);
        self.emit_quoted(value, scope);
        self.write_sep(scope.separator);
    }

    fn emit_quoted(&mut self, value: &str, scope: Scope) {
        self.buf.push(self.symbols.quotes.0);
        let inside = Scope {
            separator: self.symbols.separator,
            in_phrase: true,
            ..scope
        };
        for word in value.split_whitespace() {
            self.emit_word(word, inside);
            self.write_sep(inside.separator);
        }
        self.trim_trailing(self.symbols.separator);
        self.buf.push(self.symbols.quotes.1);
    }

    fn emit_field(&mut self, name: &str, value: &str, scope: Scope) {
        let value = self.clean(value);
        let multiword = value.split_whitespace().nth(1).is_some();
        let value = if multiword {
            value
        } else {
            self.bare_word(&value)
        };
        if value.is_empty() {
            return;
        }

        let name = self.field_name(name);
        if name.is_empty() {
            if multiword {
                self.emit_phrase(&value, scope);
            } else {
                self.emit_prefix(scope);
                self.emit_word(&value, scope);
                self.write_sep(scope.separator);
            }
            return;
        }

        if !self.fields.contains(&name) {
            self.fields.push(name.clone());
        }

        self.emit_prefix(scope);
        self.buf.push_str(&name);
        self.buf.push_str(self.symbols.field_separator);
        if multiword {
            self.emit_quoted(&value, scope);
        } else {
            self.emit_word(&value, scope);
        }
        self.write_sep(scope.separator);
    }

    fn emit_prefix(&mut self, scope: Scope) {
        if scope.requires_and() {
            self.buf.push_str(self.symbols.and);
        }
    }

    fn emit_word(&mut self, word: &str, scope: Scope) {
        self.buf.push_str(word);
        if !scope.negated {
            self.positive_terms += 1;
        }
    }

    fn write_sep(&mut self, separator: &str) {
        let blank = separator.trim().is_empty();
        if blank && self.buf.ends_with(char::is_whitespace) {
            return;
        }
        self.buf.push_str(separator);
    }

    /// Drop a dangling separator (and trailing whitespace) before a
    /// closing delimiter or the end of the query.
    fn trim_trailing(&mut self, separator: &str) {
        if !separator.is_empty() && self.buf.ends_with(separator) {
            self.buf.truncate(self.buf.len() - separator.len());
        }
        let trimmed = self.buf.trim_end().len();
        self.buf.truncate(trimmed);
    }

    /// Neutralize quote and grouping characters inside a value.
    fn clean(&self, value: &str) -> String {
        let (open, close) = self.symbols.quotes;
        let (group_open, group_close) = self.symbols.groupers;
        let mut cleaned = String::with_capacity(value.len());
        for ch in value.trim().chars() {
            if ch == open || ch == close || ch == group_open || ch == group_close {
                if let QuoteRule::Escape(escape) = self.symbols.quote_rule {
                    cleaned.push(escape);
                    cleaned.push(ch);
                }
                continue;
            }
            if let QuoteRule::Escape(escape) = self.symbols.quote_rule {
                if ch == escape {
                    cleaned.push(escape);
                }
            }
            cleaned.push(ch);
        }
        cleaned
    }

    /// A cleaned single word must not start with the AND or NOT token,
    /// which the backend would read as an operator.
    fn bare_word(&self, word: &str) -> String {
        let operators = [self.symbols.and, self.symbols.not];
        match self.symbols.quote_rule {
            QuoteRule::Strip => {
                let mut rest = word;
                while let Some(op) = operators
                    .iter()
                    .find(|op| !op.is_empty() && rest.starts_with(**op))
                {
                    rest = &rest[op.len()..];
                }
                rest.to_string()
            }
            QuoteRule::Escape(escape) => {
                if operators
                    .iter()
                    .any(|op| !op.is_empty() && word.starts_with(*op))
                {
                    format!("{escape}{word}")
                } else {
                    word.to_string()
                }
            }
        }
    }

    /// Field names are emitted raw, so keep only word characters.
    fn field_name(&self, name: &str) -> String {
        name.chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '.'))
            .collect()
    }
}
