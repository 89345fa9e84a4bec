//! Query expression tree.
//!
//! `QueryExpr` is the engine-agnostic form of a search query. It is
//! produced by `query::parse` (or built directly by callers) and
//! consumed by the `QueryConverter`, which serializes it into a
//! backend's native boolean syntax.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A parsed query expression.
///
/// Trees are immutable once built. A `Not` child is expected to
/// contain at least one term and an `Or` to hold two or more
/// children; the `and`/`or` constructors maintain the latter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryExpr {
    /// A single bare word.
    Term(String),
    /// An exact phrase, stored as written.
    Phrase(String),
    /// A value scoped to a named field (`title:guide`).
    Field {
        /// Field name.
        name: String,
        /// Word or phrase matched within the field.
        value: String,
    },
    /// Results must not match the inner expression.
    Not(Box<QueryExpr>),
    /// At least one alternative must match.
    Or(Vec<QueryExpr>),
    /// Explicit precedence grouping.
    Group(Box<QueryExpr>),
    /// Implicit conjunction of clauses.
    And(Vec<QueryExpr>),
}

impl QueryExpr {
    pub fn term(value: impl Into<String>) -> Self {
        Self::Term(value.into())
    }

    pub fn phrase(value: impl Into<String>) -> Self {
        Self::Phrase(value.into())
    }

    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn group(inner: Self) -> Self {
        Self::Group(Box::new(inner))
    }

    /// Creates an And expression, flattening nested Ands.
    ///
    /// A single clause is returned unwrapped.
    pub fn and(exprs: Vec<Self>) -> Self {
        let mut flattened: Vec<Self> = exprs
            .into_iter()
            .flat_map(|e| match e {
                Self::And(inner) => inner,
                other => vec![other],
            })
            .collect();

        if flattened.len() == 1 {
            flattened.remove(0)
        } else {
            Self::And(flattened)
        }
    }

    /// Creates an Or expression, flattening nested Ors.
    ///
    /// A disjunction of one degenerates to its only child.
    pub fn or(exprs: Vec<Self>) -> Self {
        let mut flattened: Vec<Self> = exprs
            .into_iter()
            .flat_map(|e| match e {
                Self::Or(inner) => inner,
                other => vec![other],
            })
            .collect();

        if flattened.len() == 1 {
            flattened.remove(0)
        } else {
            Self::Or(flattened)
        }
    }

    /// Whether the tree contains at least one non-empty term, phrase
    /// or fielded value (negated or not).
    pub fn has_terms(&self) -> bool {
        match self {
            Self::Term(value) | Self::Phrase(value) => !value.trim().is_empty(),
            Self::Field { value, .. } => !value.trim().is_empty(),
            Self::Not(inner) | Self::Group(inner) => inner.has_terms(),
            Self::Or(exprs) | Self::And(exprs) => exprs.iter().any(Self::has_terms),
        }
    }

    /// Whether the node renders as a single token, so it can be
    /// negated or ORed without an enclosing group.
    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            Self::Term(_) | Self::Phrase(_) | Self::Field { .. } | Self::Group(_)
        )
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match self {
            Self::Term(s) => writeln!(f, "{prefix}Term({s:?})"),
            Self::Phrase(s) => writeln!(f, "{prefix}Phrase({s:?})"),
            Self::Field { name, value } => writeln!(f, "{prefix}Field({name:?}, {value:?})"),
            Self::Not(inner) => {
                writeln!(f, "{prefix}Not")?;
                inner.fmt_tree(f, indent + 1)
            }
            Self::Group(inner) => {
                writeln!(f, "{prefix}Group")?;
                inner.fmt_tree(f, indent + 1)
            }
            Self::Or(exprs) | Self::And(exprs) => {
                let label = if matches!(self, Self::Or(_)) { "Or" } else { "And" };
                writeln!(f, "{prefix}{label}")?;
                for expr in exprs {
                    expr.fmt_tree(f, indent + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}
