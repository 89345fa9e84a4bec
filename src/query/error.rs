//! Error types for query parsing.

use thiserror::Error;

/// Error produced while turning a query string into a `QueryExpr`.
///
/// Positions are byte offsets into the original query string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unclosed quote starting at byte {position}")]
    UnclosedQuote { position: usize },

    #[error("unbalanced parenthesis at byte {position}")]
    UnbalancedParen { position: usize },

    #[error("{message} at byte {position}")]
    Unexpected { message: String, position: usize },

    #[error("unexpected end of query: {message}")]
    UnexpectedEnd { message: String },
}

impl QueryError {
    pub(crate) fn unexpected(message: impl Into<String>, position: usize) -> Self {
        Self::Unexpected {
            message: message.into(),
            position,
        }
    }

    /// Returns a hint for common mistakes, when one applies.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::UnclosedQuote { .. } => Some("add a closing quote (\") to complete the phrase"),
            Self::UnbalancedParen { .. } => Some("every '(' needs a matching ')'"),
            Self::Unexpected { message, .. } | Self::UnexpectedEnd { message }
                if message.contains("OR") =>
            {
                Some("OR requires expressions on both sides, e.g. 'rust OR golang'")
            }
            _ => None,
        }
    }
}
