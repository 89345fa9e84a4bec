//! Query expressions and their translation to native boolean syntax.
//!
//! - `ast`: the engine-agnostic `QueryExpr` tree.
//! - `parser`: user query strings into trees.
//! - `convert`: trees into a backend's boolean query string.
//! - `boolean_mode`: evaluation of MySQL boolean-mode strings, used by
//!   the document stores as their native match operator.

mod ast;
pub mod boolean_mode;
mod convert;
mod error;
mod parser;

pub use ast::QueryExpr;
pub use boolean_mode::BooleanQuery;
pub use convert::{ConvertedQuery, QueryConverter, QuoteRule, Symbols};
pub use error::QueryError;
pub use parser::parse;
