//! Query string parsing.
//!
//! Turns a user-typed query into a `QueryExpr` tree:
//! - Whitespace-separated clauses are combined with AND.
//! - `a OR b` (or `a|b`) is a disjunction and binds tighter than the
//!   implicit AND, so `rust web OR cli` means `rust AND (web OR cli)`.
//! - `-word` and `NOT word` negate the following clause.
//! - `"..."` is a phrase; `( ... )` groups.
//! - `field:value` and `field:"some phrase"` scope a value to a field.
//! - A leading `+` is accepted and ignored; a bare `AND` keyword is
//!   a no-op.
//!
//! Disjunctions and compound negations that sit next to other AND
//! clauses are wrapped in `Group` so that the converter scopes them
//! instead of leaking OR semantics into the surrounding conjunction.

use crate::query::ast::QueryExpr;
use crate::query::error::QueryError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Term(String),
    Phrase(String),
    FieldPrefix(String),
    Or,
    Not,
    Plus,
    LParen,
    RParen,
}

/// Parse a query string.
///
/// Empty (or whitespace-only) input yields an empty `And`, which
/// converts to an empty native query.
pub fn parse(input: &str) -> Result<QueryExpr, QueryError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
    };

    let expr = parser.parse_and_expr()?;
    if let Some((_, pos)) = parser.tokens.get(parser.position) {
        // The only token that can stop a top-level conjunction is a
        // stray closing parenthesis.
        return Err(QueryError::UnbalancedParen { position: *pos });
    }

    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((Token::LParen, start));
            }
            ')' => {
                chars.next();
                tokens.push((Token::RParen, start));
            }
            '|' => {
                chars.next();
                tokens.push((Token::Or, start));
            }
            '"' => {
                chars.next();
                let mut phrase = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    phrase.push(c);
                }
                if !closed {
                    return Err(QueryError::UnclosedQuote { position: start });
                }
                tokens.push((Token::Phrase(phrase), start));
            }
            '-' | '+' => {
                chars.next();
                let attached = chars
                    .peek()
                    .map(|&(_, next)| !next.is_whitespace())
                    .unwrap_or(false);
                if attached {
                    let token = if ch == '-' { Token::Not } else { Token::Plus };
                    tokens.push((token, start));
                }
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '|') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                push_word(&mut tokens, word, start);
            }
        }
    }

    Ok(tokens)
}

fn push_word(tokens: &mut Vec<(Token, usize)>, word: String, start: usize) {
    match word.as_str() {
        "OR" => tokens.push((Token::Or, start)),
        "NOT" => tokens.push((Token::Not, start)),
        "AND" => {}
        _ => match word.split_once(':') {
            Some((name, value)) if !name.is_empty() => {
                tokens.push((Token::FieldPrefix(name.to_string()), start));
                if !value.is_empty() {
                    tokens.push((Token::Term(value.to_string()), start + name.len() + 1));
                }
            }
            _ => tokens.push((Token::Term(word), start)),
        },
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn current_pos(&self) -> Option<usize> {
        self.tokens.get(self.position).map(|(_, p)| *p)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// and_expr → or_expr*
    fn parse_and_expr(&mut self) -> Result<QueryExpr, QueryError> {
        let mut clauses = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(Token::RParen) if self.depth > 0 => break,
                Some(Token::RParen) => {
                    let position = self.current_pos().unwrap_or_default();
                    return Err(QueryError::UnbalancedParen { position });
                }
                Some(Token::Or) => {
                    let position = self.current_pos().unwrap_or_default();
                    return Err(QueryError::unexpected(
                        "unexpected OR (needs expression before it)",
                        position,
                    ));
                }
                Some(_) => clauses.push(self.parse_or_expr()?),
            }
        }

        let expr = QueryExpr::and(clauses);
        Ok(match expr {
            QueryExpr::And(clauses) if clauses.len() > 1 => {
                QueryExpr::And(clauses.into_iter().map(scope_in_conjunction).collect())
            }
            other => other,
        })
    }

    /// or_expr → unary ("OR" unary)*
    fn parse_or_expr(&mut self) -> Result<QueryExpr, QueryError> {
        let mut alternatives = vec![self.parse_unary()?];

        while self.peek() == Some(&Token::Or) {
            self.advance();
            if matches!(self.peek(), None | Some(Token::RParen) | Some(Token::Or)) {
                return Err(match self.current_pos() {
                    Some(position) => {
                        QueryError::unexpected("expected expression after OR", position)
                    }
                    None => QueryError::UnexpectedEnd {
                        message: "expected expression after OR".to_string(),
                    },
                });
            }
            alternatives.push(self.parse_unary()?);
        }

        Ok(QueryExpr::or(
            alternatives.into_iter().map(scope_in_disjunction).collect(),
        ))
    }

    /// unary → ("-" | "NOT") unary | "+" unary | primary
    fn parse_unary(&mut self) -> Result<QueryExpr, QueryError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                if matches!(self.peek(), None | Some(Token::RParen) | Some(Token::Or)) {
                    return Err(match self.current_pos() {
                        Some(position) => {
                            QueryError::unexpected("expected expression after NOT", position)
                        }
                        None => QueryError::UnexpectedEnd {
                            message: "expected expression after NOT".to_string(),
                        },
                    });
                }
                let inner = self.parse_unary()?;
                Ok(match inner {
                    // Double negation cancels out.
                    QueryExpr::Not(inner) => *inner,
                    atom if atom.is_atom() => QueryExpr::not(atom),
                    compound => QueryExpr::not(QueryExpr::group(compound)),
                })
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<QueryExpr, QueryError> {
        let Some((token, position)) = self.advance() else {
            return Err(QueryError::UnexpectedEnd {
                message: "expected a term".to_string(),
            });
        };

        match token {
            Token::Term(text) => Ok(QueryExpr::Term(text)),
            Token::Phrase(text) => Ok(QueryExpr::Phrase(text)),
            Token::FieldPrefix(name) => match self.advance() {
                Some((Token::Term(value), _)) | Some((Token::Phrase(value), _)) => {
                    Ok(QueryExpr::Field { name, value })
                }
                Some((_, pos)) => Err(QueryError::unexpected(
                    format!("expected term or phrase after '{name}:'"),
                    pos,
                )),
                None => Err(QueryError::UnexpectedEnd {
                    message: format!("expected term or phrase after '{name}:'"),
                }),
            },
            Token::LParen => {
                self.depth += 1;
                let inner = self.parse_and_expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(QueryExpr::group(inner)),
                    _ => Err(QueryError::UnbalancedParen { position }),
                }
            }
            Token::RParen => Err(QueryError::UnbalancedParen { position }),
            Token::Or => Err(QueryError::unexpected(
                "unexpected OR (needs expression before it)",
                position,
            )),
            Token::Not | Token::Plus => Err(QueryError::unexpected("unexpected operator", position)),
        }
    }
}

/// Wrap a conjunction member that would otherwise change the meaning
/// of its siblings.
fn scope_in_conjunction(expr: QueryExpr) -> QueryExpr {
    match expr {
        or @ QueryExpr::Or(_) => QueryExpr::group(or),
        other => other,
    }
}

/// Wrap a disjunction member that is not a single token.
fn scope_in_disjunction(expr: QueryExpr) -> QueryExpr {
    match expr {
        QueryExpr::Not(inner) if !inner.is_atom() => QueryExpr::not(QueryExpr::group(*inner)),
        other => other,
    }
}
