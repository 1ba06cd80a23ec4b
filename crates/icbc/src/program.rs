use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lexer::{self, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("program text is empty")]
    Empty,

    #[error("invalid token {token:?} at line {line}, col {col}")]
    InvalidToken {
        token: String,
        line: usize,
        col: usize,
    },

    #[error("integer {token} out of range at line {line}, col {col}")]
    IntegerOverflow {
        token: String,
        line: usize,
        col: usize,
    },

    #[error("missing value before line {line}, col {col}")]
    MissingValue { line: usize, col: usize },

    #[error("expected ',' but found {token:?} at line {line}, col {col}")]
    MissingSeparator {
        token: String,
        line: usize,
        col: usize,
    },
}

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// An Intcode program image: the initial contents of VM memory.
///
/// Programs are immutable once loaded; every VM built from one keeps the
/// image around so it can be reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    cells: Vec<i64>,
}

impl Program {
    pub fn new(cells: Vec<i64>) -> Self {
        Program { cells }
    }

    /// Parse comma-separated signed decimal integers.
    ///
    /// Surrounding whitespace and newlines are accepted anywhere between
    /// values; anything else is reported with its position.
    pub fn parse(text: &str) -> Result<Program, ParseError> {
        let tokens = lexer::lex(text)?;
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut cells = Vec::with_capacity(tokens.len() / 2 + 1);
        let mut expect_value = true;
        for token in &tokens {
            match (token.kind, expect_value) {
                (TokenKind::Int, true) => {
                    let value =
                        token
                            .text
                            .parse::<i64>()
                            .map_err(|_| ParseError::IntegerOverflow {
                                token: token.text.to_string(),
                                line: token.line,
                                col: token.col,
                            })?;
                    cells.push(value);
                    expect_value = false;
                }
                (TokenKind::Comma, false) => expect_value = true,
                (TokenKind::Comma, true) => {
                    return Err(ParseError::MissingValue {
                        line: token.line,
                        col: token.col,
                    })
                }
                (TokenKind::Int, false) => {
                    return Err(ParseError::MissingSeparator {
                        token: token.text.to_string(),
                        line: token.line,
                        col: token.col,
                    })
                }
            }
        }

        // Trailing comma
        if expect_value {
            if let Some(last) = tokens.last() {
                return Err(ParseError::MissingValue {
                    line: last.line,
                    col: last.col + 1,
                });
            }
        }

        Ok(Program { cells })
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, address: usize) -> Option<i64> {
        self.cells.get(address).copied()
    }

    /// Canonical text form, accepted back by [`Program::parse`].
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Serialize to JSON (portable image format).
    pub fn to_json(&self) -> Result<String, BytecodeError> {
        serde_json::to_string(self).map_err(|e| BytecodeError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, BytecodeError> {
        serde_json::from_str(json).map_err(|e| BytecodeError::Serialization(e.to_string()))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}

impl FromStr for Program {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Program::parse(s)
    }
}

impl From<Vec<i64>> for Program {
    fn from(cells: Vec<i64>) -> Self {
        Program::new(cells)
    }
}
