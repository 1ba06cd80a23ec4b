use logos::Logos;

use crate::program::ParseError;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    #[regex(r"[+-]?[0-9]+")]
    Int,

    #[token(",")]
    Comma,
}

#[derive(Debug, Clone)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub line: usize,
    pub col: usize,
}

pub fn lex(source: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut tokens = Vec::new();
    let mut line = 1usize;
    let mut line_start = 0usize;
    let mut scanned = 0usize;

    let mut lexer = TokenKind::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();

        for (offset, ch) in source[scanned..span.start].char_indices() {
            if ch == '\n' {
                line += 1;
                line_start = scanned + offset + 1;
            }
        }
        scanned = span.start;
        let col = span.start - line_start + 1;

        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                text: lexer.slice(),
                line,
                col,
            }),
            Err(_) => {
                let (word_start, word) = offending_word(source, span.start);
                return Err(ParseError::InvalidToken {
                    token: word.to_string(),
                    line,
                    col: word_start - line_start + 1,
                });
            }
        }
    }

    Ok(tokens)
}

/// The whole comma/whitespace-delimited word starting at `start`, so that
/// `12x4` is reported as such rather than as the single character `x`.
fn offending_word(source: &str, start: usize) -> (usize, &str) {
    let word_start = source[..start]
        .char_indices()
        .rev()
        .find(|&(_, c)| c == ',' || c.is_whitespace())
        .map_or(0, |(i, c)| i + c.len_utf8());
    let rest = &source[word_start..];
    let len = rest
        .find(|c: char| c == ',' || c.is_whitespace())
        .unwrap_or(rest.len());
    (word_start, &rest[..len])
}
