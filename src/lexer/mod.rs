use crate::error::AsmError;
use crate::lexer::cursor::Cursor;
use crate::symbol::{Span, SrcOffset};

pub mod cursor;

/// Source lines must be shorter than this, in bytes, not counting the line ending.
pub const MAX_LINE_LENGTH: usize = 100;
/// Most lines accepted in one source file.
pub const MAX_LINES: usize = 1024;

/// Everything from this character to the end of the line is ignored.
pub const COMMENT: char = '#';

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Mnemonic, label, register or literal
    Word,
    Comma,
}

/// One line of source after comments and surrounding whitespace are removed.
#[derive(Clone, Debug)]
pub struct SourceLine {
    /// Counts from 1
    pub number: usize,
    /// Normalized content, empty for blank lines
    pub span: Span,
    pub toks: Vec<Token>,
}

impl SourceLine {
    pub fn is_blank(&self) -> bool {
        self.toks.is_empty()
    }
}

/// Test if a character ends a word.
pub(crate) fn is_separator(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> Option<Token> {
        self.take_while(char::is_whitespace);
        self.reset_pos();
        let kind = match self.bump()? {
            ',' => TokenKind::Comma,
            _ => {
                self.take_while(|c| !is_separator(c));
                TokenKind::Word
            }
        };
        let span = Span::new(SrcOffset(self.token_start()), self.pos_in_token());
        self.reset_pos();
        Some(Token { kind, span })
    }
}

/// Split `src` into lines, strip comments and whitespace, and tokenize what is left.
///
/// Every line of the input is returned, blank ones included, so that line numbers line up.
pub fn normalize(src: &str) -> Result<Vec<SourceLine>, AsmError> {
    let mut lines = Vec::new();
    let mut offs = 0;

    for (idx, raw) in src.split_inclusive('\n').enumerate() {
        let number = idx + 1;
        if number > MAX_LINES {
            return Err(AsmError::TooManyLines {
                count: src.split_inclusive('\n').count(),
            });
        }

        let text = raw.trim_end_matches(|c: char| c == '\n' || c == '\r');
        if text.len() >= MAX_LINE_LENGTH {
            return Err(AsmError::LineTooLong {
                line: number,
                span: Span::new(SrcOffset(offs), text.len()),
            });
        }

        let code = match text.find(COMMENT) {
            Some(idx) => &text[..idx],
            None => text,
        };
        let leading = code.len() - code.trim_start().len();
        let content = code.trim();
        let start = offs + leading;

        let mut cursor = Cursor::new(content, start);
        let toks = std::iter::from_fn(|| cursor.advance_token()).collect();

        lines.push(SourceLine {
            number,
            span: Span::new(SrcOffset(start), content.len()),
            toks,
        });
        offs += raw.len();
    }
    Ok(lines)
}

/// Parse a numeric literal: decimal with an optional sign, or `0x` hexadecimal.
///
/// Does not check the range.
pub fn parse_literal(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            i64::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse().ok()?
        }
        None => return None,
    };
    Some(if negative { -value } else { value })
}
