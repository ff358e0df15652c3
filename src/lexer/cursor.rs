// Heavily inspired by `rustc_lexer` and adapted to suit the project.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

/// Peekable iterator over the chars of one source line.
#[derive(Clone)]
pub struct Cursor<'a> {
    /// Bytes left at the start of the current token
    len_remaining: usize,
    /// Length of the line
    len: usize,
    /// Offset of the line from the start of the source file
    base: usize,
    chars: Chars<'a>,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str, base: usize) -> Cursor<'a> {
        Cursor {
            len_remaining: input.len(),
            len: input.len(),
            base,
            chars: input.chars(),
        }
    }

    /// Peek the next char without consuming it. Returns `'\0'` at the end of input.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or('\0')
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    pub fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) {
        while !self.is_eof() && pred(self.first()) {
            self.bump();
        }
    }

    /// Bytes consumed since the last call to [`Cursor::reset_pos`].
    pub fn pos_in_token(&self) -> usize {
        self.len_remaining - self.chars.as_str().len()
    }

    /// Offset of the current token from the start of the source file.
    pub fn token_start(&self) -> usize {
        self.base + self.len - self.len_remaining
    }

    pub fn reset_pos(&mut self) {
        self.len_remaining = self.chars.as_str().len();
    }
}
