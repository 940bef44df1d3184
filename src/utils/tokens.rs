//! Whitespace-separated token stream used by the model file format.

use crate::error::{NnError, Result};
use std::str::{FromStr, SplitWhitespace};

/// Cursor over the whitespace-separated tokens of a model file.
pub struct TokenReader<'a> {
    tokens: SplitWhitespace<'a>,
    consumed: usize,
}

impl<'a> TokenReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            tokens: text.split_whitespace(),
            consumed: 0,
        }
    }

    /// Next raw token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<&'a str> {
        let token = self.tokens.next()?;
        self.consumed += 1;
        Some(token)
    }

    /// Next token, failing at end of input.
    pub fn expect_token(&mut self, what: &str) -> Result<&'a str> {
        self.next_token().ok_or_else(|| {
            NnError::Parse(format!(
                "unexpected end of input while reading {what} (after token {})",
                self.consumed
            ))
        })
    }

    /// Next token parsed as `T`.
    pub fn parse<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.expect_token(what)?;
        token.parse::<T>().map_err(|_| {
            NnError::Parse(format!(
                "invalid {what} '{token}' at token {}",
                self.consumed
            ))
        })
    }

    pub fn read_usize(&mut self, what: &str) -> Result<usize> {
        self.parse::<usize>(what)
    }

    /// Read exactly `count` floats.
    ///
    /// `count` usually comes from the stream itself, so the buffer grows with
    /// the values read rather than being reserved up front.
    pub fn read_f32s(&mut self, count: usize, what: &str) -> Result<Vec<f32>> {
        let mut values = Vec::new();
        for _ in 0..count {
            values.push(self.parse::<f32>(what)?);
        }
        Ok(values)
    }
}

/// Append `values` to `out` as one space-separated line.
pub fn write_f32_line(out: &mut String, values: &[f32]) {
    let mut first = true;
    for value in values {
        if !first {
            out.push(' ');
        }
        // `{}` on f32 prints the shortest text that parses back to the same bits.
        out.push_str(&value.to_string());
        first = false;
    }
    out.push('\n');
}
