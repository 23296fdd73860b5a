//! Delimiter-based tokenizer
//!
//! Splits a byte slice at the first byte that belongs to a delimiter set.
//! The delimiter itself is consumed. No allocation, no error path: running
//! off the end of the input simply yields the whole input as the token.

/// Result of splitting one token off the front of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Bytes before the delimiter
    pub token: &'a [u8],

    /// The delimiter that ended the token, `None` at end of input
    pub delimiter: Option<u8>,

    /// Bytes after the delimiter (empty at end of input)
    pub rest: &'a [u8],
}

impl<'a> Token<'a> {
    /// Whether the token ran to the end of the input
    #[inline]
    pub fn at_end(&self) -> bool {
        self.delimiter.is_none()
    }
}

/// Split `input` at the first byte contained in `delimiters`
///
/// Reports which delimiter was hit so callers can branch on it.
#[inline]
pub fn split_token<'a>(input: &'a [u8], delimiters: &[u8]) -> Token<'a> {
    match input.iter().position(|b| delimiters.contains(b)) {
        Some(i) => Token {
            token: &input[..i],
            delimiter: Some(input[i]),
            rest: &input[i + 1..],
        },
        None => Token {
            token: input,
            delimiter: None,
            rest: &[],
        },
    }
}

/// Split `input` into `(token, remainder)` at the first delimiter
///
/// The delimiter byte is dropped. Without a delimiter the whole input is the
/// token and the remainder is empty.
#[inline]
pub fn token<'a>(input: &'a [u8], delimiters: &[u8]) -> (&'a [u8], &'a [u8]) {
    let t = split_token(input, delimiters);
    (t.token, t.rest)
}
