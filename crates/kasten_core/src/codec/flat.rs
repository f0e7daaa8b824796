//! Flat encoding of value sequences into a single text column.
//!
//! # Responsibility
//! - Join stringified values with the ASCII unit separator (code point 31).
//! - Split such a column back into typed values.
//!
//! # Invariants
//! - `decode::<T>(&encode(seq)) == seq` for any sequence that is not a single
//!   empty token and whose tokens do not contain [`UNIT_SEPARATOR`].
//! - The separator is never escaped. Values containing it split into extra
//!   tokens on decode; callers must keep it out of user text.
//! - Malformed tokens are reported as [`DecodeError`], never defaulted.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// ASCII "unit separator" placed between encoded elements.
pub const UNIT_SEPARATOR: char = '\u{1f}';

/// One token could not be parsed as the requested element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// Zero-based token position within the encoded column.
    pub index: usize,
    pub token: String,
    /// Rust type name the token was parsed as.
    pub target: &'static str,
    pub message: String,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "token {} (`{}`) is not a valid {}: {}",
            self.index, self.token, self.target, self.message
        )
    }
}

impl Error for DecodeError {}

/// Joins `values` into one separator-delimited string.
///
/// An empty sequence encodes to the empty string.
pub fn encode<T: Display>(values: &[T]) -> String {
    let mut encoded = String::new();
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            encoded.push(UNIT_SEPARATOR);
        }
        encoded.push_str(&value.to_string());
    }
    encoded
}

/// Splits `text` on the separator and parses each token as `T`.
///
/// The empty string decodes to an empty sequence.
///
/// # Errors
/// - Returns the first token that fails `T::from_str`.
pub fn decode<T>(text: &str) -> Result<Vec<T>, DecodeError>
where
    T: FromStr,
    T::Err: Display,
{
    if text.is_empty() {
        return Ok(Vec::new());
    }

    text.split(UNIT_SEPARATOR)
        .enumerate()
        .map(|(index, token)| {
            token.parse::<T>().map_err(|err| DecodeError {
                index,
                token: token.to_string(),
                target: std::any::type_name::<T>(),
                message: err.to_string(),
            })
        })
        .collect()
}
