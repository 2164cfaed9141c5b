//! Phone number canonicalization.
//!
//! The gateway addresses counterparties by their digits-only international
//! number (`51999888777`). Operators type numbers with `+`, spaces, dashes
//! or parentheses, so every chat key goes through [`normalize_phone`] first.

use crate::{Error, Result};

/// Strip formatting characters and return the digits-only number.
///
/// Rejects input that is empty after stripping or that contains anything
/// other than digits and the usual separators.
pub fn normalize_phone(input: &str) -> Result<String> {
    let mut digits = String::with_capacity(input.len());
    for c in input.trim().chars() {
        match c {
            '0'..='9' => digits.push(c),
            '+' | ' ' | '-' | '(' | ')' | '.' => {},
            _ => return Err(Error::invalid_phone(input)),
        }
    }
    if digits.is_empty() {
        return Err(Error::invalid_phone(input));
    }
    Ok(digits)
}
