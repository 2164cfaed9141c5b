//! Shared error type, clock and phone-number helpers used across the
//! chatdesk crates.

pub mod error;
pub mod phone;
pub mod time;

pub use error::{Error, Result};
