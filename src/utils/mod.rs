//! Shared utilities: logging initialization and the crate error type.

pub mod error;
pub mod logging;
