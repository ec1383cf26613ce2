//! Common error handling utilities for the eligibility engine
//!
//! Library crates keep their own `thiserror` enums; this crate holds the
//! process-level error the daemon reports on startup and shutdown, plus the
//! logging helper used when an error is handled rather than propagated.
//!
//! # Example
//!
//! ```rust
//! use error_common::{EngineError, Result};
//!
//! fn require_database_url(url: &str) -> Result<&str> {
//!     if url.is_empty() {
//!         return Err(EngineError::ConfigError("database url is empty".to_string()));
//!     }
//!     Ok(url)
//! }
//!
//! assert!(require_database_url("").is_err());
//! ```

pub mod types;

pub use types::*;
