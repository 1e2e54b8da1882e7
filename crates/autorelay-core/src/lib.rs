//! # Autorelay Core
//!
//! Shared foundation for the Autorelay workspace: configuration loading,
//! the error taxonomy, and the management-API response envelopes.

pub mod config;
pub mod envelope;
pub mod error;

pub use config::AutorelayConfig;
pub use error::{AutorelayError, Result};
