//! Error taxonomy shared across the workspace.
//!
//! Management endpoints never surface these as HTTP errors — they are
//! translated into `{status: 0}` envelopes at the route layer. Only dynamic
//! proxy routes ever map an error onto a real HTTP status.

use thiserror::Error;

/// Workspace-wide error type.
#[derive(Debug, Error)]
pub enum AutorelayError {
    /// A required field on a management endpoint was missing or empty.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A job was requested for a user with no stored credential.
    #[error("user not logged in: {0}")]
    UserNotLoggedIn(String),

    /// The referenced resource (credential, job) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Transport-level failure talking to the remote API.
    #[error("http error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, AutorelayError>;
