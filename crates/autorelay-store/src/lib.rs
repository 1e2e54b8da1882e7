//! # Autorelay Store
//!
//! In-memory shared state: the per-user credential store and the response
//! cache it keeps coherent. Both are plain mutex-guarded maps — state is
//! deliberately not persisted; a credential lives only as long as the
//! process, and staleness is discovered when the remote API rejects it.

pub mod cache;
pub mod credentials;

pub use cache::ResponseCache;
pub use credentials::{CredentialRecord, CredentialStore};
