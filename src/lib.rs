//! Hardware-backed keychain credential storage.
//!
//! This crate persists small secrets (strings or byte blobs) under string
//! keys, scoped to a logical namespace by an identifier and an
//! access-control policy, with biometric or passcode gating on reads. The
//! platform keychain engine and its authentication UI are consumed through
//! the traits in [`engine`]; this layer owns the query construction, the
//! "single prompt" authentication-session lifecycle, and the per-store
//! locking discipline that makes the whole surface safe to call from
//! arbitrary threads.
//!
//! Stores are deduplicated process-wide by the canonical signature of
//! their base query, so two callers constructing a store for the same
//! `(identifier, scope, policy)` share one authentication session.

mod engine;
mod error;
pub mod logger;
mod migration;
mod policy;
mod query;
mod registry;
mod session;
mod store;
#[cfg(test)]
mod test_support;

pub use engine::{EngineError, KeychainEngine, KeychainItem, KeychainProvider};
pub use error::{KeychainError, KeychainResult};
pub use policy::{AccessControlPolicy, AccessScope, Accessibility, Identifier};
pub use query::{BaseQuery, InteractionMode, ItemQuery};
pub use session::AuthenticationContext;
pub use store::KeychainStore;

uniffi::setup_scaffolding!("secure_keychain");
