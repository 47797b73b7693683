//! Platform interfaces for the keychain engine.
//!
//! These traits are the boundary to the opaque, query-keyed secure store
//! and its authentication UI. The engine primitives mirror the underlying
//! platform API: each takes a fully-built [`ItemQuery`] and answers with
//! success, not-found, or a reason code. Both traits are implementable
//! from foreign code.

use std::sync::Arc;

use thiserror::Error;

use crate::policy::AccessControlPolicy;
use crate::query::ItemQuery;
use crate::session::AuthenticationContext;

/// Reason codes returned by engine primitives.
#[derive(Debug, Error, uniffi::Error)]
pub enum EngineError {
    /// No record matched the query.
    #[error("item not found")]
    ItemNotFound,

    /// A record matched, but completing the operation would require user
    /// interaction that the query disallowed.
    #[error("interaction required but not allowed")]
    InteractionNotAllowed,

    /// The user failed authentication.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The user dismissed the authentication UI.
    #[error("authentication cancelled")]
    UserCancelled,

    /// Any other platform failure.
    #[error("platform error {code}: {message}")]
    Platform {
        /// Raw platform status code.
        code: i64,
        /// Human-readable description.
        message: String,
    },
}

/// One record returned by an enumeration.
#[derive(Debug, Clone, uniffi::Record)]
pub struct KeychainItem {
    /// Record key.
    pub key: String,
    /// Record payload; present only when the query requested data.
    pub value: Option<Vec<u8>>,
}

/// Opaque query-keyed secure store.
///
/// Reads and enumerations accept an optional authentication context
/// carrying continued authentication; the engine decides whether the
/// context still holds a valid authorization or a prompt is needed. The
/// context is never attached to writes, deletes, or existence checks.
#[uniffi::export(with_foreign)]
pub trait KeychainEngine: Send + Sync {
    /// Reports whether the secure hardware can enforce `policy`.
    fn secure_hardware_available(&self, policy: AccessControlPolicy) -> bool;

    /// Reads the payload of the record matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if no record matches, an
    /// interactive reason code if authentication was required and
    /// rejected, or [`EngineError::Platform`] otherwise.
    fn get(
        &self,
        query: ItemQuery,
        session: Option<Arc<dyn AuthenticationContext>>,
    ) -> Result<Vec<u8>, EngineError>;

    /// Inserts the record described by `query`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Platform`] if the record cannot be
    /// inserted, including when a record already exists under the key.
    fn set(&self, query: ItemQuery) -> Result<(), EngineError>;

    /// Deletes every record matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if nothing matched, or
    /// [`EngineError::Platform`] on failure.
    fn delete(&self, query: ItemQuery) -> Result<(), EngineError>;

    /// Lists the records matching `query`, with payloads only when the
    /// query requests data.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if nothing matched, an
    /// interactive reason code if payloads were requested from gated
    /// records without authorization, or [`EngineError::Platform`]
    /// otherwise.
    fn enumerate(
        &self,
        query: ItemQuery,
        session: Option<Arc<dyn AuthenticationContext>>,
    ) -> Result<Vec<KeychainItem>, EngineError>;

    /// Succeeds exactly when a record matches `query`, without returning
    /// its payload.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] if nothing matched,
    /// [`EngineError::InteractionNotAllowed`] if the match exists but is
    /// interaction-gated, or [`EngineError::Platform`] otherwise.
    fn contains(&self, query: ItemQuery) -> Result<(), EngineError>;
}

/// Platform wiring for a keychain store: the engine plus fresh
/// authentication contexts.
#[uniffi::export(with_foreign)]
pub trait KeychainProvider: Send + Sync {
    /// Returns the engine implementation.
    fn engine(&self) -> Arc<dyn KeychainEngine>;

    /// Constructs a fresh authentication context for a new session.
    fn new_authentication_context(&self) -> Arc<dyn AuthenticationContext>;
}
