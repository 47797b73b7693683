//! Error types for keychain store operations.

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for keychain store operations.
pub type KeychainResult<T> = Result<T, KeychainError>;

/// Errors surfaced by [`KeychainStore`](crate::KeychainStore) operations.
///
/// Interactive failures (`AuthenticationFailed`, `UserCancelled`) are kept
/// distinct from `Storage` so callers can decide between re-prompting and
/// showing a permanent error.
#[derive(Debug, Error, uniffi::Error)]
pub enum KeychainError {
    /// The store configuration cannot be satisfied on this device, e.g.
    /// an empty identifier or secure hardware that cannot enforce the
    /// requested access-control policy. Not retryable without changing
    /// inputs or device posture.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No record exists for the requested key.
    #[error("item not found")]
    ItemNotFound,

    /// The user failed the interactive authentication step.
    #[error("user authentication failed")]
    AuthenticationFailed,

    /// The user dismissed the interactive authentication step.
    #[error("user cancelled authentication")]
    UserCancelled,

    /// An empty key was supplied.
    #[error("empty key")]
    EmptyKey,

    /// An empty value was supplied.
    #[error("empty value")]
    EmptyValue,

    /// The underlying keychain engine failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The migration source query cannot be used, e.g. it targets the
    /// destination's own namespace.
    #[error("migration source query is invalid")]
    MigrationInvalidQuery,

    /// A migration source record carries an empty key.
    #[error("migration source record has an invalid key")]
    MigrationInvalidKey,

    /// A migration source record carries no usable payload.
    #[error("migration source record has an invalid value")]
    MigrationInvalidValue,

    /// A migration source key already exists in the destination.
    #[error("migration key already exists in destination: {0}")]
    MigrationKeyCollision(String),

    /// Migrated records were inserted, but removing them from the source
    /// failed. The destination is left intact.
    #[error("migration source removal failed: {0}")]
    MigrationRemovalFailed(String),
}

impl From<EngineError> for KeychainError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ItemNotFound => Self::ItemNotFound,
            EngineError::AuthenticationFailed => Self::AuthenticationFailed,
            EngineError::UserCancelled => Self::UserCancelled,
            EngineError::InteractionNotAllowed | EngineError::Platform { .. } => {
                Self::Storage(err.to_string())
            }
        }
    }
}
