//! Authentication session lifecycle.
//!
//! A session represents "the user has already authenticated for this
//! store in this process". It wraps an opaque platform authentication
//! context that is attached to value reads and enumerations only; writes
//! and existence checks always run without one, so they can neither raise
//! a stray prompt nor report a stale cached result.

use std::sync::Arc;

use uuid::Uuid;

/// Opaque platform authentication-UI host backing one session.
///
/// Created through
/// [`KeychainProvider::new_authentication_context`](crate::KeychainProvider::new_authentication_context)
/// and passed through to the engine unread.
#[uniffi::export(with_foreign)]
pub trait AuthenticationContext: Send + Sync {
    /// Invalidates the context. Any later use of the handle must force
    /// re-authentication rather than silently succeed.
    fn invalidate(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Created; no read has authenticated through it yet.
    Fresh,
    /// At least one read authenticated through it; further reads are
    /// silent until the platform invalidates it out-of-band.
    Consumed,
    /// Explicitly invalidated; the owning store replaces the session
    /// immediately, under its lock.
    Invalidated,
}

/// One store's current authentication session.
pub(crate) struct AuthSession {
    id: Uuid,
    state: SessionState,
    context: Arc<dyn AuthenticationContext>,
}

impl AuthSession {
    pub(crate) fn new(context: Arc<dyn AuthenticationContext>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Fresh,
            context,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// The live context to attach to a continued-authentication query.
    pub(crate) fn context(&self) -> Arc<dyn AuthenticationContext> {
        Arc::clone(&self.context)
    }

    /// Records that a read authenticated through this session. Returns
    /// whether this was the first such read.
    pub(crate) fn mark_consumed(&mut self) -> bool {
        if self.state == SessionState::Fresh {
            self.state = SessionState::Consumed;
            return true;
        }
        false
    }

    /// Invalidates the platform context so a stale handle can never
    /// authenticate again.
    pub(crate) fn invalidate(&mut self) {
        self.context.invalidate();
        self.state = SessionState::Invalidated;
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
