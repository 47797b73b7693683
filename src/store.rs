//! Credential store facade implementing the keychain accessor API.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use zeroize::Zeroize;

use crate::engine::{EngineError, KeychainEngine, KeychainProvider};
use crate::error::{KeychainError, KeychainResult};
use crate::migration;
use crate::policy::{AccessControlPolicy, AccessScope, Identifier};
use crate::query::{BaseQuery, ItemQuery};
use crate::registry;
use crate::session::{AuthSession, AuthenticationContext};

const CANARY_KEY: &str = "keychain-accessibility-canary";
const CANARY_VALUE: &[u8] = b"accessible";

/// Handle to one hardware-backed credential namespace.
///
/// Instances are deduplicated process-wide by the canonical signature of
/// their base query, so two callers constructing a store for the same
/// `(identifier, scope, policy)` share one authentication session. Every
/// operation serializes on a per-instance mutex; reads that require
/// authentication block the calling thread until the platform UI
/// resolves.
#[derive(uniffi::Object)]
pub struct KeychainStore {
    base: BaseQuery,
    signature: String,
    policy: AccessControlPolicy,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    engine: Arc<dyn KeychainEngine>,
    provider: Arc<dyn KeychainProvider>,
    prepared: Option<BaseQuery>,
    session: AuthSession,
}

impl std::fmt::Debug for KeychainStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainStore")
            .field("service", &self.base.service)
            .finish_non_exhaustive()
    }
}

impl PartialEq for KeychainStore {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}

impl Eq for KeychainStore {}

impl std::hash::Hash for KeychainStore {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
    }
}

#[uniffi::export]
impl KeychainStore {
    /// Returns the store for `(identifier, scope, policy)`, creating it
    /// if no live instance exists.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Configuration`] if the identifier or the
    /// shared access group is empty, or if the canonical query cannot be
    /// encoded.
    #[uniffi::constructor]
    pub fn for_identifier(
        provider: Arc<dyn KeychainProvider>,
        identifier: String,
        scope: AccessScope,
        policy: AccessControlPolicy,
    ) -> KeychainResult<Arc<Self>> {
        let identifier = Identifier::new(identifier)?;
        if let AccessScope::SharedAccessGroup { group } = &scope {
            if group.is_empty() {
                return Err(KeychainError::Configuration(
                    "shared access group must not be empty".to_string(),
                ));
            }
        }
        let base = BaseQuery::new(&identifier, &scope, policy);
        let signature = base.canonical_signature()?;
        let key = signature.clone();
        registry::lookup_or_create(&key, move || {
            let engine = provider.engine();
            let session =
                AuthSession::new(provider.new_authentication_context());
            Ok(Arc::new(Self {
                base,
                signature,
                policy,
                inner: Mutex::new(StoreInner {
                    engine,
                    provider,
                    prepared: None,
                    session,
                }),
            }))
        })
    }

    /// Probes whether the keychain is reachable at all, without ever
    /// prompting.
    ///
    /// Runs a real write/read/delete cycle through the non-authenticating
    /// probe variant of this namespace. Returns `false` on any failure.
    pub fn can_access_keychain(&self) -> bool {
        let Ok(inner) = self.lock_inner() else {
            return false;
        };
        let probe = self.base.probe();
        let canary =
            |probe: &BaseQuery| -> ItemQuery {
                ItemQuery::for_namespace(probe.clone())
                    .with_key(CANARY_KEY.to_string())
                    .without_interaction()
            };
        // A canary left behind by an interrupted probe would make the
        // insert fail as a duplicate.
        let _ = inner.engine.delete(canary(&probe));
        let wrote = inner
            .engine
            .set(canary(&probe).with_value(CANARY_VALUE.to_vec()))
            .is_ok();
        let read = wrote
            && match inner.engine.get(canary(&probe), None) {
                Ok(mut value) => {
                    value.zeroize();
                    true
                }
                Err(_) => false,
            };
        let _ = inner.engine.delete(canary(&probe));
        wrote && read
    }

    /// Stores `value` under `key`.
    ///
    /// Updates are delete-then-insert: updating a hardware-backed record
    /// in place can raise a stray prompt, so any existing record is
    /// removed first. The removal's failure is ignored because the key
    /// may legitimately not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::EmptyKey`] or [`KeychainError::EmptyValue`]
    /// on empty inputs, [`KeychainError::Configuration`] if the policy
    /// cannot be enforced on this device, and [`KeychainError::Storage`]
    /// if the insert fails.
    pub fn set_object(&self, value: Vec<u8>, key: String) -> KeychainResult<()> {
        if key.is_empty() {
            return Err(KeychainError::EmptyKey);
        }
        if value.is_empty() {
            return Err(KeychainError::EmptyValue);
        }
        let mut inner = self.lock_inner()?;
        let base = inner.prepared(&self.base, self.policy)?;
        let _ = inner
            .engine
            .delete(ItemQuery::for_namespace(base.clone()).with_key(key.clone()));
        inner
            .engine
            .set(ItemQuery::for_namespace(base).with_key(key).with_value(value))?;
        Ok(())
    }

    /// Stores the UTF-8 bytes of `value` under `key`.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::set_object`].
    pub fn set_string(&self, value: String, key: String) -> KeychainResult<()> {
        self.set_object(value.into_bytes(), key)
    }

    /// Reads the value stored under `key`.
    ///
    /// Builds a continued-authentication query from the live session when
    /// the policy reuses sessions; `user_prompt` is attached when
    /// non-empty and shown if the platform needs to authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::ItemNotFound`] if no record exists,
    /// [`KeychainError::AuthenticationFailed`] or
    /// [`KeychainError::UserCancelled`] if the interactive step is
    /// rejected, and [`KeychainError::Storage`] otherwise.
    pub fn object(
        &self,
        key: String,
        user_prompt: String,
    ) -> KeychainResult<Vec<u8>> {
        if key.is_empty() {
            return Err(KeychainError::EmptyKey);
        }
        let mut inner = self.lock_inner()?;
        let base = inner.prepared(&self.base, self.policy)?;
        let query = ItemQuery::for_namespace(base)
            .with_key(key)
            .with_prompt(user_prompt);
        let session = inner.session_context(self.policy);
        let attached = session.is_some();
        let value = inner.engine.get(query, session)?;
        if attached && inner.session.mark_consumed() {
            debug!("authentication session {} consumed", inner.session.id());
        }
        Ok(value)
    }

    /// Reads the string stored under `key`.
    ///
    /// A record whose payload is not valid UTF-8 is reported as absent.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::object`].
    pub fn string(
        &self,
        key: String,
        user_prompt: String,
    ) -> KeychainResult<String> {
        let bytes = self.object(key, user_prompt)?;
        String::from_utf8(bytes).map_err(|err| {
            let mut rejected = err.into_bytes();
            rejected.zeroize();
            KeychainError::ItemNotFound
        })
    }

    /// Reports whether a record exists under `key`, without ever
    /// prompting.
    ///
    /// Runs against the plain base query with interaction disallowed; a
    /// record whose payload would require authentication to read still
    /// counts as present. The platform may have evicted such a record
    /// after a passcode or biometry change without reporting the eviction
    /// yet; in that window this check reports a record that no longer
    /// exists.
    pub fn contains_object(&self, key: String) -> bool {
        if key.is_empty() {
            return false;
        }
        let Ok(mut inner) = self.lock_inner() else {
            return false;
        };
        let Ok(base) = inner.prepared(&self.base, self.policy) else {
            return false;
        };
        let query = ItemQuery::for_namespace(base)
            .with_key(key)
            .without_interaction();
        matches!(
            inner.engine.contains(query),
            Ok(()) | Err(EngineError::InteractionNotAllowed)
        )
    }

    /// Forces the next read to present a fresh authentication prompt.
    ///
    /// The current session is invalidated and replaced synchronously
    /// under the store lock, so no operation in flight can observe a
    /// half-invalidated session.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Storage`] only if the store mutex is
    /// poisoned.
    pub fn require_prompt_on_next_access(&self) -> KeychainResult<()> {
        let mut inner = self.lock_inner()?;
        inner.session.invalidate();
        let replacement =
            AuthSession::new(inner.provider.new_authentication_context());
        debug!(
            "authentication session {} invalidated, replaced by {}",
            inner.session.id(),
            replacement.id()
        );
        inner.session = replacement;
        Ok(())
    }

    /// Lists every key in this namespace.
    ///
    /// Enumerates through a continued-authentication query; `user_prompt`
    /// is attached when non-empty. An empty namespace yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Storage`] or an interactive reason code
    /// if the enumeration fails.
    pub fn all_keys(&self, user_prompt: String) -> KeychainResult<Vec<String>> {
        let mut inner = self.lock_inner()?;
        let base = inner.prepared(&self.base, self.policy)?;
        let query = ItemQuery::for_namespace(base).with_prompt(user_prompt);
        let session = inner.session_context(self.policy);
        match inner.engine.enumerate(query, session) {
            Ok(items) => Ok(items.into_iter().map(|item| item.key).collect()),
            Err(EngineError::ItemNotFound) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the record stored under `key`, if any.
    ///
    /// Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Storage`] if the delete fails for a
    /// reason other than the record being absent.
    pub fn remove_object(&self, key: String) -> KeychainResult<()> {
        if key.is_empty() {
            return Err(KeychainError::EmptyKey);
        }
        let mut inner = self.lock_inner()?;
        let base = inner.prepared(&self.base, self.policy)?;
        match inner
            .engine
            .delete(ItemQuery::for_namespace(base).with_key(key))
        {
            Ok(()) | Err(EngineError::ItemNotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes every record in this namespace.
    ///
    /// An already-empty namespace is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Storage`] if the delete fails for a
    /// reason other than the namespace being empty.
    pub fn remove_all_objects(&self) -> KeychainResult<()> {
        let mut inner = self.lock_inner()?;
        let base = inner.prepared(&self.base, self.policy)?;
        match inner.engine.delete(ItemQuery::for_namespace(base)) {
            Ok(()) | Err(EngineError::ItemNotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Copies every record matched by `source` into this namespace.
    ///
    /// All-or-nothing: if any record fails validation or insertion, this
    /// namespace is left unmodified. Only after full success does the
    /// optional source-removal pass run; a failure there is reported
    /// without touching the migrated records. The source query is forced
    /// non-interactive, so migration never prompts.
    ///
    /// # Errors
    ///
    /// Returns one of the migration error kinds on validation failure,
    /// or the underlying error of the failed insert or enumeration.
    pub fn migrate_objects(
        &self,
        source: ItemQuery,
        remove_on_completion: bool,
    ) -> KeychainResult<()> {
        let mut inner = self.lock_inner()?;
        let base = inner.prepared(&self.base, self.policy)?;
        migration::migrate(
            inner.engine.as_ref(),
            &base,
            source,
            remove_on_completion,
        )
    }

    /// Copies every record of `source`'s namespace into this one.
    ///
    /// Intended for upgrading records out of a non-gated legacy
    /// namespace; a source whose records are interaction-gated fails at
    /// enumeration time because migration never prompts.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::migrate_objects`].
    pub fn migrate_objects_from(
        &self,
        source: Arc<KeychainStore>,
        remove_on_completion: bool,
    ) -> KeychainResult<()> {
        let query = ItemQuery::for_namespace(source.base_query());
        self.migrate_objects(query, remove_on_completion)
    }

    /// The canonical base query scoping this store's namespace.
    #[must_use]
    pub fn base_query(&self) -> BaseQuery {
        self.base.clone()
    }

    /// The canonical signature identifying this store.
    ///
    /// Two stores are equal exactly when their signatures are equal.
    #[must_use]
    pub fn canonical_signature(&self) -> String {
        self.signature.clone()
    }
}

/// Implementation not exposed to foreign bindings.
impl KeychainStore {
    fn lock_inner(&self) -> KeychainResult<MutexGuard<'_, StoreInner>> {
        self.inner.lock().map_err(|_| {
            KeychainError::Storage("store mutex poisoned".to_string())
        })
    }
}

impl StoreInner {
    /// Returns the platform-validated base query, preparing it on first
    /// use. Failures are not cached: every access retries until the
    /// secure hardware reports the policy enforceable.
    fn prepared(
        &mut self,
        base: &BaseQuery,
        policy: AccessControlPolicy,
    ) -> KeychainResult<BaseQuery> {
        if let Some(query) = &self.prepared {
            return Ok(query.clone());
        }
        if !self.engine.secure_hardware_available(policy) {
            return Err(KeychainError::Configuration(format!(
                "secure hardware cannot enforce {}",
                policy.canonical_name()
            )));
        }
        self.prepared = Some(base.clone());
        Ok(base.clone())
    }

    fn session_context(
        &self,
        policy: AccessControlPolicy,
    ) -> Option<Arc<dyn AuthenticationContext>> {
        policy
            .reuses_session()
            .then(|| self.session.context())
    }
}
