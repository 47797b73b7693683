//! Canonical query construction for keychain operations.
//!
//! A [`BaseQuery`] is the immutable attribute set that scopes every
//! operation to exactly one namespace. An [`ItemQuery`] is the ephemeral
//! engine-facing view of one operation: the base query plus a key, an
//! optional payload, prompt text, and an interaction mode. Item queries
//! are rebuilt on every call and never cached, so a session invalidation
//! between calls always takes effect.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{KeychainError, KeychainResult};
use crate::policy::{AccessControlPolicy, AccessScope, Accessibility, Identifier};

const SERVICE_PREFIX: &str = "secure-keychain";
const SIGNATURE_DOMAIN: &[u8] = b"secure-keychain:base-query";
const PROBE_SERVICE_SUFFIX: &str = "accessibility-probe";

/// Canonical, immutable attribute set identifying one keychain namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct BaseQuery {
    /// Service attribute scoping records to the namespace.
    pub service: String,
    /// Shared access group, when the namespace is shared.
    pub access_group: Option<String>,
    /// Accessibility class applied to every record.
    pub accessibility: Accessibility,
    /// Access-control policy gating reads; absent only for the
    /// accessibility probe namespace.
    pub access_control: Option<AccessControlPolicy>,
}

impl BaseQuery {
    /// Builds the base query for `(identifier, scope, policy)`.
    ///
    /// Pure function of its inputs. The service attribute embeds the
    /// policy's canonical name, so the same identifier under two policies
    /// names two distinct namespaces.
    #[must_use]
    pub fn new(
        identifier: &Identifier,
        scope: &AccessScope,
        policy: AccessControlPolicy,
    ) -> Self {
        let service = format!(
            "{SERVICE_PREFIX}.{}.{}",
            identifier.as_str(),
            policy.canonical_name()
        );
        let access_group = match scope {
            AccessScope::Standalone => None,
            AccessScope::SharedAccessGroup { group } => Some(group.clone()),
        };
        Self {
            service,
            access_group,
            accessibility: policy.accessibility(),
            access_control: Some(policy),
        }
    }

    /// Derives the non-authenticating probe variant of this namespace.
    ///
    /// Used only by the keychain accessibility check. The probe lives
    /// under a sibling service so its canary record can never clobber a
    /// stored secret.
    #[must_use]
    pub fn probe(&self) -> Self {
        Self {
            service: format!("{}.{PROBE_SERVICE_SUFFIX}", self.service),
            access_group: self.access_group.clone(),
            accessibility: Accessibility::WhenUnlockedThisDeviceOnly,
            access_control: None,
        }
    }

    /// Canonical signature of this query: the hex SHA-256 digest of its
    /// domain-separated CBOR encoding.
    ///
    /// Two stores are the same store exactly when their signatures are
    /// equal; the registry keys instances by this value.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Configuration`] if the query cannot be
    /// encoded.
    pub fn canonical_signature(&self) -> KeychainResult<String> {
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(self, &mut encoded).map_err(|err| {
            KeychainError::Configuration(format!(
                "base query encoding failed: {err}"
            ))
        })?;
        let mut hasher = Sha256::new();
        hasher.update(SIGNATURE_DOMAIN);
        hasher.update(&encoded);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// How an operation may interact with the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum InteractionMode {
    /// The platform may present authentication UI.
    Allowed,
    /// The operation must fail rather than prompt.
    Disallowed,
}

/// Ephemeral engine-facing query describing one operation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct ItemQuery {
    /// Namespace attributes.
    pub base: BaseQuery,
    /// Record key; absent to match every record in the namespace.
    pub key: Option<String>,
    /// Payload for insertions.
    pub value: Option<Vec<u8>>,
    /// Human-readable prompt shown if authentication UI appears.
    pub prompt: Option<String>,
    /// Whether the platform may present authentication UI.
    pub interaction: InteractionMode,
    /// Whether enumeration should return record payloads.
    pub wants_data: bool,
}

impl ItemQuery {
    /// A query matching everything in `base`'s namespace, interactive,
    /// without payload.
    #[must_use]
    pub fn for_namespace(base: BaseQuery) -> Self {
        Self {
            base,
            key: None,
            value: None,
            prompt: None,
            interaction: InteractionMode::Allowed,
            wants_data: false,
        }
    }

    pub(crate) fn with_key(mut self, key: String) -> Self {
        self.key = Some(key);
        self
    }

    pub(crate) fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }

    /// Attaches `prompt` when non-empty; an empty prompt means no custom
    /// prompt text.
    pub(crate) fn with_prompt(mut self, prompt: String) -> Self {
        if !prompt.is_empty() {
            self.prompt = Some(prompt);
        }
        self
    }

    pub(crate) fn without_interaction(mut self) -> Self {
        self.interaction = InteractionMode::Disallowed;
        self
    }
}
