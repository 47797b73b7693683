//! Namespace identity and access-control policy vocabulary.

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::error::{KeychainError, KeychainResult};

/// Name of a logical credential namespace. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validates and wraps a namespace identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Configuration`] if `identifier` is empty.
    pub fn new(identifier: String) -> KeychainResult<Self> {
        if identifier.is_empty() {
            return Err(KeychainError::Configuration(
                "identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(identifier))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether a namespace is private to the owning principal or shared
/// across a defined group of principals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, uniffi::Enum)]
pub enum AccessScope {
    /// Namespace private to the constructing principal.
    Standalone,
    /// Namespace shared across an access group.
    SharedAccessGroup {
        /// The shared access group identifier. Never empty.
        group: String,
    },
}

/// Device posture required before a hardware-backed secret can be read.
///
/// The policy determines both the accessibility class records are stored
/// with and whether one successful authentication is reused across
/// subsequent reads.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    uniffi::Enum,
)]
#[strum(serialize_all = "camelCase")]
pub enum AccessControlPolicy {
    /// Device passcode (or enrolled biometry) gate; one successful
    /// authentication unlocks subsequent reads until explicitly
    /// invalidated.
    DevicePasscodeSinglePrompt,
    /// Device passcode (or enrolled biometry) gate on every read.
    DevicePasscodePromptPerAccess,
    /// Any enrolled biometry; re-prompts on every read.
    BiometryAny,
    /// Only the currently enrolled biometric set; re-prompts on every
    /// read and is invalidated by re-enrollment.
    BiometryCurrentSet,
}

impl AccessControlPolicy {
    /// Accessibility class applied to records stored under this policy.
    #[must_use]
    pub const fn accessibility(self) -> Accessibility {
        Accessibility::WhenPasscodeSetThisDeviceOnly
    }

    /// Whether a cached authentication session is reused across reads.
    #[must_use]
    pub const fn reuses_session(self) -> bool {
        matches!(self, Self::DevicePasscodeSinglePrompt)
    }

    /// Canonical policy name, embedded in service identifiers so
    /// differently-gated namespaces never collide.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        self.into()
    }
}

/// When records under a namespace are readable at all.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum,
)]
pub enum Accessibility {
    /// Only while the device is unlocked; never migrates to another
    /// device. Used by the non-authenticating accessibility probe.
    WhenUnlockedThisDeviceOnly,
    /// Only while the device is unlocked and a passcode is set; records
    /// are evicted if the passcode is removed.
    WhenPasscodeSetThisDeviceOnly,
}
