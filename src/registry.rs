//! Process-wide deduplication of store instances.
//!
//! Two lookups with structurally equal inputs must share one store, and
//! therefore one authentication session, while any strong reference is
//! held. The registry maps canonical query signatures to weak handles; it
//! never keeps a store alive, and dead entries are pruned opportunistically
//! on the next lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use crate::error::{KeychainError, KeychainResult};
use crate::store::KeychainStore;

static STORES: OnceLock<Mutex<HashMap<String, Weak<KeychainStore>>>> =
    OnceLock::new();

/// Returns the live store registered under `signature`, or registers the
/// store produced by `factory`.
///
/// The critical section covers map access and the factory call only;
/// `factory` performs no I/O.
pub(crate) fn lookup_or_create<F>(
    signature: &str,
    factory: F,
) -> KeychainResult<Arc<KeychainStore>>
where
    F: FnOnce() -> KeychainResult<Arc<KeychainStore>>,
{
    let registry = STORES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = registry.lock().map_err(|_| {
        KeychainError::Storage("store registry mutex poisoned".to_string())
    })?;
    map.retain(|_, handle| handle.strong_count() > 0);
    if let Some(existing) = map.get(signature).and_then(Weak::upgrade) {
        return Ok(existing);
    }
    let store = factory()?;
    map.insert(signature.to_string(), Arc::downgrade(&store));
    Ok(store)
}
