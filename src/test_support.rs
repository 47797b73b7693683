//! In-memory fakes of the platform collaborators for tests.
//!
//! The fake engine models the platform behaviors the store depends on:
//! duplicate inserts are rejected, gated records demand authentication,
//! an invalidated context can never authenticate again, and reads with
//! interaction disallowed answer "interaction required" instead of
//! prompting. Tests script failures and observe prompt counts through
//! [`EngineState`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::{
    EngineError, KeychainEngine, KeychainItem, KeychainProvider,
};
use crate::policy::AccessControlPolicy;
use crate::query::{InteractionMode, ItemQuery};
use crate::session::AuthenticationContext;

/// Scripted outcome for the next interactive authentication attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) enum AuthOutcome {
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    service: String,
    access_group: Option<String>,
    key: String,
}

impl ItemKey {
    fn from_query(query: &ItemQuery, key: String) -> Self {
        Self {
            service: query.base.service.clone(),
            access_group: query.base.access_group.clone(),
            key,
        }
    }
}

struct StoredItem {
    value: Vec<u8>,
    gated: bool,
}

/// Shared, observable state behind the fake engine and contexts.
pub(crate) struct EngineState {
    items: Mutex<HashMap<ItemKey, StoredItem>>,
    authorized: Mutex<HashSet<usize>>,
    invalidated: Mutex<HashSet<usize>>,
    prompted_contexts: Mutex<HashSet<usize>>,
    prompts: AtomicUsize,
    probe_calls: AtomicUsize,
    hardware_available: AtomicBool,
    deny_writes: AtomicBool,
    fail_set_keys: Mutex<HashSet<String>>,
    fail_delete_services: Mutex<HashSet<String>>,
    next_auth_outcome: Mutex<Option<AuthOutcome>>,
    // Contexts are identified by address, so every one ever vended is
    // kept alive to rule out allocator address reuse.
    #[allow(dead_code)]
    contexts: Mutex<Vec<Arc<dyn AuthenticationContext>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            authorized: Mutex::new(HashSet::new()),
            invalidated: Mutex::new(HashSet::new()),
            prompted_contexts: Mutex::new(HashSet::new()),
            prompts: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            hardware_available: AtomicBool::new(true),
            deny_writes: AtomicBool::new(false),
            fail_set_keys: Mutex::new(HashSet::new()),
            fail_delete_services: Mutex::new(HashSet::new()),
            next_auth_outcome: Mutex::new(None),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub(crate) fn prompted_context_count(&self) -> usize {
        self.prompted_contexts
            .lock()
            .expect("engine state mutex")
            .len()
    }

    pub(crate) fn probe_call_count(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_hardware_available(&self, available: bool) {
        self.hardware_available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn set_deny_writes(&self, deny: bool) {
        self.deny_writes.store(deny, Ordering::SeqCst);
    }

    pub(crate) fn fail_inserts_for(&self, key: &str) {
        self.fail_set_keys
            .lock()
            .expect("engine state mutex")
            .insert(key.to_string());
    }

    pub(crate) fn fail_deletes_in(&self, service: &str) {
        self.fail_delete_services
            .lock()
            .expect("engine state mutex")
            .insert(service.to_string());
    }

    pub(crate) fn fail_next_authentication(&self, outcome: AuthOutcome) {
        *self.next_auth_outcome.lock().expect("engine state mutex") =
            Some(outcome);
    }

    /// Seeds a non-gated record, as a legacy application would have
    /// written it.
    pub(crate) fn seed_plain_item(&self, service: &str, key: &str, value: &[u8]) {
        self.items.lock().expect("engine state mutex").insert(
            ItemKey {
                service: service.to_string(),
                access_group: None,
                key: key.to_string(),
            },
            StoredItem {
                value: value.to_vec(),
                gated: false,
            },
        );
    }

    pub(crate) fn has_item(&self, service: &str, key: &str) -> bool {
        self.items
            .lock()
            .expect("engine state mutex")
            .keys()
            .any(|item| item.service == service && item.key == key)
    }

    pub(crate) fn namespace_len(&self, service: &str) -> usize {
        self.items
            .lock()
            .expect("engine state mutex")
            .keys()
            .filter(|item| item.service == service)
            .count()
    }

    fn context_id(context: &Arc<dyn AuthenticationContext>) -> usize {
        Arc::as_ptr(context).cast::<()>() as usize
    }

    /// Resolves authentication for a gated operation: reuse an authorized
    /// context, refuse an invalidated one, or prompt.
    fn authorize(
        &self,
        interaction: InteractionMode,
        session: Option<&Arc<dyn AuthenticationContext>>,
    ) -> Result<(), EngineError> {
        if let Some(context) = session {
            let id = Self::context_id(context);
            if self
                .invalidated
                .lock()
                .expect("engine state mutex")
                .contains(&id)
            {
                return Err(EngineError::AuthenticationFailed);
            }
            if self
                .authorized
                .lock()
                .expect("engine state mutex")
                .contains(&id)
            {
                return Ok(());
            }
        }
        if interaction == InteractionMode::Disallowed {
            return Err(EngineError::InteractionNotAllowed);
        }
        if let Some(outcome) = self
            .next_auth_outcome
            .lock()
            .expect("engine state mutex")
            .take()
        {
            return Err(match outcome {
                AuthOutcome::Failed => EngineError::AuthenticationFailed,
                AuthOutcome::Cancelled => EngineError::UserCancelled,
            });
        }
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if let Some(context) = session {
            let id = Self::context_id(context);
            self.authorized
                .lock()
                .expect("engine state mutex")
                .insert(id);
            self.prompted_contexts
                .lock()
                .expect("engine state mutex")
                .insert(id);
        }
        Ok(())
    }
}

fn platform(message: &str) -> EngineError {
    EngineError::Platform {
        code: -1,
        message: message.to_string(),
    }
}

struct TestEngine {
    state: Arc<EngineState>,
}

impl KeychainEngine for TestEngine {
    fn secure_hardware_available(&self, _policy: AccessControlPolicy) -> bool {
        self.state.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.state.hardware_available.load(Ordering::SeqCst)
    }

    fn get(
        &self,
        query: ItemQuery,
        session: Option<Arc<dyn AuthenticationContext>>,
    ) -> Result<Vec<u8>, EngineError> {
        let key = query
            .key
            .clone()
            .ok_or_else(|| platform("get requires a key"))?;
        let item_key = ItemKey::from_query(&query, key);
        let (value, gated) = {
            let items = self.state.items.lock().expect("engine state mutex");
            let Some(item) = items.get(&item_key) else {
                return Err(EngineError::ItemNotFound);
            };
            (item.value.clone(), item.gated)
        };
        if gated {
            self.state.authorize(query.interaction, session.as_ref())?;
        }
        Ok(value)
    }

    fn set(&self, query: ItemQuery) -> Result<(), EngineError> {
        if self.state.deny_writes.load(Ordering::SeqCst) {
            return Err(platform("writes denied"));
        }
        let key = query
            .key
            .clone()
            .ok_or_else(|| platform("set requires a key"))?;
        if self
            .state
            .fail_set_keys
            .lock()
            .expect("engine state mutex")
            .contains(&key)
        {
            return Err(platform("scripted insert failure"));
        }
        let value = query
            .value
            .clone()
            .ok_or_else(|| platform("set requires a value"))?;
        let gated = query.base.access_control.is_some();
        let item_key = ItemKey::from_query(&query, key);
        let mut items = self.state.items.lock().expect("engine state mutex");
        if items.contains_key(&item_key) {
            return Err(EngineError::Platform {
                code: -25299,
                message: "duplicate item".to_string(),
            });
        }
        items.insert(item_key, StoredItem { value, gated });
        Ok(())
    }

    fn delete(&self, query: ItemQuery) -> Result<(), EngineError> {
        if self
            .state
            .fail_delete_services
            .lock()
            .expect("engine state mutex")
            .contains(&query.base.service)
        {
            return Err(platform("scripted delete failure"));
        }
        let mut items = self.state.items.lock().expect("engine state mutex");
        let before = items.len();
        match &query.key {
            Some(key) => {
                let item_key = ItemKey::from_query(&query, key.clone());
                items.remove(&item_key);
            }
            None => {
                items.retain(|item, _| {
                    item.service != query.base.service
                        || item.access_group != query.base.access_group
                });
            }
        }
        if items.len() == before {
            return Err(EngineError::ItemNotFound);
        }
        Ok(())
    }

    fn enumerate(
        &self,
        query: ItemQuery,
        session: Option<Arc<dyn AuthenticationContext>>,
    ) -> Result<Vec<KeychainItem>, EngineError> {
        let (mut matched, any_gated) = {
            let items = self.state.items.lock().expect("engine state mutex");
            let mut matched: Vec<(String, Vec<u8>, bool)> = items
                .iter()
                .filter(|(item, _)| {
                    item.service == query.base.service
                        && item.access_group == query.base.access_group
                        && query
                            .key
                            .as_ref()
                            .is_none_or(|key| *key == item.key)
                })
                .map(|(item, stored)| {
                    (item.key.clone(), stored.value.clone(), stored.gated)
                })
                .collect();
            matched.sort_by(|a, b| a.0.cmp(&b.0));
            let any_gated = matched.iter().any(|(_, _, gated)| *gated);
            (matched, any_gated)
        };
        if matched.is_empty() {
            return Err(EngineError::ItemNotFound);
        }
        if query.wants_data && any_gated {
            self.state.authorize(query.interaction, session.as_ref())?;
        }
        Ok(matched
            .drain(..)
            .map(|(key, value, _)| KeychainItem {
                key,
                value: query.wants_data.then_some(value),
            })
            .collect())
    }

    fn contains(&self, query: ItemQuery) -> Result<(), EngineError> {
        let key = query
            .key
            .clone()
            .ok_or_else(|| platform("contains requires a key"))?;
        let item_key = ItemKey::from_query(&query, key);
        let items = self.state.items.lock().expect("engine state mutex");
        let Some(item) = items.get(&item_key) else {
            return Err(EngineError::ItemNotFound);
        };
        if item.gated && query.interaction == InteractionMode::Disallowed {
            return Err(EngineError::InteractionNotAllowed);
        }
        Ok(())
    }
}

struct TestContext {
    state: Arc<EngineState>,
}

impl AuthenticationContext for TestContext {
    fn invalidate(&self) {
        let id = std::ptr::from_ref(self).cast::<()>() as usize;
        self.state
            .invalidated
            .lock()
            .expect("engine state mutex")
            .insert(id);
    }
}

/// Provider wiring the fake engine and contexts together.
pub(crate) struct TestProvider {
    state: Arc<EngineState>,
    engine: Arc<TestEngine>,
}

impl TestProvider {
    pub(crate) fn new() -> Self {
        let state = Arc::new(EngineState::new());
        Self {
            engine: Arc::new(TestEngine {
                state: Arc::clone(&state),
            }),
            state,
        }
    }

    pub(crate) fn state(&self) -> Arc<EngineState> {
        Arc::clone(&self.state)
    }

    pub(crate) fn engine_impl(&self) -> Arc<dyn KeychainEngine> {
        Arc::clone(&self.engine) as Arc<dyn KeychainEngine>
    }
}

impl KeychainProvider for TestProvider {
    fn engine(&self) -> Arc<dyn KeychainEngine> {
        self.engine_impl()
    }

    fn new_authentication_context(&self) -> Arc<dyn AuthenticationContext> {
        let context: Arc<dyn AuthenticationContext> = Arc::new(TestContext {
            state: Arc::clone(&self.state),
        });
        self.state
            .contexts
            .lock()
            .expect("engine state mutex")
            .push(Arc::clone(&context));
        context
    }
}
