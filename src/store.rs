use std::{
    cell::RefCell,
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread::AccessError,
};

use crate::Context;

thread_local! {
    static CONTEXT_STORE: ContextStore = ContextStore::new();
}

static NEXT_STORE_KEY: AtomicU64 = AtomicU64::new(0);

/// Identifies the store slot owned by one logger instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey(u64);

impl StoreKey {
    pub fn next() -> Self {
        Self(NEXT_STORE_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Per-thread override slots, one per logger instance.
///
/// A slot only ever holds a complete [`Context`]; overrides are swapped in and
/// out wholesale so a reader can never see a half-built value.
#[derive(Debug, Default)]
pub struct ContextStore {
    slots: RefCell<HashMap<StoreKey, Arc<Context>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: StoreKey) -> Option<Arc<Context>> {
        self.slots.borrow().get(&key).cloned()
    }

    /// Installs `context` (or clears the slot) and returns the previous value.
    pub fn replace(&self, key: StoreKey, context: Option<Arc<Context>>) -> Option<Arc<Context>> {
        let mut slots = self.slots.borrow_mut();
        match context {
            Some(context) => slots.insert(key, context),
            None => slots.remove(&key),
        }
    }
}

/// Returns the override installed by the current execution unit.
pub fn get_current(key: StoreKey) -> Result<Option<Arc<Context>>, AccessError> {
    CONTEXT_STORE.try_with(|store| store.get(key))
}

/// Installs an override for the current execution unit.
///
/// During thread teardown the store may already be gone; there is nothing
/// left to restore in that case.
pub fn set_current(key: StoreKey, context: Option<Arc<Context>>) -> Option<Arc<Context>> {
    CONTEXT_STORE
        .try_with(|store| store.replace(key, context))
        .ok()
        .flatten()
}
