//! Context layering for one logger instance.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::{
    Context, Error, Result,
    guard::ContextGuard,
    store::{self, StoreKey},
};

/// The global context and scoped overrides of one logger instance.
///
/// The effective context of a call is the scoped override installed on the
/// calling thread if there is one, otherwise the global context. Overrides
/// already contain the global context they were merged on top of, so once an
/// override exists the global context is locked against reassignment.
#[derive(Debug)]
pub struct ContextScope {
    key: StoreKey,
    owner: &'static str,
    global: RwLock<Arc<Context>>,
    lock_reason: OnceLock<String>,
}

impl ContextScope {
    pub(crate) fn new(owner: &'static str, global: Context) -> Self {
        Self {
            key: StoreKey::next(),
            owner,
            global: RwLock::new(Arc::new(global)),
            lock_reason: OnceLock::new(),
        }
    }

    pub(crate) const fn key(&self) -> StoreKey {
        self.key
    }

    pub fn global_context(&self) -> Arc<Context> {
        self.global
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the global context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GlobalContextLocked`] once a scoped override has been
    /// pushed on this logger; the previous global context is kept.
    pub fn set_global_context(&self, context: Context) -> Result<()> {
        let mut global = self.global.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(reason) = self.lock_reason.get() {
            return Err(Error::GlobalContextLocked {
                reason: reason.clone(),
            });
        }
        *global = Arc::new(context);
        Ok(())
    }

    /// Describes what locked the global context, if anything did.
    pub fn lock_reason(&self) -> Option<&str> {
        self.lock_reason.get().map(String::as_str)
    }

    /// The scoped override installed by the calling thread or task.
    pub fn override_context(&self) -> Option<Arc<Context>> {
        store::get_current(self.key).unwrap_or_else(|err| {
            // We can't log through ourselves here, that would recurse.
            eprintln!("Error accessing context store: {err}");
            None
        })
    }

    pub fn current_context(&self) -> Arc<Context> {
        self.override_context()
            .unwrap_or_else(|| self.global_context())
    }

    /// Merges an inline context on top of the current one.
    ///
    /// An empty inline context returns the current context itself, so callers
    /// may rely on pointer identity of the result.
    pub fn resolve(&self, inline: &Context) -> Arc<Context> {
        let current = self.current_context();
        if inline.is_empty() {
            current
        } else {
            Arc::new(current.deep_merge(inline))
        }
    }

    /// Builds the override a push of `context` installs and locks the global
    /// context.
    pub(crate) fn stacked(&self, context: &Context) -> Arc<Context> {
        // The lock is taken and the base read under one read guard, so a
        // concurrent `set_global_context` either lands before both or fails.
        let current = {
            let global = self.global.read().unwrap_or_else(PoisonError::into_inner);
            self.lock_reason.get_or_init(|| {
                format!(
                    "scoped context override set for {} #{}",
                    self.owner,
                    self.key.id()
                )
            });
            self.override_context().unwrap_or_else(|| global.clone())
        };

        if context.is_empty() {
            current
        } else {
            Arc::new(current.deep_merge(context))
        }
    }

    pub fn push(&self, context: &Context) -> ContextGuard<'_> {
        ContextGuard::enter(self.key, self.stacked(context))
    }
}
