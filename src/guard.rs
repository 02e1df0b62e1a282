//! A scoped logging context guard.

use std::{marker::PhantomData, sync::Arc};

use crate::{
    Context,
    store::{self, StoreKey},
};

/// A guard representing a context pushed onto a logger.
///
/// The guard remembers the context that was active before the push. Calling
/// [`ContextGuard::restore`] or dropping the guard reinstates it, exactly once.
/// This is returned by [`ContextualLog::push_context`](crate::ContextualLog::push_context).
///
/// Guards must be released in reverse order of creation. Leaking a guard with
/// [`std::mem::forget`] leaves its context in place for the rest of the
/// thread's lifetime.
///
/// # Examples
///
/// ```
/// use context_redact_logger::{Context, ContextLogger, ContextualLog};
///
/// let logger = ContextLogger::builder().build();
///
/// // Install a context for the following calls.
/// let guard = logger.push_context(&Context::new().record("user_id", 123));
/// assert!(logger.current_context().contains_key("user_id"));
///
/// // Restoring the guard removes the context again.
/// guard.restore();
/// assert!(logger.current_context().is_empty());
/// ```
#[must_use = "the context is removed again as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard<'a> {
    key: StoreKey,
    previous: Option<Arc<Context>>,
    installed: Arc<Context>,
    restored: bool,
    // Make this guard unsendable: it must be restored on the thread that pushed it.
    _marker: PhantomData<&'a *mut ()>,
}

impl ContextGuard<'_> {
    pub(crate) fn enter(key: StoreKey, installed: Arc<Context>) -> Self {
        let previous = store::set_current(key, Some(installed.clone()));
        Self {
            key,
            previous,
            installed,
            restored: false,
            _marker: PhantomData,
        }
    }

    /// The full context installed by this guard.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.installed
    }

    /// The context that was active before this guard was created.
    #[must_use]
    pub fn previous(&self) -> Option<&Context> {
        self.previous.as_deref()
    }

    /// Reinstates the previous context.
    pub fn restore(mut self) {
        self.restore_previous();
    }

    fn restore_previous(&mut self) {
        if !self.restored {
            self.restored = true;
            store::set_current(self.key, self.previous.take());
        }
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.restore_previous();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ContextValue;

    fn record(key: StoreKey, name: &str) -> Option<ContextValue> {
        store::get_current(key)
            .unwrap()
            .and_then(|context| context.get(name).cloned())
    }

    #[test]
    fn test_context_guard_enter() {
        let key = StoreKey::next();
        // Make sure the slot is empty before entering the context.
        assert_eq!(store::get_current(key).unwrap(), None);

        let guard = ContextGuard::enter(key, Arc::new(Context::new().record("simple", 42)));
        assert_eq!(record(key, "simple"), Some(ContextValue::from(42)));

        // Check that the slot is empty after dropping the guard.
        drop(guard);
        assert_eq!(store::get_current(key).unwrap(), None);
    }

    #[test]
    fn test_nested_guards_restore_in_lifo_order() {
        let key = StoreKey::next();
        let outer = ContextGuard::enter(key, Arc::new(Context::new().record("value", "outer")));
        assert_eq!(record(key, "value"), Some("outer".into()));

        {
            let inner = ContextGuard::enter(key, Arc::new(Context::new().record("value", "inner")));
            assert_eq!(record(key, "value"), Some("inner".into()));
            assert_eq!(inner.previous().and_then(|c| c.get("value")), Some(&"outer".into()));
            inner.restore();
        }

        assert_eq!(record(key, "value"), Some("outer".into()));
        outer.restore();
        assert_eq!(store::get_current(key).unwrap(), None);
    }

    #[test]
    fn test_restore_runs_once() {
        let key = StoreKey::next();
        let mut guard = ContextGuard::enter(key, Arc::new(Context::new().record("value", 1)));
        guard.restore_previous();

        // Something else installed later must survive the guard's drop.
        store::set_current(key, Some(Arc::new(Context::new().record("value", 2))));
        drop(guard);
        assert_eq!(record(key, "value"), Some(ContextValue::from(2)));
        store::set_current(key, None);
    }

    #[test]
    fn test_context_guard_multithread() {
        let key = StoreKey::next();
        let main_guard = ContextGuard::enter(key, Arc::new(Context::new().record("owner", "main")));

        let handles = ["first_thread", "second_thread"].map(|name| {
            std::thread::spawn(move || {
                assert_eq!(store::get_current(key).unwrap(), None);
                let guard = ContextGuard::enter(key, Arc::new(Context::new().record("owner", name)));
                assert_eq!(record(key, "owner"), Some(name.into()));
                drop(guard);
            })
        });
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(record(key, "owner"), Some("main".into()));
        drop(main_guard);
    }
}
