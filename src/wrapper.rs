//! A logger that adds a fixed context on top of another logger.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU8, Ordering},
    },
};

use crate::{
    Context, ContextValue, Result,
    facade::{ContextualLog, Entry},
    level::{IntoSeverity, Severity},
    redactor::Redactor,
    scope::ContextScope,
};

/// Upper bound on memoized merges before the cache is dropped wholesale.
pub const MERGE_CACHE_CAPACITY: usize = 5000;

const NO_LEVEL: u8 = u8::MAX;

struct CachedMerge {
    // Holding the received context keeps its address from being reused while
    // the entry is alive.
    received: Arc<Context>,
    lower: Arc<Context>,
    merged: Arc<Context>,
}

/// Wraps a [`ContextualLog`] with its own fixed context and, optionally, its
/// own level.
///
/// Entries are handed down to the delegate with the delegate's current
/// context, then this wrapper's fixed context, then the context of the call
/// deep-merged in that order. Independent subsystems can each carry a
/// wrapper around one shared root logger.
///
/// Only loggers implementing [`ContextualLog`] can be wrapped; anything else
/// is rejected at compile time.
///
/// ```
/// use std::sync::Arc;
/// use context_redact_logger::{Context, ContextLogger, ContextualLog, LoggerWithContext, MemorySink};
///
/// let sink = MemorySink::shared();
/// let root = Arc::new(ContextLogger::new(sink.clone()));
/// let redis = LoggerWithContext::for_log_source(root.clone(), "redis_client");
///
/// redis.warn("connection reset");
/// let line: serde_json::Value = serde_json::from_str(&sink.lines()[0]).unwrap();
/// assert_eq!(line["log_source"], "redis_client");
/// ```
pub struct LoggerWithContext<L> {
    delegate: Arc<L>,
    context: Arc<Context>,
    override_level: AtomicU8,
    scope: ContextScope,
    merge_cache: Mutex<HashMap<usize, CachedMerge>>,
}

impl<L> LoggerWithContext<L>
where
    L: ContextualLog,
{
    pub fn new(delegate: Arc<L>, context: Context) -> Self {
        Self {
            delegate,
            context: Arc::new(context),
            override_level: AtomicU8::new(NO_LEVEL),
            scope: ContextScope::new("LoggerWithContext", Context::new()),
            merge_cache: Mutex::default(),
        }
    }

    /// Creates a wrapper with its own level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLevel`](crate::Error::InvalidLevel) for an
    /// unrecognized level.
    pub fn with_level(delegate: Arc<L>, context: Context, level: impl IntoSeverity) -> Result<Self> {
        let level = level.into_severity()?;
        let logger = Self::new(delegate, context);
        logger.override_level.store(level.rank(), Ordering::Relaxed);
        Ok(logger)
    }

    /// Creates a wrapper whose fixed context is `{log_source: source}`.
    pub fn for_log_source(delegate: Arc<L>, source: impl Into<ContextValue>) -> Self {
        Self::new(delegate, Context::new().record("log_source", source))
    }

    pub const fn delegate(&self) -> &Arc<L> {
        &self.delegate
    }

    /// The fixed context given at construction.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// This wrapper's own level, if it has one.
    pub fn override_level(&self) -> Option<Severity> {
        match self.override_level.load(Ordering::Relaxed) {
            NO_LEVEL => None,
            rank => Severity::from_rank(i64::from(rank)).ok(),
        }
    }

    /// Gives this wrapper its own level, detaching it from the delegate's.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLevel`](crate::Error::InvalidLevel) for
    /// unrecognized input; the current level is kept.
    pub fn set_level(&self, level: impl IntoSeverity) -> Result<()> {
        let level = level.into_severity()?;
        self.override_level.store(level.rank(), Ordering::Relaxed);
        Ok(())
    }

    /// Follows the delegate's level again.
    pub fn clear_level(&self) {
        self.override_level.store(NO_LEVEL, Ordering::Relaxed);
    }

    fn merged_context(&self, received: Arc<Context>) -> Arc<Context> {
        let lower = self.delegate.current_context();
        let id = Arc::as_ptr(&received) as usize;

        if let Some(hit) = self.lock_cache().get(&id) {
            if Arc::ptr_eq(&hit.received, &received) && Arc::ptr_eq(&hit.lower, &lower) {
                return hit.merged.clone();
            }
        }

        let merged = Arc::new(lower.deep_merge(&self.context).deep_merge(&received));
        let mut cache = self.lock_cache();
        if cache.len() >= MERGE_CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(
            id,
            CachedMerge {
                received,
                lower,
                merged: merged.clone(),
            },
        );
        merged
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<usize, CachedMerge>> {
        self.merge_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn cached_merges(&self) -> usize {
        self.lock_cache().len()
    }
}

impl<L> ContextualLog for LoggerWithContext<L>
where
    L: ContextualLog,
{
    fn scope(&self) -> &ContextScope {
        &self.scope
    }

    fn level(&self) -> Severity {
        self.override_level()
            .unwrap_or_else(|| self.delegate.level())
    }

    fn progname(&self) -> Option<Arc<str>> {
        self.delegate.progname()
    }

    fn redactor(&self) -> &Redactor {
        self.delegate.redactor()
    }

    fn write_entry(&self, entry: Entry<'_>) {
        let context = self.merged_context(entry.context);
        self.delegate.write_entry(Entry { context, ..entry });
    }

    fn flush(&self) {
        self.delegate.flush();
    }
}

impl<L> std::fmt::Debug for LoggerWithContext<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerWithContext")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
