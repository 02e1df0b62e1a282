//! The logging surface shared by every contextual logger.

use std::{borrow::Cow, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    Context, Result,
    guard::ContextGuard,
    level::Severity,
    redactor::Redactor,
    scope::ContextScope,
};

/// One entry on its way from a logger to its sink.
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub progname: Option<&'a str>,
    pub message: &'a str,
    /// The effective context resolved so far.
    pub context: Arc<Context>,
}

macro_rules! severity_methods {
    ($($severity:ident => $plain:ident, $with:ident, $lazy:ident;)*) => {
        $(
            #[doc = concat!("Logs `message` at [`Severity::", stringify!($severity), "`].")]
            fn $plain(&self, message: &str) -> bool {
                self.add(Some(Severity::$severity), Some(message), None, Context::new())
            }

            #[doc = concat!("Logs `message` with an inline context at [`Severity::", stringify!($severity), "`].")]
            fn $with(&self, message: &str, context: Context) -> bool {
                self.add(Some(Severity::$severity), Some(message), None, context)
            }

            #[doc = concat!("Logs the message built by `producer` at [`Severity::", stringify!($severity), "`].")]
            ///
            /// The producer only runs if the severity is enabled.
            fn $lazy<F>(&self, progname: Option<&str>, context: Context, producer: F) -> bool
            where
                F: FnOnce() -> String,
            {
                self.add_lazy(Some(Severity::$severity), progname, context, producer)
            }
        )*
    };
}

/// A logger that attaches scoped context to every entry.
///
/// Implementors provide the context scope, the level and the final write;
/// the entry points, level gating, message resolution and context merging
/// are shared.
///
/// Context precedence, highest first:
///
/// 1. the inline context passed to the logging call,
/// 2. contexts pushed on this logger with [`with_context`](Self::with_context)
///    or [`push_context`](Self::push_context),
/// 3. the fixed context of a [`LoggerWithContext`](crate::LoggerWithContext),
/// 4. the global context of the root logger.
pub trait ContextualLog: Send + Sync {
    fn scope(&self) -> &ContextScope;

    /// The minimum severity that is written.
    fn level(&self) -> Severity;

    /// Program name used when a call does not pass one.
    fn progname(&self) -> Option<Arc<str>>;

    fn redactor(&self) -> &Redactor;

    /// Receives an enabled entry with the context resolved on this logger.
    fn write_entry(&self, entry: Entry<'_>);

    fn flush(&self) {}

    fn enabled(&self, severity: Severity) -> bool {
        severity >= self.level()
    }

    fn global_context(&self) -> Arc<Context> {
        self.scope().global_context()
    }

    /// Replaces the global context of this logger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GlobalContextLocked`](crate::Error::GlobalContextLocked)
    /// if a context has already been pushed on this logger.
    fn set_global_context(&self, context: Context) -> Result<()> {
        self.scope().set_global_context(context)
    }

    /// The context active for the calling thread or task: the innermost
    /// pushed context, or the global context.
    fn current_context(&self) -> Arc<Context> {
        self.scope().current_context()
    }

    /// Deep-merges `context` on top of the current one until the returned
    /// guard is restored or dropped.
    fn push_context(&self, context: &Context) -> ContextGuard<'_> {
        self.scope().push(context)
    }

    /// Runs `body` with `context` deep-merged on top of the current one.
    ///
    /// The previous context is restored on every exit path, including panics.
    fn with_context<R, F>(&self, context: &Context, body: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.push_context(context);
        body()
    }

    /// Registers a literal secret with the redactor of this logger.
    ///
    /// # Errors
    ///
    /// See [`Redactor::register_secret`].
    fn register_secret(&self, secret: &str) -> Result<bool> {
        self.redactor().register_secret(secret)
    }

    /// Registers a secret pattern with the redactor of this logger.
    ///
    /// # Errors
    ///
    /// See [`Redactor::register_secret_pattern`].
    fn register_secret_pattern(&self, pattern: &str) -> Result<bool> {
        self.redactor().register_secret_pattern(pattern)
    }

    /// Logs an entry, classic logger style.
    ///
    /// A missing severity is logged as [`Severity::Unknown`]. When `message`
    /// is `None` the value in the `progname` position is used as the message
    /// and the default program name applies. Always returns `true`.
    fn add(
        &self,
        severity: Option<Severity>,
        message: Option<&str>,
        progname: Option<&str>,
        context: Context,
    ) -> bool {
        dispatch(self, severity, message, progname, &context, None::<fn() -> String>)
    }

    /// Logs the message built by `producer`, which only runs if `severity`
    /// is enabled. Always returns `true`.
    fn add_lazy<F>(
        &self,
        severity: Option<Severity>,
        progname: Option<&str>,
        context: Context,
        producer: F,
    ) -> bool
    where
        F: FnOnce() -> String,
    {
        dispatch(self, severity, None, progname, &context, Some(producer))
    }

    severity_methods! {
        Debug => debug, debug_with, debug_lazy;
        Info => info, info_with, info_lazy;
        Warn => warn, warn_with, warn_lazy;
        Error => error, error_with, error_lazy;
        Fatal => fatal, fatal_with, fatal_lazy;
        Unknown => unknown, unknown_with, unknown_lazy;
    }
}

fn dispatch<L, F>(
    logger: &L,
    severity: Option<Severity>,
    message: Option<&str>,
    progname: Option<&str>,
    inline: &Context,
    producer: Option<F>,
) -> bool
where
    L: ContextualLog + ?Sized,
    F: FnOnce() -> String,
{
    let severity = severity.unwrap_or(Severity::Unknown);
    if !logger.enabled(severity) {
        return true;
    }

    let default_progname = logger.progname();
    let (message, progname): (Cow<'_, str>, Option<&str>) = match (message, producer) {
        (Some(message), _) => (
            Cow::Borrowed(message),
            progname.or(default_progname.as_deref()),
        ),
        (None, Some(producer)) => (
            Cow::Owned(producer()),
            progname.or(default_progname.as_deref()),
        ),
        (None, None) => (
            Cow::Borrowed(progname.unwrap_or_default()),
            default_progname.as_deref(),
        ),
    };

    logger.write_entry(Entry {
        severity,
        timestamp: Utc::now(),
        progname,
        message: &message,
        context: logger.scope().resolve(inline),
    });
    true
}
