//! Integration with the [`log`] facade.

use std::{borrow::Cow, sync::Arc};

use log::kv::{Key, Value, VisitSource};

use crate::{Context, ContextValue, ContextualLog, Severity};

/// Routes records of the [`log`] crate through a [`ContextualLog`].
///
/// Key-values attached to a `log` record become the inline context of the
/// entry. `log`'s trace level is written as debug.
///
/// ```no_run
/// use std::sync::Arc;
/// use context_redact_logger::{Context, ContextLogger, ContextualLog, LogBridge, WriterSink};
///
/// let logger = Arc::new(ContextLogger::new(WriterSink::new(std::io::stdout())));
/// LogBridge::new(logger.clone()).init();
///
/// logger.with_context(&Context::new().record("request_id", "req-123"), || {
///     log::info!(user_id = 42; "Processing request");
/// });
/// ```
pub struct LogBridge<L> {
    logger: Arc<L>,
}

impl<L> LogBridge<L>
where
    L: ContextualLog + 'static,
{
    pub const fn new(logger: Arc<L>) -> Self {
        Self { logger }
    }

    /// Installs the bridge as the global `log` logger.
    ///
    /// Level filtering is left to the wrapped logger, so its level can keep
    /// changing after installation.
    ///
    /// # Panics
    ///
    /// Panics if a logger has already been set.
    pub fn init(self) {
        self.try_init()
            .expect("LogBridge::init should not be called after logger initialization");
    }

    /// Installs the bridge as the global `log` logger.
    ///
    /// # Errors
    ///
    /// Returns an error if a logger has already been set.
    pub fn try_init(self) -> Result<(), log::SetLoggerError> {
        log::set_max_level(log::LevelFilter::Trace);
        log::set_boxed_logger(Box::new(self))
    }
}

impl<L> std::fmt::Debug for LogBridge<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBridge").finish_non_exhaustive()
    }
}

impl<L> log::Log for LogBridge<L>
where
    L: ContextualLog,
{
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.logger.enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        let severity = Severity::from(record.level());
        if !self.logger.enabled(severity) {
            return;
        }

        let mut visitor = ContextVisitor(Context::new());
        if let Err(err) = record.key_values().visit(&mut visitor) {
            // We can't use `log::error!` here because we are in the middle of logging and
            // this invocation becomes recursive.
            eprintln!("Error collecting log record key-values: {err}");
        }

        let message = record
            .args()
            .as_str()
            .map_or_else(|| Cow::Owned(record.args().to_string()), Cow::Borrowed);
        self.logger.add(Some(severity), Some(&message), None, visitor.0);
    }

    fn flush(&self) {
        self.logger.flush();
    }
}

struct ContextVisitor(Context);

impl<'kvs> VisitSource<'kvs> for ContextVisitor {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), log::kv::Error> {
        let value = serde_json::to_value(&value)
            .map_or_else(|_| ContextValue::display(&value), ContextValue::from);
        self.0.insert(key.as_str().to_owned(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use log::Log as _;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ContextLogger, MemorySink};

    #[test]
    fn test_key_values_become_inline_context() {
        let sink = MemorySink::shared();
        let logger = Arc::new(
            ContextLogger::builder()
                .sink(sink.clone())
                .level(Severity::Info)
                .build(),
        );
        let bridge = LogBridge::new(logger.clone());

        let _guard = logger.push_context(&Context::new().record("user_id", 1));
        let kvs = [("user_id", 42)];
        bridge.log(
            &log::Record::builder()
                .args(format_args!("processing {}", "request"))
                .level(log::Level::Warn)
                .key_values(&kvs)
                .build(),
        );

        let line: serde_json::Value = serde_json::from_str(&sink.lines()[0]).unwrap();
        assert_eq!(line["message"], "processing request");
        assert_eq!(line["severity"], "WARN");
        assert_eq!(line["user_id"], 42);
    }

    #[test]
    fn test_level_is_checked_by_wrapped_logger() {
        let sink = MemorySink::shared();
        let logger = Arc::new(
            ContextLogger::builder()
                .sink(sink.clone())
                .level(Severity::Info)
                .build(),
        );
        let bridge = LogBridge::new(logger.clone());

        let trace = log::Metadata::builder().level(log::Level::Trace).build();
        assert!(!bridge.enabled(&trace));

        logger.set_level(Severity::Debug).unwrap();
        assert!(bridge.enabled(&trace));
        bridge.log(
            &log::Record::builder()
                .args(format_args!("traced"))
                .level(log::Level::Trace)
                .build(),
        );
        let line: serde_json::Value = serde_json::from_str(&sink.lines()[0]).unwrap();
        assert_eq!(line["severity"], "DEBUG");
    }
}
