use std::{
    collections::BTreeMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU8, Ordering},
    },
};

use crate::{
    Context, ContextValue, Error, Result,
    config::LoggerConfig,
    facade::{ContextualLog, Entry},
    format::{self, Formatter},
    level::{IntoSeverity, Severity},
    record::{FieldPolicy, Record},
    redactor::{DEFAULT_REDACTION_MARKER, Redactor},
    scope::ContextScope,
    sink::Sink,
};

type ContextFn = Arc<dyn Fn() -> ContextValue + Send + Sync>;

/// The root logger: formats entries, redacts them and writes them to a sink.
///
/// # Example
///
/// ```
/// use context_redact_logger::{Context, ContextLogger, ContextualLog, MemorySink, Severity};
///
/// let sink = MemorySink::shared();
/// let logger = ContextLogger::builder()
///     .sink(sink.clone())
///     .level(Severity::Info)
///     .global_context(Context::new().record("service", "api"))
///     .build();
///
/// logger.with_context(&Context::new().record("trace_id", "T1"), || {
///     logger.info_with("request done", Context::new().record("status", 200));
/// });
///
/// let line: serde_json::Value = serde_json::from_str(&sink.lines()[0]).unwrap();
/// assert_eq!(line["service"], "api");
/// assert_eq!(line["trace_id"], "T1");
/// assert_eq!(line["status"], 200);
/// ```
pub struct ContextLogger {
    scope: ContextScope,
    level: AtomicU8,
    progname: RwLock<Option<Arc<str>>>,
    redactor: Redactor,
    formatter: Option<Box<dyn Formatter>>,
    sink: Option<Box<dyn Sink>>,
    field_policy: FieldPolicy,
    context_fns: RwLock<BTreeMap<String, ContextFn>>,
}

impl ContextLogger {
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Creates a logger writing JSON lines to `sink` at debug level.
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink + 'static,
    {
        Self::builder().sink(sink).build()
    }

    /// Creates a logger from deserialized configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured level is unknown or a secret
    /// pattern does not compile. Nothing is built in that case.
    pub fn from_config<S>(config: LoggerConfig, sink: S) -> Result<Self>
    where
        S: Sink + 'static,
    {
        let LoggerConfig {
            level,
            progname,
            global_context,
            redaction_marker,
            field_policy,
            secrets,
            secret_patterns,
        } = config;

        let mut builder = Self::builder()
            .sink(sink)
            .global_context(global_context)
            .field_policy(field_policy)
            .redaction_marker(redaction_marker.as_deref().unwrap_or(DEFAULT_REDACTION_MARKER));
        if let Some(level) = level {
            builder = builder.level(level.into_severity()?);
        }
        if let Some(progname) = progname {
            builder = builder.progname(progname);
        }

        let logger = builder.build();
        for secret in &secrets {
            logger.register_secret(secret)?;
        }
        for pattern in &secret_patterns {
            logger.register_secret_pattern(pattern)?;
        }
        Ok(logger)
    }

    /// Changes the minimum severity that is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLevel`] for unrecognized input; the current
    /// level is kept.
    pub fn set_level(&self, level: impl IntoSeverity) -> Result<()> {
        let level = level.into_severity()?;
        self.level.store(level.rank(), Ordering::Relaxed);
        Ok(())
    }

    pub fn set_progname(&self, progname: Option<&str>) {
        *self.progname.write().unwrap_or_else(PoisonError::into_inner) = progname.map(Arc::from);
    }

    #[must_use]
    pub const fn field_policy(&self) -> FieldPolicy {
        self.field_policy
    }

    /// Registers a function evaluated for every written entry. Its result is
    /// stored under `field` unless the entry's context already has that key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyContextField`] for an empty field name and
    /// [`Error::ContextFnAlreadyDefined`] if `field` already has a function.
    pub fn add_global_context_fn<F>(&self, field: impl Into<String>, context_fn: F) -> Result<()>
    where
        F: Fn() -> ContextValue + Send + Sync + 'static,
    {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(Error::EmptyContextField);
        }

        let mut context_fns = self
            .context_fns
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if context_fns.contains_key(&field) {
            return Err(Error::ContextFnAlreadyDefined { field });
        }
        context_fns.insert(field, Arc::new(context_fn));
        Ok(())
    }

    fn with_context_fns(&self, context: Arc<Context>) -> Arc<Context> {
        let context_fns = self
            .context_fns
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if context_fns.is_empty() {
            return context;
        }

        let evaluated = context_fns
            .iter()
            .filter(|(field, _)| !context.contains_key(field))
            .map(|(field, context_fn)| (field.clone(), context_fn()))
            .collect::<Context>();
        Arc::new(evaluated.deep_merge(&context))
    }
}

impl ContextualLog for ContextLogger {
    fn scope(&self) -> &ContextScope {
        &self.scope
    }

    fn level(&self) -> Severity {
        Severity::from_rank(i64::from(self.level.load(Ordering::Relaxed)))
            .unwrap_or(Severity::Debug)
    }

    fn progname(&self) -> Option<Arc<str>> {
        self.progname
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    fn write_entry(&self, entry: Entry<'_>) {
        let context = self.with_context_fns(entry.context);
        // Custom formatters may re-encode values, so they only see redacted ones.
        let context = match &self.formatter {
            Some(_) => Arc::new(self.redactor.redact_context(&context)),
            None => context,
        };
        let record = Record {
            severity: entry.severity,
            timestamp: entry.timestamp,
            progname: entry.progname,
            message: entry.message,
            context: &context,
            policy: self.field_policy,
        };
        let line = format::render(self.formatter.as_deref(), &record);
        if let Some(sink) = &self.sink {
            sink.write(&self.redactor.redact_str(&line));
        }
    }

    fn flush(&self) {
        if let Some(sink) = &self.sink {
            sink.flush();
        }
    }
}

impl std::fmt::Debug for ContextLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextLogger")
            .field("level", &self.level())
            .field("field_policy", &self.field_policy)
            .finish_non_exhaustive()
    }
}

/// Configures a [`ContextLogger`].
///
/// A builder without a sink produces a logger that accepts every call and
/// writes nothing.
#[must_use]
pub struct Builder {
    level: Severity,
    progname: Option<Arc<str>>,
    global_context: Context,
    formatter: Option<Box<dyn Formatter>>,
    sink: Option<Box<dyn Sink>>,
    redaction_marker: String,
    field_policy: FieldPolicy,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            level: Severity::Debug,
            progname: None,
            global_context: Context::new(),
            formatter: None,
            sink: None,
            redaction_marker: DEFAULT_REDACTION_MARKER.to_owned(),
            field_policy: FieldPolicy::default(),
        }
    }

    pub const fn level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    pub fn progname(mut self, progname: impl Into<Arc<str>>) -> Self {
        self.progname = Some(progname.into());
        self
    }

    /// Sets the context attached to every entry of the new logger.
    pub fn global_context(mut self, context: Context) -> Self {
        self.global_context = context;
        self
    }

    /// Adds one record to the global context.
    pub fn default_record(
        mut self,
        key: impl Into<crate::StaticCowStr>,
        value: impl Into<ContextValue>,
    ) -> Self {
        self.global_context.insert(key, value);
        self
    }

    pub fn formatter<F>(mut self, formatter: F) -> Self
    where
        F: Formatter + 'static,
    {
        self.formatter = Some(Box::new(formatter));
        self
    }

    pub fn sink<S>(mut self, sink: S) -> Self
    where
        S: Sink + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn redaction_marker(mut self, marker: impl Into<String>) -> Self {
        self.redaction_marker = marker.into();
        self
    }

    pub const fn field_policy(mut self, policy: FieldPolicy) -> Self {
        self.field_policy = policy;
        self
    }

    pub fn build(self) -> ContextLogger {
        ContextLogger {
            scope: ContextScope::new("ContextLogger", self.global_context),
            level: AtomicU8::new(self.level.rank()),
            progname: RwLock::new(self.progname),
            redactor: Redactor::with_marker(self.redaction_marker),
            formatter: self.formatter,
            sink: self.sink,
            field_policy: self.field_policy,
            context_fns: RwLock::default(),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("level", &self.level)
            .field("progname", &self.progname)
            .field("global_context", &self.global_context)
            .field("field_policy", &self.field_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::MemorySink;

    fn logger(level: Severity) -> (ContextLogger, Arc<MemorySink>) {
        let sink = MemorySink::shared();
        let logger = ContextLogger::builder()
            .sink(sink.clone())
            .level(level)
            .build();
        (logger, sink)
    }

    fn parsed(sink: &MemorySink) -> Vec<serde_json::Value> {
        sink.lines()
            .iter()
            .map(|line| {
                let mut value: serde_json::Value = serde_json::from_str(line).unwrap();
                value.as_object_mut().unwrap().remove("timestamp");
                value
            })
            .collect()
    }

    #[test]
    fn test_end_to_end_record() {
        let (logger, sink) = logger(Severity::Info);
        logger
            .set_global_context(Context::new().record("service", "api"))
            .unwrap();

        logger.with_context(&Context::new().record("trace_id", "T1"), || {
            assert!(logger.info_with("request done", Context::new().record("status", 200)));
        });

        assert_eq!(
            parsed(&sink),
            vec![json!({
                "message": "request done",
                "severity": "INFO",
                "service": "api",
                "trace_id": "T1",
                "status": 200,
            })]
        );
        assert!(sink.lines()[0].ends_with("}\n"));
    }

    #[test]
    fn test_every_severity_method() {
        let (logger, sink) = logger(Severity::Debug);
        logger.debug("d");
        logger.info("i");
        logger.warn("w");
        logger.error("e");
        logger.fatal("f");
        logger.unknown("u");

        let severities = parsed(&sink)
            .into_iter()
            .map(|line| line["severity"].as_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(severities, ["DEBUG", "INFO", "WARN", "ERROR", "FATAL", "ANY"]);
    }

    #[test]
    fn test_disabled_level_skips_producer() {
        let (logger, sink) = logger(Severity::Info);
        let called = Cell::new(false);

        let result = logger.debug_lazy(None, Context::new(), || {
            called.set(true);
            "expensive".to_owned()
        });

        assert!(result);
        assert!(!called.get());
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_lazy_message_with_progname() {
        let (logger, sink) = logger(Severity::Debug);
        logger.info_lazy(Some("worker"), Context::new().record("job", 7), || {
            "computed".to_owned()
        });

        assert_eq!(
            parsed(&sink),
            vec![json!({
                "message": "computed",
                "severity": "INFO",
                "progname": "worker",
                "job": 7,
            })]
        );
    }

    #[test]
    fn test_add_resolves_message_and_progname() {
        let (logger, sink) = logger(Severity::Debug);
        logger.set_progname(Some("app"));

        logger.add(Some(Severity::Info), Some("explicit"), None, Context::new());
        logger.add(Some(Severity::Info), Some("explicit"), Some("svc"), Context::new());
        logger.add(Some(Severity::Info), None, Some("from progname slot"), Context::new());
        logger.add(None, Some("no severity"), None, Context::new());

        let lines = parsed(&sink);
        assert_eq!(lines[0]["message"], "explicit");
        assert_eq!(lines[0]["progname"], "app");
        assert_eq!(lines[1]["progname"], "svc");
        assert_eq!(lines[2]["message"], "from progname slot");
        assert_eq!(lines[2]["progname"], "app");
        assert_eq!(lines[3]["severity"], "ANY");
    }

    #[test]
    fn test_without_sink_accepts_calls() {
        let logger = ContextLogger::builder().build();
        assert!(logger.info("nowhere"));
        assert!(logger.fatal_with("nowhere", Context::new().record("a", 1)));
    }

    #[test]
    fn test_output_is_redacted() {
        let (logger, sink) = logger(Severity::Debug);
        logger.register_secret("hunter2").unwrap();

        logger.info_with("login with hunter2", Context::new().record("password", "hunter2"));

        let lines = parsed(&sink);
        assert_eq!(lines[0]["message"], "login with <redacted>");
        assert_eq!(lines[0]["password"], "<redacted>");
    }

    #[test]
    fn test_set_level_rejects_invalid_input() {
        let (logger, _sink) = logger(Severity::Warn);
        assert!(logger.set_level("loud").is_err());
        assert_eq!(logger.level(), Severity::Warn);

        logger.set_level("error").unwrap();
        assert_eq!(logger.level(), Severity::Error);
        logger.set_level(1).unwrap();
        assert_eq!(logger.level(), Severity::Info);
    }

    #[test]
    fn test_global_context_locked_after_push() {
        let (logger, _sink) = logger(Severity::Debug);
        logger
            .set_global_context(Context::new().record("service", "api"))
            .unwrap();
        logger.with_context(&Context::new().record("trace_id", "T1"), || {});

        assert!(matches!(
            logger.set_global_context(Context::new().record("service", "web")),
            Err(Error::GlobalContextLocked { .. })
        ));
        assert_eq!(
            *logger.global_context(),
            Context::new().record("service", "api")
        );
    }

    #[test]
    fn test_with_context_restores_after_panic() {
        let (logger, _sink) = logger(Severity::Debug);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            logger.with_context(&Context::new().record("trace_id", "T1"), || {
                panic!("boom");
            });
        }));

        assert!(result.is_err());
        assert!(logger.current_context().is_empty());
    }

    #[test]
    fn test_global_context_fns_fill_missing_keys() {
        let (logger, sink) = logger(Severity::Debug);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        logger
            .add_global_context_fn("sequence", move || {
                ContextValue::from(counter.fetch_add(1, Ordering::SeqCst))
            })
            .unwrap();

        logger.info("first");
        logger.info_with("second", Context::new().record("sequence", "inline"));

        let lines = parsed(&sink);
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], "inline");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_global_context_fn_registration_errors() {
        let (logger, _sink) = logger(Severity::Debug);
        assert!(matches!(
            logger.add_global_context_fn("", ContextValue::null),
            Err(Error::EmptyContextField)
        ));

        logger.add_global_context_fn("host", || "a".into()).unwrap();
        assert!(matches!(
            logger.add_global_context_fn("host", || "b".into()),
            Err(Error::ContextFnAlreadyDefined { .. })
        ));
    }

    #[test]
    fn test_secret_with_json_escapes_never_reaches_sink() {
        let (logger, sink) = logger(Severity::Debug);
        let secret = r#"pa"ss\word"#;
        logger.register_secret(secret).unwrap();

        logger.info_with("login", Context::new().record("password", secret));
        logger.info(&format!("pw is {secret}"));

        let lines = sink.lines();
        assert!(lines.iter().all(|line| !line.contains(r#"pa\"ss\\word"#)));
        let records = parsed(&sink);
        assert_eq!(records[0]["password"], "<redacted>");
        assert_eq!(records[1]["message"], "pw is <redacted>");
    }

    #[test]
    fn test_custom_formatter_sees_redacted_values() {
        let sink = MemorySink::shared();
        let logger = ContextLogger::builder()
            .sink(sink.clone())
            .formatter(
                |_severity: &str,
                 _timestamp: chrono::DateTime<chrono::Utc>,
                 _progname: Option<&str>,
                 record: &Context| {
                    let password = record
                        .get("password")
                        .and_then(ContextValue::as_str)
                        .unwrap_or_default();
                    format!("{}\n", password.to_uppercase())
                },
            )
            .build();
        logger.register_secret("hunter2").unwrap();

        logger.info_with("login", Context::new().record("password", "hunter2"));
        assert_eq!(sink.lines(), vec!["<REDACTED>\n".to_owned()]);
    }

    #[test]
    fn test_default_record_extends_global_context() {
        let sink = MemorySink::shared();
        let logger = ContextLogger::builder()
            .sink(sink.clone())
            .global_context(Context::new().record("service", "api"))
            .default_record("version", "1.0.0")
            .build();

        assert_eq!(
            *logger.global_context(),
            Context::new().record("service", "api").record("version", "1.0.0")
        );
        logger.info("started");
        assert_eq!(parsed(&sink)[0]["version"], "1.0.0");
    }

    #[test]
    fn test_context_overrides_policy() {
        let sink = MemorySink::shared();
        let logger = ContextLogger::builder()
            .sink(sink.clone())
            .field_policy(FieldPolicy::ContextOverrides)
            .build();

        logger.info_with("original", Context::new().record("message", "replaced"));
        assert_eq!(parsed(&sink)[0]["message"], "replaced");
    }
}
