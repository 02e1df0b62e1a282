//! Record serialization.

use chrono::{DateTime, Utc};

use crate::{Context, record::Record};

/// Shapes a record into the line handed to the sink.
///
/// `record` holds the message and the effective context fields. Any closure
/// with the same signature is a formatter:
///
/// ```
/// use context_redact_logger::{Context, ContextLogger, ContextualLog, MemorySink};
///
/// let sink = MemorySink::shared();
/// let logger = ContextLogger::builder()
///     .sink(sink.clone())
///     .formatter(|severity: &str, _timestamp: chrono::DateTime<chrono::Utc>, _progname: Option<&str>, record: &Context| {
///         let message = record.get("message").and_then(|m| m.as_str()).unwrap_or_default();
///         format!("{severity} {message}\n")
///     })
///     .build();
///
/// logger.info("hello");
/// assert_eq!(sink.lines(), vec!["INFO hello\n".to_owned()]);
/// ```
pub trait Formatter: Send + Sync {
    fn format(
        &self,
        severity: &str,
        timestamp: DateTime<Utc>,
        progname: Option<&str>,
        record: &Context,
    ) -> String;
}

impl<F> Formatter for F
where
    F: Fn(&str, DateTime<Utc>, Option<&str>, &Context) -> String + Send + Sync,
{
    fn format(
        &self,
        severity: &str,
        timestamp: DateTime<Utc>,
        progname: Option<&str>,
        record: &Context,
    ) -> String {
        self(severity, timestamp, progname, record)
    }
}

/// Renders a record with `formatter` if one is configured, otherwise as a
/// single JSON object terminated by a newline.
pub(crate) fn render(formatter: Option<&dyn Formatter>, record: &Record<'_>) -> String {
    match formatter {
        Some(formatter) => formatter.format(
            record.severity.as_str(),
            record.timestamp,
            record.progname,
            &record.payload(),
        ),
        None => {
            let mut line = serde_json::to_string(record).unwrap_or_else(|err| {
                serde_json::json!({
                    "message": record.message,
                    "severity": record.severity.as_str(),
                    "timestamp": record.timestamp_string(),
                    "context_error": err.to_string(),
                })
                .to_string()
            });
            line.push('\n');
            line
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{FieldPolicy, Severity};

    #[test]
    fn test_default_format_is_json_line() {
        let context = Context::new().record("status", 200);
        let record = Record {
            severity: Severity::Warn,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            progname: Some("worker"),
            message: "slow",
            context: &context,
            policy: FieldPolicy::default(),
        };

        assert_eq!(
            render(None, &record),
            "{\"message\":\"slow\",\"severity\":\"WARN\",\"timestamp\":\"2024-01-02T03:04:05.000000Z\",\"progname\":\"worker\",\"status\":200}\n"
        );
    }

    #[test]
    fn test_custom_formatter_receives_payload() {
        let context = Context::new().record("status", 200);
        let record = Record {
            severity: Severity::Info,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            progname: None,
            message: "done",
            context: &context,
            policy: FieldPolicy::default(),
        };
        let formatter = |severity: &str, _: DateTime<Utc>, progname: Option<&str>, record: &Context| {
            format!(
                "{severity}|{}|{}",
                progname.unwrap_or("-"),
                serde_json::to_string(record).unwrap()
            )
        };

        assert_eq!(
            render(Some(&formatter), &record),
            r#"INFO|-|{"message":"done","status":200}"#
        );
    }
}
