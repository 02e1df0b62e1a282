//! The shape of a single log entry.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, ser::SerializeMap};

use crate::{Context, ContextValue, Severity};

/// How collisions between context keys and standard record fields resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// `message`, `severity`, `timestamp` and `progname` always keep the
    /// values the logger computed; colliding context keys are dropped.
    #[default]
    StandardFieldsWin,
    /// Context keys replace the standard fields they collide with.
    ContextOverrides,
}

/// A log entry ready to be formatted.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub progname: Option<&'a str>,
    pub message: &'a str,
    pub context: &'a Context,
    pub policy: FieldPolicy,
}

impl Record<'_> {
    #[must_use]
    pub fn timestamp_string(&self) -> String {
        format_timestamp(self.timestamp)
    }

    /// The message together with the context fields, as handed to custom
    /// formatters.
    #[must_use]
    pub fn payload(&self) -> Context {
        let mut payload = self.context.clone();
        if self.keeps_standard("message") {
            payload.insert("message", self.message);
        }
        payload
    }

    fn keeps_standard(&self, field: &str) -> bool {
        self.policy == FieldPolicy::StandardFieldsWin || !self.context.contains_key(field)
    }

    fn is_shadowed(&self, key: &str) -> bool {
        self.policy == FieldPolicy::StandardFieldsWin
            && match key {
                "message" | "severity" | "timestamp" => true,
                "progname" => self.progname.is_some(),
                _ => false,
            }
    }
}

impl Serialize for Record<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if self.keeps_standard("message") {
            map.serialize_entry("message", self.message)?;
        }
        if self.keeps_standard("severity") {
            map.serialize_entry("severity", self.severity.as_str())?;
        }
        if self.keeps_standard("timestamp") {
            map.serialize_entry("timestamp", &self.timestamp_string())?;
        }
        if let Some(progname) = self.progname {
            if self.keeps_standard("progname") {
                map.serialize_entry("progname", progname)?;
            }
        }
        for (key, value) in self.context {
            if !self.is_shadowed(key) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl From<DateTime<Utc>> for ContextValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::String(format_timestamp(value))
    }
}
