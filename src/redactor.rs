//! Secret redaction.
//!
//! All registered secrets are compiled into a single alternation so a scan
//! costs one pass over the text no matter how many secrets are known.

use std::{
    borrow::Cow,
    sync::{Arc, PoisonError, RwLock},
};

use regex::Regex;

use crate::{Context, ContextValue, Result};

/// Marker substituted for every redacted span unless configured otherwise.
pub const DEFAULT_REDACTION_MARKER: &str = "<redacted>";

#[derive(Debug, Default)]
struct RedactionSet {
    patterns: Vec<String>,
    matcher: Option<Arc<Regex>>,
}

/// Scrubs registered secrets from log output.
///
/// Registration is rare and takes an exclusive lock; every log call only
/// clones the compiled matcher out of a read lock.
#[derive(Debug)]
pub struct Redactor {
    set: RwLock<RedactionSet>,
    marker: String,
}

impl Redactor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_marker(DEFAULT_REDACTION_MARKER)
    }

    #[must_use]
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            set: RwLock::default(),
            marker: marker.into(),
        }
    }

    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Registers a literal secret. Returns `false` if it was already known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`](crate::Error::InvalidPattern) if the
    /// combined matcher exceeds the regex size limit.
    pub fn register_secret(&self, secret: &str) -> Result<bool> {
        let mut patterns = vec![regex::escape(secret)];
        // Serialized records carry the JSON-escaped form of the secret.
        if let Some(escaped) = json_escaped(secret) {
            patterns.push(regex::escape(&escaped));
        }
        self.register(patterns)
    }

    /// Registers a regular expression matching secrets, such as
    /// `password=\S+`. Returns `false` if it was already known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`](crate::Error::InvalidPattern) if the
    /// pattern does not compile. The set is left unchanged in that case.
    pub fn register_secret_pattern(&self, pattern: &str) -> Result<bool> {
        Regex::new(pattern)?;
        self.register(vec![pattern.to_owned()])
    }

    fn register(&self, mut patterns: Vec<String>) -> Result<bool> {
        let mut set = self.set.write().unwrap_or_else(PoisonError::into_inner);
        patterns.retain(|pattern| !set.patterns.contains(pattern));
        patterns.dedup();
        if patterns.is_empty() {
            return Ok(false);
        }

        let combined = set
            .patterns
            .iter()
            .chain(&patterns)
            .map(|pattern| format!("(?:{pattern})"))
            .collect::<Vec<_>>()
            .join("|");
        let matcher = Regex::new(&combined)?;

        set.patterns.extend(patterns);
        set.matcher = Some(Arc::new(matcher));
        Ok(true)
    }

    /// Returns the registered patterns in registration order.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.set
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .patterns
            .clone()
    }

    fn matcher(&self) -> Option<Arc<Regex>> {
        self.set
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .matcher
            .clone()
    }

    /// Replaces every secret in `text` with the marker.
    ///
    /// Borrows the input when nothing is registered or nothing matches.
    pub fn redact_str<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self.matcher() {
            Some(matcher) => Self::replace(&matcher, text, &self.marker),
            None => Cow::Borrowed(text),
        }
    }

    /// Redacts every leaf of a value.
    ///
    /// Maps and arrays keep their shape, booleans and nulls pass through, and
    /// every other scalar is returned as its redacted string form.
    #[must_use]
    pub fn redact(&self, value: &ContextValue) -> ContextValue {
        match self.matcher() {
            Some(matcher) => Self::redact_value(&matcher, value, &self.marker),
            None => value.clone(),
        }
    }

    /// Redacts every value of a context, keeping its keys.
    #[must_use]
    pub fn redact_context(&self, context: &Context) -> Context {
        match self.matcher() {
            Some(matcher) => Self::redact_map(&matcher, context, &self.marker),
            None => context.clone(),
        }
    }

    fn redact_value(matcher: &Regex, value: &ContextValue, marker: &str) -> ContextValue {
        match value {
            ContextValue::Map(map) => ContextValue::Map(Self::redact_map(matcher, map, marker)),
            ContextValue::Array(items) => ContextValue::Array(
                items
                    .iter()
                    .map(|item| Self::redact_value(matcher, item, marker))
                    .collect(),
            ),
            ContextValue::Bool(_) | ContextValue::Null => value.clone(),
            scalar => ContextValue::String(
                Self::replace(matcher, &scalar.to_text(), marker).into_owned(),
            ),
        }
    }

    fn redact_map(matcher: &Regex, map: &Context, marker: &str) -> Context {
        map.iter()
            .map(|(key, value)| (key.clone(), Self::redact_value(matcher, value, marker)))
            .collect()
    }

    fn replace<'a>(matcher: &Regex, text: &'a str, marker: &str) -> Cow<'a, str> {
        matcher.replace_all(text, regex::NoExpand(marker))
    }
}

/// The body of `text` as a JSON string literal, if escaping changes it.
fn json_escaped(text: &str) -> Option<String> {
    let literal = serde_json::to_string(text).ok()?;
    let escaped = literal.strip_prefix('"')?.strip_suffix('"')?;
    (escaped != text).then(|| escaped.to_owned())
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}
