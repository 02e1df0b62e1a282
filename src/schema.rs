//! Declared context shapes.
//!
//! A schema lists the context keys an application expects together with
//! their types, and coerces contexts into that shape before they are
//! pushed or logged.

use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, SecondsFormat};

use crate::{Context, ContextValue, Error, Result};

type FormatFn = Arc<dyn Fn(&ContextValue) -> Option<ContextValue> + Send + Sync>;

/// The type declared for a context key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Boolean,
    Number,
    Date,
    Map,
}

impl FieldKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Date => "date",
            Self::Map => "map",
        }
    }

    fn format(self, value: &ContextValue) -> Option<ContextValue> {
        match self {
            Self::String => Some(match value {
                ContextValue::String(_) => value.clone(),
                other => ContextValue::String(other.to_text().into_owned()),
            }),
            // Only null and false are falsy.
            Self::Boolean => Some(ContextValue::Bool(!matches!(
                value,
                ContextValue::Null | ContextValue::Bool(false)
            ))),
            Self::Number => format_number(value),
            Self::Date => format_date(value),
            Self::Map => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn format_number(value: &ContextValue) -> Option<ContextValue> {
    match value {
        ContextValue::Number(number) => number
            .as_i64()
            .map(ContextValue::from)
            .or_else(|| number.as_u64().map(ContextValue::from))
            .or_else(|| number.as_f64().and_then(truncate)),
        ContextValue::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .map(ContextValue::from)
                .or_else(|| text.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(value: f64) -> Option<ContextValue> {
    let truncated = value.trunc();
    (truncated.is_finite() && truncated.abs() < 9.0e18).then(|| ContextValue::from(truncated as i64))
}

fn format_date(value: &ContextValue) -> Option<ContextValue> {
    let timestamp = match value {
        ContextValue::String(text) => DateTime::parse_from_rfc3339(text.trim()).ok()?,
        ContextValue::Number(number) => {
            DateTime::from_timestamp(number.as_i64()?, 0)?.fixed_offset()
        }
        _ => return None,
    };
    Some(ContextValue::String(
        timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
    ))
}

#[derive(Clone)]
struct FieldSpec {
    kind: FieldKind,
    formatter: Option<FormatFn>,
    fields: Option<ContextSchema>,
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("kind", &self.kind)
            .field("custom_formatter", &self.formatter.is_some())
            .field("fields", &self.fields)
            .finish()
    }
}

/// A declared set of typed context keys.
///
/// ```
/// use context_redact_logger::{Context, ContextSchema, ContextValue};
///
/// let schema = ContextSchema::builder()
///     .string("request_id")?
///     .number("attempt")?
///     .map("user", |user| user.string("name")?.boolean("admin"))?
///     .build();
///
/// let context = schema.conform(&Context::new().record("attempt", "3"))?;
/// assert_eq!(context.get("attempt"), Some(&ContextValue::from(3)));
/// # Ok::<(), context_redact_logger::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContextSchema {
    strict: bool,
    fields: BTreeMap<String, FieldSpec>,
}

impl ContextSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Whether undeclared keys are rejected.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// The declared shape, e.g. `{"attempt": {"type": "number", "custom_formatter": false}}`.
    #[must_use]
    pub fn shape(&self) -> Context {
        self.fields
            .iter()
            .map(|(key, declared)| {
                let mut shape = Context::new()
                    .record("type", declared.kind.as_str())
                    .record("custom_formatter", declared.formatter.is_some());
                if let Some(fields) = &declared.fields {
                    shape.insert("fields", fields.shape());
                }
                (key.clone(), shape)
            })
            .collect()
    }

    /// Coerces every declared key of `context` into its declared type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownContextKey`] for undeclared keys of a strict
    /// schema and [`Error::ContextTypeMismatch`] for values that cannot be
    /// coerced. Nested keys are reported as dotted paths.
    pub fn conform(&self, context: &Context) -> Result<Context> {
        self.conform_at("", context)
    }

    fn conform_at(&self, prefix: &str, context: &Context) -> Result<Context> {
        let mut conformed = Context::new();
        for (key, value) in context {
            let path = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{prefix}.{key}")
            };

            let Some(declared) = self.fields.get(&**key) else {
                if self.strict {
                    return Err(Error::UnknownContextKey { key: path });
                }
                conformed.insert(key.clone(), value.clone());
                continue;
            };

            let formatted = match (&declared.fields, value) {
                (Some(fields), ContextValue::Map(nested)) => {
                    Some(ContextValue::Map(fields.conform_at(&path, nested)?))
                }
                (Some(_), _) => None,
                (None, value) => declared
                    .formatter
                    .as_ref()
                    .map_or_else(|| declared.kind.format(value), |format| format(value)),
            };
            let formatted = formatted.ok_or(Error::ContextTypeMismatch {
                key: path,
                expected: declared.kind.as_str(),
            })?;
            conformed.insert(key.clone(), formatted);
        }
        Ok(conformed)
    }
}

/// Declares the keys of a [`ContextSchema`].
///
/// Every declaration fails with [`Error::DuplicateDefinition`] if the key was
/// already declared in the same block.
#[derive(Debug)]
#[must_use]
pub struct SchemaBuilder {
    schema: ContextSchema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: ContextSchema {
                strict: true,
                fields: BTreeMap::new(),
            },
        }
    }

    /// Sets whether undeclared keys are rejected. Schemas are strict by default.
    pub const fn strict(mut self, strict: bool) -> Self {
        self.schema.strict = strict;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if `key` is already declared.
    pub fn string(self, key: impl Into<String>) -> Result<Self> {
        self.declare(key.into(), FieldKind::String, None, None)
    }

    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if `key` is already declared.
    pub fn boolean(self, key: impl Into<String>) -> Result<Self> {
        self.declare(key.into(), FieldKind::Boolean, None, None)
    }

    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if `key` is already declared.
    pub fn number(self, key: impl Into<String>) -> Result<Self> {
        self.declare(key.into(), FieldKind::Number, None, None)
    }

    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if `key` is already declared.
    pub fn date(self, key: impl Into<String>) -> Result<Self> {
        self.declare(key.into(), FieldKind::Date, None, None)
    }

    /// Declares a key with a custom formatter. The formatter returns `None`
    /// for values it cannot format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if `key` is already declared.
    pub fn formatted<F>(self, key: impl Into<String>, kind: FieldKind, formatter: F) -> Result<Self>
    where
        F: Fn(&ContextValue) -> Option<ContextValue> + Send + Sync + 'static,
    {
        self.declare(key.into(), kind, Some(Arc::new(formatter)), None)
    }

    /// Declares a nested map whose keys are declared by `define`.
    ///
    /// The nested block inherits this builder's strictness.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDefinition`] if `key` is already declared,
    /// or any error returned by `define`.
    pub fn map<F>(self, key: impl Into<String>, define: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        let nested = define(Self::new().strict(self.schema.strict))?.build();
        self.declare(key.into(), FieldKind::Map, None, Some(nested))
    }

    fn declare(
        mut self,
        key: String,
        kind: FieldKind,
        formatter: Option<FormatFn>,
        fields: Option<ContextSchema>,
    ) -> Result<Self> {
        if let Some(previous) = self.schema.fields.get(&key) {
            return Err(Error::DuplicateDefinition {
                key,
                previous: previous.kind.as_str(),
                requested: kind.as_str(),
            });
        }
        self.schema.fields.insert(
            key,
            FieldSpec {
                kind,
                formatter,
                fields,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> ContextSchema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_schema_is_strict_by_default() {
        assert!(ContextSchema::builder().build().is_strict());
        assert!(!ContextSchema::builder().strict(false).build().is_strict());
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let err = ContextSchema::builder()
            .string("test_context")
            .unwrap()
            .number("test_context")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "defining duplicate entry test_context previously as string and now as number"
        );

        assert!(matches!(
            ContextSchema::builder().map("nested", |nested| nested.date("at")?.date("at")),
            Err(Error::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn test_shape() {
        let schema = ContextSchema::builder()
            .number("attempt")
            .unwrap()
            .map("user", |user| user.string("name"))
            .unwrap()
            .build();

        let expected = Context::new()
            .record(
                "attempt",
                Context::new()
                    .record("type", "number")
                    .record("custom_formatter", false),
            )
            .record(
                "user",
                Context::new()
                    .record("type", "map")
                    .record("custom_formatter", false)
                    .record(
                        "fields",
                        Context::new().record(
                            "name",
                            Context::new()
                                .record("type", "string")
                                .record("custom_formatter", false),
                        ),
                    ),
            );
        assert_eq!(schema.shape(), expected);
    }

    #[test]
    fn test_conform_coerces_declared_types() {
        let schema = ContextSchema::builder()
            .string("id")
            .unwrap()
            .boolean("admin")
            .unwrap()
            .number("attempt")
            .unwrap()
            .date("at")
            .unwrap()
            .build();

        let context = Context::new()
            .record("id", 17)
            .record("admin", "no")
            .record("attempt", 2.9)
            .record("at", "2024-03-01T10:00:00+00:00");
        let expected = Context::new()
            .record("id", "17")
            .record("admin", true)
            .record("attempt", 2)
            .record("at", "2024-03-01T10:00:00.000000Z");
        assert_eq!(schema.conform(&context).unwrap(), expected);
    }

    #[test]
    fn test_strict_schema_rejects_unknown_nested_key() {
        let schema = ContextSchema::builder()
            .map("user", |user| user.string("name"))
            .unwrap()
            .build();

        let context = Context::new().record("user", Context::new().record("email", "a@b.c"));
        let err = schema.conform(&context).unwrap_err();
        assert!(matches!(err, Error::UnknownContextKey { ref key } if key == "user.email"));
    }

    #[test]
    fn test_lenient_schema_passes_unknown_keys() {
        let schema = ContextSchema::builder().strict(false).number("n").unwrap().build();
        let context = Context::new().record("n", "5").record("extra", "kept");
        assert_eq!(
            schema.conform(&context).unwrap(),
            Context::new().record("n", 5).record("extra", "kept")
        );
    }

    #[test]
    fn test_type_mismatch() {
        let schema = ContextSchema::builder().number("n").unwrap().build();
        assert!(matches!(
            schema.conform(&Context::new().record("n", "many")),
            Err(Error::ContextTypeMismatch { expected: "number", .. })
        ));
    }

    #[test]
    fn test_custom_formatter() {
        let schema = ContextSchema::builder()
            .formatted("name", FieldKind::String, |value| {
                value.as_str().map(|name| name.to_uppercase().into())
            })
            .unwrap()
            .build();
        assert_eq!(
            schema.conform(&Context::new().record("name", "ada")).unwrap(),
            Context::new().record("name", "ADA")
        );
    }
}
