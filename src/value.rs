use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize, ser::SerializeSeq};

use crate::Context;

/// A single value stored in a [`Context`].
///
/// Values are plain data so that contexts can be deep-merged and redacted.
/// Nested mappings are represented by [`ContextValue::Map`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum ContextValue {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<ContextValue>),
    Map(Context),
}

impl ContextValue {
    #[must_use]
    pub const fn null() -> Self {
        Self::Null
    }

    /// Captures any serializable value as context data.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON data,
    /// e.g. a map with non-string keys.
    pub fn serde<S>(value: S) -> serde_json::Result<Self>
    where
        S: Serialize,
    {
        serde_json::to_value(value).map(Self::from)
    }

    /// Captures the [`Display`](fmt::Display) representation of a value.
    pub fn display<T>(value: T) -> Self
    where
        T: fmt::Display,
    {
        Self::String(value.to_string())
    }

    /// Captures the [`Debug`](fmt::Debug) representation of a value.
    pub fn debug<T>(value: T) -> Self
    where
        T: fmt::Debug,
    {
        Self::String(format!("{value:?}"))
    }

    pub fn error<T>(value: &T) -> Self
    where
        T: std::error::Error + ?Sized,
    {
        Self::String(value.to_string())
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&Context> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the textual form used when matching secrets.
    ///
    /// Strings are borrowed as-is; other scalars use their JSON rendering.
    pub(crate) fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::String(s) => Cow::Borrowed(s),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::Array(_) | Self::Map(_) => {
                Cow::Owned(serde_json::to_string(self).unwrap_or_default())
            }
        }
    }
}

impl Serialize for ContextValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => map.serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<ContextValue> for serde_json::Value {
    fn from(value: ContextValue) -> Self {
        match value {
            ContextValue::Null => Self::Null,
            ContextValue::Bool(b) => Self::Bool(b),
            ContextValue::Number(n) => Self::Number(n),
            ContextValue::String(s) => Self::String(s),
            ContextValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            ContextValue::Map(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key.into_owned(), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Cow<'_, str>> for ContextValue {
    fn from(value: Cow<'_, str>) -> Self {
        Self::String(value.into_owned())
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<f32> for ContextValue {
    fn from(value: f32) -> Self {
        Self::from(f64::from(value))
    }
}

impl From<Context> for ContextValue {
    fn from(value: Context) -> Self {
        Self::Map(value)
    }
}

impl<T> From<Vec<T>> for ContextValue
where
    T: Into<Self>,
{
    fn from(value: Vec<T>) -> Self {
        Self::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Option<T>> for ContextValue
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ContextValue {
                fn from(value: $ty) -> Self {
                    Self::Number(serde_json::Number::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);
