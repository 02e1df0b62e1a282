//! Error types.
//!
//! Every variant describes a usage or configuration mistake. They are
//! returned synchronously from the call that detected them and the failing
//! call never leaves the logger partially updated.

use thiserror::Error;

/// Errors raised while configuring or using a contextual logger.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The value is neither a known severity rank nor a severity name.
    #[error("invalid log level: {input:?}")]
    InvalidLevel { input: String },

    /// The global context can no longer be reassigned because a scoped
    /// override has already been consulted on this logger.
    #[error("global context is locked: {reason}")]
    GlobalContextLocked { reason: String },

    /// A secret pattern could not be compiled.
    #[error("invalid secret pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A schema block declared the same key twice.
    #[error("defining duplicate entry {key} previously as {previous} and now as {requested}")]
    DuplicateDefinition {
        key: String,
        previous: &'static str,
        requested: &'static str,
    },

    /// A global context function was registered with an empty field name.
    #[error("the field cannot be empty")]
    EmptyContextField,

    /// A global context function already exists for this field.
    #[error("a context function for `{field}` is already defined")]
    ContextFnAlreadyDefined { field: String },

    /// A strict schema received a key it does not declare.
    #[error("context key `{key}` is not declared in the schema")]
    UnknownContextKey { key: String },

    /// A context value cannot be coerced to its declared type.
    #[error("context key `{key}` cannot be formatted as {expected}")]
    ContextTypeMismatch { key: String, expected: &'static str },
}

/// A specialized [`Result`](std::result::Result) for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
