//! # Overview
//!
#![doc = include_utils::include_md!("README.md:description")]
//!
//! Services often need the same identifiers on every log line of a request
//! or job, and must never leak the secrets they handle. This library:
//!
//! - Keeps a global context and a scoped context per logger instance.
//! - Deep-merges nested scopes and inline per-call context.
//! - Wraps loggers with a fixed context and an optional level of their own.
//! - Redacts registered secrets from every rendered line.
//! - Propagates scoped context across `.await` points.
//!
//! Scoped context lives in thread-local storage keyed by logger instance, so
//! two threads (or two loggers) never observe each other's scopes.
//!
//! ## Basic example
//!
#![doc = include_utils::include_md!("README.md:basic_example")]
//!
//! ## Wrapping loggers
//!
#![doc = include_utils::include_md!("README.md:wrapper_example")]
//!
//! ## Async Context Propagation
//!
#![doc = include_utils::include_md!("README.md:async_example")]
//!
//! Records of the [`log`] crate can be routed through any contextual logger
//! with [`LogBridge`].

use std::borrow::Cow;

pub use self::{
    bridge::LogBridge,
    config::{LevelSetting, LoggerConfig},
    context::Context,
    error::{Error, Result},
    facade::{ContextualLog, Entry},
    format::Formatter,
    future::FutureExt,
    guard::ContextGuard,
    level::{IntoSeverity, Severity},
    logger::{Builder, ContextLogger},
    record::{FieldPolicy, Record},
    redactor::{DEFAULT_REDACTION_MARKER, Redactor},
    schema::{ContextSchema, FieldKind, SchemaBuilder},
    scope::ContextScope,
    sink::{MemorySink, Sink, WriterSink},
    value::ContextValue,
    wrapper::{LoggerWithContext, MERGE_CACHE_CAPACITY},
};

mod bridge;
mod config;
mod context;
mod error;
mod facade;
mod format;
pub mod future;
pub mod guard;
mod level;
mod logger;
mod record;
mod redactor;
mod schema;
mod scope;
mod sink;
mod store;
mod value;
mod wrapper;

type StaticCowStr = Cow<'static, str>;
