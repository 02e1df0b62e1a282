//! Severity levels and their normalization.

use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// Severity of a log entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
    /// Sentinel used when a caller does not supply a severity.
    Unknown = 5,
}

/// Name and rank of every severity, in rank order.
pub(crate) const SEVERITY_TABLE: [(&str, Severity); 6] = [
    ("debug", Severity::Debug),
    ("info", Severity::Info),
    ("warn", Severity::Warn),
    ("error", Severity::Error),
    ("fatal", Severity::Fatal),
    ("unknown", Severity::Unknown),
];

impl Severity {
    /// Returns the upper-case name used in log records, e.g. `"INFO"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
            Self::Unknown => "ANY",
        }
    }

    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Looks a severity up by its numeric rank.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLevel`] if the rank is outside `0..=5`.
    pub fn from_rank(rank: i64) -> Result<Self> {
        usize::try_from(rank)
            .ok()
            .and_then(|index| SEVERITY_TABLE.get(index))
            .map(|(_, severity)| *severity)
            .ok_or_else(|| Error::InvalidLevel {
                input: rank.to_string(),
            })
    }

    /// Normalizes any accepted level representation into a [`Severity`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLevel`] for unrecognized input.
    pub fn normalize(level: impl IntoSeverity) -> Result<Self> {
        level.into_severity()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        SEVERITY_TABLE
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, severity)| *severity)
            .ok_or_else(|| Error::InvalidLevel {
                input: s.to_owned(),
            })
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug | log::Level::Trace => Self::Debug,
        }
    }
}

/// Values accepted wherever a level is configured.
///
/// Implemented for [`Severity`] itself, numeric ranks and case-insensitive
/// level names, so every setter funnels through one validation routine.
pub trait IntoSeverity {
    /// # Errors
    ///
    /// Returns [`Error::InvalidLevel`] when the value names no severity.
    fn into_severity(self) -> Result<Severity>;
}

impl IntoSeverity for Severity {
    fn into_severity(self) -> Result<Severity> {
        Ok(self)
    }
}

impl IntoSeverity for log::Level {
    fn into_severity(self) -> Result<Severity> {
        Ok(self.into())
    }
}

impl IntoSeverity for &str {
    fn into_severity(self) -> Result<Severity> {
        self.parse()
    }
}

impl IntoSeverity for String {
    fn into_severity(self) -> Result<Severity> {
        self.parse()
    }
}

impl IntoSeverity for &String {
    fn into_severity(self) -> Result<Severity> {
        self.parse()
    }
}

macro_rules! impl_into_severity_for_int {
    ($($ty:ty),*) => {
        $(
            impl IntoSeverity for $ty {
                fn into_severity(self) -> Result<Severity> {
                    i64::try_from(self)
                        .map_err(|_| Error::InvalidLevel { input: self.to_string() })
                        .and_then(Severity::from_rank)
                }
            }
        )*
    };
}

impl_into_severity_for_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64);
