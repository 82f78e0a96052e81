//! ADC-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, AdcError>;

/// Top-level error type for the deep-clean engine.
///
/// Per-file deletion failures are deliberately absent: they are carried by
/// [`crate::scanner::deletion::DeletionError`] and aggregated into the job
/// summary instead of aborting anything.
#[derive(Debug, Error)]
pub enum AdcError {
    #[error("[ADC-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ADC-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ADC-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ADC-2001] scan of root {root} failed: {details}")]
    Scan { root: PathBuf, details: String },

    #[error("[ADC-2002] scan of root {root} exceeded {limit_ms}ms budget")]
    ScanTimeout { root: PathBuf, limit_ms: u64 },

    #[error("[ADC-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ADC-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[ADC-3001] audit trail write failed at {path}: {details}")]
    AuditWrite { path: PathBuf, details: String },

    #[error("[ADC-3002] audit trail corrupt at line {line}: {details}")]
    AuditCorrupt { line: u64, details: String },

    #[error("[ADC-3101] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ADC-3102] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[ADC-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl AdcError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ADC-1001",
            Self::MissingConfig { .. } => "ADC-1002",
            Self::ConfigParse { .. } => "ADC-1003",
            Self::Scan { .. } => "ADC-2001",
            Self::ScanTimeout { .. } => "ADC-2002",
            Self::Serialization { .. } => "ADC-2101",
            Self::Sql { .. } => "ADC-2102",
            Self::AuditWrite { .. } => "ADC-3001",
            Self::AuditCorrupt { .. } => "ADC-3002",
            Self::Io { .. } => "ADC-3101",
            Self::ChannelClosed { .. } => "ADC-3102",
            Self::Runtime { .. } => "ADC-3900",
        }
    }

    /// Errors that must stop a job immediately: a bad configuration means the
    /// job never starts, and a failed audit write means nothing more may be
    /// deleted without a trail.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::AuditWrite { .. }
        )
    }

    /// Root-scoped scan failures; the job continues with the remaining roots.
    #[must_use]
    pub const fn is_scan_failure(&self) -> bool {
        matches!(self, Self::Scan { .. } | Self::ScanTimeout { .. })
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::ChannelClosed { .. } | Self::Sql { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for audit durability failures.
    #[must_use]
    pub fn audit_write(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::AuditWrite {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for AdcError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for AdcError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for AdcError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
