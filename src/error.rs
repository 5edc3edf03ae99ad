/// Error types for the ambient layers (configuration, ingest, worker pool).
///
/// The analytics engines themselves never fail; they degrade to
/// low-information results instead.

use std::path::PathBuf;

/// Configuration and engine setup errors.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Failed to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("UTC offset of {0} minutes is outside +/-24h")]
    InvalidUtcOffset(i32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Analytics worker failed: {0}")]
    WorkerFailed(String),

    #[error("Analytics run was cancelled")]
    Cancelled,

    #[error("Report was already taken from this handle")]
    ReportTaken,
}

/// Errors produced while turning an open-data payload into `BridgeEvent`s.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No data available: {0}")]
    NoDataAvailable(String),
}
