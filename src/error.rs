//! Error types shared across the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// A startup artifact (scaler or model) is missing, unreadable or
/// inconsistent with the configured window length.
///
/// These errors are fatal: the writer loop refuses to start rather than
/// emit predictions from a mismatched configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{what} has length {actual}, expected {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("{what} contains a non-finite value at index {index}")]
    NonFinite { what: String, index: usize },

    #[error("invalid model: {0}")]
    InvalidModel(String),
}

/// A single input row could not be turned into samples.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("row has {actual} columns, expected {expected}")]
    ColumnCount { expected: usize, actual: usize },

    #[error("non-numeric value {value:?} in column {column}")]
    NonNumeric { column: usize, value: String },

    #[error("row is empty")]
    Empty,
}

/// Inference failed for a batch.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("expected input width {expected}, got {actual}")]
    InputWidth { expected: usize, actual: usize },

    #[error("inference network error: {0}")]
    Network(String),

    #[error("inference server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("malformed inference response: {0}")]
    Response(String),
}

/// Writing to the output log or status file failed.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("output CSV error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A writer-loop iteration failed.
///
/// The loop logs these and carries on after the poll delay.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// The writer loop could not be assembled.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
