//! Single-value status file holding the most recent predicted class.
//!
//! The writer replaces the file atomically on every classification; the
//! reader treats an absent or empty file as the baseline class.

use crate::core::classes::BeatClass;
use crate::error::SinkError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Outcome of reading the status value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusRead {
    /// A class id was read
    Value(i64),
    /// The file exists but holds nothing
    Empty,
    /// The file does not exist
    Missing,
    /// The file could not be read or parsed
    Unreadable(String),
}

/// Anything the alert state machine can poll for the current status.
pub trait StatusSource: Send + Sync {
    fn read_status(&self) -> StatusRead;
}

/// Status value persisted as a plain-text integer.
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Publish a class, replacing any previous value.
    pub fn publish(&self, class: BeatClass) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, class.id().to_string()).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl StatusSource for StatusFile {
    fn read_status(&self) -> StatusRead {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_status(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => StatusRead::Missing,
            Err(e) => StatusRead::Unreadable(e.to_string()),
        }
    }
}

/// Parse status text; integral floats such as `"2.0"` are accepted.
fn parse_status(content: &str) -> StatusRead {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return StatusRead::Empty;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return StatusRead::Value(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => StatusRead::Value(value as i64),
        _ => StatusRead::Unreadable(format!("not a class id: {trimmed:?}")),
    }
}
