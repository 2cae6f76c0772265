//! Result sink for classified windows.
//!
//! Every classified window produces exactly one record in the prediction
//! log and overwrites the published status value.

pub mod log;
pub mod status;

use crate::core::classes::BeatClass;
use crate::core::record::ClassificationRecord;
use crate::error::SinkError;

pub use log::{count_records, PredictionLog};
pub use status::{StatusFile, StatusRead, StatusSource};

/// Writes records to the prediction log and publishes the latest class.
pub struct ResultSink {
    log: PredictionLog,
    status: StatusFile,
}

impl ResultSink {
    pub fn new(log: PredictionLog, status: StatusFile) -> Self {
        Self { log, status }
    }

    /// Append a record to the prediction log. Once this returns `Ok` the
    /// record is durable and must not be written again.
    pub fn append(&mut self, record: &ClassificationRecord) -> Result<(), SinkError> {
        self.log.append(record)
    }

    /// Publish a class as the current status.
    pub fn publish(&self, class: BeatClass) -> Result<(), SinkError> {
        self.status.publish(class)
    }

    pub fn log(&self) -> &PredictionLog {
        &self.log
    }

    pub fn status(&self) -> &StatusFile {
        &self.status
    }
}
