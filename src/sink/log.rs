//! Append-only CSV log of classification records.
//!
//! The log is created with a fixed header before the first write. Every
//! append is flushed and synced before returning, so a crash can lose at
//! most the row being written.

use crate::core::record::{ClassificationRecord, RECORD_HEADER};
use crate::error::SinkError;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Durable, append-only prediction log.
pub struct PredictionLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    appended: u64,
}

impl PredictionLog {
    /// Open the log for appending, creating it with a header if needed.
    ///
    /// A trailing partial row left by an interrupted write is cut off so
    /// new rows start on a clean line.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let io_err = |source| SinkError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let mut existing = Vec::new();
        file.read_to_end(&mut existing).map_err(io_err)?;

        let is_new = existing.is_empty();
        if !is_new && existing.last() != Some(&b'\n') {
            let keep = existing
                .iter()
                .rposition(|&b| b == b'\n')
                .map(|i| i + 1)
                .unwrap_or(0);
            tracing::warn!(
                "Dropping {} bytes of partial row at the end of {:?}",
                existing.len() - keep,
                path
            );
            file.set_len(keep as u64).map_err(io_err)?;
            file.seek(SeekFrom::End(0)).map_err(io_err)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        // Nothing survives truncation when no complete line was written
        let needs_header = is_new || !existing.contains(&b'\n');
        if needs_header {
            writer
                .write_record(RECORD_HEADER)
                .map_err(|source| SinkError::Csv {
                    path: path.clone(),
                    source,
                })?;
            tracing::info!("Created output log {:?}", path);
        }

        let mut log = Self {
            path,
            writer,
            appended: 0,
        };
        log.commit()?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Append one record and make it durable.
    pub fn append(&mut self, record: &ClassificationRecord) -> Result<(), SinkError> {
        let row = record.to_row()?;
        self.writer
            .serialize(&row)
            .map_err(|source| SinkError::Csv {
                path: self.path.clone(),
                source,
            })?;
        self.commit()?;
        self.appended += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        self.writer.flush().map_err(io_err)?;
        self.writer.get_ref().sync_data().map_err(io_err)
    }
}

/// Number of records already in a log file, header excluded.
///
/// A missing file counts as zero.
pub fn count_records(path: &Path) -> Result<u64, SinkError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(SinkError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut count = 0;
    for record in reader.records() {
        record.map_err(|source| SinkError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        count += 1;
    }
    Ok(count)
}
