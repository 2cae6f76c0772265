//! Tailing an append-only CSV source.
//!
//! The tailer remembers how many rows it has delivered and, on each read,
//! returns only the rows appended since. A missing, empty, truncated or
//! half-written source is reported as "no new data" and never moves the
//! offset, so the next read retries from the same place.

use crate::source::types::RawRow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Rows appended since the previous read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailBatch {
    pub rows: Vec<RawRow>,
    /// Column count declared by the header line, if the source has one
    pub header_width: Option<usize>,
}

/// Why a read produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoDataReason {
    /// The source does not exist yet
    Missing,
    /// The source exists but holds no complete rows
    Empty,
    /// No rows were appended since the last read
    Unchanged,
    /// The source holds fewer rows than already delivered
    Truncated { rows: u64, offset: u64 },
    /// The source could not be read or parsed right now
    Unreadable(String),
}

/// Result of a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailOutcome {
    Rows(TailBatch),
    NoNewData(NoDataReason),
}

impl TailOutcome {
    pub fn row_count(&self) -> usize {
        match self {
            TailOutcome::Rows(batch) => batch.rows.len(),
            TailOutcome::NoNewData(_) => 0,
        }
    }
}

/// Source conditions worth one log line when first entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Healthy,
    Missing,
    Truncated,
    Unreadable,
}

/// Reads rows appended to a CSV file since the last read.
#[derive(Debug)]
pub struct SourceTailer {
    path: PathBuf,
    has_header: bool,
    offset: u64,
    condition: Condition,
}

impl SourceTailer {
    /// Create a tailer that will deliver rows starting at `start_row`.
    pub fn new(path: impl Into<PathBuf>, has_header: bool, start_row: u64) -> Self {
        Self {
            path: path.into(),
            has_header,
            offset: start_row,
            condition: Condition::Healthy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows already delivered (or skipped via the start row).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Move the offset, e.g. to resume after rows already processed.
    pub fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Return the rows appended since the previous successful read.
    pub fn read_new(&mut self) -> TailOutcome {
        let outcome = self.read_inner();

        let condition = match &outcome {
            TailOutcome::NoNewData(NoDataReason::Missing) => Condition::Missing,
            TailOutcome::NoNewData(NoDataReason::Truncated { .. }) => Condition::Truncated,
            TailOutcome::NoNewData(NoDataReason::Unreadable(_)) => Condition::Unreadable,
            _ => Condition::Healthy,
        };
        if condition != self.condition {
            match &outcome {
                TailOutcome::NoNewData(NoDataReason::Missing) => {
                    tracing::info!("Waiting for input source {:?} to appear", self.path);
                }
                TailOutcome::NoNewData(NoDataReason::Truncated { rows, offset }) => {
                    tracing::warn!(
                        "Input source {:?} shrank to {} rows, below offset {}; waiting for new rows",
                        self.path,
                        rows,
                        offset
                    );
                }
                TailOutcome::NoNewData(NoDataReason::Unreadable(e)) => {
                    tracing::warn!("Input source {:?} unreadable: {}", self.path, e);
                }
                _ => {
                    tracing::info!("Input source {:?} readable", self.path);
                }
            }
            self.condition = condition;
        }

        outcome
    }

    fn read_inner(&mut self) -> TailOutcome {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return TailOutcome::NoNewData(NoDataReason::Missing)
            }
            Err(e) => return TailOutcome::NoNewData(NoDataReason::Unreadable(e.to_string())),
        };

        // A trailing line without a newline is still being written
        let complete = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => &bytes[..=last_newline],
            None => return TailOutcome::NoNewData(NoDataReason::Empty),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .from_reader(complete);

        let header_width = if self.has_header {
            match reader.byte_headers() {
                Ok(headers) => Some(headers.len()),
                Err(e) => return TailOutcome::NoNewData(NoDataReason::Unreadable(e.to_string())),
            }
        } else {
            None
        };

        let mut total: u64 = 0;
        let mut rows = Vec::new();
        // Invalid UTF-8 is decoded lossily so row parsing rejects only that row
        for record in reader.byte_records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => return TailOutcome::NoNewData(NoDataReason::Unreadable(e.to_string())),
            };
            if total >= self.offset {
                rows.push(RawRow::new(
                    total,
                    record
                        .iter()
                        .map(|field| String::from_utf8_lossy(field).into_owned())
                        .collect(),
                ));
            }
            total += 1;
        }

        if total == 0 {
            return TailOutcome::NoNewData(NoDataReason::Empty);
        }
        if total < self.offset {
            return TailOutcome::NoNewData(NoDataReason::Truncated {
                rows: total,
                offset: self.offset,
            });
        }
        if rows.is_empty() {
            return TailOutcome::NoNewData(NoDataReason::Unchanged);
        }

        self.offset = total;
        TailOutcome::Rows(TailBatch { rows, header_width })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_rows(path: &Path, header: bool, range: std::ops::Range<usize>) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        if header {
            writeln!(file, "a,b,label").unwrap();
        }
        for i in range {
            writeln!(file, "{},{},0", i, i * 2).unwrap();
        }
    }

    #[test]
    fn test_reads_only_appended_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_rows(&path, true, 0..100);

        let mut tailer = SourceTailer::new(&path, true, 0);
        assert_eq!(tailer.read_new().row_count(), 100);
        assert_eq!(tailer.offset(), 100);

        write_rows(&path, false, 100..105);
        match tailer.read_new() {
            TailOutcome::Rows(batch) => {
                assert_eq!(batch.rows.len(), 5);
                assert_eq!(batch.header_width, Some(3));
                assert_eq!(batch.rows[0].index, 100);
                assert_eq!(batch.rows[0].fields, vec!["100", "200", "0"]);
                assert_eq!(batch.rows[4].index, 104);
            }
            other => panic!("expected rows, got {other:?}"),
        }
        assert_eq!(tailer.offset(), 105);

        assert_eq!(
            tailer.read_new(),
            TailOutcome::NoNewData(NoDataReason::Unchanged)
        );
        assert_eq!(tailer.offset(), 105);
    }

    #[test]
    fn test_missing_source_keeps_offset() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = SourceTailer::new(dir.path().join("absent.csv"), true, 7);

        assert_eq!(tailer.read_new(), TailOutcome::NoNewData(NoDataReason::Missing));
        assert_eq!(tailer.offset(), 7);
    }

    #[test]
    fn test_empty_and_header_only_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        std::fs::write(&path, "").unwrap();

        let mut tailer = SourceTailer::new(&path, true, 0);
        assert_eq!(tailer.read_new(), TailOutcome::NoNewData(NoDataReason::Empty));

        std::fs::write(&path, "a,b,label\n").unwrap();
        assert_eq!(tailer.read_new(), TailOutcome::NoNewData(NoDataReason::Empty));
        assert_eq!(tailer.offset(), 0);
    }

    #[test]
    fn test_partial_trailing_line_is_deferred() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        std::fs::write(&path, "a,b,label\n1,2,0\n3,4").unwrap();

        let mut tailer = SourceTailer::new(&path, true, 0);
        assert_eq!(tailer.read_new().row_count(), 1);
        assert_eq!(tailer.offset(), 1);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, ",1").unwrap();
        match tailer.read_new() {
            TailOutcome::Rows(batch) => {
                assert_eq!(batch.rows.len(), 1);
                assert_eq!(batch.rows[0].fields, vec!["3", "4", "1"]);
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn test_start_row_skips_earlier_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_rows(&path, false, 0..10);

        let mut tailer = SourceTailer::new(&path, false, 8);
        match tailer.read_new() {
            TailOutcome::Rows(batch) => {
                assert_eq!(batch.header_width, None);
                let indices: Vec<u64> = batch.rows.iter().map(|r| r.index).collect();
                assert_eq!(indices, vec![8, 9]);
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_source_does_not_rewind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_rows(&path, true, 0..5);

        let mut tailer = SourceTailer::new(&path, true, 0);
        assert_eq!(tailer.read_new().row_count(), 5);

        std::fs::remove_file(&path).unwrap();
        write_rows(&path, true, 0..2);
        assert_eq!(
            tailer.read_new(),
            TailOutcome::NoNewData(NoDataReason::Truncated { rows: 2, offset: 5 })
        );
        assert_eq!(tailer.offset(), 5);
    }

    #[test]
    fn test_invalid_utf8_row_does_not_block_later_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        let mut bytes = b"a,b\n1,2\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b',', b'1', b'\n']);
        bytes.extend_from_slice(b"3,4\n");
        std::fs::write(&path, bytes).unwrap();

        let mut tailer = SourceTailer::new(&path, true, 0);
        match tailer.read_new() {
            TailOutcome::Rows(batch) => {
                assert_eq!(batch.rows.len(), 3);
                assert!(batch.rows[1].fields[0].contains('\u{FFFD}'));
                assert_eq!(batch.rows[1].fields[1], "1");
                assert_eq!(batch.rows[2].fields, vec!["3", "4"]);
            }
            other => panic!("expected rows, got {other:?}"),
        }
        assert_eq!(tailer.offset(), 3);
    }

    #[test]
    fn test_unreadable_source_keeps_offset() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be read as a file
        let mut tailer = SourceTailer::new(dir.path(), true, 4);
        assert!(matches!(
            tailer.read_new(),
            TailOutcome::NoNewData(NoDataReason::Unreadable(_))
        ));
        assert_eq!(tailer.offset(), 4);
    }
}
