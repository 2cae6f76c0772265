//! Row types for the tabular input source.
//!
//! Each row carries sample columns followed by an optional trailing label
//! column. Leading columns (such as a capture timestamp) can be skipped.

use crate::error::RowError;
use serde::{Deserialize, Serialize};

/// A raw row exactly as read from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Zero-based row index in the source, header excluded
    pub index: u64,
    /// Unparsed fields
    pub fields: Vec<String>,
}

impl RawRow {
    pub fn new(index: u64, fields: Vec<String>) -> Self {
        Self { index, fields }
    }
}

/// Column layout of the input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowSchema {
    /// Number of leading columns to ignore
    pub leading_columns: usize,
    /// Whether the last column is a ground-truth class label
    pub has_label: bool,
}

impl Default for RowSchema {
    fn default() -> Self {
        Self {
            leading_columns: 0,
            has_label: true,
        }
    }
}

/// Samples and optional label parsed from a row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub index: u64,
    pub samples: Vec<f64>,
    pub label: Option<i64>,
}

impl RowSchema {
    /// Parse a row into samples and label.
    ///
    /// Every sample column must be numeric. A label that is not an integral
    /// number is dropped rather than failing the row.
    pub fn parse(&self, row: &RawRow) -> Result<ParsedRow, RowError> {
        let fields = row.fields.get(self.leading_columns..).unwrap_or(&[]);
        if fields.is_empty() {
            return Err(RowError::Empty);
        }

        let (sample_fields, label) = match (self.has_label, fields.split_last()) {
            (true, Some((last, rest))) => (rest, parse_label(last)),
            _ => (fields, None),
        };

        let samples = sample_fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let trimmed = field.trim();
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| RowError::NonNumeric {
                        column: self.leading_columns + i,
                        value: trimmed.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ParsedRow {
            index: row.index,
            samples,
            label,
        })
    }

    /// Check a row against the width declared by the source header.
    pub fn check_width(&self, row: &RawRow, expected: Option<usize>) -> Result<(), RowError> {
        match expected {
            Some(expected) if row.fields.len() != expected => Err(RowError::ColumnCount {
                expected,
                actual: row.fields.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// Labels are written as integers or integral floats ("2" or "2.0").
fn parse_label(field: &str) -> Option<i64> {
    let value: f64 = field.trim().parse().ok()?;
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> RawRow {
        RawRow::new(3, fields.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_with_label() {
        let parsed = RowSchema::default().parse(&row(&["0.1", "0.2", " 0.3", "2.0"])).unwrap();
        assert_eq!(parsed.index, 3);
        assert_eq!(parsed.samples, vec![0.1, 0.2, 0.3]);
        assert_eq!(parsed.label, Some(2));
    }

    #[test]
    fn test_parse_without_label() {
        let schema = RowSchema {
            leading_columns: 1,
            has_label: false,
        };
        let parsed = schema.parse(&row(&["1700000000000", "512", "498"])).unwrap();
        assert_eq!(parsed.samples, vec![512.0, 498.0]);
        assert_eq!(parsed.label, None);
    }

    #[test]
    fn test_non_integral_label_dropped() {
        let parsed = RowSchema::default().parse(&row(&["1", "2", "x"])).unwrap();
        assert_eq!(parsed.samples, vec![1.0, 2.0]);
        assert_eq!(parsed.label, None);

        let parsed = RowSchema::default().parse(&row(&["1", "2", "0.5"])).unwrap();
        assert_eq!(parsed.label, None);
    }

    #[test]
    fn test_non_numeric_sample_rejected() {
        let err = RowSchema::default().parse(&row(&["1", "", "0"])).unwrap_err();
        assert_eq!(
            err,
            RowError::NonNumeric {
                column: 1,
                value: String::new()
            }
        );

        let err = RowSchema::default().parse(&row(&["nan", "1", "0"])).unwrap_err();
        assert!(matches!(err, RowError::NonNumeric { column: 0, .. }));
    }

    #[test]
    fn test_empty_row_rejected() {
        let schema = RowSchema {
            leading_columns: 2,
            has_label: false,
        };
        assert_eq!(schema.parse(&row(&["a", "b"])).unwrap_err(), RowError::Empty);
    }

    #[test]
    fn test_width_check() {
        let schema = RowSchema::default();
        assert!(schema.check_width(&row(&["1", "2"]), Some(2)).is_ok());
        assert!(schema.check_width(&row(&["1", "2"]), None).is_ok());
        assert_eq!(
            schema.check_width(&row(&["1"]), Some(2)).unwrap_err(),
            RowError::ColumnCount {
                expected: 2,
                actual: 1
            }
        );
    }
}
