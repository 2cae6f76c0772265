//! Classification records written to the output log.

use crate::core::classes::BeatClass;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Column names of the output log, in order.
pub const RECORD_HEADER: [&str; 5] = [
    "timestamp",
    "features",
    "predicted_class",
    "class_label",
    "class_probabilities",
];

/// One classified window.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRecord {
    pub timestamp: DateTime<Utc>,
    /// Raw (un-normalized) window samples
    pub window_features: Vec<f64>,
    pub predicted_class: BeatClass,
    pub class_probabilities: Vec<f64>,
}

impl ClassificationRecord {
    /// Build a record from a window and its probability row.
    ///
    /// The predicted class is the argmax of `probabilities`; ties resolve to
    /// the lowest index. Returns `None` for an empty or non-finite row.
    pub fn from_prediction(
        timestamp: DateTime<Utc>,
        window_features: Vec<f64>,
        probabilities: Vec<f64>,
    ) -> Option<Self> {
        let predicted = argmax(&probabilities)?;
        Some(Self {
            timestamp,
            window_features,
            predicted_class: BeatClass::from_id(predicted as i64),
            class_probabilities: probabilities,
        })
    }

    pub fn class_label(&self) -> &'static str {
        self.predicted_class.label()
    }

    /// The serialized row as written to the output log.
    pub fn to_row(&self) -> Result<OutputRow, serde_json::Error> {
        // Keys stay in class-id order (serde_json `preserve_order`)
        let probabilities: serde_json::Map<String, serde_json::Value> = self
            .class_probabilities
            .iter()
            .enumerate()
            .map(|(i, p)| {
                (
                    BeatClass::column_label(i),
                    serde_json::Value::String(format!("{p:.3}")),
                )
            })
            .collect();

        Ok(OutputRow {
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            features: self
                .window_features
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(";"),
            predicted_class: self.predicted_class.id(),
            class_label: self.class_label().to_string(),
            class_probabilities: serde_json::to_string(&probabilities)?,
        })
    }
}

/// A row of the output log, one field per header column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub timestamp: String,
    pub features: String,
    pub predicted_class: i64,
    pub class_label: String,
    pub class_probabilities: String,
}

/// Index of the largest finite value; the first wins on ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            return None;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
