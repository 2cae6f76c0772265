//! Heartbeat class taxonomy.
//!
//! Beats are classified into the five AAMI classes used by the MIT-BIH
//! arrhythmia database. Any class id outside the table maps to
//! [`BeatClass::Unknown`] instead of falling through silently.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A classified heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum BeatClass {
    /// Normal beat (the baseline class)
    Normal,
    /// Supraventricular premature beat
    Supraventricular,
    /// Ventricular premature beat
    Ventricular,
    /// Fusion of ventricular and normal beat
    Fusion,
    /// Unclassifiable beat
    Unclassifiable,
    /// Class id not present in the table
    Unknown(i64),
}

impl BeatClass {
    /// All known classes, in class-id order.
    pub const KNOWN: [BeatClass; 5] = [
        BeatClass::Normal,
        BeatClass::Supraventricular,
        BeatClass::Ventricular,
        BeatClass::Fusion,
        BeatClass::Unclassifiable,
    ];

    /// The baseline class used when no status is available.
    pub const BASELINE: BeatClass = BeatClass::Normal;

    /// Map a class id to a class.
    pub fn from_id(id: i64) -> Self {
        match id {
            0 => BeatClass::Normal,
            1 => BeatClass::Supraventricular,
            2 => BeatClass::Ventricular,
            3 => BeatClass::Fusion,
            4 => BeatClass::Unclassifiable,
            other => BeatClass::Unknown(other),
        }
    }

    /// Numeric class id.
    pub fn id(self) -> i64 {
        match self {
            BeatClass::Normal => 0,
            BeatClass::Supraventricular => 1,
            BeatClass::Ventricular => 2,
            BeatClass::Fusion => 3,
            BeatClass::Unclassifiable => 4,
            BeatClass::Unknown(id) => id,
        }
    }

    /// Short label as written to the output log.
    pub fn label(self) -> &'static str {
        match self {
            BeatClass::Normal => "N",
            BeatClass::Supraventricular => "S",
            BeatClass::Ventricular => "V",
            BeatClass::Fusion => "F",
            BeatClass::Unclassifiable => "Q",
            BeatClass::Unknown(_) => "Unknown",
        }
    }

    /// Human readable description.
    pub fn description(self) -> &'static str {
        match self {
            BeatClass::Normal => "Normal beat",
            BeatClass::Supraventricular => "Supraventricular premature beat",
            BeatClass::Ventricular => "Ventricular premature beat",
            BeatClass::Fusion => "Fusion of ventricular and normal beat",
            BeatClass::Unclassifiable => "Unclassifiable beat",
            BeatClass::Unknown(_) => "Unknown class",
        }
    }

    pub fn is_normal(self) -> bool {
        self == BeatClass::Normal
    }

    /// Label for a probability column index.
    ///
    /// Columns beyond the known table are labelled by their index so that no
    /// probability is dropped from the output log.
    pub fn column_label(index: usize) -> String {
        match BeatClass::from_id(index as i64) {
            BeatClass::Unknown(id) => format!("class_{id}"),
            known => known.label().to_string(),
        }
    }
}

impl From<i64> for BeatClass {
    fn from(id: i64) -> Self {
        BeatClass::from_id(id)
    }
}

impl From<BeatClass> for i64 {
    fn from(class: BeatClass) -> Self {
        class.id()
    }
}

impl fmt::Display for BeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.label())
    }
}
