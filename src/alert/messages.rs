//! Alert messages keyed by beat class.

use crate::core::classes::BeatClass;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Caution,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Caution => "caution",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// A user-facing alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl AlertMessage {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Immutable class → alert lookup.
///
/// The baseline class has no entry by default, so returning to normal
/// rhythm is silent.
#[derive(Debug, Clone)]
pub struct AlertTable {
    entries: HashMap<BeatClass, AlertMessage>,
}

impl AlertTable {
    /// Build a table from explicit entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (BeatClass, AlertMessage)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Alert for a class, if it has one.
    pub fn get(&self, class: BeatClass) -> Option<&AlertMessage> {
        self.entries.get(&class)
    }

    /// Entries sorted by class id.
    pub fn entries(&self) -> Vec<(BeatClass, &AlertMessage)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(c, m)| (*c, m)).collect();
        entries.sort_by_key(|(class, _)| class.id());
        entries
    }
}

impl Default for AlertTable {
    fn default() -> Self {
        Self::from_entries([
            (
                BeatClass::Supraventricular,
                AlertMessage::new(
                    "Irregular heartbeat",
                    "A supraventricular premature beat was detected. Sit down and rest if you feel palpitations or dizziness.",
                    Severity::Caution,
                ),
            ),
            (
                BeatClass::Ventricular,
                AlertMessage::new(
                    "Ventricular premature beat",
                    "A ventricular premature beat was detected. Seek medical attention if it repeats or you feel chest pain.",
                    Severity::Critical,
                ),
            ),
            (
                BeatClass::Fusion,
                AlertMessage::new(
                    "Fusion beat",
                    "A fusion of ventricular and normal beats was detected. Keep monitoring and rest if you feel unwell.",
                    Severity::Caution,
                ),
            ),
            (
                BeatClass::Unclassifiable,
                AlertMessage::new(
                    "Unclassifiable heartbeat",
                    "A heartbeat could not be classified. Check that the sensor electrodes are attached properly.",
                    Severity::Caution,
                ),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Caution);
        assert!(Severity::Caution < Severity::Critical);
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn test_default_table() {
        let table = AlertTable::default();
        assert!(table.get(BeatClass::Normal).is_none());
        assert!(table.get(BeatClass::Unknown(42)).is_none());
        assert_eq!(
            table.get(BeatClass::Ventricular).map(|m| m.severity),
            Some(Severity::Critical)
        );
        for class in &BeatClass::KNOWN[1..] {
            assert!(table.get(*class).is_some(), "missing alert for {class}");
        }

        let ids: Vec<i64> = table.entries().iter().map(|(c, _)| c.id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
