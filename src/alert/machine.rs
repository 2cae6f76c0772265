//! Transition-triggered alerting over the published status value.
//!
//! Each poll reads the current status (or an installed forced override) and
//! emits an alert only when the value differs from the previous poll. The
//! first poll has no previous value, so a non-baseline value with an alert
//! message fires immediately.

use crate::alert::messages::{AlertMessage, AlertTable};
use crate::core::classes::BeatClass;
use crate::sink::status::{StatusRead, StatusSource};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Result of one status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Current class id
    pub value: i64,
    /// Alert for a changed value, if the new value has one
    pub new_alert: Option<AlertMessage>,
    /// Whether the value came from a forced override
    pub forced: bool,
}

/// Confirmation of an installed override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedOverride {
    pub value: i64,
    pub rows: u32,
}

/// How the last real status read went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadCondition {
    Healthy,
    Missing,
    Unreadable,
}

/// State carried between polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub last_published_value: Option<i64>,
    pub forced_value: Option<i64>,
    pub forced_remaining_polls: u32,
    pub read_condition: ReadCondition,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            last_published_value: None,
            forced_value: None,
            forced_remaining_polls: 0,
            read_condition: ReadCondition::Healthy,
        }
    }
}

/// Polls a status source and debounces alerts to value transitions.
///
/// All state lives behind one mutex so concurrent polls and override
/// installs are serialized; a poll never fails.
pub struct AlertStateMachine {
    source: Box<dyn StatusSource>,
    table: AlertTable,
    state: Mutex<AlertState>,
}

impl AlertStateMachine {
    pub fn new(source: impl StatusSource + 'static, table: AlertTable) -> Self {
        Self {
            source: Box::new(source),
            table,
            state: Mutex::new(AlertState::default()),
        }
    }

    pub fn table(&self) -> &AlertTable {
        &self.table
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AlertState {
        self.lock().clone()
    }

    /// Read the current value and report an alert if it changed.
    pub fn poll(&self) -> StatusReport {
        let mut state = self.lock();

        let forced_value = state
            .forced_value
            .filter(|_| state.forced_remaining_polls > 0);
        let (value, forced) = match forced_value {
            Some(value) => {
                state.forced_remaining_polls -= 1;
                if state.forced_remaining_polls == 0 {
                    state.forced_value = None;
                    tracing::info!("Forced status override finished");
                }
                (value, true)
            }
            None => (self.read_value(&mut state), false),
        };

        let new_alert = if state.last_published_value != Some(value) {
            let alert = self.table.get(BeatClass::from_id(value)).cloned();
            match &alert {
                Some(alert) => tracing::warn!(
                    "Status changed {:?} -> {}: {} [{}]",
                    state.last_published_value,
                    value,
                    alert.title,
                    alert.severity
                ),
                None => tracing::info!(
                    "Status changed {:?} -> {}",
                    state.last_published_value,
                    value
                ),
            }
            alert
        } else {
            None
        };
        state.last_published_value = Some(value);

        StatusReport {
            value,
            new_alert,
            forced,
        }
    }

    /// Make the next `rows` polls report `value`; zero rows clears any override.
    pub fn force(&self, value: i64, rows: u32) -> ForcedOverride {
        let mut state = self.lock();
        if rows == 0 {
            state.forced_value = None;
            state.forced_remaining_polls = 0;
            tracing::info!("Forced status override cleared");
        } else {
            state.forced_value = Some(value);
            state.forced_remaining_polls = rows;
            tracing::info!("Forcing status {} for the next {} polls", value, rows);
        }
        ForcedOverride { value, rows }
    }

    /// Read the real status, degrading to the baseline class on failure.
    fn read_value(&self, state: &mut AlertState) -> i64 {
        let baseline = BeatClass::BASELINE.id();
        let (value, condition) = match self.source.read_status() {
            StatusRead::Value(value) => (value, ReadCondition::Healthy),
            StatusRead::Empty => (baseline, ReadCondition::Healthy),
            StatusRead::Missing => {
                if state.read_condition != ReadCondition::Missing {
                    tracing::warn!("Status source missing; reporting baseline class");
                }
                (baseline, ReadCondition::Missing)
            }
            StatusRead::Unreadable(e) => {
                if state.read_condition != ReadCondition::Unreadable {
                    tracing::warn!("Status source unreadable ({}); reporting baseline class", e);
                }
                (baseline, ReadCondition::Unreadable)
            }
        };
        state.read_condition = condition;
        value
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
