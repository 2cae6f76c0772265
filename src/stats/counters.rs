//! Pipeline counters.
//!
//! Tracks how much input the writer loop has consumed and what it produced,
//! cumulatively across sessions when persisted.

use crate::core::classes::BeatClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Slots for the five known classes plus one for unknown ids.
const CLASS_SLOTS: usize = 6;

/// Counters for the current run.
#[derive(Debug)]
pub struct PipelineStats {
    /// Input rows delivered by the tailer
    rows_read: AtomicU64,
    /// Input rows rejected during parsing
    rows_skipped: AtomicU64,
    /// Windows that produced a record
    windows_classified: AtomicU64,
    /// Windows dropped before or after inference
    windows_skipped: AtomicU64,
    /// Iterations that ended in an error
    iteration_errors: AtomicU64,
    /// Records per predicted class
    class_counts: [AtomicU64; CLASS_SLOTS],
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            rows_read: AtomicU64::new(0),
            rows_skipped: AtomicU64::new(0),
            windows_classified: AtomicU64::new(0),
            windows_skipped: AtomicU64::new(0),
            iteration_errors: AtomicU64::new(0),
            class_counts: Default::default(),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create counters that load from and save to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous pipeline stats: {}", e);
        }

        stats
    }

    pub fn record_rows_read(&self, count: u64) {
        self.rows_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_row_skipped(&self) {
        self.rows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_skipped(&self) {
        self.windows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_iteration_error(&self) {
        self.iteration_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a classified window.
    pub fn record_classified(&self, class: BeatClass) {
        self.windows_classified.fetch_add(1, Ordering::Relaxed);
        self.class_counts[class_slot(class)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            windows_classified: self.windows_classified.load(Ordering::Relaxed),
            windows_skipped: self.windows_skipped.load(Ordering::Relaxed),
            iteration_errors: self.iteration_errors.load(Ordering::Relaxed),
            class_counts: std::array::from_fn(|i| self.class_counts[i].load(Ordering::Relaxed)),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Summary for display at shutdown.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut out = format!(
            "Session Statistics:\n\
             - Rows read: {}\n\
             - Rows skipped: {}\n\
             - Windows classified: {}\n\
             - Windows skipped: {}\n\
             - Iterations with errors: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Beats by class:",
            stats.rows_read,
            stats.rows_skipped,
            stats.windows_classified,
            stats.windows_skipped,
            stats.iteration_errors,
            stats.session_duration_secs
        );
        for class in BeatClass::KNOWN {
            out.push_str(&format!(
                "\n - {} ({}): {}",
                class.label(),
                class.description(),
                stats.class_counts[class_slot(class)]
            ));
        }
        out.push_str(&format!(
            "\n - Unknown: {}",
            stats.class_counts[CLASS_SLOTS - 1]
        ));
        out
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                rows_read: stats.rows_read,
                rows_skipped: stats.rows_skipped,
                windows_classified: stats.windows_classified,
                windows_skipped: stats.windows_skipped,
                iteration_errors: stats.iteration_errors,
                class_counts: stats.class_counts.to_vec(),
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.rows_read.store(persisted.rows_read, Ordering::Relaxed);
                self.rows_skipped
                    .store(persisted.rows_skipped, Ordering::Relaxed);
                self.windows_classified
                    .store(persisted.windows_classified, Ordering::Relaxed);
                self.windows_skipped
                    .store(persisted.windows_skipped, Ordering::Relaxed);
                self.iteration_errors
                    .store(persisted.iteration_errors, Ordering::Relaxed);
                for (slot, count) in self.class_counts.iter().zip(&persisted.class_counts) {
                    slot.store(*count, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

fn class_slot(class: BeatClass) -> usize {
    match class {
        BeatClass::Unknown(_) => CLASS_SLOTS - 1,
        known => known.id() as usize,
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub windows_classified: u64,
    pub windows_skipped: u64,
    pub iteration_errors: u64,
    pub class_counts: [u64; CLASS_SLOTS],
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    rows_read: u64,
    rows_skipped: u64,
    windows_classified: u64,
    windows_skipped: u64,
    iteration_errors: u64,
    class_counts: Vec<u64>,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared counters.
pub type SharedStats = Arc<PipelineStats>;

/// Create shared counters, persisted when a path is given.
pub fn create_shared_stats(path: Option<PathBuf>) -> SharedStats {
    match path {
        Some(path) => Arc::new(PipelineStats::with_persistence(path)),
        None => Arc::new(PipelineStats::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = PipelineStats::new();
        stats.record_rows_read(10);
        stats.record_row_skipped();
        stats.record_classified(BeatClass::Normal);
        stats.record_classified(BeatClass::Ventricular);
        stats.record_classified(BeatClass::Unknown(12));
        stats.record_window_skipped();

        let snapshot = stats.stats();
        assert_eq!(snapshot.rows_read, 10);
        assert_eq!(snapshot.rows_skipped, 1);
        assert_eq!(snapshot.windows_classified, 3);
        assert_eq!(snapshot.windows_skipped, 1);
        assert_eq!(snapshot.class_counts, [1, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let stats = PipelineStats::with_persistence(path.clone());
        stats.record_rows_read(4);
        stats.record_classified(BeatClass::Fusion);
        stats.save().unwrap();

        let reloaded = PipelineStats::with_persistence(path);
        let snapshot = reloaded.stats();
        assert_eq!(snapshot.rows_read, 4);
        assert_eq!(snapshot.windows_classified, 1);
        assert_eq!(snapshot.class_counts[3], 1);
    }

    #[test]
    fn test_summary_format() {
        let stats = PipelineStats::new();
        let summary = stats.summary();
        assert!(summary.contains("Rows read"));
        assert!(summary.contains("Ventricular premature beat"));
        assert!(summary.contains("Unknown: 0"));
    }
}
