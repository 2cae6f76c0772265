//! Input source handling for the heartbeat monitor.
//!
//! The source is an append-only CSV file written by a capture process.
//! This module tails it for new rows and parses rows into samples.

pub mod tailer;
pub mod types;

// Re-export commonly used types
pub use tailer::{NoDataReason, SourceTailer, TailBatch, TailOutcome};
pub use types::{ParsedRow, RawRow, RowSchema};
