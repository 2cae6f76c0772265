//! Run statistics for the writer loop.

pub mod counters;

// Re-export commonly used types
pub use counters::{create_shared_stats, PipelineStats, SharedStats, StatsSnapshot};
