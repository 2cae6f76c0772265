//! Core signal processing for the heartbeat monitor.
//!
//! This module contains:
//! - The beat class taxonomy
//! - R-peak detection and window extraction
//! - Feature normalization ahead of inference
//! - Heartbeat scoring
//! - Classification records for the output log

pub mod classes;
pub mod normalizer;
pub mod record;
pub mod scoring;
pub mod segmenter;

// Re-export commonly used types
pub use classes::BeatClass;
pub use normalizer::{FeatureNormalizer, ScalerParams};
pub use record::{argmax, ClassificationRecord, OutputRow, RECORD_HEADER};
pub use scoring::heartbeat_score;
pub use segmenter::{BeatSegmenter, PeakHeight, SegmenterConfig, Window};
