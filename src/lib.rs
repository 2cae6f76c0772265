//! Synheart ECG Agent - streaming heartbeat classification and alerting.
//!
//! This library tails a CSV source of ECG samples written by a capture
//! process, cuts it into fixed-length beat windows, classifies each window
//! into one of the AAMI beat classes and keeps an append-only log of the
//! results. A separate reader side turns the latest published class into
//! transition-triggered alerts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Writer loop (pipeline)                     │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐ │
//! │  │   Source   │──▶│    Beat    │──▶│  Feature   │──▶│Classifier│ │
//! │  │   Tailer   │   │ Segmenter  │   │ Normalizer │   │          │ │
//! │  └────────────┘   └────────────┘   └────────────┘   └──────────┘ │
//! │                                                          │       │
//! │                   ┌────────────┐   ┌────────────┐        │       │
//! │                   │   Result   │◀──│  Scoring   │◀───────┘       │
//! │                   │    Sink    │   │   Policy   │                │
//! │                   └────────────┘   └────────────┘                │
//! └──────────────────────────│───────────────────────────────────────┘
//!                            ▼ status file
//!                   ┌────────────────┐
//!                   │ Alert state    │◀── GET /status, POST /force
//!                   │ machine        │
//!                   └────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use synheart_ecg_agent::{create_shared_stats, Config, Pipeline, ThreadSleeper};
//!
//! let config = Config::load().unwrap_or_default();
//! let stats = create_shared_stats(Some(config.stats_path.clone()));
//! let mut pipeline = Pipeline::from_config(&config, stats).expect("startup failed");
//!
//! let running = AtomicBool::new(true);
//! pipeline.run(&running, &ThreadSleeper);
//! ```

pub mod alert;
pub mod config;
pub mod core;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod stats;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use alert::{AlertMessage, AlertStateMachine, AlertTable, Severity, StatusReport};
pub use config::{Config, ConfigError, InputMode};
pub use crate::core::{
    heartbeat_score, BeatClass, BeatSegmenter, ClassificationRecord, FeatureNormalizer, Window,
};
pub use error::{
    ClassifierError, ConfigurationError, PipelineError, RowError, SinkError, StartupError,
};
pub use model::{Classifier, DenseModel};
pub use pipeline::{IterationSummary, Pipeline, Sleeper, ThreadSleeper};
pub use sink::{ResultSink, StatusFile};
pub use source::SourceTailer;
pub use stats::{create_shared_stats, PipelineStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Legend printed at startup and by the `classes` command.
pub fn class_legend() -> String {
    let mut out = String::from("Beat classes:");
    for class in BeatClass::KNOWN {
        out.push_str(&format!(
            "\n  {} = {} ({})",
            class.id(),
            class.label(),
            class.description()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_legend_contents() {
        let legend = class_legend();
        assert!(legend.contains("0 = N (Normal beat)"));
        assert!(legend.contains("2 = V (Ventricular premature beat)"));
        assert_eq!(legend.lines().count(), 6);
    }
}
