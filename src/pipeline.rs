//! The writer loop.
//!
//! Each iteration pulls rows appended to the input source, turns them into
//! fixed-length windows, classifies them in batches and records one result
//! per window. Iteration errors are logged and the loop carries on after the
//! poll delay; only a cleared run flag stops it.

use crate::config::{Config, InputMode};
use crate::core::classes::BeatClass;
use crate::core::normalizer::{FeatureNormalizer, ScalerParams};
use crate::core::record::ClassificationRecord;
use crate::core::scoring::heartbeat_score;
use crate::core::segmenter::{BeatSegmenter, Window};
use crate::error::{ConfigurationError, PipelineError, StartupError};
use crate::model::{Classifier, DenseModel};
use crate::sink::{count_records, PredictionLog, ResultSink, StatusFile};
use crate::source::tailer::{NoDataReason, SourceTailer, TailBatch, TailOutcome};
use crate::source::types::RowSchema;
use crate::stats::SharedStats;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Delay between loop iterations.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Source of record timestamps.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One recorded classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Input row of the window, in beats mode
    pub row: Option<u64>,
    pub class: BeatClass,
    pub score: f64,
}

/// What a single iteration did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationSummary {
    /// Why nothing was read, when nothing was
    pub idle: Option<NoDataReason>,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub windows_skipped: usize,
    pub predictions: Vec<Prediction>,
}

impl IterationSummary {
    fn idle(reason: NoDataReason) -> Self {
        Self {
            idle: Some(reason),
            ..Self::default()
        }
    }

    pub fn windows_classified(&self) -> usize {
        self.predictions.len()
    }
}

/// Writer side of the agent.
pub struct Pipeline {
    mode: InputMode,
    tailer: SourceTailer,
    schema: RowSchema,
    segmenter: BeatSegmenter,
    normalizer: FeatureNormalizer,
    classifier: Box<dyn Classifier>,
    sink: ResultSink,
    stats: SharedStats,
    clock: Box<dyn Clock>,
    batch_size: usize,
    min_row_features: usize,
    poll_interval: Duration,
}

impl Pipeline {
    /// Assemble the pipeline from configuration, loading the scaler and
    /// classifier artifacts it names.
    pub fn from_config(config: &Config, stats: SharedStats) -> Result<Self, StartupError> {
        let normalizer = load_normalizer(config)?;
        let classifier = load_classifier(config)?;
        Self::new(config, normalizer, classifier, stats)
    }

    /// Assemble the pipeline around an already constructed normalizer and classifier.
    pub fn new(
        config: &Config,
        normalizer: FeatureNormalizer,
        classifier: Box<dyn Classifier>,
        stats: SharedStats,
    ) -> Result<Self, StartupError> {
        let window_length = config.window_length;
        if normalizer.window_length() != window_length {
            return Err(ConfigurationError::LengthMismatch {
                what: "normalizer window".to_string(),
                expected: window_length,
                actual: normalizer.window_length(),
            }
            .into());
        }
        if classifier.input_len() != window_length {
            return Err(ConfigurationError::LengthMismatch {
                what: "classifier input".to_string(),
                expected: window_length,
                actual: classifier.input_len(),
            }
            .into());
        }

        let mut start_row = config.start_row;
        if config.mode == InputMode::Beats && config.resume_from_log {
            let processed = count_records(&config.output_path)?;
            if processed > start_row {
                tracing::info!(
                    "Resuming at row {} ({} records already in {:?})",
                    processed,
                    processed,
                    config.output_path
                );
                start_row = processed;
            }
        }

        let log = PredictionLog::open(&config.output_path)?;
        let status = StatusFile::new(&config.status_path);

        Ok(Self {
            mode: config.mode,
            tailer: SourceTailer::new(&config.input_path, config.has_header, start_row),
            schema: config.schema,
            segmenter: BeatSegmenter::new(&config.segmenter()),
            normalizer,
            classifier,
            sink: ResultSink::new(log, status),
            stats,
            clock: Box::new(SystemClock),
            batch_size: config.batch_size.max(1),
            min_row_features: config.min_row_features,
            poll_interval: config.poll_interval,
        })
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Next input row to be read.
    pub fn offset(&self) -> u64 {
        self.tailer.offset()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    /// Run iterations until `running` is cleared.
    ///
    /// The flag is checked between iterations, never inside one.
    pub fn run(&mut self, running: &AtomicBool, sleeper: &dyn Sleeper) {
        tracing::info!(
            "Writer loop started on {:?} ({:?} mode, offset {})",
            self.tailer.path(),
            self.mode,
            self.tailer.offset()
        );

        while running.load(Ordering::SeqCst) {
            match self.run_once() {
                Ok(summary) if summary.windows_classified() > 0 => {
                    tracing::debug!(
                        "Iteration classified {} windows from {} rows",
                        summary.windows_classified(),
                        summary.rows_read
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    self.stats.record_iteration_error();
                    tracing::error!("Iteration failed: {}", e);
                }
            }

            if !running.load(Ordering::SeqCst) {
                break;
            }
            sleeper.sleep(self.poll_interval);
        }

        tracing::info!("Writer loop stopped at offset {}", self.tailer.offset());
    }

    /// Process everything appended since the previous iteration.
    pub fn run_once(&mut self) -> Result<IterationSummary, PipelineError> {
        let batch = match self.tailer.read_new() {
            TailOutcome::Rows(batch) => batch,
            TailOutcome::NoNewData(reason) => return Ok(IterationSummary::idle(reason)),
        };

        let mut summary = IterationSummary {
            rows_read: batch.rows.len(),
            ..IterationSummary::default()
        };
        self.stats.record_rows_read(batch.rows.len() as u64);

        let windows = match self.mode {
            InputMode::Beats => self.beat_windows(&batch, &mut summary),
            InputMode::Stream => self.stream_windows(&batch, &mut summary),
        };

        let window_length = self.segmenter.window_length();
        let windows: Vec<Window> = windows
            .into_iter()
            .filter(|window| {
                if window.len() == window_length {
                    return true;
                }
                tracing::warn!(
                    "Skipping window from row {:?}: length {}, expected {}",
                    window.source_row,
                    window.len(),
                    window_length
                );
                summary.windows_skipped += 1;
                self.stats.record_window_skipped();
                false
            })
            .collect();

        for chunk in windows.chunks(self.batch_size) {
            self.classify_chunk(chunk, &mut summary)?;
        }

        Ok(summary)
    }

    /// One window per row; each row is already a segmented beat.
    fn beat_windows(&self, batch: &TailBatch, summary: &mut IterationSummary) -> Vec<Window> {
        let mut windows = Vec::with_capacity(batch.rows.len());
        for row in &batch.rows {
            let parsed = match self.schema.parse(row) {
                Ok(parsed) if parsed.samples.len() < self.min_row_features => {
                    tracing::debug!(
                        "Row {} has {} features; not a beat",
                        row.index,
                        parsed.samples.len()
                    );
                    summary.rows_skipped += 1;
                    self.stats.record_row_skipped();
                    continue;
                }
                Ok(parsed) => self
                    .schema
                    .check_width(row, batch.header_width)
                    .map(|()| parsed),
                Err(e) => Err(e),
            };

            match parsed {
                Ok(parsed) => {
                    windows.push(Window::from_row(parsed.index, parsed.samples, parsed.label));
                }
                Err(e) => {
                    tracing::warn!("Skipping row {}: {}", row.index, e);
                    summary.rows_skipped += 1;
                    self.stats.record_row_skipped();
                }
            }
        }
        windows
    }

    /// Concatenate the new rows' samples and cut windows around detected peaks.
    fn stream_windows(&self, batch: &TailBatch, summary: &mut IterationSummary) -> Vec<Window> {
        let mut samples = Vec::new();
        for row in &batch.rows {
            match self.schema.parse(row) {
                Ok(parsed) => samples.extend(parsed.samples),
                Err(e) => {
                    tracing::warn!("Skipping row {}: {}", row.index, e);
                    summary.rows_skipped += 1;
                    self.stats.record_row_skipped();
                }
            }
        }

        let windows = self.segmenter.segment(&samples);
        tracing::debug!(
            "Segmented {} samples into {} windows",
            samples.len(),
            windows.len()
        );
        windows
    }

    fn classify_chunk(
        &mut self,
        chunk: &[Window],
        summary: &mut IterationSummary,
    ) -> Result<(), PipelineError> {
        let normalized: Vec<Vec<f64>> = chunk
            .iter()
            .map(|window| self.normalizer.apply(&window.samples))
            .collect();

        let probabilities = match self.classifier.predict(&normalized) {
            Ok(probabilities) => probabilities,
            Err(e) => {
                self.rewind_to(chunk.first());
                return Err(e.into());
            }
        };

        if probabilities.len() != chunk.len() {
            tracing::warn!(
                "Classifier returned {} probability rows for {} windows; skipping batch",
                probabilities.len(),
                chunk.len()
            );
            summary.windows_skipped += chunk.len();
            for _ in chunk {
                self.stats.record_window_skipped();
            }
            return Ok(());
        }

        let num_classes = self.classifier.num_classes();
        for (window, probs) in chunk.iter().zip(probabilities) {
            if probs.len() != num_classes {
                tracing::warn!(
                    "Skipping window from row {:?}: {} probabilities, expected {}",
                    window.source_row,
                    probs.len(),
                    num_classes
                );
                summary.windows_skipped += 1;
                self.stats.record_window_skipped();
                continue;
            }

            let record = match ClassificationRecord::from_prediction(
                self.clock.now(),
                window.samples.clone(),
                probs,
            ) {
                Some(record) => record,
                None => {
                    tracing::warn!(
                        "Skipping window from row {:?}: non-finite probabilities",
                        window.source_row
                    );
                    summary.windows_skipped += 1;
                    self.stats.record_window_skipped();
                    continue;
                }
            };

            let truth = window.ground_truth.map(BeatClass::from_id);
            let score = heartbeat_score(record.predicted_class, &record.class_probabilities, truth);

            if let Err(e) = self.sink.append(&record) {
                self.rewind_to(Some(window));
                return Err(e.into());
            }
            if let Err(e) = self.sink.publish(record.predicted_class) {
                tracing::warn!("Recorded beat but could not publish status: {}", e);
            }

            let row_label = window
                .source_row
                .map_or_else(|| "-".to_string(), |r| r.to_string());
            match truth {
                Some(truth) => tracing::info!(
                    "Beat {}: predicted {}, actual {}, score {:.2}",
                    row_label,
                    record.predicted_class,
                    truth,
                    score
                ),
                None => tracing::info!(
                    "Beat {}: predicted {}, score {:.2}",
                    row_label,
                    record.predicted_class,
                    score
                ),
            }

            self.stats.record_classified(record.predicted_class);
            summary.predictions.push(Prediction {
                row: window.source_row,
                class: record.predicted_class,
                score,
            });
        }

        Ok(())
    }

    /// After a failure, re-deliver rows from the first unrecorded window.
    fn rewind_to(&mut self, window: Option<&Window>) {
        match window.and_then(|w| w.source_row) {
            Some(row) if row < self.tailer.offset() => {
                tracing::warn!("Will retry from row {}", row);
                self.tailer.seek(row);
            }
            Some(_) => {}
            None => tracing::warn!("Unrecorded stream windows were dropped"),
        }
    }
}

/// Load fitted scaler parameters. A missing artifact means pass-through.
pub fn load_normalizer(config: &Config) -> Result<FeatureNormalizer, ConfigurationError> {
    let params = match &config.scaler_path {
        Some(path) if path.exists() => Some(ScalerParams::load(path)?),
        Some(path) => {
            tracing::warn!("Scaler parameters {:?} not found", path);
            None
        }
        None => None,
    };
    FeatureNormalizer::new(params, config.window_length)
}

/// Load the configured classifier.
pub fn load_classifier(config: &Config) -> Result<Box<dyn Classifier>, ConfigurationError> {
    #[cfg(feature = "remote")]
    if let Some(remote) = &config.remote {
        let remote_config = crate::model::RemoteConfig {
            url: remote.url.clone(),
            timeout_secs: remote.timeout_secs,
            num_classes: remote.num_classes,
        };
        tracing::info!("Using remote classifier at {}", remote_config.url);
        return Ok(Box::new(crate::model::RemoteClassifier::new(
            remote_config,
            config.window_length,
        )?));
    }

    #[cfg(not(feature = "remote"))]
    if config.remote.is_some() {
        tracing::warn!("Remote classifier configured but the remote feature is disabled; using local model");
    }

    let model = DenseModel::load(&config.model_path, config.window_length)?;
    tracing::info!("Loaded classifier from {:?}", config.model_path);
    Ok(Box::new(model))
}
