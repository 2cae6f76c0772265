//! Beat segmentation for raw sample streams.
//!
//! R-peaks are detected as local maxima above a height threshold, with a
//! minimum spacing between accepted peaks. Each accepted peak anchors a
//! fixed-length window; windows that run past either end of the buffer are
//! zero-padded so every window has exactly `window_length` samples.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Minimum height a local maximum must reach to count as a peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakHeight {
    /// Mean of the finite samples in the segment
    Mean,
    /// Fixed threshold in sample units
    Fixed(f64),
}

impl Default for PeakHeight {
    fn default() -> Self {
        PeakHeight::Mean
    }
}

/// Segmentation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Number of samples per window
    pub window_length: usize,
    /// Sampling rate of the stream in Hz
    pub sampling_rate_hz: f64,
    /// Minimum spacing between accepted peaks, in seconds
    pub min_peak_distance_secs: f64,
    /// Peak height threshold
    pub peak_height: PeakHeight,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            window_length: 187,
            sampling_rate_hz: 125.0,
            min_peak_distance_secs: 0.6,
            peak_height: PeakHeight::Mean,
        }
    }
}

/// A fixed-length slice of samples handed to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Index of the anchoring peak in the segmented buffer (stream mode)
    pub peak_index: Option<usize>,
    /// Input row the window came from (beats mode)
    pub source_row: Option<u64>,
    /// Optional ground-truth class id carried by the input
    pub ground_truth: Option<i64>,
    /// Raw sample values
    pub samples: Vec<f64>,
}

impl Window {
    /// A window built from a pre-segmented input row.
    pub fn from_row(row: u64, samples: Vec<f64>, ground_truth: Option<i64>) -> Self {
        Self {
            peak_index: None,
            source_row: Some(row),
            ground_truth,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Detects peaks and cuts peak-centred windows out of a sample buffer.
#[derive(Debug, Clone)]
pub struct BeatSegmenter {
    window_length: usize,
    min_distance: usize,
    peak_height: PeakHeight,
}

impl BeatSegmenter {
    /// Create a segmenter from its configuration.
    pub fn new(config: &SegmenterConfig) -> Self {
        let min_distance = (config.min_peak_distance_secs * config.sampling_rate_hz).round();
        Self {
            window_length: config.window_length,
            min_distance: if min_distance.is_finite() && min_distance >= 1.0 {
                min_distance as usize
            } else {
                1
            },
            peak_height: config.peak_height,
        }
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    /// Samples to the left of the peak inside a window.
    pub fn half_length(&self) -> usize {
        self.window_length / 2
    }

    /// Minimum spacing between accepted peaks, in samples.
    pub fn min_distance(&self) -> usize {
        self.min_distance
    }

    /// Segment a buffer into one window per accepted peak, in peak order.
    pub fn segment(&self, samples: &[f64]) -> Vec<Window> {
        self.detect_peaks(samples)
            .into_iter()
            .map(|p| Window {
                peak_index: Some(p),
                source_row: None,
                ground_truth: None,
                samples: self.extract_window(samples, p),
            })
            .collect()
    }

    /// Indices of accepted peaks in ascending order.
    ///
    /// Candidates below the height threshold are dropped first; the rest are
    /// accepted greedily, earliest first, skipping any candidate closer than
    /// the minimum distance to the last accepted peak.
    pub fn detect_peaks(&self, samples: &[f64]) -> Vec<usize> {
        let height = match self.peak_height {
            PeakHeight::Mean => samples.iter().filter(|v| v.is_finite()).mean(),
            PeakHeight::Fixed(h) => h,
        };

        let mut accepted: Vec<usize> = Vec::new();
        for p in local_maxima(samples) {
            // NaN threshold (empty or all non-finite buffer) rejects everything
            let tall_enough = samples[p] >= height;
            if !tall_enough {
                continue;
            }
            match accepted.last() {
                Some(&last) if p - last < self.min_distance => {}
                _ => accepted.push(p),
            }
        }
        accepted
    }

    /// Cut the window anchored at `peak`, zero-padding past either end.
    pub fn extract_window(&self, samples: &[f64], peak: usize) -> Vec<f64> {
        let start = peak as isize - self.half_length() as isize;
        (0..self.window_length as isize)
            .map(|offset| {
                let idx = start + offset;
                if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Finite local maxima; flat plateaus report their middle sample.
///
/// The first and last samples are never maxima.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] && x[i].is_finite() {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter(window_length: usize, min_distance_samples: f64) -> BeatSegmenter {
        BeatSegmenter::new(&SegmenterConfig {
            window_length,
            sampling_rate_hz: 1.0,
            min_peak_distance_secs: min_distance_samples,
            peak_height: PeakHeight::Mean,
        })
    }

    /// A flat baseline with unit spikes at the given positions.
    fn spikes(len: usize, at: &[usize]) -> Vec<f64> {
        let mut signal = vec![0.0; len];
        for &p in at {
            signal[p] = 1.0;
        }
        signal
    }

    #[test]
    fn test_min_distance_from_rate() {
        let seg = BeatSegmenter::new(&SegmenterConfig::default());
        assert_eq!(seg.min_distance(), 75);
        assert_eq!(seg.half_length(), 93);
    }

    #[test]
    fn test_detects_isolated_spikes() {
        let seg = segmenter(8, 3.0);
        let signal = spikes(30, &[5, 15, 25]);
        assert_eq!(seg.detect_peaks(&signal), vec![5, 15, 25]);
    }

    #[test]
    fn test_close_peaks_merge_earliest_first() {
        let seg = segmenter(8, 5.0);
        let signal = spikes(30, &[5, 7, 12, 20]);
        // 7 is within 5 of 5; 12 is 7 away from 5
        assert_eq!(seg.detect_peaks(&signal), vec![5, 12, 20]);
    }

    #[test]
    fn test_accepted_peaks_respect_min_distance() {
        let seg = segmenter(16, 6.0);
        let signal: Vec<f64> = (0..400)
            .map(|i| ((i as f64) * 0.7).sin() + ((i as f64) * 0.13).cos())
            .collect();
        let peaks = seg.detect_peaks(&signal);
        assert!(!peaks.is_empty());
        for pair in peaks.windows(2) {
            assert!(pair[1] - pair[0] >= seg.min_distance());
        }
    }

    #[test]
    fn test_peaks_below_mean_are_ignored() {
        let seg = segmenter(8, 1.0);
        let mut signal = vec![10.0; 20];
        signal[3] = 2.0;
        signal[4] = 3.0; // local max but far below the mean
        signal[5] = 2.0;
        signal[12] = 20.0;
        assert_eq!(seg.detect_peaks(&signal), vec![12]);
    }

    #[test]
    fn test_fixed_height_threshold() {
        let seg = BeatSegmenter::new(&SegmenterConfig {
            window_length: 8,
            sampling_rate_hz: 1.0,
            min_peak_distance_secs: 1.0,
            peak_height: PeakHeight::Fixed(0.8),
        });
        let mut signal = spikes(20, &[4, 14]);
        signal[14] = 0.5;
        assert_eq!(seg.detect_peaks(&signal), vec![4]);
    }

    #[test]
    fn test_plateau_reports_middle() {
        let seg = segmenter(8, 1.0);
        let signal = vec![0.0, 1.0, 3.0, 3.0, 3.0, 1.0, 0.0];
        assert_eq!(seg.detect_peaks(&signal), vec![3]);
    }

    #[test]
    fn test_edges_are_never_peaks() {
        let seg = segmenter(4, 1.0);
        let signal = vec![5.0, 1.0, 0.0, 1.0, 5.0];
        assert!(seg.detect_peaks(&signal).is_empty());
    }

    #[test]
    fn test_no_peaks_yields_no_windows() {
        let seg = segmenter(8, 1.0);
        assert!(seg.segment(&[]).is_empty());
        assert!(seg.segment(&[1.0, 1.0, 1.0, 1.0]).is_empty());
        assert!(seg.segment(&[0.0, 1.0, 2.0, 3.0]).is_empty());
    }

    #[test]
    fn test_nan_samples_never_peak() {
        let seg = BeatSegmenter::new(&SegmenterConfig {
            window_length: 4,
            sampling_rate_hz: 1.0,
            min_peak_distance_secs: 1.0,
            peak_height: PeakHeight::Fixed(0.0),
        });
        let signal = vec![0.0, f64::NAN, 0.0, 1.0, 0.0];
        assert_eq!(seg.detect_peaks(&signal), vec![3]);
    }

    #[test]
    fn test_window_length_invariant_for_every_peak_position() {
        for window_length in [4usize, 7, 187, 188] {
            let seg = segmenter(window_length, 1.0);
            let signal: Vec<f64> = (0..50).map(|i| i as f64).collect();
            for peak in 0..signal.len() {
                assert_eq!(seg.extract_window(&signal, peak).len(), window_length);
            }
        }
    }

    #[test]
    fn test_left_padding_round_trip() {
        let seg = segmenter(10, 1.0);
        let signal: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let h = seg.half_length();
        let p = 2;

        let window = seg.extract_window(&signal, p);
        let pad = h - p;
        assert!(window[..pad].iter().all(|&v| v == 0.0));
        assert_eq!(&window[pad..], &signal[..10 - pad]);
    }

    #[test]
    fn test_right_padding() {
        let seg = segmenter(10, 1.0);
        let signal: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let p = 18;

        let window = seg.extract_window(&signal, p);
        // window covers [13, 23), signal ends at 20
        assert_eq!(&window[..7], &signal[13..20]);
        assert!(window[7..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_short_buffer_pads_both_sides() {
        let seg = segmenter(12, 1.0);
        let signal = vec![0.0, 4.0, 0.0];
        let windows = seg.segment(&signal);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].peak_index, Some(1));
        assert_eq!(windows[0].samples.len(), 12);
        assert_eq!(&windows[0].samples[5..8], &[0.0, 4.0, 0.0]);
    }

    #[test]
    fn test_segment_orders_windows_by_peak() {
        let seg = segmenter(6, 2.0);
        let signal = spikes(40, &[3, 17, 31]);
        let windows = seg.segment(&signal);
        let peaks: Vec<_> = windows.iter().filter_map(|w| w.peak_index).collect();
        assert_eq!(peaks, vec![3, 17, 31]);
        assert!(windows.iter().all(|w| w.len() == 6));
    }
}
