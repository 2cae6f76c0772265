//! Per-feature standardization applied to windows before inference.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fitted standard-scaler parameters, one entry per window sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl ScalerParams {
    /// Load parameters from a JSON artifact `{"mean": [...], "scale": [...]}`.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Applies `(x - mean) / scale` to each window.
///
/// Without fitted parameters the normalizer passes windows through
/// unchanged; that state is logged once at construction and reported by
/// [`FeatureNormalizer::is_passthrough`].
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    window_length: usize,
    params: Option<ScalerParams>,
}

impl FeatureNormalizer {
    /// Build a normalizer, checking parameter shapes against the window length.
    pub fn new(params: Option<ScalerParams>, window_length: usize) -> Result<Self, ConfigurationError> {
        let params = match params {
            Some(params) => Some(validate(params, window_length)?),
            None => {
                tracing::warn!(
                    "No fitted scaler parameters; windows will be classified without normalization"
                );
                None
            }
        };

        Ok(Self {
            window_length,
            params,
        })
    }

    /// A normalizer that never scales.
    pub fn passthrough(window_length: usize) -> Self {
        Self {
            window_length,
            params: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.params.is_none()
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    /// Normalize one window. The caller guarantees `window.len() == window_length`.
    pub fn apply(&self, window: &[f64]) -> Vec<f64> {
        match &self.params {
            Some(params) => window
                .iter()
                .zip(params.mean.iter().zip(&params.scale))
                .map(|(x, (mean, scale))| (x - mean) / scale)
                .collect(),
            None => window.to_vec(),
        }
    }
}

fn validate(mut params: ScalerParams, window_length: usize) -> Result<ScalerParams, ConfigurationError> {
    for (what, values) in [("scaler mean", &params.mean), ("scaler scale", &params.scale)] {
        if values.len() != window_length {
            return Err(ConfigurationError::LengthMismatch {
                what: what.to_string(),
                expected: window_length,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ConfigurationError::NonFinite {
                what: what.to_string(),
                index,
            });
        }
    }

    // Constant features were fitted with zero variance
    for scale in params.scale.iter_mut() {
        if *scale == 0.0 {
            *scale = 1.0;
        }
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applies_affine_transform() {
        let params = ScalerParams {
            mean: vec![1.0, 2.0, 3.0],
            scale: vec![2.0, 0.5, 1.0],
        };
        let normalizer = FeatureNormalizer::new(Some(params), 3).unwrap();
        assert!(!normalizer.is_passthrough());
        assert_eq!(normalizer.apply(&[3.0, 3.0, 3.0]), vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let params = ScalerParams {
            mean: vec![0.0; 186],
            scale: vec![1.0; 186],
        };
        let err = FeatureNormalizer::new(Some(params), 187).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::LengthMismatch {
                expected: 187,
                actual: 186,
                ..
            }
        ));
    }

    #[test]
    fn test_scale_length_checked_separately() {
        let params = ScalerParams {
            mean: vec![0.0; 4],
            scale: vec![1.0; 3],
        };
        assert!(FeatureNormalizer::new(Some(params), 4).is_err());
    }

    #[test]
    fn test_non_finite_parameters_rejected() {
        let params = ScalerParams {
            mean: vec![0.0, f64::NAN],
            scale: vec![1.0, 1.0],
        };
        let err = FeatureNormalizer::new(Some(params), 2).unwrap_err();
        assert!(matches!(err, ConfigurationError::NonFinite { index: 1, .. }));
    }

    #[test]
    fn test_zero_scale_treated_as_unit() {
        let params = ScalerParams {
            mean: vec![1.0, 1.0],
            scale: vec![0.0, 2.0],
        };
        let normalizer = FeatureNormalizer::new(Some(params), 2).unwrap();
        assert_eq!(normalizer.apply(&[3.0, 3.0]), vec![2.0, 1.0]);
    }

    #[test]
    fn test_passthrough_without_params() {
        let normalizer = FeatureNormalizer::new(None, 3).unwrap();
        assert!(normalizer.is_passthrough());
        assert_eq!(normalizer.apply(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_load_params_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        std::fs::write(&path, r#"{"mean": [0.5, 0.5], "scale": [0.1, 0.2]}"#).unwrap();

        let params = ScalerParams::load(&path).unwrap();
        assert_eq!(params.mean, vec![0.5, 0.5]);
        assert_eq!(params.scale, vec![0.1, 0.2]);

        let missing = ScalerParams::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigurationError::Read { .. })));
    }
}
