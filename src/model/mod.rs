//! Classifier boundary.
//!
//! The trained beat classifier is treated as a black box: a pure function
//! from a batch of normalized windows `[N, L]` to probability rows `[N, C]`.
//! A dense network loaded from a JSON artifact is provided, and with the
//! `remote` feature a client for an HTTP inference service.

pub mod dense;

#[cfg(feature = "remote")]
pub mod remote;

use crate::error::ClassifierError;

pub use dense::{Activation, DenseLayer, DenseModel};

#[cfg(feature = "remote")]
pub use remote::{RemoteClassifier, RemoteConfig};

/// A beat classifier.
pub trait Classifier: Send + Sync {
    /// Expected window length.
    fn input_len(&self) -> usize;

    /// Number of probability columns produced per window.
    fn num_classes(&self) -> usize;

    /// Classify a batch of windows, one probability row per window.
    fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn input_len(&self) -> usize {
        (**self).input_len()
    }

    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        (**self).predict(batch)
    }
}
