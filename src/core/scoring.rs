//! Heartbeat score on a 1-10 style scale.
//!
//! Normal beats score `P(normal) * 10`. Any abnormal beat scores
//! `clamp(5 - P(normal) * 5, 1, 5)`, which keeps every abnormal result in
//! the lower half of the scale.

use crate::core::classes::BeatClass;

/// Upper bound of an abnormal score.
pub const ABNORMAL_CEILING: f64 = 5.0;
/// Lower bound of an abnormal score.
pub const ABNORMAL_FLOOR: f64 = 1.0;

/// Score a classified beat.
///
/// The ground-truth class decides the branch when the input carried one,
/// otherwise the predicted class does. A missing probability for the normal
/// class counts as zero.
pub fn heartbeat_score(
    predicted: BeatClass,
    probabilities: &[f64],
    ground_truth: Option<BeatClass>,
) -> f64 {
    let p_normal = probabilities.first().copied().unwrap_or(0.0);
    let reference = ground_truth.unwrap_or(predicted);

    if reference.is_normal() {
        p_normal * 10.0
    } else {
        (ABNORMAL_CEILING - p_normal * 5.0).clamp(ABNORMAL_FLOOR, ABNORMAL_CEILING)
    }
}
