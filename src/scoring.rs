//! Consensus scoring policies.
//!
//! Every scorer turns the residual vector of a candidate into a [`Score`]
//! where greater is better, and knows which threshold classifies the inliers
//! of the winning model once sampling is over.

use crate::core::Scoring;
use crate::utils::median_in_place;

/// Consistency constant turning a median absolute deviation into a Gaussian
/// standard deviation.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Score of a candidate model. `value` decides the ordering, ties are broken
/// by `inlier_count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub inlier_count: usize,
    pub value: f64,
}

impl Score {
    pub fn new(inlier_count: usize, value: f64) -> Self {
        Self {
            inlier_count,
            value,
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.value.partial_cmp(&other.value) {
            Some(std::cmp::Ordering::Equal) => self.inlier_count.partial_cmp(&other.inlier_count),
            ord => ord,
        }
    }
}

fn count_within(residuals: &[f64], threshold: f64) -> usize {
    residuals.iter().filter(|&&r| r <= threshold).count()
}

/// Robust inlier threshold derived from the median of squared residuals.
///
/// `sigma = 1.4826 (1 + 5 / (n - k)) sqrt(median)`; the threshold is
/// `inlier_factor * sigma`, never below `stop_threshold`.
pub fn median_inlier_threshold(
    median_sq: f64,
    point_count: usize,
    sample_size: usize,
    inlier_factor: f64,
    stop_threshold: f64,
) -> f64 {
    if !median_sq.is_finite() {
        return stop_threshold;
    }
    let dof = point_count.saturating_sub(sample_size);
    let correction = if dof > 0 { 1.0 + 5.0 / dof as f64 } else { 1.0 };
    let sigma = MAD_TO_SIGMA * correction * median_sq.sqrt();
    (inlier_factor * sigma).max(stop_threshold)
}

fn squared(residuals: &[f64]) -> Vec<f64> {
    residuals.iter().map(|r| r * r).collect()
}

/// RANSAC: number of residuals below the threshold.
#[derive(Debug, Clone)]
pub struct RansacScoring {
    threshold: f64,
}

impl RansacScoring {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Scoring for RansacScoring {
    fn score(&self, residuals: &[f64]) -> Score {
        let inlier_count = count_within(residuals, self.threshold);
        Score::new(inlier_count, inlier_count as f64)
    }

    fn inlier_threshold(&self, _residuals: &[f64]) -> f64 {
        self.threshold
    }
}

/// MSAC: truncated quadratic cost `sum(min(r², t²))`, lower is better.
#[derive(Debug, Clone)]
pub struct MsacScoring {
    threshold: f64,
}

impl MsacScoring {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Scoring for MsacScoring {
    fn score(&self, residuals: &[f64]) -> Score {
        let t2 = self.threshold * self.threshold;
        let mut inlier_count = 0usize;
        let mut cost = 0.0;
        for &r in residuals {
            let r2 = r * r;
            if r2 <= t2 {
                inlier_count += 1;
                cost += r2;
            } else {
                cost += t2;
            }
        }
        Score::new(inlier_count, -cost)
    }

    fn inlier_threshold(&self, _residuals: &[f64]) -> f64 {
        self.threshold
    }
}

/// LMedS: median of squared residuals, lower is better. The threshold is a
/// stop threshold: sampling ends once the median residual drops below it.
///
/// PROMedS scores candidates the same way; only its sampling differs.
#[derive(Debug, Clone)]
pub struct LmedsScoring {
    stop_threshold: f64,
    inlier_factor: f64,
    sample_size: usize,
}

impl LmedsScoring {
    pub fn new(stop_threshold: f64, inlier_factor: f64, sample_size: usize) -> Self {
        Self {
            stop_threshold,
            inlier_factor,
            sample_size,
        }
    }

    fn threshold_for(&self, median_sq: f64, point_count: usize) -> f64 {
        median_inlier_threshold(
            median_sq,
            point_count,
            self.sample_size,
            self.inlier_factor,
            self.stop_threshold,
        )
    }
}

impl Scoring for LmedsScoring {
    fn score(&self, residuals: &[f64]) -> Score {
        let Some(median_sq) = median_in_place(&mut squared(residuals)) else {
            return Score::new(0, f64::NEG_INFINITY);
        };
        let threshold = self.threshold_for(median_sq, residuals.len());
        Score::new(count_within(residuals, threshold), -median_sq)
    }

    fn inlier_threshold(&self, residuals: &[f64]) -> f64 {
        let median_sq = median_in_place(&mut squared(residuals)).unwrap_or(f64::INFINITY);
        self.threshold_for(median_sq, residuals.len())
    }

    fn is_good_enough(&self, best: &Score) -> bool {
        -best.value <= self.stop_threshold * self.stop_threshold
    }

    /// The robust threshold grows with the candidate's own median, so its
    /// inlier count is trusted up to the breakdown point only.
    fn termination_inlier_count(&self, score: &Score, point_count: usize) -> usize {
        score.inlier_count.min(point_count / 2)
    }
}
