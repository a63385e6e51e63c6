//! Configuration types for the robust estimators.
//!
//! [`RobustSettings`] is plain data with sensible defaults per method and an
//! optional `serde` representation. [`EstimatorConfig`] wraps it with the
//! re-entrancy lock that guards an estimator while `estimate` runs: every
//! mutator checks the lock first and fails fast with
//! [`EstimatorError::Locked`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ArgumentError, EstimatorError};

pub const DEFAULT_CONFIDENCE: f64 = 0.99;
pub const DEFAULT_MAX_ITERATIONS: usize = 5000;
pub const DEFAULT_PROGRESS_DELTA: f64 = 0.05;
pub const DEFAULT_THRESHOLD: f64 = 1.0;
pub const DEFAULT_STOP_THRESHOLD: f64 = 1e-3;
pub const DEFAULT_INLIER_FACTOR: f64 = 1.5;

/// Robust estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RobustMethod {
    /// Uniform sampling, inlier-count score.
    #[default]
    Ransac,
    /// Uniform sampling, truncated quadratic cost.
    Msac,
    /// Uniform sampling, least median of squared residuals.
    Lmeds,
    /// Quality-ordered progressive sampling, inlier-count score.
    Prosac,
    /// Quality-ordered progressive sampling, median score as in LMedS.
    Promeds,
}

impl RobustMethod {
    pub const ALL: [RobustMethod; 5] = [
        RobustMethod::Ransac,
        RobustMethod::Msac,
        RobustMethod::Lmeds,
        RobustMethod::Prosac,
        RobustMethod::Promeds,
    ];

    /// Whether the method needs one quality score per correspondence.
    pub fn requires_quality_scores(self) -> bool {
        matches!(self, RobustMethod::Prosac | RobustMethod::Promeds)
    }

    /// Whether the threshold is a stop threshold on the median residual
    /// rather than a fixed inlier threshold.
    pub fn is_median_based(self) -> bool {
        matches!(self, RobustMethod::Lmeds | RobustMethod::Promeds)
    }
}

/// Tunable parameters of a robust estimation run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RobustSettings {
    /// Inlier threshold (RANSAC, MSAC, PROSAC) or stop threshold on the
    /// median residual (LMedS, PROMedS). Must be positive.
    pub threshold: f64,
    /// Desired probability in \[0, 1\] of having drawn an all-inlier sample.
    pub confidence: f64,
    /// Hard cap on the number of iterations, at least 1.
    pub max_iterations: usize,
    /// Minimum progress change in \[0, 1\] between two progress notifications.
    pub progress_delta: f64,
    /// Factor applied to the robust standard deviation of median-based methods.
    pub inlier_factor: f64,
    /// Re-estimate the best model from all its inliers.
    pub refine_result: bool,
    /// Keep the covariance of the refined parameters.
    pub keep_covariance: bool,
    /// Cheaper, slightly less accurate refinement.
    pub fast_refinement: bool,
    /// Keep the per-correspondence inlier flags of the best model.
    pub compute_and_keep_inliers: bool,
    /// Keep the per-correspondence residuals of the best model.
    pub compute_and_keep_residuals: bool,
    /// Seed of the sampling generator; entropy-seeded when `None`.
    pub seed: Option<u64>,
}

impl Default for RobustSettings {
    fn default() -> Self {
        Self::for_method(RobustMethod::default())
    }
}

impl RobustSettings {
    /// Defaults for a given method. Median-based methods get a small stop
    /// threshold, the others a unit inlier threshold.
    pub fn for_method(method: RobustMethod) -> Self {
        let threshold = if method.is_median_based() {
            DEFAULT_STOP_THRESHOLD
        } else {
            DEFAULT_THRESHOLD
        };
        Self {
            threshold,
            confidence: DEFAULT_CONFIDENCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            progress_delta: DEFAULT_PROGRESS_DELTA,
            inlier_factor: DEFAULT_INLIER_FACTOR,
            refine_result: true,
            keep_covariance: false,
            fast_refinement: false,
            compute_and_keep_inliers: true,
            compute_and_keep_residuals: true,
            seed: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ArgumentError> {
        validate_threshold(self.threshold)?;
        validate_confidence(self.confidence)?;
        validate_max_iterations(self.max_iterations)?;
        validate_progress_delta(self.progress_delta)?;
        validate_inlier_factor(self.inlier_factor)?;
        Ok(())
    }
}

fn validate_threshold(threshold: f64) -> Result<(), ArgumentError> {
    if threshold > 0.0 && threshold.is_finite() {
        Ok(())
    } else {
        Err(ArgumentError::InvalidThreshold(threshold))
    }
}

fn validate_confidence(confidence: f64) -> Result<(), ArgumentError> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(ArgumentError::InvalidConfidence(confidence))
    }
}

fn validate_max_iterations(max_iterations: usize) -> Result<(), ArgumentError> {
    if max_iterations >= 1 {
        Ok(())
    } else {
        Err(ArgumentError::InvalidMaxIterations(max_iterations))
    }
}

fn validate_progress_delta(progress_delta: f64) -> Result<(), ArgumentError> {
    if (0.0..=1.0).contains(&progress_delta) {
        Ok(())
    } else {
        Err(ArgumentError::InvalidProgressDelta(progress_delta))
    }
}

fn validate_inlier_factor(inlier_factor: f64) -> Result<(), ArgumentError> {
    if inlier_factor > 0.0 && inlier_factor.is_finite() {
        Ok(())
    } else {
        Err(ArgumentError::InvalidInlierFactor(inlier_factor))
    }
}

/// Lock-guarded configuration of an estimator.
///
/// Listener callbacks receive a mutable reference to it while `estimate`
/// runs; any mutation attempted from there is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    settings: RobustSettings,
    locked: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            settings: RobustSettings::default(),
            locked: false,
        }
    }
}

impl EstimatorConfig {
    pub fn new(settings: RobustSettings) -> Result<Self, ArgumentError> {
        settings.validate()?;
        Ok(Self {
            settings,
            locked: false,
        })
    }

    pub fn settings(&self) -> &RobustSettings {
        &self.settings
    }

    /// True while an estimation is running.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub(crate) fn check_unlocked(&self) -> Result<(), EstimatorError> {
        if self.locked {
            Err(EstimatorError::Locked)
        } else {
            Ok(())
        }
    }

    /// Replace all settings at once.
    pub fn set_settings(&mut self, settings: RobustSettings) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        validate_threshold(threshold)?;
        self.settings.threshold = threshold;
        Ok(())
    }

    pub fn set_confidence(&mut self, confidence: f64) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        validate_confidence(confidence)?;
        self.settings.confidence = confidence;
        Ok(())
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        validate_max_iterations(max_iterations)?;
        self.settings.max_iterations = max_iterations;
        Ok(())
    }

    pub fn set_progress_delta(&mut self, progress_delta: f64) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        validate_progress_delta(progress_delta)?;
        self.settings.progress_delta = progress_delta;
        Ok(())
    }

    pub fn set_inlier_factor(&mut self, inlier_factor: f64) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        validate_inlier_factor(inlier_factor)?;
        self.settings.inlier_factor = inlier_factor;
        Ok(())
    }

    pub fn set_refine_result(&mut self, refine_result: bool) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        self.settings.refine_result = refine_result;
        Ok(())
    }

    pub fn set_keep_covariance(&mut self, keep_covariance: bool) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        self.settings.keep_covariance = keep_covariance;
        Ok(())
    }

    pub fn set_fast_refinement(&mut self, fast_refinement: bool) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        self.settings.fast_refinement = fast_refinement;
        Ok(())
    }

    pub fn set_compute_and_keep_inliers(&mut self, keep: bool) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        self.settings.compute_and_keep_inliers = keep;
        Ok(())
    }

    pub fn set_compute_and_keep_residuals(&mut self, keep: bool) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        self.settings.compute_and_keep_residuals = keep;
        Ok(())
    }

    pub fn set_seed(&mut self, seed: Option<u64>) -> Result<(), EstimatorError> {
        self.check_unlocked()?;
        self.settings.seed = seed;
        Ok(())
    }
}
