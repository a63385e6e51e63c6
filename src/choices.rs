//! Lightweight runtime wrappers exposing the built-in samplers and scorers
//! via enums, so that a [`RobustMethod`] chosen at runtime maps onto the
//! fully generic [`RobustEngine`](crate::core::RobustEngine).

use crate::core::{Sampler, Scoring};
use crate::samplers::{ProsacSampler, UniformRandomSampler};
use crate::scoring::{LmedsScoring, MsacScoring, RansacScoring, Score};
use crate::settings::{RobustMethod, RobustSettings};

/// Runtime sampler selection.
pub enum SamplerChoice {
    Uniform(UniformRandomSampler),
    Progressive(ProsacSampler),
}

impl SamplerChoice {
    /// Sampler used by `method`. Progressive methods fall back to uniform
    /// sampling when no quality scores are available.
    pub fn for_method(
        method: RobustMethod,
        quality_scores: Option<&[f64]>,
        seed: Option<u64>,
    ) -> Self {
        match (method.requires_quality_scores(), quality_scores) {
            (true, Some(quality)) => {
                SamplerChoice::Progressive(ProsacSampler::with_seed(quality, seed))
            }
            _ => SamplerChoice::Uniform(UniformRandomSampler::with_seed(seed)),
        }
    }
}

impl Sampler for SamplerChoice {
    fn sample(
        &mut self,
        point_count: usize,
        sample_size: usize,
        out_indices: &mut [usize],
    ) -> bool {
        match self {
            SamplerChoice::Uniform(s) => s.sample(point_count, sample_size, out_indices),
            SamplerChoice::Progressive(s) => s.sample(point_count, sample_size, out_indices),
        }
    }

    fn reset(&mut self) {
        match self {
            SamplerChoice::Uniform(s) => s.reset(),
            SamplerChoice::Progressive(s) => s.reset(),
        }
    }
}

/// Runtime scoring selection.
pub enum ScoringChoice {
    Ransac(RansacScoring),
    Msac(MsacScoring),
    Lmeds(LmedsScoring),
}

impl ScoringChoice {
    /// Scorer used by `method`. PROSAC ranks candidates like RANSAC and
    /// PROMedS like LMedS; their quality scores only drive the sampler.
    pub fn for_method(method: RobustMethod, settings: &RobustSettings, sample_size: usize) -> Self {
        let threshold = settings.threshold;
        let factor = settings.inlier_factor;
        match method {
            RobustMethod::Ransac | RobustMethod::Prosac => {
                ScoringChoice::Ransac(RansacScoring::new(threshold))
            }
            RobustMethod::Msac => ScoringChoice::Msac(MsacScoring::new(threshold)),
            RobustMethod::Lmeds | RobustMethod::Promeds => {
                ScoringChoice::Lmeds(LmedsScoring::new(threshold, factor, sample_size))
            }
        }
    }
}

impl Scoring for ScoringChoice {
    fn score(&self, residuals: &[f64]) -> Score {
        match self {
            ScoringChoice::Ransac(s) => s.score(residuals),
            ScoringChoice::Msac(s) => s.score(residuals),
            ScoringChoice::Lmeds(s) => s.score(residuals),
        }
    }

    fn inlier_threshold(&self, residuals: &[f64]) -> f64 {
        match self {
            ScoringChoice::Ransac(s) => s.inlier_threshold(residuals),
            ScoringChoice::Msac(s) => s.inlier_threshold(residuals),
            ScoringChoice::Lmeds(s) => s.inlier_threshold(residuals),
        }
    }

    fn is_good_enough(&self, best: &Score) -> bool {
        match self {
            ScoringChoice::Ransac(s) => s.is_good_enough(best),
            ScoringChoice::Msac(s) => s.is_good_enough(best),
            ScoringChoice::Lmeds(s) => s.is_good_enough(best),
        }
    }

    fn termination_inlier_count(&self, score: &Score, point_count: usize) -> usize {
        match self {
            ScoringChoice::Ransac(s) => s.termination_inlier_count(score, point_count),
            ScoringChoice::Msac(s) => s.termination_inlier_count(score, point_count),
            ScoringChoice::Lmeds(s) => s.termination_inlier_count(score, point_count),
        }
    }
}
