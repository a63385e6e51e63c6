//! Core traits and the generic robust estimation loop.
//!
//! The loop is expressed once, generically over three capabilities:
//! - a [`ModelAdapter`] turning minimal samples into candidate models and
//!   measuring residuals,
//! - a [`Sampler`] drawing the minimal samples,
//! - a [`Scoring`] policy ranking candidates and classifying final inliers.
//!
//! [`RobustEngine`] drives sampling, scoring and the adaptive iteration
//! bound, and reports its progress to a [`ProgressObserver`].

use tracing::{debug, trace};

use crate::error::EstimatorError;
use crate::scoring::Score;

/// Problem-specific glue between the engine and a minimal solver.
///
/// Implementations own (or borrow) the correspondences; indices passed to
/// the methods refer to positions in those parallel sequences.
pub trait ModelAdapter {
    /// Model type produced by this adapter.
    type Model: Clone;

    /// Size of a minimal sample.
    fn sample_size(&self) -> usize;

    /// Number of correspondences.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cheap geometric check run before the solver.
    fn is_valid_sample(&self, _sample: &[usize]) -> bool {
        true
    }

    /// Candidate models for a sample. An empty list marks a degenerate sample.
    fn estimate_models(&self, sample: &[usize]) -> Vec<Self::Model>;

    /// Non-negative error of one correspondence with respect to `model`.
    fn residual(&self, model: &Self::Model, index: usize) -> f64;

    /// Residuals of every correspondence, written into `out`.
    fn residuals(&self, model: &Self::Model, out: &mut Vec<f64>) {
        out.clear();
        out.extend((0..self.len()).map(|i| self.residual(model, i)));
    }
}

/// Sampler responsible for drawing minimal samples.
pub trait Sampler {
    /// Draw `sample_size` distinct indices of `[0, point_count)` into
    /// `out_indices`.
    ///
    /// Returns `false` if a valid sample could not be drawn (caller may retry).
    fn sample(
        &mut self,
        point_count: usize,
        sample_size: usize,
        out_indices: &mut [usize],
    ) -> bool;

    /// Forget adaptive state before a new run.
    fn reset(&mut self) {}
}

/// Scoring strategy used to rank candidates and determine inliers.
pub trait Scoring {
    /// Score the residuals of a candidate; greater is better.
    fn score(&self, residuals: &[f64]) -> Score;

    /// Threshold classifying the inliers of the winning model.
    fn inlier_threshold(&self, residuals: &[f64]) -> f64;

    /// Whether `best` is good enough to stop sampling right away.
    fn is_good_enough(&self, _best: &Score) -> bool {
        false
    }

    /// Inlier count of a new best `score` that the adaptive iteration bound
    /// may rely on.
    fn termination_inlier_count(&self, score: &Score, _point_count: usize) -> usize {
        score.inlier_count
    }
}

/// Synchronous notifications fired by [`RobustEngine::run`], in the order
/// start, then `(next_iteration, progress?)` per iteration, then end.
pub trait ProgressObserver {
    fn on_start(&mut self) {}
    fn on_end(&mut self) {}
    /// Called after each iteration with the number of iterations done so far.
    fn on_next_iteration(&mut self, _iteration: usize) {}
    /// Called when progress advanced by more than the configured delta.
    fn on_progress(&mut self, _progress: f32) {}
}

/// Observer ignoring every notification.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Inlier ratios are kept within `[MIN_INLIER_RATIO, 1 - MAX_INLIER_RATIO_GAP]`
/// so that `ln(1 - w^k)` stays finite and negative.
pub const MIN_INLIER_RATIO: f64 = 1e-6;
pub const MAX_INLIER_RATIO_GAP: f64 = 1e-9;

/// RANSAC-style termination criterion updating the iteration budget from
/// the best inlier ratio and the desired confidence.
///
/// The update rule follows the standard formula
/// `N = log(1 - confidence) / log(1 - inlier_ratio^sample_size)`.
#[derive(Debug, Clone)]
pub struct RansacTerminationCriterion {
    /// Desired confidence in \[0, 1\].
    pub confidence: f64,
}

impl RansacTerminationCriterion {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }

    /// Iterations needed to draw an all-inlier sample with the configured
    /// confidence, clamped to `[1, max_iterations]`.
    pub fn required_iterations(
        &self,
        inlier_count: usize,
        point_count: usize,
        sample_size: usize,
        max_iterations: usize,
    ) -> usize {
        if point_count == 0 {
            return max_iterations;
        }
        let ratio = (inlier_count as f64 / point_count as f64)
            .clamp(MIN_INLIER_RATIO, 1.0 - MAX_INLIER_RATIO_GAP);
        let p_good_sample = ratio.powi(sample_size as i32);

        let log_one_minus_conf = (1.0 - self.confidence).ln();
        let log_one_minus_p = (-p_good_sample).ln_1p();
        if !(log_one_minus_p < 0.0) {
            return max_iterations;
        }

        let required = (log_one_minus_conf / log_one_minus_p).ceil();
        if !required.is_finite() || required >= max_iterations as f64 {
            max_iterations
        } else {
            (required as usize).clamp(1, max_iterations)
        }
    }

    /// Shrink `max_iterations` given the inlier count of a new best
    /// candidate. Never grows it.
    pub fn check(
        &self,
        inlier_count: usize,
        point_count: usize,
        sample_size: usize,
        max_iterations: &mut usize,
    ) {
        let required =
            self.required_iterations(inlier_count, point_count, sample_size, *max_iterations);
        if required < *max_iterations {
            *max_iterations = required;
        }
    }
}

/// Outcome of a successful consensus run.
#[derive(Debug, Clone)]
pub struct ConsensusResult<M> {
    pub model: M,
    pub score: Score,
    /// Residual of every correspondence against `model`.
    pub residuals: Vec<f64>,
    /// Inlier flag of every correspondence against `model`.
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
    /// Threshold used to classify `inliers`.
    pub inlier_threshold: f64,
    pub iterations: usize,
}

impl<M> ConsensusResult<M> {
    /// Indices of the inliers.
    pub fn inlier_indices(&self) -> Vec<usize> {
        self.inliers
            .iter()
            .enumerate()
            .filter_map(|(i, &inlier)| inlier.then_some(i))
            .collect()
    }
}

/// Generic robust estimation loop.
pub struct RobustEngine<'a, A, Sa, Sc>
where
    A: ModelAdapter,
    Sa: Sampler,
    Sc: Scoring,
{
    pub adapter: &'a A,
    pub sampler: Sa,
    pub scoring: Sc,
    pub termination: RansacTerminationCriterion,
    pub max_iterations: usize,
    pub progress_delta: f32,
}

impl<'a, A, Sa, Sc> RobustEngine<'a, A, Sa, Sc>
where
    A: ModelAdapter,
    Sa: Sampler,
    Sc: Scoring,
{
    pub fn new(
        adapter: &'a A,
        sampler: Sa,
        scoring: Sc,
        termination: RansacTerminationCriterion,
        max_iterations: usize,
    ) -> Self {
        Self {
            adapter,
            sampler,
            scoring,
            termination,
            max_iterations,
            progress_delta: 0.05,
        }
    }

    pub fn with_progress_delta(mut self, progress_delta: f32) -> Self {
        self.progress_delta = progress_delta;
        self
    }

    /// Run the sampling loop and classify the inliers of the best candidate.
    ///
    /// Degenerate samples consume an iteration. Fails with
    /// [`EstimatorError::RobustEstimationFailed`] if no candidate was ever
    /// produced within the budget.
    pub fn run(
        &mut self,
        observer: &mut dyn ProgressObserver,
    ) -> Result<ConsensusResult<A::Model>, EstimatorError> {
        let point_count = self.adapter.len();
        let sample_size = self.adapter.sample_size();
        if sample_size == 0 || point_count < sample_size {
            return Err(EstimatorError::NotReady);
        }

        self.sampler.reset();
        // A single sample is possible when every point is needed.
        let mut max_iterations = if point_count == sample_size {
            1
        } else {
            self.max_iterations.max(1)
        };

        observer.on_start();

        let mut sample = vec![0usize; sample_size];
        let mut residuals = Vec::with_capacity(point_count);
        let mut best: Option<(A::Model, Score)> = None;
        let mut iteration = 0usize;
        let mut last_progress = 0.0f32;

        while iteration < max_iterations {
            iteration += 1;

            if self.sampler.sample(point_count, sample_size, &mut sample)
                && self.adapter.is_valid_sample(&sample)
            {
                let models = self.adapter.estimate_models(&sample);
                if models.is_empty() {
                    trace!(iteration, ?sample, "degenerate sample");
                }

                for model in models {
                    self.adapter.residuals(&model, &mut residuals);
                    let score = self.scoring.score(&residuals);
                    let better = match &best {
                        None => true,
                        Some((_, best_score)) => score > *best_score,
                    };
                    if better {
                        let trusted = self.scoring.termination_inlier_count(&score, point_count);
                        self.termination.check(
                            trusted,
                            point_count,
                            sample_size,
                            &mut max_iterations,
                        );
                        debug!(
                            iteration,
                            inliers = score.inlier_count,
                            value = score.value,
                            max_iterations,
                            "new best candidate"
                        );
                        best = Some((model, score));
                    }
                }
            }

            observer.on_next_iteration(iteration);

            let progress = (iteration as f32 / max_iterations as f32).min(1.0);
            if progress > last_progress && progress - last_progress >= self.progress_delta {
                last_progress = progress;
                trace!(progress, "progress");
                observer.on_progress(progress);
            }

            if let Some((_, best_score)) = &best {
                if self.scoring.is_good_enough(best_score) {
                    debug!(iteration, "stop threshold reached");
                    break;
                }
            }
        }

        let Some((model, score)) = best else {
            observer.on_end();
            return Err(EstimatorError::RobustEstimationFailed {
                iterations: iteration,
            });
        };

        self.adapter.residuals(&model, &mut residuals);
        let inlier_threshold = self.scoring.inlier_threshold(&residuals);
        let inliers: Vec<bool> = residuals.iter().map(|&r| r <= inlier_threshold).collect();
        let inlier_count = inliers.iter().filter(|&&inlier| inlier).count();

        observer.on_end();

        Ok(ConsensusResult {
            model,
            score,
            residuals,
            inliers,
            inlier_count,
            inlier_threshold,
            iterations: iteration,
        })
    }
}
