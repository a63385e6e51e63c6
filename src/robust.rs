//! Estimator façade binding a problem, its quality scores and a
//! configuration to the generic engine.
//!
//! A [`RobustEstimator`] owns everything a run needs and keeps the
//! diagnostics of the last successful `estimate` call. While `estimate`
//! runs, the configuration is locked: listeners receive it mutably, and
//! every mutator they call fails with [`EstimatorError::Locked`].

use tracing::debug;

use crate::choices::{SamplerChoice, ScoringChoice};
use crate::core::{ConsensusResult, ProgressObserver, RansacTerminationCriterion, RobustEngine};
use crate::error::{ArgumentError, EstimatorError};
use crate::estimators::{
    HomographyProblem, LineFromPointsProblem, PinholeCameraProblem, PointFromPlanesProblem,
    Problem,
};
use crate::refinement::RefineOptions;
use crate::scoring::Score;
use crate::settings::{EstimatorConfig, RobustMethod, RobustSettings};
use crate::types::Covariance;

/// Synchronous notifications of an `estimate` call, fired in the order
/// start, then `(next_iteration, progress_change?)` per iteration, then end.
///
/// Callbacks receive the locked configuration of the running estimator.
pub trait RobustEstimatorListener {
    fn on_estimate_start(&mut self, _config: &mut EstimatorConfig) {}
    fn on_estimate_end(&mut self, _config: &mut EstimatorConfig) {}
    fn on_estimate_next_iteration(&mut self, _config: &mut EstimatorConfig, _iteration: usize) {}
    fn on_estimate_progress_change(&mut self, _config: &mut EstimatorConfig, _progress: f32) {}
}

/// Inlier classification of the winning model of the last run.
#[derive(Debug, Clone, PartialEq)]
pub struct InliersData {
    /// Per-correspondence inlier flags, when kept.
    pub inliers: Option<Vec<bool>>,
    /// Per-correspondence residuals, when kept.
    pub residuals: Option<Vec<f64>>,
    pub num_inliers: usize,
    /// Threshold the inliers were classified with. Fixed for RANSAC, MSAC and
    /// PROSAC, estimated from the median for LMedS and PROMedS.
    pub inlier_threshold: f64,
}

impl InliersData {
    fn from_consensus<M>(result: &ConsensusResult<M>, settings: &RobustSettings) -> Self {
        Self {
            inliers: settings
                .compute_and_keep_inliers
                .then(|| result.inliers.clone()),
            residuals: settings
                .compute_and_keep_residuals
                .then(|| result.residuals.clone()),
            num_inliers: result.inlier_count,
            inlier_threshold: result.inlier_threshold,
        }
    }
}

struct ListenerBridge<'a> {
    listener: &'a mut Option<Box<dyn RobustEstimatorListener>>,
    config: &'a mut EstimatorConfig,
}

impl ProgressObserver for ListenerBridge<'_> {
    fn on_start(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_estimate_start(self.config);
        }
    }

    fn on_end(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_estimate_end(self.config);
        }
    }

    fn on_next_iteration(&mut self, iteration: usize) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_estimate_next_iteration(self.config, iteration);
        }
    }

    fn on_progress(&mut self, progress: f32) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_estimate_progress_change(self.config, progress);
        }
    }
}

/// Outcome of one locked run, before it is committed to the estimator.
struct RunOutput<M> {
    model: M,
    consensus: ConsensusResult<M>,
    covariance: Option<Covariance>,
}

/// Robust estimator for a problem `P`, with the method chosen at runtime.
pub struct RobustEstimator<P: Problem> {
    problem: Option<P>,
    quality_scores: Option<Vec<f64>>,
    method: RobustMethod,
    config: EstimatorConfig,
    listener: Option<Box<dyn RobustEstimatorListener>>,
    inliers_data: Option<InliersData>,
    covariance: Option<Covariance>,
    iterations: usize,
    best_score: Option<Score>,
}

pub type PinholeCameraRobustEstimator = RobustEstimator<PinholeCameraProblem>;
pub type HomographyRobustEstimator = RobustEstimator<HomographyProblem>;
pub type PointFromPlanesRobustEstimator = RobustEstimator<PointFromPlanesProblem>;
pub type LineFromPointsRobustEstimator = RobustEstimator<LineFromPointsProblem>;

fn validate_quality_scores(scores: &[f64], required: usize) -> Result<(), ArgumentError> {
    if scores.len() < required {
        return Err(ArgumentError::NotEnoughCorrespondences {
            required,
            got: scores.len(),
        });
    }
    match scores
        .iter()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
    {
        Some((index, &value)) => Err(ArgumentError::InvalidQualityScore { index, value }),
        None => Ok(()),
    }
}

impl<P: Problem> RobustEstimator<P> {
    /// Estimator without data, using the default settings of `method`.
    pub fn new(method: RobustMethod) -> Self {
        Self {
            problem: None,
            quality_scores: None,
            method,
            config: EstimatorConfig::new(RobustSettings::for_method(method)).unwrap_or_default(),
            listener: None,
            inliers_data: None,
            covariance: None,
            iterations: 0,
            best_score: None,
        }
    }

    pub fn with_problem(method: RobustMethod, problem: P) -> Self {
        Self {
            problem: Some(problem),
            ..Self::new(method)
        }
    }

    /// Estimator with quality scores only; data is supplied later.
    pub fn with_quality_scores(
        method: RobustMethod,
        quality_scores: Vec<f64>,
    ) -> Result<Self, ArgumentError> {
        validate_quality_scores(&quality_scores, P::MIN_CORRESPONDENCES)?;
        Ok(Self {
            quality_scores: Some(quality_scores),
            ..Self::new(method)
        })
    }

    pub fn with_problem_and_quality_scores(
        method: RobustMethod,
        problem: P,
        quality_scores: Vec<f64>,
    ) -> Result<Self, ArgumentError> {
        validate_quality_scores(&quality_scores, P::MIN_CORRESPONDENCES)?;
        if quality_scores.len() != problem.len() {
            return Err(ArgumentError::SizeMismatch {
                expected: problem.len(),
                got: quality_scores.len(),
            });
        }
        Ok(Self {
            problem: Some(problem),
            quality_scores: Some(quality_scores),
            ..Self::new(method)
        })
    }

    pub fn with_listener(mut self, listener: Box<dyn RobustEstimatorListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_settings(mut self, settings: RobustSettings) -> Result<Self, ArgumentError> {
        self.config = EstimatorConfig::new(settings)?;
        Ok(self)
    }

    pub fn method(&self) -> RobustMethod {
        self.method
    }

    /// Switch method, keeping the current settings.
    pub fn set_method(&mut self, method: RobustMethod) -> Result<(), EstimatorError> {
        self.config.check_unlocked()?;
        self.method = method;
        Ok(())
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Mutable configuration. Its setters reject changes while locked.
    pub fn config_mut(&mut self) -> &mut EstimatorConfig {
        &mut self.config
    }

    pub fn settings(&self) -> &RobustSettings {
        self.config.settings()
    }

    pub fn is_locked(&self) -> bool {
        self.config.is_locked()
    }

    pub fn problem(&self) -> Option<&P> {
        self.problem.as_ref()
    }

    /// Mutable access to the problem, e.g. to change its data or its
    /// suggestions.
    pub fn problem_mut(&mut self) -> Result<Option<&mut P>, EstimatorError> {
        self.config.check_unlocked()?;
        Ok(self.problem.as_mut())
    }

    pub fn set_problem(&mut self, problem: P) -> Result<(), EstimatorError> {
        self.config.check_unlocked()?;
        self.problem = Some(problem);
        Ok(())
    }

    pub fn quality_scores(&self) -> Option<&[f64]> {
        self.quality_scores.as_deref()
    }

    /// Replace the quality scores. Their length is checked against the data
    /// by [`is_ready`](Self::is_ready), not here.
    pub fn set_quality_scores(&mut self, quality_scores: Vec<f64>) -> Result<(), EstimatorError> {
        self.config.check_unlocked()?;
        validate_quality_scores(&quality_scores, P::MIN_CORRESPONDENCES)?;
        self.quality_scores = Some(quality_scores);
        Ok(())
    }

    pub fn set_listener(
        &mut self,
        listener: Option<Box<dyn RobustEstimatorListener>>,
    ) -> Result<(), EstimatorError> {
        self.config.check_unlocked()?;
        self.listener = listener;
        Ok(())
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Data present with at least the minimal count and, for the
    /// quality-driven methods, one quality score per correspondence.
    pub fn is_ready(&self) -> bool {
        let Some(problem) = &self.problem else {
            return false;
        };
        if problem.len() < problem.sample_size().max(P::MIN_CORRESPONDENCES) {
            return false;
        }
        if !self.method.requires_quality_scores() {
            return true;
        }
        self.quality_scores
            .as_ref()
            .is_some_and(|q| q.len() == problem.len())
    }

    /// Inliers of the last successful run.
    pub fn inliers_data(&self) -> Option<&InliersData> {
        self.inliers_data.as_ref()
    }

    /// Covariance of the last successful run, when refinement and
    /// covariance keeping were enabled and the refinement succeeded.
    pub fn covariance(&self) -> Option<&Covariance> {
        self.covariance.as_ref()
    }

    /// Iterations performed by the last successful run.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn best_score(&self) -> Option<Score> {
        self.best_score
    }

    /// Run the robust estimation and, if enabled, the refinement.
    ///
    /// On error the results of the previous run are left untouched.
    pub fn estimate(&mut self) -> Result<P::Model, EstimatorError> {
        self.config.check_unlocked()?;
        if !self.is_ready() {
            return Err(EstimatorError::NotReady);
        }
        let Some(problem) = self.problem.as_ref() else {
            return Err(EstimatorError::NotReady);
        };

        self.config.set_locked(true);
        let output = Self::run_locked(
            problem,
            self.method,
            self.quality_scores.as_deref(),
            &mut self.listener,
            &mut self.config,
        );
        self.config.set_locked(false);
        let output = output?;

        let settings = self.config.settings();
        self.inliers_data = Some(InliersData::from_consensus(&output.consensus, settings));
        self.covariance = output.covariance;
        self.iterations = output.consensus.iterations;
        self.best_score = Some(output.consensus.score);
        Ok(output.model)
    }

    fn run_locked(
        problem: &P,
        method: RobustMethod,
        quality_scores: Option<&[f64]>,
        listener: &mut Option<Box<dyn RobustEstimatorListener>>,
        config: &mut EstimatorConfig,
    ) -> Result<RunOutput<P::Model>, EstimatorError> {
        let settings = config.settings().clone();
        let sampler = SamplerChoice::for_method(method, quality_scores, settings.seed);
        let scoring = ScoringChoice::for_method(method, &settings, problem.sample_size());
        let mut engine = RobustEngine::new(
            problem,
            sampler,
            scoring,
            RansacTerminationCriterion::new(settings.confidence),
            settings.max_iterations,
        )
        .with_progress_delta(settings.progress_delta as f32);

        let mut bridge = ListenerBridge { listener, config };
        let consensus = engine.run(&mut bridge)?;
        debug!(
            ?method,
            iterations = consensus.iterations,
            inliers = consensus.inlier_count,
            threshold = consensus.inlier_threshold,
            "consensus reached"
        );

        let mut model = consensus.model.clone();
        let mut covariance = None;
        if settings.refine_result {
            let options = RefineOptions {
                fast: settings.fast_refinement,
                keep_covariance: settings.keep_covariance,
            };
            match problem.refine(&model, &consensus.inlier_indices(), &options) {
                Ok(refined) => {
                    model = refined.model;
                    covariance = refined.covariance.filter(|_| settings.keep_covariance);
                }
                Err(err) => debug!(%err, "refinement failed, keeping the consensus model"),
            }
        }

        Ok(RunOutput {
            model,
            consensus,
            covariance,
        })
    }
}

impl<P: Problem> Default for RobustEstimator<P> {
    fn default() -> Self {
        Self::new(RobustMethod::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModelAdapter;
    use crate::types::Point2;

    fn line_problem() -> LineFromPointsProblem {
        let mut points: Vec<Point2> = (0..40)
            .map(|i| Point2::new(i as f64, 2.0 * i as f64 - 3.0))
            .collect();
        points.extend((0..10).map(|i| Point2::new(i as f64 * 3.1, 50.0 + i as f64 * 7.3)));
        LineFromPointsProblem::new(points).unwrap()
    }

    #[test]
    fn not_ready_without_data() {
        let mut estimator = LineFromPointsRobustEstimator::new(RobustMethod::Ransac);
        assert!(!estimator.is_ready());
        assert_eq!(estimator.estimate().unwrap_err(), EstimatorError::NotReady);
        assert!(estimator.inliers_data().is_none());
        assert!(estimator.covariance().is_none());
    }

    #[test]
    fn quality_methods_need_matching_scores() {
        let problem = line_problem();
        let n = problem.len();
        let mut estimator =
            LineFromPointsRobustEstimator::with_problem(RobustMethod::Prosac, problem);
        assert!(!estimator.is_ready());

        estimator.set_quality_scores(vec![1.0; n - 1]).unwrap();
        assert!(!estimator.is_ready());

        estimator.set_quality_scores(vec![1.0; n]).unwrap();
        assert!(estimator.is_ready());

        estimator.set_method(RobustMethod::Ransac).unwrap();
        estimator.set_quality_scores(vec![1.0; n - 1]).unwrap();
        assert!(estimator.is_ready());
    }

    #[test]
    fn invalid_quality_scores_are_rejected() {
        assert_eq!(
            LineFromPointsRobustEstimator::with_quality_scores(RobustMethod::Prosac, vec![1.0])
                .err(),
            Some(ArgumentError::NotEnoughCorrespondences {
                required: 2,
                got: 1
            })
        );
        assert_eq!(
            LineFromPointsRobustEstimator::with_quality_scores(
                RobustMethod::Promeds,
                vec![1.0, f64::NAN, 2.0]
            )
            .err()
            .map(|e| matches!(e, ArgumentError::InvalidQualityScore { index: 1, .. })),
            Some(true)
        );
        assert!(matches!(
            LineFromPointsRobustEstimator::with_problem_and_quality_scores(
                RobustMethod::Prosac,
                line_problem(),
                vec![1.0; 3]
            ),
            Err(ArgumentError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn estimate_fills_results() {
        let settings = RobustSettings::for_method(RobustMethod::Msac)
            .with_threshold(1e-3)
            .with_seed(11);
        let mut estimator =
            LineFromPointsRobustEstimator::with_problem(RobustMethod::Msac, line_problem())
                .with_settings(settings)
                .unwrap();
        let line = estimator.estimate().unwrap();
        assert!(!estimator.is_locked());

        let data = estimator.inliers_data().unwrap();
        assert_eq!(data.num_inliers, 40);
        assert_eq!(data.inliers.as_ref().unwrap().len(), 50);
        assert_eq!(data.residuals.as_ref().unwrap().len(), 50);
        assert!(estimator.iterations() >= 1);
        assert_eq!(estimator.best_score().unwrap().inlier_count, 40);
        assert!(line.distance(&Point2::new(10.0, 17.0)) < 1e-6);
        // Covariance is opt-in.
        assert!(estimator.covariance().is_none());
    }

    #[test]
    fn keep_flags_drop_arrays() {
        let mut estimator =
            LineFromPointsRobustEstimator::with_problem(RobustMethod::Ransac, line_problem());
        let config = estimator.config_mut();
        config.set_threshold(1e-3).unwrap();
        config.set_seed(Some(5)).unwrap();
        config.set_compute_and_keep_inliers(false).unwrap();
        config.set_compute_and_keep_residuals(false).unwrap();
        estimator.estimate().unwrap();

        let data = estimator.inliers_data().unwrap();
        assert!(data.inliers.is_none());
        assert!(data.residuals.is_none());
        assert_eq!(data.num_inliers, 40);
    }
}
