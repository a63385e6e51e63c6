//! High-level Rust API.
//!
//! One-shot functions building a [`RobustEstimator`] for a given problem,
//! running it once and collecting every diagnostic of the run.

use crate::error::EstimatorError;
use crate::estimators::{
    HomographyProblem, LineFromPointsProblem, PinholeCameraProblem, PointFromPlanesProblem,
    Problem,
};
use crate::models::{Homography, Line2, PinholeCamera, Plane};
use crate::robust::{InliersData, RobustEstimator};
use crate::scoring::Score;
use crate::settings::{RobustMethod, RobustSettings};
use crate::types::{Covariance, Point2, Point3};

/// Result of a robust estimation.
#[derive(Debug, Clone)]
pub struct EstimationResult<M> {
    /// The estimated (and possibly refined) model.
    pub model: M,
    /// Indices of inlier correspondences.
    pub inliers: Vec<usize>,
    /// Full inlier classification, as kept by the settings.
    pub inliers_data: InliersData,
    /// Covariance of the refined parameters, if requested and available.
    pub covariance: Option<Covariance>,
    /// Score of the winning candidate.
    pub score: Score,
    /// Number of iterations performed.
    pub iterations: usize,
}

fn run<P: Problem>(
    problem: P,
    method: RobustMethod,
    settings: Option<RobustSettings>,
    quality_scores: Option<&[f64]>,
) -> Result<EstimationResult<P::Model>, EstimatorError> {
    let point_count = problem.len();
    let mut estimator = match quality_scores {
        Some(q) => RobustEstimator::with_problem_and_quality_scores(method, problem, q.to_vec())?,
        None => RobustEstimator::with_problem(method, problem),
    };
    if let Some(settings) = settings {
        estimator.config_mut().set_settings(settings)?;
    }
    // Inlier indices are always reported, whatever the settings keep.
    let keep_inliers = estimator.settings().compute_and_keep_inliers;
    estimator.config_mut().set_compute_and_keep_inliers(true)?;

    let model = estimator.estimate()?;
    let mut inliers_data = estimator
        .inliers_data()
        .cloned()
        .ok_or(EstimatorError::NotReady)?;
    let flags = inliers_data
        .inliers
        .clone()
        .unwrap_or_else(|| vec![false; point_count]);
    let inliers = flags
        .iter()
        .enumerate()
        .filter_map(|(i, &inlier)| inlier.then_some(i))
        .collect();
    if !keep_inliers {
        inliers_data.inliers = None;
    }

    Ok(EstimationResult {
        model,
        inliers,
        inliers_data,
        covariance: estimator.covariance().cloned(),
        score: estimator.best_score().unwrap_or(Score::new(0, f64::NEG_INFINITY)),
        iterations: estimator.iterations(),
    })
}

/// Estimate a pinhole camera from 3D world points and their 2D projections.
///
/// # Arguments
/// * `world` - 3D points
/// * `image` - Their projections, in pixels
/// * `method` - Robust method
/// * `settings` - Optional settings (method defaults if None)
/// * `quality_scores` - One score per correspondence, needed by PROSAC and PROMedS
pub fn estimate_pinhole_camera(
    world: &[Point3],
    image: &[Point2],
    method: RobustMethod,
    settings: Option<RobustSettings>,
    quality_scores: Option<&[f64]>,
) -> Result<EstimationResult<PinholeCamera>, EstimatorError> {
    let problem = PinholeCameraProblem::new(world.to_vec(), image.to_vec())?;
    run(problem, method, settings, quality_scores)
}

/// Estimate a homography mapping `sources` onto `targets`.
pub fn estimate_homography(
    sources: &[Point2],
    targets: &[Point2],
    method: RobustMethod,
    settings: Option<RobustSettings>,
    quality_scores: Option<&[f64]>,
) -> Result<EstimationResult<Homography>, EstimatorError> {
    let problem = HomographyProblem::new(sources.to_vec(), targets.to_vec())?;
    run(problem, method, settings, quality_scores)
}

/// Estimate the 3D point shared by `planes`.
pub fn estimate_point_from_planes(
    planes: &[Plane],
    method: RobustMethod,
    settings: Option<RobustSettings>,
    quality_scores: Option<&[f64]>,
) -> Result<EstimationResult<Point3>, EstimatorError> {
    let problem = PointFromPlanesProblem::new(planes.to_vec())?;
    run(problem, method, settings, quality_scores)
}

/// Estimate a 2D line through `points`.
pub fn estimate_line(
    points: &[Point2],
    method: RobustMethod,
    settings: Option<RobustSettings>,
    quality_scores: Option<&[f64]>,
) -> Result<EstimationResult<Line2>, EstimatorError> {
    let problem = LineFromPointsProblem::new(points.to_vec())?;
    run(problem, method, settings, quality_scores)
}
