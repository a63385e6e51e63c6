//! Exact recovery of the ground truth from contaminated synthetic data,
//! without refinement, for every method and problem.

mod common;

use common::{
    camera_scene, contaminated_line_scene, contaminated_planes_scene, homography_scene,
    is_heavy_outlier, is_outlier, line_scene, planes_scene, Contamination, POINTS,
};
use georobust::estimators::{
    HomographyProblem, LineFromPointsProblem, PinholeCameraProblem, PointFromPlanesProblem,
    Problem,
};
use georobust::{ModelAdapter, RobustEstimator, RobustMethod, RobustSettings};
use rstest::rstest;

const INLIER_TOLERANCE: f64 = 1e-5;

fn settings(method: RobustMethod, seed: u64) -> RobustSettings {
    let mut settings = RobustSettings::for_method(method).with_seed(seed);
    if !method.is_median_based() {
        settings.threshold = 1e-3;
    }
    settings.refine_result = false;
    settings
}

fn estimator<P: Problem>(
    method: RobustMethod,
    problem: P,
    quality: Vec<f64>,
    seed: u64,
) -> RobustEstimator<P> {
    RobustEstimator::with_problem_and_quality_scores(method, problem, quality)
        .and_then(|e| e.with_settings(settings(method, seed)))
        .unwrap()
}

fn assert_true_inliers_fit<P: Problem>(estimator: &RobustEstimator<P>, model: &P::Model) {
    assert_untouched_fit(estimator, model, is_outlier);
}

fn assert_untouched_fit<P: Problem>(
    estimator: &RobustEstimator<P>,
    model: &P::Model,
    outlier: Contamination,
) {
    let problem = estimator.problem().unwrap();
    assert_eq!(problem.len(), POINTS);
    let untouched: Vec<usize> = (0..POINTS).filter(|&i| !outlier(i)).collect();
    for &i in &untouched {
        let r = problem.residual(model, i);
        assert!(r <= INLIER_TOLERANCE, "correspondence {i} has residual {r}");
    }

    let data = estimator.inliers_data().unwrap();
    assert!(data.num_inliers >= untouched.len());
    let flags = data.inliers.as_ref().unwrap();
    assert!(untouched.iter().all(|&i| flags[i]));
}

#[rstest]
fn pinhole_camera_consensus(
    #[values(
        RobustMethod::Ransac,
        RobustMethod::Msac,
        RobustMethod::Lmeds,
        RobustMethod::Prosac,
        RobustMethod::Promeds
    )]
    method: RobustMethod,
) {
    let scene = camera_scene(1, 0.0);
    let (world, image) = scene.data;
    let problem = PinholeCameraProblem::new(world, image).unwrap();
    let mut estimator = estimator(method, problem, scene.quality, 10);

    let camera = estimator.estimate().unwrap();
    assert_true_inliers_fit(&estimator, &camera);
    assert!(estimator.covariance().is_none());
}

#[rstest]
fn homography_consensus(
    #[values(
        RobustMethod::Ransac,
        RobustMethod::Msac,
        RobustMethod::Lmeds,
        RobustMethod::Prosac,
        RobustMethod::Promeds
    )]
    method: RobustMethod,
) {
    let scene = homography_scene(2);
    let (sources, targets) = scene.data;
    let problem = HomographyProblem::new(sources, targets).unwrap();
    let mut estimator = estimator(method, problem, scene.quality, 20);

    let homography = estimator.estimate().unwrap();
    assert_true_inliers_fit(&estimator, &homography);
}

#[rstest]
fn point_from_planes_consensus(
    #[values(
        RobustMethod::Ransac,
        RobustMethod::Msac,
        RobustMethod::Lmeds,
        RobustMethod::Prosac,
        RobustMethod::Promeds
    )]
    method: RobustMethod,
) {
    let scene = planes_scene(3, 0.0);
    let problem = PointFromPlanesProblem::new(scene.data).unwrap();
    let mut estimator = estimator(method, problem, scene.quality, 30);

    let point = estimator.estimate().unwrap();
    assert_true_inliers_fit(&estimator, &point);
    assert!((point - scene.truth).norm() < 1e-6);
}

#[rstest]
fn line_consensus(
    #[values(
        RobustMethod::Ransac,
        RobustMethod::Msac,
        RobustMethod::Lmeds,
        RobustMethod::Prosac,
        RobustMethod::Promeds
    )]
    method: RobustMethod,
) {
    let scene = line_scene(4, 0.0);
    let problem = LineFromPointsProblem::new(scene.data).unwrap();
    let mut estimator = estimator(method, problem, scene.quality, 40);

    let line = estimator.estimate().unwrap();
    assert_true_inliers_fit(&estimator, &line);
    assert!((line.angle().sin() * scene.truth.angle().cos()
        - line.angle().cos() * scene.truth.angle().sin())
    .abs()
        < 1e-9);
}

#[rstest]
#[case(RobustMethod::Ransac)]
#[case(RobustMethod::Prosac)]
fn iteration_bound_shrinks_well_below_the_cap(#[case] method: RobustMethod) {
    let scene = line_scene(5, 0.0);
    let problem = LineFromPointsProblem::new(scene.data).unwrap();
    let mut estimator = estimator(method, problem, scene.quality, 50);

    estimator.estimate().unwrap();
    // 80% inliers and pairs: a handful of iterations reach 99% confidence.
    assert!(estimator.iterations() < 20, "{}", estimator.iterations());
}

#[rstest]
fn median_methods_recover_a_line_with_forty_percent_outliers(
    #[values(RobustMethod::Lmeds, RobustMethod::Promeds)] method: RobustMethod,
    #[values(61, 62, 63, 64)] seed: u64,
) {
    let scene = contaminated_line_scene(seed, 0.0, is_heavy_outlier);
    let problem = LineFromPointsProblem::new(scene.data).unwrap();
    let mut estimator = estimator(method, problem, scene.quality, seed);

    let line = estimator.estimate().unwrap();
    assert_untouched_fit(&estimator, &line, is_heavy_outlier);
    let data = estimator.inliers_data().unwrap();
    assert!(data.num_inliers < POINTS * 2 / 3, "{}", data.num_inliers);
}

#[rstest]
fn median_methods_recover_a_point_with_forty_percent_outliers(
    #[values(RobustMethod::Lmeds, RobustMethod::Promeds)] method: RobustMethod,
    #[values(71, 72, 73, 74)] seed: u64,
) {
    let scene = contaminated_planes_scene(seed, 0.0, is_heavy_outlier);
    let problem = PointFromPlanesProblem::new(scene.data).unwrap();
    let mut estimator = estimator(method, problem, scene.quality, seed);

    let point = estimator.estimate().unwrap();
    assert_untouched_fit(&estimator, &point, is_heavy_outlier);
    assert!((point - scene.truth).norm() < 1e-6);
}

#[test]
fn lmeds_line_survives_forty_percent_outliers_across_seeds() {
    let wrong = (0..100u64)
        .filter(|&seed| {
            let scene = contaminated_line_scene(seed, 0.0, is_heavy_outlier);
            let problem = LineFromPointsProblem::new(scene.data).unwrap();
            let mut estimator = estimator(RobustMethod::Lmeds, problem, scene.quality, seed);
            let line = estimator.estimate().unwrap();
            let problem = estimator.problem().unwrap();
            (0..POINTS)
                .filter(|&i| !is_heavy_outlier(i))
                .any(|i| problem.residual(&line, i) > INLIER_TOLERANCE)
        })
        .count();
    // 99% confidence per run, 100 runs.
    assert!(wrong <= 3, "{wrong} of 100 runs missed the line");
}
