//! Example: Pinhole camera estimation with a progress listener
//!
//! Estimates a camera from 3D-2D correspondences with PROSAC, reports
//! progress through a listener, then refines again with a zero-skew
//! suggestion.

use georobust::estimators::{CameraSuggestions, PinholeCameraProblem};
use georobust::models::{CameraIntrinsics, PinholeCamera};
use georobust::robust::PinholeCameraRobustEstimator;
use georobust::types::{Point2, Point3};
use georobust::{EstimatorConfig, RobustEstimatorListener, RobustMethod};
use nalgebra::Rotation3;
use rand::Rng;
use rand_distr::{Distribution, Normal};

struct ProgressPrinter;

impl RobustEstimatorListener for ProgressPrinter {
    fn on_estimate_start(&mut self, _config: &mut EstimatorConfig) {
        println!("estimation started");
    }

    fn on_estimate_progress_change(&mut self, _config: &mut EstimatorConfig, progress: f32) {
        println!("  progress {:>5.1}%", progress * 100.0);
    }

    fn on_estimate_end(&mut self, _config: &mut EstimatorConfig) {
        println!("estimation finished");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Camera Pose Example ===\n");

    let truth = PinholeCamera::from_parts(
        &CameraIntrinsics {
            fx: 800.0,
            fy: 800.0,
            skew: 0.0,
            cx: 320.0,
            cy: 240.0,
        },
        &Rotation3::from_euler_angles(0.1, -0.2, 0.05),
        &Point3::new(0.5, 0.2, -10.0),
    );

    let mut rng = rand::thread_rng();
    let pixel_noise = Normal::new(0.0, 0.5)?;
    let mut world = Vec::new();
    let mut image = Vec::new();
    let mut quality = Vec::new();
    for i in 0..300 {
        let x = Point3::new(
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-1.0..2.0),
        );
        let Some(projected) = truth.project(&x) else {
            continue;
        };
        let outlier = i % 4 == 0;
        let m = if outlier {
            Point2::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0))
        } else {
            projected
                + nalgebra::Vector2::new(
                    pixel_noise.sample(&mut rng),
                    pixel_noise.sample(&mut rng),
                )
        };
        world.push(x);
        image.push(m);
        quality.push(if outlier { rng.gen_range(0.0..0.7) } else { rng.gen_range(0.3..1.0) });
    }

    let problem = PinholeCameraProblem::new(world, image)?;
    let mut estimator = PinholeCameraRobustEstimator::with_problem_and_quality_scores(
        RobustMethod::Prosac,
        problem,
        quality,
    )?
    .with_listener(Box::new(ProgressPrinter));
    estimator.config_mut().set_threshold(2.0)?;
    estimator.config_mut().set_progress_delta(0.25)?;

    let camera = estimator.estimate()?;
    let data = estimator.inliers_data().ok_or("missing inliers data")?;
    let parts = camera.decompose().ok_or("degenerate camera")?;
    println!(
        "\ninliers: {}, iterations: {}",
        data.num_inliers,
        estimator.iterations()
    );
    println!("intrinsics: {:?}", parts.intrinsics);
    println!("center: {}", parts.center);

    if let Some(problem) = estimator.problem_mut()? {
        problem.set_suggestions(CameraSuggestions {
            skewness: Some(0.0),
            aspect_ratio: Some(1.0),
            ..Default::default()
        })?;
    }
    let suggested = estimator.estimate()?;
    if let Some(parts) = suggested.decompose() {
        println!(
            "\nwith suggestions: skew {:.4}, aspect ratio {:.5}",
            parts.intrinsics.skew,
            parts.intrinsics.aspect_ratio()
        );
    }

    Ok(())
}
