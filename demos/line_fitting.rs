//! Example: Robust line fitting
//!
//! Fits `y = 2x + 1` to noisy points mixed with random outliers, once per
//! robust method.

use georobust::types::Point2;
use georobust::{estimate_line, RobustMethod, RobustSettings};
use rand::seq::SliceRandom;
use rand::Rng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Robust Line Fitting Example ===\n");

    let n_inliers = 60;
    let n_outliers = 25;
    let true_slope = 2.0;
    let true_intercept = 1.0;

    let mut rng = rand::thread_rng();
    println!("True line: y = {:.2}x + {:.2}", true_slope, true_intercept);
    println!("Generating {} inliers and {} outliers\n", n_inliers, n_outliers);

    // (point, quality): inliers tend to have better quality than outliers.
    let mut samples: Vec<(Point2, f64)> = (0..n_inliers)
        .map(|i| {
            let x = (i as f64) * 0.2 - 6.0;
            let y = true_slope * x + true_intercept + rng.gen_range(-0.3..0.3);
            (Point2::new(x, y), rng.gen_range(0.4..1.0))
        })
        .collect();
    samples.extend((0..n_outliers).map(|_| {
        let p = Point2::new(rng.gen_range(-10.0..10.0), rng.gen_range(-20.0..20.0));
        (p, rng.gen_range(0.0..0.6))
    }));
    samples.shuffle(&mut rng);

    let points: Vec<Point2> = samples.iter().map(|(p, _)| *p).collect();
    let quality: Vec<f64> = samples.iter().map(|(_, q)| *q).collect();

    for method in RobustMethod::ALL {
        let mut settings = RobustSettings::for_method(method);
        if !method.is_median_based() {
            settings.threshold = 0.5;
        }
        settings.keep_covariance = true;

        let result = estimate_line(&points, method, Some(settings), Some(&quality))?;
        let [a, b, c] = [result.model.params.x, result.model.params.y, result.model.params.z];
        println!("{method:?}:");
        println!("  line: y = {:.3}x + {:.3}", -a / b, -c / b);
        println!(
            "  inliers: {}/{} (threshold {:.3})",
            result.inliers.len(),
            points.len(),
            result.inliers_data.inlier_threshold
        );
        println!("  iterations: {}", result.iterations);
        if let Some(cov) = result.covariance {
            println!(
                "  std dev (angle, offset): ({:.2e}, {:.2e})",
                cov[(0, 0)].sqrt(),
                cov[(1, 1)].sqrt()
            );
        }
    }

    Ok(())
}
