//! Synthetic scenes shared by the integration tests.
//!
//! Every generator corrupts 20% of the correspondences (every fifth one)
//! with a large Gaussian perturbation and leaves the others exact. The line
//! and plane generators also accept a heavier [`Contamination`]. Quality
//! scores favour the untouched correspondences.

#![allow(dead_code)]

use georobust::models::{CameraIntrinsics, Homography, Line2, PinholeCamera, Plane};
use georobust::types::{Point2, Point3};
use nalgebra::{Matrix3, Rotation3, Vector3};
use rand::prelude::*;
use rand_distr::{Normal, Uniform};

pub const POINTS: usize = 500;

/// Which correspondences a scene corrupts.
pub type Contamination = fn(usize) -> bool;

/// 20% of the correspondences.
pub fn is_outlier(i: usize) -> bool {
    i % 5 == 0
}

/// 40% of the correspondences.
pub fn is_heavy_outlier(i: usize) -> bool {
    i % 5 < 2
}

pub fn quality_scores(rng: &mut StdRng, n: usize) -> Vec<f64> {
    contaminated_quality_scores(rng, n, is_outlier)
}

fn contaminated_quality_scores(rng: &mut StdRng, n: usize, outlier: Contamination) -> Vec<f64> {
    (0..n)
        .map(|i| {
            if outlier(i) {
                rng.gen_range(0.0..0.6)
            } else {
                rng.gen_range(0.4..1.0)
            }
        })
        .collect()
}

pub struct Scene<M, D> {
    pub truth: M,
    pub data: D,
    pub quality: Vec<f64>,
}

pub fn camera_truth() -> PinholeCamera {
    let intrinsics = CameraIntrinsics {
        fx: 820.0,
        fy: 800.0,
        skew: 0.0,
        cx: 320.0,
        cy: 240.0,
    };
    PinholeCamera::from_parts(
        &intrinsics,
        &Rotation3::from_euler_angles(0.1, -0.05, 0.2),
        &Point3::new(0.4, -0.3, -9.0),
    )
}

/// World points in front of the camera and their projections. `noise` adds
/// Gaussian pixel noise to the untouched projections.
pub fn camera_scene(seed: u64, noise: f64) -> Scene<PinholeCamera, (Vec<Point3>, Vec<Point2>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let truth = camera_truth();
    let xy = Uniform::new(-3.0, 3.0);
    let z = Uniform::new(-1.0, 3.0);
    let outlier = Normal::new(0.0, 60.0).unwrap();

    let mut world = Vec::with_capacity(POINTS);
    let mut image = Vec::with_capacity(POINTS);
    for i in 0..POINTS {
        let x = Point3::new(xy.sample(&mut rng), xy.sample(&mut rng), z.sample(&mut rng));
        let mut m = truth.project(&x).unwrap();
        if is_outlier(i) {
            m.x += outlier.sample(&mut rng);
            m.y += outlier.sample(&mut rng);
        } else if noise > 0.0 {
            let gaussian = Normal::new(0.0, noise).unwrap();
            m.x += gaussian.sample(&mut rng);
            m.y += gaussian.sample(&mut rng);
        }
        world.push(x);
        image.push(m);
    }
    let quality = quality_scores(&mut rng, POINTS);
    Scene {
        truth,
        data: (world, image),
        quality,
    }
}

pub fn homography_scene(seed: u64) -> Scene<Homography, (Vec<Point2>, Vec<Point2>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let truth = Homography::new(Matrix3::new(
        0.9, 0.1, 25.0, //
        -0.08, 1.05, -12.0, //
        2e-4, -1e-4, 1.0,
    ));
    let x = Uniform::new(0.0, 640.0);
    let y = Uniform::new(0.0, 480.0);
    let outlier = Normal::new(0.0, 40.0).unwrap();

    let mut sources = Vec::with_capacity(POINTS);
    let mut targets = Vec::with_capacity(POINTS);
    for i in 0..POINTS {
        let s = Point2::new(x.sample(&mut rng), y.sample(&mut rng));
        let mut t = truth.transform(&s).unwrap();
        if is_outlier(i) {
            t.x += outlier.sample(&mut rng);
            t.y += outlier.sample(&mut rng);
        }
        sources.push(s);
        targets.push(t);
    }
    let quality = quality_scores(&mut rng, POINTS);
    Scene {
        truth,
        data: (sources, targets),
        quality,
    }
}

/// Planes through a common point. `noise` shifts the untouched planes
/// along their normal.
pub fn planes_scene(seed: u64, noise: f64) -> Scene<Point3, Vec<Plane>> {
    contaminated_planes_scene(seed, noise, is_outlier)
}

pub fn contaminated_planes_scene(
    seed: u64,
    noise: f64,
    outlier: Contamination,
) -> Scene<Point3, Vec<Plane>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let truth = Point3::new(1.5, -2.0, 4.0);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let outlier_noise = Normal::new(0.0, 8.0).unwrap();

    let planes = (0..POINTS)
        .map(|i| {
            let n = Vector3::new(
                normal.sample(&mut rng),
                normal.sample(&mut rng),
                normal.sample(&mut rng),
            )
            .normalize();
            let mut plane = Plane::from_point_and_normal(&truth, &n);
            if outlier(i) {
                plane.params.w += outlier_noise.sample(&mut rng);
            } else if noise > 0.0 {
                plane.params.w += Normal::new(0.0, noise).unwrap().sample(&mut rng);
            }
            plane
        })
        .collect();
    let quality = contaminated_quality_scores(&mut rng, POINTS, outlier);
    Scene {
        truth,
        data: planes,
        quality,
    }
}

/// Points on `y = 0.5 x + 2`. `noise` perturbs the untouched points.
pub fn line_scene(seed: u64, noise: f64) -> Scene<Line2, Vec<Point2>> {
    contaminated_line_scene(seed, noise, is_outlier)
}

pub fn contaminated_line_scene(
    seed: u64,
    noise: f64,
    outlier: Contamination,
) -> Scene<Line2, Vec<Point2>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let truth = Line2::new(0.5, -1.0, 2.0).unwrap();
    let x = Uniform::new(-50.0, 50.0);
    let outlier_noise = Normal::new(0.0, 25.0).unwrap();

    let points = (0..POINTS)
        .map(|i| {
            let px = x.sample(&mut rng);
            let mut p = Point2::new(px, 0.5 * px + 2.0);
            if outlier(i) {
                p.y += outlier_noise.sample(&mut rng);
            } else if noise > 0.0 {
                p.y += Normal::new(0.0, noise).unwrap().sample(&mut rng);
            }
            p
        })
        .collect();
    let quality = contaminated_quality_scores(&mut rng, POINTS, outlier);
    Scene {
        truth,
        data: points,
        quality,
    }
}
