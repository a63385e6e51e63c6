//! Miscellaneous utilities shared by the samplers and the problem adapters.
//!
//! The random generator is a thin wrapper around `rand` that can be seeded
//! for reproducible runs. The remaining helpers are small linear-algebra
//! routines used by the minimal solvers.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Rotation3, Vector2, Vector3};
use rand::distributions::uniform::SampleUniform;
use rand::distributions::Uniform;
use rand::prelude::*;

use crate::types::{Point2, Point3};

/// Uniform integer random-number generator.
///
/// By default this uses an entropy-seeded RNG, but test code can construct
/// it from a fixed seed for reproducible behavior.
pub struct UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    rng: StdRng,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Default for UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    /// Construct with a random seed (suitable for production use).
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Construct with a fixed seed (useful for tests).
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            _marker: std::marker::PhantomData,
        }
    }

    /// Seeded when `seed` is given, entropy-seeded otherwise.
    pub fn with_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::new(),
        }
    }

    /// Generate a set of unique random integers in `[min, max]` into `out`.
    ///
    /// Rejection sampling, suitable for the small sample sizes of minimal
    /// solvers. The range must hold at least `out.len()` values.
    pub fn gen_unique(&mut self, out: &mut [T], min: T, max: T)
    where
        T: Eq,
    {
        let dist = Uniform::new_inclusive(min, max);
        for i in 0..out.len() {
            loop {
                let candidate = self.rng.sample(&dist);
                if out[..i].iter().all(|&v| v != candidate) {
                    out[i] = candidate;
                    break;
                }
            }
        }
    }
}

/// Right singular vector associated with the smallest singular value of `a`,
/// i.e. the least-squares solution of `a x = 0` with `|x| = 1`.
///
/// Matrices with fewer rows than columns are padded with zero rows so that
/// the full right basis is available.
pub fn null_vector(a: &DMatrix<f64>) -> Option<DVector<f64>> {
    let cols = a.ncols();
    if cols == 0 || a.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let padded = if a.nrows() < cols {
        let mut m = DMatrix::<f64>::zeros(cols, cols);
        m.rows_mut(0, a.nrows()).copy_from(a);
        m
    } else {
        a.clone()
    };

    let svd = padded.svd(false, true);
    let v_t = svd.v_t?;
    let (idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.total_cmp(y.1))?;
    Some(v_t.row(idx).transpose())
}

/// Similarity moving the centroid of `points` to the origin with a mean
/// distance of `sqrt(2)`. Returns the transformed points and the transform.
pub fn normalize_points2(points: &[Point2]) -> Option<(Vec<Point2>, Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let mean_dist = points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    if !mean_dist.is_finite() || mean_dist < 1e-12 {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(
        s, 0.0, -s * centroid.x, //
        0.0, s, -s * centroid.y, //
        0.0, 0.0, 1.0,
    );
    let normalized = points
        .iter()
        .map(|p| Point2::from((p.coords - centroid) * s))
        .collect();
    Some((normalized, t))
}

/// 3D counterpart of [`normalize_points2`] with a mean distance of `sqrt(3)`.
pub fn normalize_points3(points: &[Point3]) -> Option<(Vec<Point3>, Matrix4<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
    let mean_dist = points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    if !mean_dist.is_finite() || mean_dist < 1e-12 {
        return None;
    }

    let s = 3.0_f64.sqrt() / mean_dist;
    let mut t = Matrix4::identity() * s;
    t[(3, 3)] = 1.0;
    t.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-s * centroid));
    let normalized = points
        .iter()
        .map(|p| Point3::from((p.coords - centroid) * s))
        .collect();
    Some((normalized, t))
}

/// RQ decomposition `m = k * r` with `k` upper triangular with a non-negative
/// diagonal and `r` orthogonal.
pub fn rq3(m: &Matrix3<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    let flip = Matrix3::new(
        0.0, 0.0, 1.0, //
        0.0, 1.0, 0.0, //
        1.0, 0.0, 0.0,
    );
    let qr = (flip * m).transpose().qr();
    let mut k = flip * qr.r().transpose() * flip;
    let mut r = flip * qr.q().transpose();

    for i in 0..3 {
        if k[(i, i)] < 0.0 {
            k.column_mut(i).neg_mut();
            r.row_mut(i).neg_mut();
        }
    }
    (k, r)
}

/// Rotation from a rotation vector (axis scaled by angle).
pub fn rotation_from_vector(v: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::new(*v)
}

/// Rotation vector (axis scaled by angle) of a rotation.
pub fn rotation_to_vector(r: &Rotation3<f64>) -> Vector3<f64> {
    r.scaled_axis()
}

/// Median of a slice, or `None` if it is empty. Reorders the slice.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    Some(*m)
}
