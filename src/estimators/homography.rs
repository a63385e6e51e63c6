//! Projective 2D transformation (homography) from point pairs.

use nalgebra::{DMatrix, DVector, Matrix3};

use crate::core::ModelAdapter;
use crate::error::{ArgumentError, RefinementError};
use crate::estimators::{check_correspondences, Problem};
use crate::models::Homography;
use crate::refinement::{
    ensure_inliers, levenberg_marquardt, NumericLeastSquares, Refine, RefineOptions, Refined,
};
use crate::types::Point2;
use crate::utils::{normalize_points2, null_vector};

/// Homography mapping `sources[i]` onto `targets[i]`.
///
/// The minimal solver is a four-point DLT, optionally run on Hartley
/// normalized coordinates. The residual is the forward transfer error
/// `|H s - t|` in target units.
#[derive(Debug, Clone)]
pub struct HomographyProblem {
    sources: Vec<Point2>,
    targets: Vec<Point2>,
    normalize_subset: bool,
}

impl HomographyProblem {
    pub fn new(sources: Vec<Point2>, targets: Vec<Point2>) -> Result<Self, ArgumentError> {
        check_correspondences(sources.len(), targets.len(), Self::MIN_CORRESPONDENCES)?;
        Ok(Self {
            sources,
            targets,
            normalize_subset: true,
        })
    }

    pub fn sources(&self) -> &[Point2] {
        &self.sources
    }

    pub fn targets(&self) -> &[Point2] {
        &self.targets
    }

    pub fn set_points(
        &mut self,
        sources: Vec<Point2>,
        targets: Vec<Point2>,
    ) -> Result<(), ArgumentError> {
        check_correspondences(sources.len(), targets.len(), Self::MIN_CORRESPONDENCES)?;
        self.sources = sources;
        self.targets = targets;
        Ok(())
    }

    pub fn normalize_subset(&self) -> bool {
        self.normalize_subset
    }

    /// Rescale the sampled points before the DLT runs.
    pub fn set_normalize_subset(&mut self, normalize: bool) {
        self.normalize_subset = normalize;
    }

    /// Direct linear transform over the correspondences at `indices`.
    pub fn dlt(&self, indices: &[usize]) -> Option<Homography> {
        let src: Vec<Point2> = indices.iter().map(|&i| self.sources[i]).collect();
        let dst: Vec<Point2> = indices.iter().map(|&i| self.targets[i]).collect();

        let (src, dst, t_src, t_dst) = if self.normalize_subset {
            let (src, t_src) = normalize_points2(&src)?;
            let (dst, t_dst) = normalize_points2(&dst)?;
            (src, dst, t_src, t_dst)
        } else {
            (src, dst, Matrix3::identity(), Matrix3::identity())
        };

        let mut a = DMatrix::<f64>::zeros(2 * src.len(), 9);
        for (i, (s, t)) in src.iter().zip(&dst).enumerate() {
            let (x, y) = (s.x, s.y);
            let (u, v) = (t.x, t.y);
            a.row_mut(2 * i)
                .copy_from_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
            a.row_mut(2 * i + 1)
                .copy_from_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
        }

        let h = null_vector(&a)?;
        let h_norm = Matrix3::from_row_slice(h.as_slice());
        let h = t_dst.try_inverse()? * h_norm * t_src;

        let model = Homography::new(h).normalized();
        if !(model.h.determinant().abs() > 1e-12) {
            return None;
        }
        Some(model)
    }

    fn has_collinear_triple(points: &[Point2]) -> bool {
        let scale = points
            .iter()
            .flat_map(|p| [p.x.abs(), p.y.abs()])
            .fold(1.0_f64, f64::max);
        let tolerance = 1e-12 * scale * scale;
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                for k in (j + 1)..points.len() {
                    let a = points[j] - points[i];
                    let b = points[k] - points[i];
                    if (a.x * b.y - a.y * b.x).abs() <= tolerance {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn homography_from_params(params: &DVector<f64>) -> Homography {
        let mut h = Matrix3::identity();
        for (k, value) in params.iter().enumerate() {
            h[(k / 3, k % 3)] = *value;
        }
        Homography::new(h)
    }
}

impl Problem for HomographyProblem {
    const MIN_CORRESPONDENCES: usize = 4;
}

impl ModelAdapter for HomographyProblem {
    type Model = Homography;

    fn sample_size(&self) -> usize {
        4
    }

    fn len(&self) -> usize {
        self.sources.len()
    }

    fn is_valid_sample(&self, sample: &[usize]) -> bool {
        let src: Vec<Point2> = sample.iter().map(|&i| self.sources[i]).collect();
        let dst: Vec<Point2> = sample.iter().map(|&i| self.targets[i]).collect();
        !Self::has_collinear_triple(&src) && !Self::has_collinear_triple(&dst)
    }

    fn estimate_models(&self, sample: &[usize]) -> Vec<Homography> {
        self.dlt(sample).into_iter().collect()
    }

    fn residual(&self, model: &Homography, index: usize) -> f64 {
        model
            .transform(&self.sources[index])
            .map_or(f64::INFINITY, |p| (p - self.targets[index]).norm())
    }
}

impl Refine for HomographyProblem {
    /// Refines the 8 free entries with `h33 = 1`. The covariance is reported
    /// over all 9 entries, with a zero last row and column.
    fn refine(
        &self,
        model: &Homography,
        inliers: &[usize],
        options: &RefineOptions,
    ) -> Result<Refined<Homography>, RefinementError> {
        ensure_inliers(inliers, self.sample_size())?;
        let h33 = model.h[(2, 2)];
        if h33.abs() < 1e-12 {
            return Err(RefinementError::InvalidParameters);
        }
        let h = model.h / h33;

        let pairs: Vec<(Point2, Point2)> = inliers
            .iter()
            .map(|&i| (self.sources[i], self.targets[i]))
            .collect();
        let problem = NumericLeastSquares::new(
            |p: &DVector<f64>| {
                let candidate = Self::homography_from_params(p);
                let mut r = DVector::<f64>::zeros(2 * pairs.len());
                for (k, (s, t)) in pairs.iter().enumerate() {
                    let (dx, dy) = candidate
                        .transform(s)
                        .map_or((f64::INFINITY, f64::INFINITY), |q| (q.x - t.x, q.y - t.y));
                    r[2 * k] = dx;
                    r[2 * k + 1] = dy;
                }
                r
            },
            options.fast,
        );

        let initial = DVector::from_iterator(8, (0..8).map(|k| h[(k / 3, k % 3)]));
        let solution = levenberg_marquardt(
            &problem,
            initial,
            options.max_iterations(),
            options.keep_covariance,
        )?;

        let covariance = solution.covariance.map(|c| {
            let mut full = DMatrix::<f64>::zeros(9, 9);
            full.view_mut((0, 0), (8, 8)).copy_from(&c);
            full
        });
        Ok(Refined {
            model: Self::homography_from_params(&solution.params),
            covariance,
        })
    }
}
