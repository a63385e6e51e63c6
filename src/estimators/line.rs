//! 2D line fitting from points.

use nalgebra::DVector;

use crate::core::ModelAdapter;
use crate::error::{ArgumentError, RefinementError};
use crate::estimators::{check_count, Problem};
use crate::models::Line2;
use crate::refinement::{
    ensure_inliers, levenberg_marquardt, NumericLeastSquares, Refine, RefineOptions, Refined,
};
use crate::types::Point2;

/// Line `a x + b y + c = 0` through 2D points.
///
/// The minimal solver joins two points; the residual is the orthogonal
/// point-to-line distance. Refinement runs over `(theta, c)` with the line
/// written as `cos(theta) x + sin(theta) y + c = 0`.
#[derive(Debug, Clone)]
pub struct LineFromPointsProblem {
    points: Vec<Point2>,
}

impl LineFromPointsProblem {
    pub fn new(points: Vec<Point2>) -> Result<Self, ArgumentError> {
        check_count(points.len(), Self::MIN_CORRESPONDENCES)?;
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn set_points(&mut self, points: Vec<Point2>) -> Result<(), ArgumentError> {
        check_count(points.len(), Self::MIN_CORRESPONDENCES)?;
        self.points = points;
        Ok(())
    }

    fn line_from_params(params: &DVector<f64>) -> Option<Line2> {
        Line2::new(params[0].cos(), params[0].sin(), params[1])
    }
}

impl Problem for LineFromPointsProblem {
    const MIN_CORRESPONDENCES: usize = 2;
}

impl ModelAdapter for LineFromPointsProblem {
    type Model = Line2;

    fn sample_size(&self) -> usize {
        2
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn is_valid_sample(&self, sample: &[usize]) -> bool {
        let d = self.points[sample[0]] - self.points[sample[1]];
        d.norm_squared() > 1e-20
    }

    fn estimate_models(&self, sample: &[usize]) -> Vec<Line2> {
        Line2::through(&self.points[sample[0]], &self.points[sample[1]])
            .into_iter()
            .collect()
    }

    fn residual(&self, model: &Line2, index: usize) -> f64 {
        model.distance(&self.points[index])
    }
}

impl Refine for LineFromPointsProblem {
    fn refine(
        &self,
        model: &Line2,
        inliers: &[usize],
        options: &RefineOptions,
    ) -> Result<Refined<Line2>, RefinementError> {
        ensure_inliers(inliers, self.sample_size())?;
        let points: Vec<Point2> = inliers.iter().map(|&i| self.points[i]).collect();

        let problem = NumericLeastSquares::new(
            |p: &DVector<f64>| {
                let (sin, cos) = p[0].sin_cos();
                DVector::from_iterator(
                    points.len(),
                    points.iter().map(|q| cos * q.x + sin * q.y + p[1]),
                )
            },
            options.fast,
        );
        let initial = DVector::from_vec(vec![model.angle(), model.params.z]);
        let solution = levenberg_marquardt(
            &problem,
            initial,
            options.max_iterations(),
            options.keep_covariance,
        )?;

        let model =
            Self::line_from_params(&solution.params).ok_or(RefinementError::InvalidParameters)?;
        Ok(Refined {
            model,
            covariance: solution.covariance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn points_on_line() -> Vec<Point2> {
        // y = 0.5 x + 1
        (0..10)
            .map(|i| {
                let x = i as f64;
                Point2::new(x, 0.5 * x + 1.0)
            })
            .collect()
    }

    #[test]
    fn minimal_sample_gives_exact_line() {
        let problem = LineFromPointsProblem::new(points_on_line()).unwrap();
        let models = problem.estimate_models(&[0, 5]);
        assert_eq!(models.len(), 1);
        for i in 0..problem.len() {
            assert!(problem.residual(&models[0], i) < 1e-12);
        }
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let problem =
            LineFromPointsProblem::new(vec![Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)])
                .unwrap();
        assert!(!problem.is_valid_sample(&[0, 1]));
        assert!(problem.estimate_models(&[0, 1]).is_empty());
    }

    #[test]
    fn single_point_is_rejected() {
        assert_eq!(
            LineFromPointsProblem::new(vec![Point2::origin()]).unwrap_err(),
            ArgumentError::NotEnoughCorrespondences {
                required: 2,
                got: 1
            }
        );
    }

    #[test]
    fn refinement_reduces_error_and_yields_covariance() {
        let mut points = points_on_line();
        for (i, p) in points.iter_mut().enumerate() {
            p.y += if i % 2 == 0 { 0.01 } else { -0.01 };
        }
        let problem = LineFromPointsProblem::new(points).unwrap();
        let rough = Line2::through(&problem.points()[0], &problem.points()[9]).unwrap();
        let inliers: Vec<usize> = (0..problem.len()).collect();
        let options = RefineOptions {
            fast: false,
            keep_covariance: true,
        };

        let refined = problem.refine(&rough, &inliers, &options).unwrap();
        let cost = |l: &Line2| inliers.iter().map(|&i| problem.residual(l, i).powi(2)).sum::<f64>();
        assert!(cost(&refined.model) <= cost(&rough));

        let cov = refined.covariance.unwrap();
        assert_eq!(cov.shape(), (2, 2));
        assert_relative_eq!(refined.model.params.xy().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn refinement_needs_two_inliers() {
        let problem = LineFromPointsProblem::new(points_on_line()).unwrap();
        let line = Line2::through(&problem.points()[0], &problem.points()[1]).unwrap();
        let err = problem
            .refine(&line, &[3], &RefineOptions::default())
            .unwrap_err();
        assert!(matches!(err, RefinementError::NotEnoughInliers { .. }));
    }
}
