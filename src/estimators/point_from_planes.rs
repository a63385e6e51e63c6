//! 3D point as the common intersection of planes.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Matrix4x3, Vector3, Vector4};

use crate::core::ModelAdapter;
use crate::error::{ArgumentError, RefinementError};
use crate::estimators::{check_count, Problem};
use crate::models::Plane;
use crate::refinement::{
    ensure_inliers, levenberg_marquardt, NumericLeastSquares, Refine, RefineOptions, Refined,
};
use crate::types::{Covariance, Point3};

/// Point shared by a set of planes.
///
/// Three planes in general position meet in a single point; the residual of
/// a plane is its distance to the candidate point.
#[derive(Debug, Clone)]
pub struct PointFromPlanesProblem {
    planes: Vec<Plane>,
    homogeneous_covariance: bool,
}

impl PointFromPlanesProblem {
    pub fn new(planes: Vec<Plane>) -> Result<Self, ArgumentError> {
        check_count(planes.len(), Self::MIN_CORRESPONDENCES)?;
        Ok(Self {
            planes: planes.iter().map(Plane::normalized).collect(),
            homogeneous_covariance: false,
        })
    }

    /// Planes with unit normals.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn set_planes(&mut self, planes: Vec<Plane>) -> Result<(), ArgumentError> {
        check_count(planes.len(), Self::MIN_CORRESPONDENCES)?;
        self.planes = planes.iter().map(Plane::normalized).collect();
        Ok(())
    }

    pub fn homogeneous_covariance(&self) -> bool {
        self.homogeneous_covariance
    }

    /// Report the covariance of the unit-norm homogeneous point (4x4)
    /// instead of the inhomogeneous one (3x3).
    pub fn set_homogeneous_covariance(&mut self, homogeneous: bool) {
        self.homogeneous_covariance = homogeneous;
    }

    /// Least-squares intersection of the planes at `indices`.
    pub fn intersect(&self, indices: &[usize]) -> Option<Point3> {
        if indices.len() < Self::MIN_CORRESPONDENCES {
            return None;
        }
        if indices.len() == Self::MIN_CORRESPONDENCES {
            let a = Matrix3::from_rows(&[
                self.planes[indices[0]].normal().transpose(),
                self.planes[indices[1]].normal().transpose(),
                self.planes[indices[2]].normal().transpose(),
            ]);
            // Normals are unit length, so |det| is scale free.
            if a.determinant().abs() < 1e-10 {
                return None;
            }
            let b = Vector3::new(
                -self.planes[indices[0]].params.w,
                -self.planes[indices[1]].params.w,
                -self.planes[indices[2]].params.w,
            );
            return a.lu().solve(&b).map(Point3::from);
        }

        let mut a = DMatrix::<f64>::zeros(indices.len(), 3);
        let mut b = DVector::<f64>::zeros(indices.len());
        for (row, &i) in indices.iter().enumerate() {
            let plane = &self.planes[i];
            a.set_row(row, &plane.normal().transpose());
            b[row] = -plane.params.w;
        }
        let svd = a.svd(true, true);
        let smallest = svd.singular_values.min();
        let largest = svd.singular_values.max();
        if !(largest > 0.0) || smallest / largest < 1e-10 {
            return None;
        }
        let x = svd.solve(&b, 1e-12).ok()?;
        Some(Point3::new(x[0], x[1], x[2]))
    }

    /// First-order propagation of a 3x3 covariance of `point` to the
    /// homogeneous unit-norm vector `(x, y, z, 1) / |(x, y, z, 1)|`.
    fn homogeneous_covariance_of(point: &Point3, covariance: &Covariance) -> Covariance {
        let v = Vector4::new(point.x, point.y, point.z, 1.0);
        let norm = v.norm();
        let h = v / norm;
        let projector = (Matrix4::identity() - h * h.transpose()) / norm;
        let jac: Matrix4x3<f64> = projector.fixed_columns::<3>(0).into_owned();

        let c3 = Matrix3::from_iterator(covariance.iter().copied());
        let c4 = jac * c3 * jac.transpose();
        DMatrix::from_iterator(4, 4, c4.iter().copied())
    }
}

impl Problem for PointFromPlanesProblem {
    const MIN_CORRESPONDENCES: usize = 3;
}

impl ModelAdapter for PointFromPlanesProblem {
    type Model = Point3;

    fn sample_size(&self) -> usize {
        3
    }

    fn len(&self) -> usize {
        self.planes.len()
    }

    fn estimate_models(&self, sample: &[usize]) -> Vec<Point3> {
        self.intersect(sample).into_iter().collect()
    }

    fn residual(&self, model: &Point3, index: usize) -> f64 {
        self.planes[index].distance(model)
    }
}

impl Refine for PointFromPlanesProblem {
    fn refine(
        &self,
        model: &Point3,
        inliers: &[usize],
        options: &RefineOptions,
    ) -> Result<Refined<Point3>, RefinementError> {
        ensure_inliers(inliers, self.sample_size())?;
        let planes: Vec<&Plane> = inliers.iter().map(|&i| &self.planes[i]).collect();

        let problem = NumericLeastSquares::new(
            |p: &DVector<f64>| {
                let x = Point3::new(p[0], p[1], p[2]);
                DVector::from_iterator(planes.len(), planes.iter().map(|pl| pl.signed_distance(&x)))
            },
            options.fast,
        );
        let start = self.intersect(inliers).unwrap_or(*model);
        let solution = levenberg_marquardt(
            &problem,
            DVector::from_column_slice(start.coords.as_slice()),
            options.max_iterations(),
            options.keep_covariance,
        )?;

        let point = Point3::new(solution.params[0], solution.params[1], solution.params[2]);
        let covariance = solution.covariance.map(|c| {
            if self.homogeneous_covariance {
                Self::homogeneous_covariance_of(&point, &c)
            } else {
                c
            }
        });
        Ok(Refined {
            model: point,
            covariance,
        })
    }
}
