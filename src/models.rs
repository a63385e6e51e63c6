//! Geometric models estimated by the robust estimators.
//!
//! These are plain value types: a candidate is produced fresh from a sample
//! and never mutated in place by the estimation loop.

use nalgebra::{Matrix3, Matrix3x4, Rotation3, Vector3, Vector4};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{Point2, Point3};
use crate::utils::rq3;

/// Planar projective transformation represented by a 3x3 matrix.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Map a point through the transformation. Returns `None` for points
    /// sent to infinity.
    pub fn transform(&self, point: &Point2) -> Option<Point2> {
        let p = self.h * point.to_homogeneous();
        if p.z.abs() < 1e-12 {
            return None;
        }
        Some(Point2::new(p.x / p.z, p.y / p.z))
    }

    /// Same transformation scaled so that its Frobenius norm is one.
    pub fn normalized(&self) -> Self {
        let norm = self.h.norm();
        if norm > 0.0 {
            Self::new(self.h / norm)
        } else {
            self.clone()
        }
    }
}

/// 2D line `a x + b y + c = 0` with `a² + b² = 1`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Line2 {
    pub params: Vector3<f64>,
}

impl Line2 {
    /// Build a line from raw coefficients, normalizing the normal vector.
    /// Returns `None` if `(a, b)` vanishes.
    pub fn new(a: f64, b: f64, c: f64) -> Option<Self> {
        let norm = (a * a + b * b).sqrt();
        if !norm.is_finite() || norm < 1e-12 {
            return None;
        }
        Some(Self {
            params: Vector3::new(a / norm, b / norm, c / norm),
        })
    }

    /// Line through two distinct points.
    pub fn through(p: &Point2, q: &Point2) -> Option<Self> {
        let l = p.to_homogeneous().cross(&q.to_homogeneous());
        Self::new(l.x, l.y, l.z)
    }

    /// Angle of the unit normal.
    pub fn angle(&self) -> f64 {
        self.params.y.atan2(self.params.x)
    }

    pub fn signed_distance(&self, point: &Point2) -> f64 {
        self.params.x * point.x + self.params.y * point.y + self.params.z
    }

    pub fn distance(&self, point: &Point2) -> f64 {
        self.signed_distance(point).abs()
    }
}

/// Plane `a x + b y + c z + d = 0`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plane {
    pub params: Vector4<f64>,
}

impl Plane {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            params: Vector4::new(a, b, c, d),
        }
    }

    /// Plane through `point` orthogonal to `normal`.
    pub fn from_point_and_normal(point: &Point3, normal: &Vector3<f64>) -> Self {
        Self::new(normal.x, normal.y, normal.z, -normal.dot(&point.coords))
    }

    pub fn normal(&self) -> Vector3<f64> {
        self.params.xyz()
    }

    /// Same plane with a unit normal. Degenerate planes are returned unchanged.
    pub fn normalized(&self) -> Self {
        let norm = self.normal().norm();
        if norm > 0.0 {
            Self {
                params: self.params / norm,
            }
        } else {
            self.clone()
        }
    }

    pub fn signed_distance(&self, point: &Point3) -> f64 {
        let norm = self.normal().norm();
        (self.normal().dot(&point.coords) + self.params.w) / norm
    }

    pub fn distance(&self, point: &Point3) -> f64 {
        self.signed_distance(point).abs()
    }
}

/// Intrinsic parameters of a pinhole camera.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub skew: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Read the parameters from an upper-triangular matrix with `k[(2, 2)] == 1`.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            skew: k[(0, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    /// Vertical over horizontal focal length.
    pub fn aspect_ratio(&self) -> f64 {
        self.fy / self.fx
    }

    pub fn principal_point(&self) -> Point2 {
        Point2::new(self.cx, self.cy)
    }
}

/// Pinhole camera split into intrinsics, orientation and center.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraDecomposition {
    pub intrinsics: CameraIntrinsics,
    pub rotation: Rotation3<f64>,
    pub center: Point3,
}

/// Pinhole camera represented by its 3x4 projection matrix `P = K [R | -R C]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinholeCamera {
    pub p: Matrix3x4<f64>,
}

impl PinholeCamera {
    pub fn new(p: Matrix3x4<f64>) -> Self {
        Self { p }
    }

    pub fn from_parts(
        intrinsics: &CameraIntrinsics,
        rotation: &Rotation3<f64>,
        center: &Point3,
    ) -> Self {
        let r = rotation.matrix();
        let t = -(r * center.coords);
        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(r);
        rt.set_column(3, &t);
        Self::new(intrinsics.matrix() * rt)
    }

    /// Project a world point. Returns `None` for points on the principal plane.
    pub fn project(&self, point: &Point3) -> Option<Point2> {
        let x = self.p * point.to_homogeneous();
        if x.z.abs() < 1e-12 {
            return None;
        }
        Some(Point2::new(x.x / x.z, x.y / x.z))
    }

    /// Same camera scaled so that its Frobenius norm is one.
    pub fn normalized(&self) -> Self {
        let norm = self.p.norm();
        if norm > 0.0 {
            Self::new(self.p / norm)
        } else {
            self.clone()
        }
    }

    /// Split `P` into `K`, `R` and the camera center using an RQ decomposition
    /// of its left 3x3 block. `K` is scaled so that `K[(2, 2)] == 1` and has a
    /// positive diagonal.
    pub fn decompose(&self) -> Option<CameraDecomposition> {
        let mut p = self.p;
        let mut m = p.fixed_view::<3, 3>(0, 0).into_owned();
        let det = m.determinant();
        if !det.is_finite() || det.abs() <= f64::EPSILON * m.norm().powi(3) {
            return None;
        }
        if det < 0.0 {
            p = -p;
            m = -m;
        }

        let (k, r) = rq3(&m);
        let k22 = k[(2, 2)];
        if k22.abs() < f64::EPSILON {
            return None;
        }
        let center = -(m.try_inverse()? * p.column(3));

        Some(CameraDecomposition {
            intrinsics: CameraIntrinsics::from_matrix(&(k / k22)),
            rotation: Rotation3::from_matrix_unchecked(r),
            center: Point3::from(center),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_camera() -> (CameraIntrinsics, Rotation3<f64>, Point3) {
        let intrinsics = CameraIntrinsics {
            fx: 800.0,
            fy: 780.0,
            skew: 0.5,
            cx: 320.0,
            cy: 240.0,
        };
        let rotation = Rotation3::from_euler_angles(0.1, -0.2, 0.3);
        let center = Point3::new(0.5, -1.0, -10.0);
        (intrinsics, rotation, center)
    }

    #[test]
    fn camera_decomposition_recovers_parts() {
        let (intrinsics, rotation, center) = sample_camera();
        let camera = PinholeCamera::from_parts(&intrinsics, &rotation, &center);

        // Arbitrary negative scale must not change the decomposition.
        let scaled = PinholeCamera::new(camera.p * -0.003);
        let parts = scaled.decompose().expect("decomposable camera");

        assert_relative_eq!(parts.intrinsics.fx, intrinsics.fx, epsilon = 1e-6);
        assert_relative_eq!(parts.intrinsics.fy, intrinsics.fy, epsilon = 1e-6);
        assert_relative_eq!(parts.intrinsics.skew, intrinsics.skew, epsilon = 1e-6);
        assert_relative_eq!(parts.intrinsics.cx, intrinsics.cx, epsilon = 1e-6);
        assert_relative_eq!(parts.intrinsics.cy, intrinsics.cy, epsilon = 1e-6);
        assert_relative_eq!(parts.rotation.matrix(), rotation.matrix(), epsilon = 1e-9);
        assert_relative_eq!(parts.center, center, epsilon = 1e-9);
    }

    #[test]
    fn camera_projects_in_front_points() {
        let (intrinsics, rotation, center) = sample_camera();
        let camera = PinholeCamera::from_parts(&intrinsics, &rotation, &center);
        let world = Point3::new(0.2, 0.1, 1.0);
        let projected = camera.project(&world).unwrap();

        let cam = rotation * (world - center);
        let expected = intrinsics.matrix() * cam;
        assert_relative_eq!(projected.x, expected.x / expected.z, epsilon = 1e-9);
        assert_relative_eq!(projected.y, expected.y / expected.z, epsilon = 1e-9);
    }

    #[test]
    fn line_through_points_is_normalized() {
        let line = Line2::through(&Point2::new(0.0, 1.0), &Point2::new(2.0, 1.0)).unwrap();
        assert_relative_eq!(line.params.xy().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(line.distance(&Point2::new(5.0, 4.0)), 3.0, epsilon = 1e-12);
        assert!(Line2::through(&Point2::new(1.0, 1.0), &Point2::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn plane_distance_ignores_scale() {
        let plane = Plane::new(0.0, 0.0, 2.0, -4.0);
        assert_relative_eq!(plane.signed_distance(&Point3::new(3.0, 1.0, 5.0)), 3.0);
        assert_relative_eq!(plane.normalized().params.w, -2.0);
    }

    #[test]
    fn homography_maps_points() {
        let h = Homography::new(Matrix3::new(2.0, 0.0, 1.0, 0.0, 2.0, -1.0, 0.0, 0.0, 1.0));
        let p = h.transform(&Point2::new(1.0, 1.0)).unwrap();
        assert_relative_eq!(p, Point2::new(3.0, 1.0));
    }
}
