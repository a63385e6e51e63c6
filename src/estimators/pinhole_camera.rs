//! Pinhole camera from 3D-2D point correspondences.

use nalgebra::{DMatrix, DVector, Matrix3x4, Rotation3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::core::ModelAdapter;
use crate::error::{ArgumentError, RefinementError};
use crate::estimators::{check_correspondences, Problem};
use crate::models::{CameraIntrinsics, PinholeCamera};
use crate::refinement::{
    ensure_inliers, levenberg_marquardt, NumericLeastSquares, Refine, RefineOptions, Refined,
};
use crate::types::{Point2, Point3};
use crate::utils::{
    normalize_points2, normalize_points3, null_vector, rotation_from_vector, rotation_to_vector,
};

/// Number of refined camera parameters:
/// `fx, fy, skew, cx, cy`, rotation vector, center.
pub const CAMERA_PARAMETERS: usize = 11;

pub const DEFAULT_SUGGESTION_WEIGHT: f64 = 1.0;

/// Soft constraints pulling the refined camera towards prior knowledge.
///
/// Every enabled (`Some`) suggestion adds residuals
/// `weight * sqrt(m) * (parameter - target)` to the refinement, where `m` is
/// the number of inliers, so the pull does not fade as inliers accumulate.
/// Penalties of several suggestions add up.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraSuggestions {
    pub skewness: Option<f64>,
    pub horizontal_focal_length: Option<f64>,
    pub vertical_focal_length: Option<f64>,
    /// Vertical over horizontal focal length.
    pub aspect_ratio: Option<f64>,
    pub principal_point: Option<Point2>,
    pub rotation: Option<Rotation3<f64>>,
    pub center: Option<Point3>,
    pub weight: f64,
}

impl Default for CameraSuggestions {
    fn default() -> Self {
        Self {
            skewness: None,
            horizontal_focal_length: None,
            vertical_focal_length: None,
            aspect_ratio: None,
            principal_point: None,
            rotation: None,
            center: None,
            weight: DEFAULT_SUGGESTION_WEIGHT,
        }
    }
}

impl CameraSuggestions {
    /// True when no suggestion is enabled.
    pub fn is_empty(&self) -> bool {
        self.residual_count() == 0
    }

    fn residual_count(&self) -> usize {
        usize::from(self.skewness.is_some())
            + usize::from(self.horizontal_focal_length.is_some())
            + usize::from(self.vertical_focal_length.is_some())
            + usize::from(self.aspect_ratio.is_some())
            + 2 * usize::from(self.principal_point.is_some())
            + 3 * usize::from(self.rotation.is_some())
            + 3 * usize::from(self.center.is_some())
    }

    fn validate(&self) -> Result<(), ArgumentError> {
        if self.weight >= 0.0 && self.weight.is_finite() {
            Ok(())
        } else {
            Err(ArgumentError::InvalidSuggestionWeight(self.weight))
        }
    }

    fn push_residuals(&self, camera: &CameraParams, scale: f64, out: &mut Vec<f64>) {
        let w = self.weight * scale;
        let k = &camera.intrinsics;
        if let Some(target) = self.skewness {
            out.push(w * (k.skew - target));
        }
        if let Some(target) = self.horizontal_focal_length {
            out.push(w * (k.fx - target));
        }
        if let Some(target) = self.vertical_focal_length {
            out.push(w * (k.fy - target));
        }
        if let Some(target) = self.aspect_ratio {
            out.push(w * (k.aspect_ratio() - target));
        }
        if let Some(target) = self.principal_point {
            out.push(w * (k.cx - target.x));
            out.push(w * (k.cy - target.y));
        }
        if let Some(target) = self.rotation {
            let delta = rotation_to_vector(&(target.inverse() * camera.rotation));
            out.extend(delta.iter().map(|d| w * d));
        }
        if let Some(target) = self.center {
            out.extend((camera.center - target).iter().map(|d| w * d));
        }
    }
}

/// Camera split into the parameters the refinement works on.
struct CameraParams {
    intrinsics: CameraIntrinsics,
    rotation: Rotation3<f64>,
    center: Point3,
}

impl CameraParams {
    fn from_camera(camera: &PinholeCamera) -> Option<Self> {
        let parts = camera.decompose()?;
        Some(Self {
            intrinsics: parts.intrinsics,
            rotation: parts.rotation,
            center: parts.center,
        })
    }

    fn from_vector(p: &DVector<f64>) -> Self {
        Self {
            intrinsics: CameraIntrinsics {
                fx: p[0],
                fy: p[1],
                skew: p[2],
                cx: p[3],
                cy: p[4],
            },
            rotation: rotation_from_vector(&Vector3::new(p[5], p[6], p[7])),
            center: Point3::new(p[8], p[9], p[10]),
        }
    }

    fn to_vector(&self) -> DVector<f64> {
        let k = &self.intrinsics;
        let r = rotation_to_vector(&self.rotation);
        DVector::from_vec(vec![
            k.fx, k.fy, k.skew, k.cx, k.cy, r.x, r.y, r.z, self.center.x, self.center.y,
            self.center.z,
        ])
    }

    fn camera(&self) -> PinholeCamera {
        PinholeCamera::from_parts(&self.intrinsics, &self.rotation, &self.center)
    }
}

/// Pinhole camera projecting `world[i]` onto `image[i]`.
///
/// The minimal solver is a six-point DLT, optionally on Hartley normalized
/// coordinates. The residual is the reprojection error in pixels.
#[derive(Debug, Clone)]
pub struct PinholeCameraProblem {
    world: Vec<Point3>,
    image: Vec<Point2>,
    normalize_subset: bool,
    suggestions: CameraSuggestions,
}

impl PinholeCameraProblem {
    pub fn new(world: Vec<Point3>, image: Vec<Point2>) -> Result<Self, ArgumentError> {
        check_correspondences(world.len(), image.len(), Self::MIN_CORRESPONDENCES)?;
        Ok(Self {
            world,
            image,
            normalize_subset: true,
            suggestions: CameraSuggestions::default(),
        })
    }

    pub fn world_points(&self) -> &[Point3] {
        &self.world
    }

    pub fn image_points(&self) -> &[Point2] {
        &self.image
    }

    pub fn set_points(
        &mut self,
        world: Vec<Point3>,
        image: Vec<Point2>,
    ) -> Result<(), ArgumentError> {
        check_correspondences(world.len(), image.len(), Self::MIN_CORRESPONDENCES)?;
        self.world = world;
        self.image = image;
        Ok(())
    }

    pub fn normalize_subset(&self) -> bool {
        self.normalize_subset
    }

    /// Rescale the sampled points before the DLT runs.
    pub fn set_normalize_subset(&mut self, normalize: bool) {
        self.normalize_subset = normalize;
    }

    pub fn suggestions(&self) -> &CameraSuggestions {
        &self.suggestions
    }

    pub fn set_suggestions(&mut self, suggestions: CameraSuggestions) -> Result<(), ArgumentError> {
        suggestions.validate()?;
        self.suggestions = suggestions;
        Ok(())
    }

    /// Direct linear transform over the correspondences at `indices`.
    pub fn dlt(&self, indices: &[usize]) -> Option<PinholeCamera> {
        let world: Vec<Point3> = indices.iter().map(|&i| self.world[i]).collect();
        let image: Vec<Point2> = indices.iter().map(|&i| self.image[i]).collect();

        let (world, image, t_world, t_image) = if self.normalize_subset {
            let (world, t_world) = normalize_points3(&world)?;
            let (image, t_image) = normalize_points2(&image)?;
            (world, image, t_world, t_image)
        } else {
            (
                world,
                image,
                nalgebra::Matrix4::identity(),
                nalgebra::Matrix3::identity(),
            )
        };

        let mut a = DMatrix::<f64>::zeros(2 * world.len(), 12);
        for (i, (x, m)) in world.iter().zip(&image).enumerate() {
            let xh = x.to_homogeneous();
            for c in 0..4 {
                a[(2 * i, c)] = xh[c];
                a[(2 * i, 8 + c)] = -m.x * xh[c];
                a[(2 * i + 1, 4 + c)] = xh[c];
                a[(2 * i + 1, 8 + c)] = -m.y * xh[c];
            }
        }

        let p = null_vector(&a)?;
        let p_norm = Matrix3x4::from_row_slice(p.as_slice());
        let camera = PinholeCamera::new(t_image.try_inverse()? * p_norm * t_world).normalized();
        camera.decompose()?;
        Some(camera)
    }
}

impl Problem for PinholeCameraProblem {
    const MIN_CORRESPONDENCES: usize = 6;
}

impl ModelAdapter for PinholeCameraProblem {
    type Model = PinholeCamera;

    fn sample_size(&self) -> usize {
        6
    }

    fn len(&self) -> usize {
        self.world.len()
    }

    fn estimate_models(&self, sample: &[usize]) -> Vec<PinholeCamera> {
        self.dlt(sample).into_iter().collect()
    }

    fn residual(&self, model: &PinholeCamera, index: usize) -> f64 {
        model
            .project(&self.world[index])
            .map_or(f64::INFINITY, |p| (p - self.image[index]).norm())
    }
}

impl Refine for PinholeCameraProblem {
    /// Refines `fx, fy, skew, cx, cy`, the rotation vector and the center,
    /// adding the residuals of the enabled suggestions. The covariance is
    /// 11x11 over the same parameters.
    fn refine(
        &self,
        model: &PinholeCamera,
        inliers: &[usize],
        options: &RefineOptions,
    ) -> Result<Refined<PinholeCamera>, RefinementError> {
        ensure_inliers(inliers, self.sample_size())?;
        let initial = CameraParams::from_camera(model).ok_or(RefinementError::InvalidParameters)?;

        let pairs: Vec<(Point3, Point2)> = inliers
            .iter()
            .map(|&i| (self.world[i], self.image[i]))
            .collect();
        let suggestion_scale = (pairs.len() as f64).sqrt();
        let residual_count = 2 * pairs.len() + self.suggestions.residual_count();

        let problem = NumericLeastSquares::new(
            |p: &DVector<f64>| {
                let params = CameraParams::from_vector(p);
                let camera = params.camera();
                let mut r = Vec::with_capacity(residual_count);
                for (x, m) in &pairs {
                    match camera.project(x) {
                        Some(q) => {
                            r.push(q.x - m.x);
                            r.push(q.y - m.y);
                        }
                        None => r.extend([f64::INFINITY, f64::INFINITY]),
                    }
                }
                self.suggestions
                    .push_residuals(&params, suggestion_scale, &mut r);
                DVector::from_vec(r)
            },
            options.fast,
        );

        let solution = levenberg_marquardt(
            &problem,
            initial.to_vector(),
            options.max_iterations(),
            options.keep_covariance,
        )?;
        let refined = CameraParams::from_vector(&solution.params);
        Ok(Refined {
            model: refined.camera(),
            covariance: solution.covariance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> PinholeCamera {
        let intrinsics = CameraIntrinsics {
            fx: 800.0,
            fy: 760.0,
            skew: 2.0,
            cx: 320.0,
            cy: 240.0,
        };
        PinholeCamera::from_parts(
            &intrinsics,
            &Rotation3::from_euler_angles(0.05, -0.1, 0.2),
            &Point3::new(0.3, -0.2, -8.0),
        )
    }

    fn scene(camera: &PinholeCamera) -> (Vec<Point3>, Vec<Point2>) {
        let world: Vec<Point3> = (0..30)
            .map(|i| {
                let i = i as f64;
                Point3::new(
                    (i * 0.37).sin() * 2.0,
                    (i * 0.71).cos() * 1.5,
                    (i * 0.13).sin() * 1.0 + 0.5,
                )
            })
            .collect();
        let image = world.iter().map(|x| camera.project(x).unwrap()).collect();
        (world, image)
    }

    #[test]
    fn six_points_recover_the_camera() {
        let truth = camera();
        let (world, image) = scene(&truth);
        for normalize in [true, false] {
            let mut problem = PinholeCameraProblem::new(world.clone(), image.clone()).unwrap();
            problem.set_normalize_subset(normalize);
            let models = problem.estimate_models(&[0, 3, 7, 12, 18, 25]);
            assert_eq!(models.len(), 1);
            for i in 0..problem.len() {
                assert!(problem.residual(&models[0], i) < 1e-6);
            }
        }
    }

    #[test]
    fn construction_checks_count_and_sizes() {
        let truth = camera();
        let (world, image) = scene(&truth);
        assert_eq!(
            PinholeCameraProblem::new(world[..5].to_vec(), image[..5].to_vec()).unwrap_err(),
            ArgumentError::NotEnoughCorrespondences {
                required: 6,
                got: 5
            }
        );
        assert_eq!(
            PinholeCameraProblem::new(world[..10].to_vec(), image[..9].to_vec()).unwrap_err(),
            ArgumentError::SizeMismatch {
                expected: 10,
                got: 9
            }
        );
    }

    #[test]
    fn negative_suggestion_weight_is_rejected() {
        let truth = camera();
        let (world, image) = scene(&truth);
        let mut problem = PinholeCameraProblem::new(world, image).unwrap();
        let suggestions = CameraSuggestions {
            skewness: Some(0.0),
            weight: -1.0,
            ..Default::default()
        };
        assert_eq!(
            problem.set_suggestions(suggestions),
            Err(ArgumentError::InvalidSuggestionWeight(-1.0))
        );
        assert!(problem.suggestions().is_empty());
    }

    #[test]
    fn refinement_covariance_is_11x11() {
        let truth = camera();
        let (world, mut image) = scene(&truth);
        for (i, m) in image.iter_mut().enumerate() {
            m.x += if i % 2 == 0 { 0.05 } else { -0.05 };
            m.y += if i % 3 == 0 { 0.05 } else { -0.05 };
        }
        let problem = PinholeCameraProblem::new(world, image).unwrap();
        let inliers: Vec<usize> = (0..problem.len()).collect();
        let options = RefineOptions {
            fast: false,
            keep_covariance: true,
        };
        let refined = problem.refine(&truth, &inliers, &options).unwrap();
        assert_eq!(
            refined.covariance.unwrap().shape(),
            (CAMERA_PARAMETERS, CAMERA_PARAMETERS)
        );
    }

    #[test]
    fn skewness_suggestion_pulls_towards_target() {
        let truth = camera();
        let (world, image) = scene(&truth);
        let mut problem = PinholeCameraProblem::new(world, image).unwrap();
        let inliers: Vec<usize> = (0..problem.len()).collect();
        let options = RefineOptions::default();

        let skew_of = |c: &PinholeCamera| c.decompose().unwrap().intrinsics.skew;
        let without = problem.refine(&truth, &inliers, &options).unwrap();

        problem
            .set_suggestions(CameraSuggestions {
                skewness: Some(0.0),
                weight: 10.0,
                ..Default::default()
            })
            .unwrap();
        let with = problem.refine(&truth, &inliers, &options).unwrap();

        assert!(skew_of(&with.model).abs() <= skew_of(&without.model).abs());
        assert_relative_eq!(skew_of(&without.model), 2.0, epsilon = 1e-4);
    }
}
