//! Shared numeric aliases.
//!
//! All geometry in the crate is `f64`. Points are `nalgebra` points so that
//! homogeneous conversions and affine helpers come for free.

use nalgebra::DMatrix;

/// 2D point (image coordinates, planar data).
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point (world coordinates).
pub type Point3 = nalgebra::Point3<f64>;

/// Square covariance matrix over a model's parameterization.
pub type Covariance = DMatrix<f64>;
