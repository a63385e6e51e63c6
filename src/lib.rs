//! # Georobust - Robust Geometric Model Fitting
//!
//! `georobust` fits geometric models (pinhole cameras, homographies, 3D
//! points from planes, 2D lines) to correspondences contaminated with
//! outliers, using RANSAC, MSAC, LMedS, PROSAC or PROMedS, followed by an
//! optional non-linear refinement over the inliers.
//!
//! ## Quick Start
//!
//! The easiest way to use `georobust` is through the high-level API functions:
//!
//! ```rust
//! use georobust::{estimate_line, RobustMethod, RobustSettings};
//! use georobust::types::Point2;
//!
//! let mut points: Vec<Point2> = (0..20).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
//! points.push(Point2::new(3.0, 40.0));
//!
//! let settings = RobustSettings::for_method(RobustMethod::Ransac).with_seed(7);
//! let result = estimate_line(&points, RobustMethod::Ransac, Some(settings), None).unwrap();
//! assert_eq!(result.inliers.len(), 20);
//! ```
//!
//! ## Estimators
//!
//! [`RobustEstimator`](robust::RobustEstimator) keeps data, quality scores,
//! a lock-guarded configuration and a listener across runs, and exposes the
//! inliers and covariance of the last run.
//!
//! ## Extending the Library
//!
//! The engine is generic over three traits:
//!
//! - **[`ModelAdapter`](core::ModelAdapter)**: minimal solver and residual of a problem
//! - **[`Sampler`](core::Sampler)**: how minimal samples are drawn
//! - **[`Scoring`](core::Scoring)**: how candidates are ranked and inliers classified
//!
//! Problems implementing [`Refine`](refinement::Refine) as well can be
//! refined, and [`Problem`](estimators::Problem) ones plug into the façade.
//!
//! ### Example: Custom Problem
//!
//! ```rust
//! use georobust::core::{ModelAdapter, RansacTerminationCriterion, NoopObserver, RobustEngine};
//! use georobust::samplers::UniformRandomSampler;
//! use georobust::scoring::RansacScoring;
//!
//! /// Offset shared by most values.
//! struct Offset(Vec<f64>);
//!
//! impl ModelAdapter for Offset {
//!     type Model = f64;
//!
//!     fn sample_size(&self) -> usize {
//!         1
//!     }
//!
//!     fn len(&self) -> usize {
//!         self.0.len()
//!     }
//!
//!     fn estimate_models(&self, sample: &[usize]) -> Vec<f64> {
//!         vec![self.0[sample[0]]]
//!     }
//!
//!     fn residual(&self, model: &f64, index: usize) -> f64 {
//!         (self.0[index] - model).abs()
//!     }
//! }
//!
//! let data = Offset(vec![1.0, 1.0, 1.0, 7.0]);
//! let mut engine = RobustEngine::new(
//!     &data,
//!     UniformRandomSampler::from_seed(1),
//!     RansacScoring::new(0.1),
//!     RansacTerminationCriterion::new(0.99),
//!     100,
//! );
//! let result = engine.run(&mut NoopObserver).unwrap();
//! assert_eq!(result.model, 1.0);
//! ```
//!
//! ## Modules
//!
//! - **[`api`](api)**: High-level API functions for common estimation tasks
//! - **[`core`](core)**: Core traits and the generic estimation loop
//! - **[`robust`](robust)**: Estimator façade, listener and inliers data
//! - **[`estimators`](estimators)**: Built-in problems
//! - **[`samplers`](samplers)**: Uniform and progressive sampling
//! - **[`scoring`](scoring)**: RANSAC, MSAC, LMedS and PROMedS scoring
//! - **[`refinement`](refinement)**: Levenberg-Marquardt refinement and covariance
//! - **[`models`](models)**: Geometric model types
//! - **[`settings`](settings)**: Configuration types

pub mod api;
pub mod choices;
pub mod core;
pub mod error;
pub mod estimators;
pub mod models;
pub mod refinement;
pub mod robust;
pub mod samplers;
pub mod scoring;
pub mod settings;
pub mod types;
pub mod utils;

// Re-export high-level API
pub use api::{
    estimate_homography, estimate_line, estimate_pinhole_camera, estimate_point_from_planes,
    EstimationResult,
};

// Re-export core traits for easy access
pub use core::{ModelAdapter, Sampler, Scoring};
pub use refinement::Refine;

pub use error::{ArgumentError, EstimatorError};
pub use robust::{InliersData, RobustEstimator, RobustEstimatorListener};
pub use settings::{EstimatorConfig, RobustMethod, RobustSettings};
