//! Sample selectors.
//!
//! Uniform sampling draws minimal samples uniformly from all
//! correspondences; progressive sampling (PROSAC) draws from a growing prefix
//! of the correspondences ordered by decreasing quality and converges to
//! uniform sampling.

pub mod prosac;
pub mod uniform;

pub use prosac::ProsacSampler;
pub use uniform::UniformRandomSampler;
