//! Problem adapters binding concrete correspondences to the generic engine.
//!
//! Each problem owns its correspondences, knows its minimal solver and
//! residual, and refines a consensus model over its inliers:
//! - [`PinholeCameraProblem`]: camera from 3D-2D point pairs (DLT),
//! - [`HomographyProblem`]: projective 2D transform from point pairs,
//! - [`PointFromPlanesProblem`]: 3D point from intersecting planes,
//! - [`LineFromPointsProblem`]: 2D line from points.

pub mod homography;
pub mod line;
pub mod pinhole_camera;
pub mod point_from_planes;

pub use homography::HomographyProblem;
pub use line::LineFromPointsProblem;
pub use pinhole_camera::{CameraSuggestions, PinholeCameraProblem};
pub use point_from_planes::PointFromPlanesProblem;

use crate::error::ArgumentError;
use crate::refinement::Refine;

/// A problem the robust estimator façade can be built on.
pub trait Problem: Refine {
    /// Smallest number of correspondences accepted at construction.
    const MIN_CORRESPONDENCES: usize;
}

/// Validate parallel correspondence sequences: equal lengths first, then the
/// minimal count.
pub(crate) fn check_correspondences(
    first: usize,
    second: usize,
    required: usize,
) -> Result<(), ArgumentError> {
    if first != second {
        return Err(ArgumentError::SizeMismatch {
            expected: first,
            got: second,
        });
    }
    check_count(first, required)
}

pub(crate) fn check_count(got: usize, required: usize) -> Result<(), ArgumentError> {
    if got < required {
        Err(ArgumentError::NotEnoughCorrespondences { required, got })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_lengths_are_reported_before_counts() {
        assert_eq!(
            check_correspondences(10, 9, 6),
            Err(ArgumentError::SizeMismatch {
                expected: 10,
                got: 9
            })
        );
        assert_eq!(
            check_correspondences(5, 5, 6),
            Err(ArgumentError::NotEnoughCorrespondences {
                required: 6,
                got: 5
            })
        );
        assert_eq!(check_correspondences(6, 6, 6), Ok(()));
    }
}
