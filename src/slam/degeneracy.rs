use std::fmt;
use crate::Float;

/**
 * Numerical conditions that cost a frame (or a single landmark) its update but leave the run intact.
 */
#[derive(Debug,Clone,Copy,PartialEq)]
pub enum Degeneracy {
    SingularInnovationCovariance,
    IllConditionedInnovationCovariance { ratio: Float },
    NonFiniteGain,
    PointBehindCamera { landmark: usize },
    NonPositiveDepth { landmark: usize }
}

impl Degeneracy {
    pub fn landmark(&self) -> Option<usize> {
        match self {
            Degeneracy::PointBehindCamera { landmark } | Degeneracy::NonPositiveDepth { landmark } => Some(*landmark),
            _ => None
        }
    }
}

impl fmt::Display for Degeneracy {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Degeneracy::SingularInnovationCovariance => write!(f, "innovation covariance is singular"),
            Degeneracy::IllConditionedInnovationCovariance { ratio } => write!(f, "innovation covariance is ill conditioned, pivot ratio {:e}", ratio),
            Degeneracy::NonFiniteGain => write!(f, "kalman gain is not finite"),
            Degeneracy::PointBehindCamera { landmark } => write!(f, "landmark {} projects behind the camera", landmark),
            Degeneracy::NonPositiveDepth { landmark } => write!(f, "landmark {} triangulates to a non positive depth", landmark)
        }
    }

}

impl std::error::Error for Degeneracy {}
