extern crate nalgebra as na;

use color_eyre::eyre::{ensure, Result};
use na::{Matrix3,Matrix4};
use serde::{Serialize, Deserialize};
use crate::Float;
use crate::numerics::pose::is_rigid_transform;

pub mod stereo;
pub mod stereo_features;

const EXTRINSIC_EPS: Float = 1e-6;

/**
 * Rectified stereo rig. The extrinsic maps the left optical frame into the body (imu) frame.
 */
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct StereoCalibration {
    pub intrinsics: Matrix3<Float>,
    pub baseline: Float,
    pub extrinsic: Matrix4<Float>
}

impl StereoCalibration {
    pub fn new(intrinsics: Matrix3<Float>, baseline: Float, extrinsic: Matrix4<Float>) -> StereoCalibration {
        StereoCalibration { intrinsics, baseline, extrinsic }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.intrinsics.iter().all(|v| v.is_finite()), "intrinsics contain non finite values");
        ensure!(self.intrinsics[(0,0)] > 0.0 && self.intrinsics[(1,1)] > 0.0, "focal lengths must be positive, got fx: {} fy: {}", self.intrinsics[(0,0)], self.intrinsics[(1,1)]);
        ensure!(self.baseline.is_finite() && self.baseline > 0.0, "baseline must be positive, got {}", self.baseline);
        ensure!(is_rigid_transform(&self.extrinsic, EXTRINSIC_EPS), "extrinsic is not a rigid transform: {}", self.extrinsic);
        Ok(())
    }
}
