extern crate nalgebra as na;

use std::fmt;
use color_eyre::eyre::{ensure, Result};
use na::{Matrix4,Matrix6};
use serde::{Serialize, Deserialize};
use crate::Float;
use crate::numerics::covariance::{ensure_covariance, to_dynamic};

/**
 * Which of {pose, landmarks} gets corrected each frame.
 */
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMode {
    /// Landmarks only. The pose is IMU dead reckoning.
    Mapping,
    /// Pose only. Landmarks are triangulated once and then held fixed.
    Localization,
    Slam
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceUpdate {
    /// (I-KH)P
    Standard,
    /// (I-KH)P(I-KH)^T + KVK^T
    Joseph
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct SlamConfig {
    pub n_landmarks: usize,
    #[serde(default = "default_landmark_noise")]
    pub landmark_noise: Float,
    #[serde(default = "default_prior_pose_covariance")]
    pub prior_pose_covariance: Matrix6<Float>,
    pub process_noise: Matrix6<Float>,
    pub observation_noise: Matrix4<Float>,
    #[serde(default = "default_max_depth")]
    pub max_depth: Float,
    #[serde(default = "default_mode")]
    pub mode: EstimationMode,
    #[serde(default = "default_covariance_update")]
    pub covariance_update: CovarianceUpdate,
    #[serde(default = "default_covariance_tolerance")]
    pub covariance_tolerance: Float
}

fn default_landmark_noise() -> Float { 0.01 }
fn default_prior_pose_covariance() -> Matrix6<Float> { Matrix6::<Float>::identity() }
fn default_max_depth() -> Float { 50.0 }
fn default_mode() -> EstimationMode { EstimationMode::Mapping }
fn default_covariance_update() -> CovarianceUpdate { CovarianceUpdate::Standard }
fn default_covariance_tolerance() -> Float { 1e-6 }

impl SlamConfig {
    pub fn new(n_landmarks: usize, process_noise: Matrix6<Float>, observation_noise: Matrix4<Float>, mode: EstimationMode) -> SlamConfig {
        SlamConfig {
            n_landmarks,
            landmark_noise: default_landmark_noise(),
            prior_pose_covariance: default_prior_pose_covariance(),
            process_noise,
            observation_noise,
            max_depth: default_max_depth(),
            mode,
            covariance_update: default_covariance_update(),
            covariance_tolerance: default_covariance_tolerance()
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.landmark_noise.is_finite() && self.landmark_noise > 0.0, "landmark noise must be positive, got {}", self.landmark_noise);
        ensure!(self.max_depth.is_finite() && self.max_depth > 0.0, "max depth must be positive, got {}", self.max_depth);
        ensure!(self.covariance_tolerance.is_finite() && self.covariance_tolerance > 0.0, "covariance tolerance must be positive, got {}", self.covariance_tolerance);
        let tol = self.covariance_tolerance;
        ensure_covariance(&to_dynamic(&self.prior_pose_covariance), tol, "prior pose")?;
        ensure_covariance(&to_dynamic(&self.process_noise), tol, "process noise")?;
        ensure_covariance(&to_dynamic(&self.observation_noise), tol, "observation noise")?;
        Ok(())
    }
}

impl fmt::Display for SlamConfig {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}_n_{}_l_{:+e}_d_{}_{:?}", self.mode, self.n_landmarks, self.landmark_noise, self.max_depth, self.covariance_update)
    }

}
