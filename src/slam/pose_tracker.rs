extern crate nalgebra as na;

use color_eyre::eyre::{eyre, ensure, Result};
use na::{DMatrix,DVector,Matrix4,Matrix6,Vector6};
use crate::Float;
use crate::numerics::{lie::{compose, exp_adjoint}, covariance::{ensure_covariance, symmetrized, to_dynamic}};
use crate::sensors::imu::imu_stream::ImuStream;
use crate::slam::{kalman::corrected_covariance, runtime_parameters::CovarianceUpdate};

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum PoseState {
    Predicted,
    Corrected,
    CorrectedBySkip
}

/**
 * Append only pose history. Step t is predicted from the terminal (corrected or skipped) pose of t-1.
 */
pub struct PoseTracker {
    poses_pred: Vec<Matrix4<Float>>,
    poses_ekf: Vec<Matrix4<Float>>,
    covariances: Vec<Matrix6<Float>>,
    states: Vec<PoseState>,
    covariance_corrected: Vec<bool>,
    prior_covariance: Matrix6<Float>,
    process_noise: Matrix6<Float>,
    covariance_tolerance: Float
}

impl PoseTracker {
    pub fn new(prior_covariance: Matrix6<Float>, process_noise: Matrix6<Float>, covariance_tolerance: Float) -> PoseTracker {
        PoseTracker {
            poses_pred: Vec::new(),
            poses_ekf: Vec::new(),
            covariances: Vec::new(),
            states: Vec::new(),
            covariance_corrected: Vec::new(),
            prior_covariance,
            process_noise,
            covariance_tolerance
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, t: usize) -> Option<PoseState> {
        self.states.get(t).copied()
    }

    pub fn predicted_pose(&self, t: usize) -> Option<&Matrix4<Float>> {
        self.poses_pred.get(t)
    }

    pub fn corrected_pose(&self, t: usize) -> Option<&Matrix4<Float>> {
        self.poses_ekf.get(t)
    }

    pub fn covariance(&self, t: usize) -> Option<&Matrix6<Float>> {
        self.covariances.get(t)
    }

    /**
     * Corrected poses when ekf_pose is set, otherwise the predictions
     */
    pub fn get_final_trajectory(&self, ekf_pose: bool) -> &[Matrix4<Float>] {
        match ekf_pose {
            true => &self.poses_ekf,
            false => &self.poses_pred
        }
    }

    fn ensure_state(&self, t: usize, expected: PoseState) -> Result<()> {
        let state = self.state(t).ok_or_else(|| eyre!("timestep {} has not been predicted yet, {} steps tracked", t, self.len()))?;
        ensure!(state == expected, "timestep {} is {:?}, expected {:?}", t, state, expected);
        Ok(())
    }

    #[allow(non_snake_case)]
    pub fn predict(&mut self, t: usize, imu: &ImuStream) -> Result<()> {
        ensure!(t == self.len(), "timestep {} predicted out of order, next timestep is {}", t, self.len());

        let (pose, covariance) = match t {
            0 => (Matrix4::<Float>::identity(), self.prior_covariance),
            _ => {
                ensure!(self.states[t-1] != PoseState::Predicted, "timestep {} was never corrected or skipped", t-1);
                let u = imu.get_linear_angular_velocity(t-1)?;
                let dt = imu.delta_t(t)?;
                let pose = compose(&self.poses_ekf[t-1], &(u*dt));
                let A = exp_adjoint(&(-dt*u));
                let covariance = A*self.covariances[t-1]*A.transpose() + self.process_noise;
                (pose, covariance)
            }
        };

        let covariance_dyn = to_dynamic(&covariance);
        ensure_covariance(&covariance_dyn, self.covariance_tolerance, "predicted pose")?;

        self.poses_pred.push(pose);
        self.poses_ekf.push(pose);
        self.covariances.push(Matrix6::<Float>::from_iterator(symmetrized(&covariance_dyn).iter().cloned()));
        self.states.push(PoseState::Predicted);
        self.covariance_corrected.push(false);
        Ok(())
    }

    /**
     * pose_ekf[t] = pose_pred[t] * exp(hat(K*innovation))
     */
    pub fn correct(&mut self, t: usize, gain: &DMatrix<Float>, innovation: &DVector<Float>) -> Result<()> {
        self.ensure_state(t, PoseState::Predicted)?;
        ensure!(gain.nrows() == 6 && gain.ncols() == innovation.len(), "pose gain is {}x{} for an innovation of {}", gain.nrows(), gain.ncols(), innovation.len());
        let delta = Vector6::<Float>::from_iterator((gain*innovation).iter().cloned());
        ensure!(delta.iter().all(|v| v.is_finite()), "non finite pose correction at timestep {}", t);
        self.poses_ekf[t] = compose(&self.poses_pred[t], &delta);
        self.states[t] = PoseState::Corrected;
        Ok(())
    }

    /**
     * cov[t] = (I - KH) cov[t], only after a correction of the same step.
     */
    pub fn correct_covariance(&mut self, t: usize, gain: &DMatrix<Float>, jacobian: &DMatrix<Float>, observation_noise: &DMatrix<Float>, form: CovarianceUpdate) -> Result<()> {
        self.ensure_state(t, PoseState::Corrected)?;
        ensure!(!self.covariance_corrected[t], "pose covariance of timestep {} was already corrected", t);
        let corrected = corrected_covariance(&to_dynamic(&self.covariances[t]), gain, jacobian, observation_noise, form, self.covariance_tolerance, "pose")?;
        self.set_corrected_covariance(t, &corrected)
    }

    /**
     * Stores a posterior computed elsewhere, e.g. the pose block of a joint pose and landmark update.
     */
    pub fn set_corrected_covariance(&mut self, t: usize, covariance: &DMatrix<Float>) -> Result<()> {
        self.ensure_state(t, PoseState::Corrected)?;
        ensure!(!self.covariance_corrected[t], "pose covariance of timestep {} was already corrected", t);
        ensure!(covariance.shape() == (6,6), "pose covariance is {}x{}", covariance.nrows(), covariance.ncols());
        ensure_covariance(covariance, self.covariance_tolerance, "corrected pose")?;
        self.covariances[t] = Matrix6::<Float>::from_iterator(symmetrized(covariance).iter().cloned());
        self.covariance_corrected[t] = true;
        Ok(())
    }

    /**
     * No usable observations: the prediction is the estimate.
     */
    pub fn skip_correction(&mut self, t: usize) -> Result<()> {
        self.ensure_state(t, PoseState::Predicted)?;
        self.poses_ekf[t] = self.poses_pred[t];
        self.states[t] = PoseState::CorrectedBySkip;
        Ok(())
    }
}
