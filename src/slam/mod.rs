extern crate nalgebra as na;

use color_eyre::eyre::{eyre, ensure, Result, WrapErr};
use na::{DMatrix,DVector,Matrix3xX,Matrix4,Matrix4xX,Matrix4x3,Matrix4x6,Vector3,Vector4};
use tracing::{debug, info, warn};
use crate::Float;
use crate::numerics::{max_norm, covariance::to_dynamic};
use crate::sensors::camera::{StereoCalibration, stereo::StereoCamera, stereo_features::StereoFeatures};
use crate::sensors::imu::imu_stream::ImuStream;
use crate::slam::degeneracy::Degeneracy;
use crate::slam::kalman::{kalman_gain, corrected_covariance, observation_noise_block, stack_observations};
use crate::slam::landmark_map::LandmarkMap;
use crate::slam::pose_tracker::{PoseTracker, PoseState};
use crate::slam::runtime_parameters::{SlamConfig, EstimationMode};

pub mod degeneracy;
pub mod kalman;
pub mod landmark_map;
pub mod pose_tracker;
pub mod runtime_parameters;

/**
 * What happened to one timestep
 */
#[derive(Debug,Clone)]
pub struct FrameReport {
    pub t: usize,
    pub initialized: Vec<usize>,
    pub corrected: Vec<usize>,
    pub pose_state: PoseState,
    pub degeneracies: Vec<Degeneracy>
}

impl FrameReport {
    fn new(t: usize) -> FrameReport {
        FrameReport { t, initialized: Vec::new(), corrected: Vec::new(), pose_state: PoseState::Predicted, degeneracies: Vec::new() }
    }

    fn report(&mut self, degeneracy: Degeneracy) {
        if !self.degeneracies.contains(&degeneracy) {
            warn!("t {}: {}", self.t, degeneracy);
            self.degeneracies.push(degeneracy);
        }
    }
}

/**
 * Stacked predictions, observations and jacobian blocks of the landmarks that project in front of the camera.
 */
struct Linearization<J> {
    indices: Vec<usize>,
    predicted: Vec<Vector4<Float>>,
    observed: Vec<Vector4<Float>>,
    jacobians: Vec<J>
}

impl<J> Linearization<J> {
    fn innovation(&self) -> DVector<Float> {
        let observed = stack_observations(&Matrix4xX::<Float>::from_columns(&self.observed));
        let predicted = stack_observations(&Matrix4xX::<Float>::from_columns(&self.predicted));
        observed - predicted
    }
}

pub struct EkfSlam {
    config: SlamConfig,
    camera: StereoCamera,
    pose_tracker: PoseTracker,
    landmark_map: LandmarkMap
}

impl EkfSlam {
    pub fn new(config: SlamConfig, calibration: &StereoCalibration) -> Result<EkfSlam> {
        config.validate().wrap_err("invalid slam configuration")?;
        calibration.validate().wrap_err("invalid stereo calibration")?;
        info!("ekf slam: {}", config);

        let pose_tracker = PoseTracker::new(config.prior_pose_covariance, config.process_noise, config.covariance_tolerance);
        let landmark_map = LandmarkMap::new(config.n_landmarks, config.landmark_noise);
        Ok(EkfSlam { camera: StereoCamera::new(calibration), config, pose_tracker, landmark_map })
    }

    pub fn config(&self) -> &SlamConfig {
        &self.config
    }

    pub fn camera(&self) -> &StereoCamera {
        &self.camera
    }

    pub fn pose_tracker(&self) -> &PoseTracker {
        &self.pose_tracker
    }

    pub fn landmark_map(&self) -> &LandmarkMap {
        &self.landmark_map
    }

    /**
     * Steps through every remaining imu reading.
     */
    pub fn run(&mut self, imu: &ImuStream, features: &StereoFeatures) -> Result<Vec<FrameReport>> {
        imu.validate()?;
        ensure!(features.len() >= imu.get_length(), "{} imu readings but only {} feature frames", imu.get_length(), features.len());
        (self.pose_tracker.len()..imu.get_length()).map(|t| self.step(t, imu, features)).collect()
    }

    /**
     * One timestep: predict, correct the pose and/or landmarks depending on the mode, then initialize new landmarks.
     * In slam mode pose and landmarks are corrected together from a single use of each observation.
     */
    pub fn step(&mut self, t: usize, imu: &ImuStream, features: &StereoFeatures) -> Result<FrameReport> {
        ensure!(t == self.pose_tracker.len(), "timestep {} out of order, next timestep is {}", t, self.pose_tracker.len());
        features.validate_frame(t, self.landmark_map.n_landmarks()).wrap_err_with(|| format!("rejected frame {}", t))?;

        let mut report = FrameReport::new(t);
        self.pose_tracker.predict(t, imu)?;

        let visible = features.visible(t)?;
        let (seen_before, newly_seen) = self.landmark_map.classify_visible(&visible);

        // A landmark whose triangulation failed stays a candidate for initialization
        let (tracked, pending): (Vec<usize>, Vec<usize>) = seen_before.iter().copied().partition(|&idx| self.landmark_map.is_initialized(idx));
        let to_initialize = newly_seen.iter().chain(pending.iter()).copied().collect::<Vec<usize>>();

        match self.config.mode {
            EstimationMode::Localization => self.correct_pose(t, &tracked, features, &mut report)?,
            EstimationMode::Slam => self.correct_jointly(t, &tracked, features, &mut report)?,
            EstimationMode::Mapping => {
                self.pose_tracker.skip_correction(t)?;
                self.correct_landmarks(t, &tracked, features, &mut report)?;
            }
        }
        report.pose_state = self.pose_tracker.state(t).ok_or_else(|| eyre!("timestep {} lost its pose", t))?;

        self.initialize_landmarks(t, &to_initialize, features, &mut report)?;

        debug!("t {}: visible {}, tracked {}, initialized {}, corrected {}, pose {:?}",
            t, visible.len(), tracked.len(), report.initialized.len(), report.corrected.len(), report.pose_state);
        Ok(report)
    }

    fn current_pose(&self, t: usize, ekf_pose: bool) -> Result<Matrix4<Float>> {
        let pose = match ekf_pose {
            true => self.pose_tracker.corrected_pose(t),
            false => self.pose_tracker.predicted_pose(t)
        };
        pose.copied().ok_or_else(|| eyre!("no pose for timestep {}", t))
    }

    fn linearize<J, F>(&self, t: usize, pose: &Matrix4<Float>, indices: &[usize], features: &StereoFeatures, jacobian: F, report: &mut FrameReport) -> Result<Linearization<J>>
        where F: Fn(&StereoCamera, &Matrix4<Float>, &Vector3<Float>) -> Option<J> {
        let observations = features.observations(t, indices)?;
        let mut linearization = Linearization { indices: Vec::new(), predicted: Vec::new(), observed: Vec::new(), jacobians: Vec::new() };
        for (col, &idx) in indices.iter().enumerate() {
            let landmark = self.landmark_map.landmarks().column(idx).into_owned();
            match (self.camera.project(pose, &landmark), jacobian(&self.camera, pose, &landmark)) {
                (Some(predicted), Some(j)) => {
                    linearization.indices.push(idx);
                    linearization.predicted.push(predicted);
                    linearization.observed.push(observations.column(col).into_owned());
                    linearization.jacobians.push(j);
                },
                _ => report.report(Degeneracy::PointBehindCamera { landmark: idx })
            }
        }
        Ok(linearization)
    }

    fn correct_pose(&mut self, t: usize, tracked: &[usize], features: &StereoFeatures, report: &mut FrameReport) -> Result<()> {
        let pose_pred = self.current_pose(t, false)?;
        let linearization = self.linearize(t, &pose_pred, tracked, features, |camera, pose, landmark| camera.jacobian_wrt_pose(pose, landmark), report)?;
        if linearization.indices.is_empty() {
            return self.pose_tracker.skip_correction(t);
        }

        let k = linearization.indices.len();
        let mut jacobian = DMatrix::<Float>::zeros(4*k,6);
        for (i, block) in linearization.jacobians.iter().enumerate() {
            jacobian.fixed_view_mut::<4,6>(4*i,0).copy_from(block);
        }
        let innovation = linearization.innovation();
        let observation_noise = observation_noise_block(&self.config.observation_noise, k);
        let covariance = to_dynamic(self.pose_tracker.covariance(t).ok_or_else(|| eyre!("no pose covariance for timestep {}", t))?);

        match kalman_gain(&covariance, &jacobian, &observation_noise) {
            Ok(gain) => {
                debug!("t {}: pose correction from {} landmarks, max innovation {}", t, k, max_norm(&innovation));
                self.pose_tracker.correct(t, &gain, &innovation)?;
                self.pose_tracker.correct_covariance(t, &gain, &jacobian, &observation_noise, self.config.covariance_update)
            },
            Err(degeneracy) => {
                report.report(degeneracy);
                self.pose_tracker.skip_correction(t)
            }
        }
    }

    fn correct_landmarks(&mut self, t: usize, tracked: &[usize], features: &StereoFeatures, report: &mut FrameReport) -> Result<()> {
        let pose = self.current_pose(t, true)?;
        let linearization = self.linearize(t, &pose, tracked, features, |camera, pose, landmark| camera.jacobian_wrt_landmark(pose, landmark), report)?;
        if linearization.indices.is_empty() {
            return Ok(());
        }

        let k = linearization.indices.len();
        let patch = self.landmark_map.extract_patch(&linearization.indices)?;
        let jacobian = LandmarkMap::assemble_jacobian(&linearization.jacobians);
        let innovation = linearization.innovation();
        let observation_noise = observation_noise_block(&self.config.observation_noise, k);

        match kalman_gain(&patch.covariance, &jacobian, &observation_noise) {
            Ok(gain) => {
                debug!("t {}: landmark correction of {} landmarks, max innovation {}", t, k, max_norm(&innovation));
                let mean_updated = &patch.mean + &gain*&innovation;
                self.landmark_map.apply_correction(&patch, &mean_updated)?;
                self.landmark_map.apply_covariance_correction(&patch, &gain, &jacobian, &observation_noise,
                    self.config.covariance_update, self.config.covariance_tolerance)?;
                report.corrected = linearization.indices;
            },
            Err(degeneracy) => report.report(degeneracy)
        }
        Ok(())
    }

    /**
     * EKF update of the stacked state (pose perturbation, landmark patch) with H = [H_pose | H_landmarks].
     * The prior is block diagonal. Only the pose block and the patch block of the posterior are kept.
     */
    fn correct_jointly(&mut self, t: usize, tracked: &[usize], features: &StereoFeatures, report: &mut FrameReport) -> Result<()> {
        let pose_pred = self.current_pose(t, false)?;
        let linearization: Linearization<(Matrix4x6<Float>, Matrix4x3<Float>)> = self.linearize(t, &pose_pred, tracked, features,
            |camera, pose, landmark| camera.jacobian_wrt_pose(pose, landmark).zip(camera.jacobian_wrt_landmark(pose, landmark)), report)?;
        if linearization.indices.is_empty() {
            return self.pose_tracker.skip_correction(t);
        }

        let k = linearization.indices.len();
        let patch = self.landmark_map.extract_patch(&linearization.indices)?;
        let mut jacobian = DMatrix::<Float>::zeros(4*k, 6+3*k);
        for (i, (pose_block, landmark_block)) in linearization.jacobians.iter().enumerate() {
            jacobian.fixed_view_mut::<4,6>(4*i,0).copy_from(pose_block);
            jacobian.fixed_view_mut::<4,3>(4*i,6+3*i).copy_from(landmark_block);
        }
        let mut covariance = DMatrix::<Float>::zeros(6+3*k, 6+3*k);
        covariance.fixed_view_mut::<6,6>(0,0).copy_from(self.pose_tracker.covariance(t).ok_or_else(|| eyre!("no pose covariance for timestep {}", t))?);
        covariance.view_mut((6,6), (3*k,3*k)).copy_from(&patch.covariance);
        let innovation = linearization.innovation();
        let observation_noise = observation_noise_block(&self.config.observation_noise, k);

        match kalman_gain(&covariance, &jacobian, &observation_noise) {
            Ok(gain) => {
                debug!("t {}: joint correction from {} landmarks, max innovation {}", t, k, max_norm(&innovation));
                let corrected = corrected_covariance(&covariance, &gain, &jacobian, &observation_noise,
                    self.config.covariance_update, self.config.covariance_tolerance, "joint")?;
                self.pose_tracker.correct(t, &gain.rows(0,6).into_owned(), &innovation)?;
                self.pose_tracker.set_corrected_covariance(t, &corrected.view((0,0), (6,6)).into_owned())?;

                let mean_updated = &patch.mean + gain.rows(6,3*k)*&innovation;
                self.landmark_map.apply_correction(&patch, &mean_updated)?;
                self.landmark_map.write_patch_covariance(&patch, &corrected.view((6,6), (3*k,3*k)).into_owned())?;
                report.corrected = linearization.indices;
                Ok(())
            },
            Err(degeneracy) => {
                report.report(degeneracy);
                self.pose_tracker.skip_correction(t)
            }
        }
    }

    fn initialize_landmarks(&mut self, t: usize, indices: &[usize], features: &StereoFeatures, report: &mut FrameReport) -> Result<()> {
        if indices.is_empty() {
            return Ok(());
        }

        let pose = self.current_pose(t, true)?;
        let observations = features.observations(t, indices)?;
        let mut initialized = Vec::<usize>::with_capacity(indices.len());
        let mut points = Vec::<Vector3<Float>>::with_capacity(indices.len());
        for (col, &idx) in indices.iter().enumerate() {
            let pixel = observations.column(col).into_owned();
            match self.camera.unproject(&pixel, self.config.max_depth) {
                Some(point_optical) if point_optical[2] > 0.0 => {
                    initialized.push(idx);
                    points.push(self.camera.optical_to_world(&pose, &point_optical));
                },
                _ => report.report(Degeneracy::NonPositiveDepth { landmark: idx })
            }
        }

        if !initialized.is_empty() {
            self.landmark_map.initialize(&initialized, &Matrix3xX::<Float>::from_columns(&points))?;
        }
        report.initialized = initialized;
        Ok(())
    }
}
