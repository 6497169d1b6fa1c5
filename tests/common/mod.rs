#![allow(dead_code)]
extern crate nalgebra as na;

use std::collections::BTreeMap;
use na::{Matrix3,Matrix4,Matrix6,Matrix3xX,Vector3,Vector4,Vector6};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use vision_ekf::Float;
use vision_ekf::numerics::{lie::compose, pose::se3};
use vision_ekf::sensors::camera::{StereoCalibration, stereo::StereoCamera, stereo_features::StereoFeatures};
use vision_ekf::sensors::imu::imu_stream::ImuStream;
use vision_ekf::slam::runtime_parameters::{SlamConfig, EstimationMode};

pub const MAX_DEPTH: Float = 50.0;

pub fn intrinsics() -> Matrix3<Float> {
    Matrix3::<Float>::new(552.554261, 0.0, 682.049453,
                          0.0, 552.554261, 238.769549,
                          0.0, 0.0, 1.0)
}

pub fn calibration() -> StereoCalibration {
    StereoCalibration::new(intrinsics(), 0.6, Matrix4::<Float>::identity())
}

/**
 * Optical frame looking along body x, mounted slightly off the body origin
 */
pub fn optical_extrinsic() -> Matrix4<Float> {
    let rotation = Matrix3::<Float>::new(0.0, 0.0, 1.0,
                                         -1.0, 0.0, 0.0,
                                         0.0, -1.0, 0.0);
    se3(&Vector3::<Float>::new(0.1, 0.0, 0.2), &rotation)
}

pub fn config(n_landmarks: usize, mode: EstimationMode) -> SlamConfig {
    SlamConfig::new(n_landmarks, Matrix6::<Float>::identity()*1e-3, Matrix4::<Float>::identity()*4.0, mode)
}

pub fn random_twist<R: Rng>(rng: &mut R, scale: Float) -> Vector6<Float> {
    Vector6::<Float>::from_fn(|_,_| rng.gen_range(-scale..scale))
}

/**
 * Point in front of the optical frame, returned in world coordinates together with its optical coordinates
 */
pub fn random_visible_point<R: Rng>(rng: &mut R, camera: &StereoCamera, world_pose: &Matrix4<Float>, min_depth: Float, max_depth: Float) -> (Vector3<Float>, Vector3<Float>) {
    let z = rng.gen_range(min_depth..max_depth);
    let optical = Vector3::<Float>::new(rng.gen_range(-0.5..0.5)*z, rng.gen_range(-0.3..0.3)*z, z);
    (camera.optical_to_world(world_pose, &optical), optical)
}

pub fn random_landmarks<R: Rng>(rng: &mut R, n: usize) -> Matrix3xX<Float> {
    Matrix3xX::<Float>::from_fn(n, |r,_| match r {
        0 => rng.gen_range(-5.0..5.0),
        1 => rng.gen_range(-2.0..2.0),
        _ => rng.gen_range(8.0..20.0)
    })
}

pub fn constant_imu(delta_t: Float, steps: usize, linear: Vector3<Float>, angular: Vector3<Float>) -> ImuStream {
    ImuStream::from_constant_rate(delta_t, vec![linear; steps], vec![angular; steps]).expect("valid imu stream")
}

/**
 * Dead reckoning of the imu stream, the same motion model the filter predicts with
 */
pub fn ground_truth_trajectory(imu: &ImuStream) -> Vec<Matrix4<Float>> {
    let mut poses = vec![Matrix4::<Float>::identity()];
    for t in 1..imu.get_length() {
        let u = imu.get_linear_angular_velocity(t-1).expect("imu reading");
        let dt = imu.delta_t(t).expect("imu interval");
        let next = compose(&poses[t-1], &(u*dt));
        poses.push(next);
    }
    poses
}

/**
 * Stereo observations of every landmark in front of the camera, optionally with gaussian pixel noise
 */
pub fn simulate_features<R: Rng>(camera: &StereoCamera, poses: &[Matrix4<Float>], landmarks: &Matrix3xX<Float>, noise: Option<(&mut R, Float)>) -> StereoFeatures {
    let mut noise = noise.map(|(rng, sigma)| (rng, Normal::new(0.0, sigma).expect("valid sigma")));
    let frames = poses.iter().map(|pose| {
        let mut frame = BTreeMap::<usize, Vector4<Float>>::new();
        for (idx, landmark) in landmarks.column_iter().enumerate() {
            if let Some(mut pixel) = camera.project(pose, &landmark.into_owned()) {
                if let Some((rng, normal)) = noise.as_mut() {
                    let du = normal.sample(&mut **rng);
                    let dv = normal.sample(&mut **rng);
                    let dr = normal.sample(&mut **rng);
                    pixel += Vector4::<Float>::new(du, dv, dr, dv);
                }
                frame.insert(idx, pixel);
            }
        }
        frame
    }).collect::<Vec<_>>();
    StereoFeatures::new(frames)
}

pub fn assert_symmetric(matrix: &na::DMatrix<Float>, tol: Float) {
    let asymmetry = (matrix - matrix.transpose()).abs().max();
    assert!(asymmetry <= tol, "asymmetry {} > {}", asymmetry, tol);
}
