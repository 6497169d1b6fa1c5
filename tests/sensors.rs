extern crate nalgebra as na;

mod common;

use std::collections::BTreeMap;
use na::{Matrix3xX,Matrix4,Matrix4xX,Vector3,Vector4};
use vision_ekf::Float;
use vision_ekf::sensors::camera::{StereoCalibration, stereo_features::{StereoFeatures, UNOBSERVED}};
use vision_ekf::sensors::imu::imu_stream::ImuStream;

#[test]
fn imu_stream_validation() {
    let v = vec![Vector3::<Float>::zeros(); 3];
    assert!(ImuStream::new(vec![0.0, 0.1, 0.2], v.clone(), v.clone()).is_ok());
    assert!(ImuStream::new(vec![0.0, 0.1, 0.1], v.clone(), v.clone()).is_err());
    assert!(ImuStream::new(vec![0.0, 0.2, 0.1], v.clone(), v.clone()).is_err());
    assert!(ImuStream::new(vec![0.0, 0.1], v.clone(), v.clone()).is_err());
    assert!(ImuStream::new(vec![0.0, Float::NAN, 0.2], v.clone(), v.clone()).is_err());

    let mut not_finite = v.clone();
    not_finite[1][2] = Float::INFINITY;
    assert!(ImuStream::new(vec![0.0, 0.1, 0.2], not_finite, v).is_err());
}

#[test]
fn imu_readings() {
    let linear = Matrix3xX::<Float>::from_column_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let angular = Matrix3xX::<Float>::from_column_slice(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    let imu = ImuStream::from_matrices(&[1.0, 1.25], &linear, &angular).expect("valid stream");
    assert_eq!(imu.get_length(), 2);

    let u = imu.get_linear_angular_velocity(1).expect("reading");
    assert_eq!(u.as_slice(), &[4.0, 5.0, 6.0, 0.4, 0.5, 0.6]);
    assert!(imu.get_linear_angular_velocity(2).is_err());

    assert_eq!(imu.delta_t(1).expect("interval"), 0.25);
    assert!(imu.delta_t(0).is_err());
    assert!(imu.delta_t(2).is_err());
}

#[test]
fn dense_features_skip_unobserved_columns() {
    let mut frame = Matrix4xX::<Float>::from_element(3, UNOBSERVED);
    frame.set_column(1, &Vector4::<Float>::new(10.0, 20.0, 8.0, 20.0));
    let features = StereoFeatures::from_dense(&[frame, Matrix4xX::<Float>::from_element(3, UNOBSERVED)]);

    assert_eq!(features.len(), 2);
    assert_eq!(features.visible(0).expect("frame"), vec![1]);
    assert!(features.visible(1).expect("frame").is_empty());
    assert!(features.visible(2).is_err());

    let observations = features.observations(0, &[1]).expect("observed");
    assert_eq!(observations.column(0).into_owned(), Vector4::<Float>::new(10.0, 20.0, 8.0, 20.0));
    assert!(features.observations(0, &[0]).is_err());
}

#[test]
fn frame_validation() {
    let mut frame = BTreeMap::new();
    frame.insert(0, Vector4::<Float>::new(1.0, 2.0, 0.5, 2.0));
    frame.insert(4, Vector4::<Float>::new(1.0, 2.0, 0.5, 2.0));
    let features = StereoFeatures::new(vec![frame]);
    assert!(features.validate_frame(0, 5).is_ok());
    assert!(features.validate_frame(0, 4).is_err());
    assert!(features.validate_frame(1, 5).is_err());
}

#[test]
fn calibration_validation() {
    assert!(common::calibration().validate().is_ok());
    assert!(StereoCalibration::new(common::intrinsics(), 0.6, common::optical_extrinsic()).validate().is_ok());

    let mut sheared = Matrix4::<Float>::identity();
    sheared[(0,1)] = 0.1;
    assert!(StereoCalibration::new(common::intrinsics(), 0.6, sheared).validate().is_err());

    let mut intrinsics = common::intrinsics();
    intrinsics[(0,0)] = -1.0;
    assert!(StereoCalibration::new(intrinsics, 0.6, Matrix4::<Float>::identity()).validate().is_err());
    assert!(StereoCalibration::new(common::intrinsics(), -0.6, Matrix4::<Float>::identity()).validate().is_err());
}
