extern crate nalgebra as na;

use color_eyre::eyre::{ensure, Result};
use na::{Vector3,Vector4,Matrix4,Matrix3,RowVector4};
use crate::Float;

pub fn se3(t: &Vector3<Float>, rotation: &Matrix3<Float>) -> Matrix4<Float> {
    let mut res = Matrix4::<Float>::identity();
    res.fixed_view_mut::<3,3>(0,0).copy_from(rotation);
    res.fixed_view_mut::<3,1>(0,3).copy_from(t);
    res
}

pub fn decomp(pose: &Matrix4<Float>) -> (Vector3<Float>,Matrix3<Float>) {
    (pose.fixed_view::<3,1>(0,3).into_owned(), pose.fixed_view::<3,3>(0,0).into_owned())
}

/**
 * Closed form inverse of a rigid transform: [R^T, -R^T t]
 */
#[allow(non_snake_case)]
pub fn inverse_transform(pose: &Matrix4<Float>) -> Matrix4<Float> {
    let (t, R) = decomp(pose);
    let R_t = R.transpose();
    se3(&(-R_t*t), &R_t)
}

pub fn transform_point(pose: &Matrix4<Float>, point: &Vector3<Float>) -> Vector3<Float> {
    let homogeneous = pose*Vector4::<Float>::new(point[0],point[1],point[2],1.0);
    homogeneous.fixed_rows::<3>(0).into_owned()
}

/**
 * Checks R^T R = I, det(R) = 1 and the homogeneous bottom row up to tol.
 */
#[allow(non_snake_case)]
pub fn is_rigid_transform(pose: &Matrix4<Float>, tol: Float) -> bool {
    let (_, R) = decomp(pose);
    let orthonormality_error = (R.transpose()*R - Matrix3::<Float>::identity()).abs().max();
    let det_error = (R.determinant() - 1.0).abs();
    let bottom_row = pose.fixed_view::<1,4>(3,0);
    orthonormality_error <= tol && det_error <= tol && bottom_row == RowVector4::<Float>::new(0.0,0.0,0.0,1.0)
}

/**
 * Root mean squared translational distance between two equally long trajectories
 */
pub fn translation_rmse(trajectory: &[Matrix4<Float>], reference: &[Matrix4<Float>]) -> Result<Float> {
    ensure!(trajectory.len() == reference.len(), "trajectory has {} poses, reference has {}", trajectory.len(), reference.len());
    ensure!(!trajectory.is_empty(), "empty trajectory");
    let norm_sum = trajectory.iter().zip(reference.iter()).fold(0.0, |acc, (a,b)| {
        acc + (a.fixed_view::<3,1>(0,3) - b.fixed_view::<3,1>(0,3)).norm_squared()
    });
    Ok((norm_sum/(trajectory.len() as Float)).sqrt())
}
