extern crate nalgebra as na;

use na::{Vector3,Vector4,Matrix4,Matrix4x3,Matrix4x6,Matrix3};
use crate::Float;
use crate::numerics::{lie::skew_symmetric, pose::{inverse_transform, transform_point}};
use crate::sensors::camera::StereoCalibration;

/**
 * Stereo observation model. Pixels are stacked as (u_left, v_left, u_right, v_right).
 *
 * ```text
 *     | fsu  0   cu   0       |
 * M = | 0    fsv cv   0       |
 *     | fsu  0   cu  -fsu*b   |
 *     | 0    fsv cv   0       |
 * ```
 */
#[derive(Copy,Clone,Debug)]
pub struct StereoCamera {
    pub stereo_calibration: Matrix4<Float>,
    pub extrinsic: Matrix4<Float>,
    pub extrinsic_inverse: Matrix4<Float>,
    pub baseline: Float
}

impl StereoCamera {
    pub fn new(calibration: &StereoCalibration) -> StereoCamera {
        let k = &calibration.intrinsics;
        let fsu = k[(0,0)];
        let fsv = k[(1,1)];
        let cu = k[(0,2)];
        let cv = k[(1,2)];
        let b = calibration.baseline;
        let stereo_calibration = Matrix4::<Float>::new(
            fsu, 0.0, cu, 0.0,
            0.0, fsv, cv, 0.0,
            fsu, 0.0, cu, -fsu*b,
            0.0, fsv, cv, 0.0);

        StereoCamera {
            stereo_calibration,
            extrinsic: calibration.extrinsic,
            extrinsic_inverse: inverse_transform(&calibration.extrinsic),
            baseline: b
        }
    }

    pub fn get_fsu(&self) -> Float {
        self.stereo_calibration[(0,0)]
    }

    pub fn get_fsv(&self) -> Float {
        self.stereo_calibration[(1,1)]
    }

    pub fn get_cu(&self) -> Float {
        self.stereo_calibration[(0,2)]
    }

    pub fn get_cv(&self) -> Float {
        self.stereo_calibration[(1,2)]
    }

    /**
     * Homogeneous point in the left optical frame: extrinsic^-1 * pose^-1 * p
     */
    pub fn world_to_optical(&self, world_pose: &Matrix4<Float>, point_world: &Vector3<Float>) -> Vector4<Float> {
        let point = Vector4::<Float>::new(point_world[0],point_world[1],point_world[2],1.0);
        self.extrinsic_inverse*inverse_transform(world_pose)*point
    }

    pub fn optical_to_world(&self, world_pose: &Matrix4<Float>, point_optical: &Vector3<Float>) -> Vector3<Float> {
        transform_point(&(world_pose*self.extrinsic), point_optical)
    }

    pub fn project_optical(&self, position: &Vector4<Float>) -> Option<Vector4<Float>> {
        match position[2] {
            z if z > 0.0 => Some(self.stereo_calibration*(position/z)),
            _ => None
        }
    }

    pub fn project(&self, world_pose: &Matrix4<Float>, point_world: &Vector3<Float>) -> Option<Vector4<Float>> {
        self.project_optical(&self.world_to_optical(world_pose, point_world))
    }

    /**
     * Triangulates from disparity. Zero disparity or depths beyond max_depth are clamped to max_depth,
     * negative disparity has no solution in front of the camera.
     */
    pub fn unproject(&self, pixel: &Vector4<Float>, max_depth: Float) -> Option<Vector3<Float>> {
        if !pixel.iter().all(|v| v.is_finite()) {
            return None;
        }

        let fsu = self.get_fsu();
        let disparity = pixel[0]-pixel[2];
        let depth = match disparity {
            d if d < 0.0 => return None,
            d if d == 0.0 => max_depth,
            d => (fsu*self.baseline/d).min(max_depth)
        };

        let x = (pixel[0]-self.get_cu())*depth/fsu;
        let y = (pixel[1]-self.get_cv())*depth/self.get_fsv();
        Some(Vector3::<Float>::new(x,y,depth))
    }

    /**
     * d pi(q) / dq for pi(q) = q/q_z
     */
    fn projection_derivative(position: &Vector4<Float>) -> Matrix4<Float> {
        let z = position[2];
        Matrix4::<Float>::new(1.0, 0.0, -position[0]/z, 0.0,
                              0.0, 1.0, -position[1]/z, 0.0,
                              0.0, 0.0, 0.0, 0.0,
                              0.0, 0.0, -position[3]/z, 1.0)/z
    }

    pub fn jacobian_wrt_landmark(&self, world_pose: &Matrix4<Float>, point_world: &Vector3<Float>) -> Option<Matrix4x3<Float>> {
        let world_to_optical = self.extrinsic_inverse*inverse_transform(world_pose);
        let position = world_to_optical*Vector4::<Float>::new(point_world[0],point_world[1],point_world[2],1.0);
        match position[2] {
            z if z > 0.0 => Some(self.stereo_calibration*StereoCamera::projection_derivative(&position)*world_to_optical.fixed_view::<4,3>(0,0)),
            _ => None
        }
    }

    /**
     * Derivative w.r.t. a right perturbation pose*exp(hat(delta)).
     * pose^-1 is perturbed by exp(-hat(delta)), so d(pose^-1 p)/d delta = -(pose^-1 p)^circledot
     */
    pub fn jacobian_wrt_pose(&self, world_pose: &Matrix4<Float>, point_world: &Vector3<Float>) -> Option<Matrix4x6<Float>> {
        let point_body = transform_point(&inverse_transform(world_pose), point_world);
        let position = self.extrinsic_inverse*Vector4::<Float>::new(point_body[0],point_body[1],point_body[2],1.0);
        match position[2] {
            z if z > 0.0 => {
                let mut circle_dot = Matrix4x6::<Float>::zeros();
                circle_dot.fixed_view_mut::<3,3>(0,0).copy_from(&Matrix3::<Float>::identity());
                circle_dot.fixed_view_mut::<3,3>(0,3).copy_from(&(-skew_symmetric(&point_body)));
                Some(-self.stereo_calibration*StereoCamera::projection_derivative(&position)*self.extrinsic_inverse*circle_dot)
            },
            _ => None
        }
    }
}
