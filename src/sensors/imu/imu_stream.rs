extern crate nalgebra as na;

use color_eyre::eyre::{eyre, ensure, Result};
use na::{Vector3,Vector6,Matrix3xX};
use crate::Float;
use crate::numerics::all_finite;

/**
 * Body frame velocity readings sampled on a common clock.
 */
#[derive(Debug,Clone)]
pub struct ImuStream {
    pub timestamps: Vec<Float>,
    pub linear_velocity: Vec<Vector3<Float>>,
    pub angular_velocity: Vec<Vector3<Float>>
}

impl ImuStream {
    pub fn new(timestamps: Vec<Float>, linear_velocity: Vec<Vector3<Float>>, angular_velocity: Vec<Vector3<Float>>) -> Result<ImuStream> {
        let stream = ImuStream { timestamps, linear_velocity, angular_velocity };
        stream.validate()?;
        Ok(stream)
    }

    pub fn from_matrices(timestamps: &[Float], linear_velocity: &Matrix3xX<Float>, angular_velocity: &Matrix3xX<Float>) -> Result<ImuStream> {
        let linear = linear_velocity.column_iter().map(|c| c.into_owned()).collect::<Vec<Vector3<Float>>>();
        let angular = angular_velocity.column_iter().map(|c| c.into_owned()).collect::<Vec<Vector3<Float>>>();
        ImuStream::new(timestamps.to_vec(), linear, angular)
    }

    /**
     * Constant sampling interval starting at t = 0
     */
    pub fn from_constant_rate(delta_t: Float, linear_velocity: Vec<Vector3<Float>>, angular_velocity: Vec<Vector3<Float>>) -> Result<ImuStream> {
        let timestamps = (0..linear_velocity.len()).map(|i| i as Float * delta_t).collect::<Vec<Float>>();
        ImuStream::new(timestamps, linear_velocity, angular_velocity)
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.timestamps.len();
        ensure!(self.linear_velocity.len() == n && self.angular_velocity.len() == n,
            "imu stream shape mismatch: {} timestamps, {} linear, {} angular readings", n, self.linear_velocity.len(), self.angular_velocity.len());
        for t in 0..n {
            ensure!(self.timestamps[t].is_finite(), "imu timestamp {} is not finite", t);
            ensure!(all_finite(&self.linear_velocity[t]) && all_finite(&self.angular_velocity[t]), "imu reading {} is not finite", t);
            if t > 0 {
                ensure!(self.timestamps[t] > self.timestamps[t-1], "imu timestamps not strictly increasing at {}: {} <= {}", t, self.timestamps[t], self.timestamps[t-1]);
            }
        }
        Ok(())
    }

    pub fn get_length(&self) -> usize {
        self.timestamps.len()
    }

    /**
     * Twist (v,w) of reading t
     */
    pub fn get_linear_angular_velocity(&self, t: usize) -> Result<Vector6<Float>> {
        let v = self.linear_velocity.get(t).ok_or_else(|| eyre!("no imu reading for timestep {}", t))?;
        let w = self.angular_velocity.get(t).ok_or_else(|| eyre!("no imu reading for timestep {}", t))?;
        let mut u = Vector6::<Float>::zeros();
        u.fixed_rows_mut::<3>(0).copy_from(v);
        u.fixed_rows_mut::<3>(3).copy_from(w);
        ensure!(all_finite(&u), "imu reading {} is not finite", t);
        Ok(u)
    }

    /**
     * Interval between reading t-1 and t
     */
    pub fn delta_t(&self, t: usize) -> Result<Float> {
        ensure!(t > 0 && t < self.timestamps.len(), "delta_t undefined for timestep {} of {}", t, self.timestamps.len());
        let dt = self.timestamps[t] - self.timestamps[t-1];
        ensure!(dt.is_finite() && dt > 0.0, "non positive imu interval {} at timestep {}", dt, t);
        Ok(dt)
    }
}
