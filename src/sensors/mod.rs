pub mod camera;
pub mod imu;
