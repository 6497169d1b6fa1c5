pub mod imu_stream;
