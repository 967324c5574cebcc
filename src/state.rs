//! Shared sample hand-off between tasks.
//!
//! The gyro task owns the IMU; the reference task needs its accelerometer
//! reading. The slot keeps only the newest value and hands each one out
//! once, so the reference task never reuses a stale sample.

use attitude_fusion::LatestSample;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

#[derive(Clone, Copy, Default)]
pub struct AccelSample {
    /// Specific force, body frame, in g
    pub accel_g: [f32; 3],
}

pub static ACCEL_SLOT: LatestSample<CriticalSectionRawMutex, AccelSample> = LatestSample::new();
