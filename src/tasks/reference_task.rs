use embassy_executor::task;
use embassy_time::{Duration, Ticker};

use crate::board::MagI2c;
use crate::drivers::hmc5883::{Hmc5883, MagError};
use crate::state::ACCEL_SLOT;
use crate::Estimator;

/// Reference update rate. The HMC5883L runs at 75 Hz so every tick sees a fresh field.
const REFERENCE_LOOP_HZ: u64 = 50;

/// Pairs the accelerometer sample published since the last tick with a
/// magnetometer reading and feeds both to the estimator as gravity and
/// north observations.
#[task]
pub async fn reference_task(mut i2c: MagI2c, mut mag: Hmc5883, estimator: &'static Estimator) {
    let mut ticker = Ticker::every(Duration::from_hz(REFERENCE_LOOP_HZ));
    let mut missed: u32 = 0;

    loop {
        ticker.next().await;

        // Gyro loop publishes at 1 kHz; nothing new means the IMU is failing
        let Some(sample) = ACCEL_SLOT.take() else {
            missed = missed.wrapping_add(1);
            if missed % 50 == 1 {
                defmt::warn!("no fresh accel sample, skipping update ({} total)", missed);
            }
            continue;
        };

        let field = match mag.read_field(&mut i2c).await {
            Ok(f) => f,
            Err(MagError::Overflow) => {
                defmt::warn!("magnetometer saturated, skipping update");
                continue;
            }
            Err(MagError::Bus) => continue,
        };

        // Rejected samples are logged by the estimator and leave it untouched
        let _ = estimator.on_reference_vectors(sample.accel_g, field);
    }
}
