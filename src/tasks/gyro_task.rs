use embassy_executor::task;
use embassy_stm32::peripherals::SPI1;
use embassy_time::{Duration, Instant, Ticker};

use crate::drivers::icm42688::Icm42688;
use crate::state::{AccelSample, ACCEL_SLOT};
use crate::Estimator;

/// Gyro loop target: 1 kHz
const GYRO_LOOP_HZ: u64 = 1000;
/// Longest step integrated at once, after a stall
const MAX_DT: f32 = 0.01;

// ── Calibration parameters (filled from main after static calib) ──────────────

pub struct GyroTaskConfig {
    pub gyro_bias: [f32; 3],
}

// ── Task ─────────────────────────────────────────────────────────────────────

/// Propagates the attitude with every gyro sample and hands the matching
/// accelerometer sample to the reference task.
#[task]
pub async fn gyro_task(
    mut imu: Icm42688<'static, SPI1>,
    config: GyroTaskConfig,
    estimator: &'static Estimator,
) {
    let mut ticker = Ticker::every(Duration::from_hz(GYRO_LOOP_HZ));
    let mut last = Instant::now();
    let mut errors: u32 = 0;

    loop {
        ticker.next().await;

        let now = Instant::now();
        let dt = (now - last).as_micros() as f32 / 1_000_000.0;
        let dt = dt.min(MAX_DT);
        last = now;

        let sample = match imu.read_sample().await {
            Ok(s) => s,
            Err(e) => {
                errors = errors.wrapping_add(1);
                if errors % 1000 == 1 {
                    defmt::warn!("IMU read failed: {} ({} total)", e, errors);
                }
                continue;
            }
        };

        let gyro = [
            sample.gyro_rad_s[0] - config.gyro_bias[0],
            sample.gyro_rad_s[1] - config.gyro_bias[1],
            sample.gyro_rad_s[2] - config.gyro_bias[2],
        ];

        // Rejected steps are logged by the estimator and leave it untouched
        let _ = estimator.on_angular_rate(gyro, dt);

        ACCEL_SLOT.publish(AccelSample {
            accel_g: sample.accel_g,
        });
    }
}
