#![no_std]
#![no_main]

mod board;
mod drivers;
mod state;
mod tasks;

use attitude_fusion::{AttitudeEstimator, EstimatorConfig, SharedEstimator};
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::board::Board;
use crate::tasks::gyro_task::{gyro_task, GyroTaskConfig};
use crate::tasks::reference_task::reference_task;
use crate::tasks::telemetry_task::telemetry_task;

/// One estimator, serialized across the gyro and reference tasks.
pub type Estimator = SharedEstimator<CriticalSectionRawMutex>;

static ESTIMATOR: StaticCell<Estimator> = StaticCell::new();

// ── Estimator tuning ──────────────────────────────────────────────────────────
/// ICM-42688 gyro white noise at 1 kHz ODR, (rad/s)²
const GYRO_NOISE_VAR: f32 = 2.4e-6;
/// Tilt correction per 50 Hz reference sample
const ACCEL_GAIN: f32 = 0.02;
/// Heading correction per 50 Hz reference sample
const MAG_GAIN: f32 = 0.01;

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL, SPI1 IMU, I2C1 magnetometer)
    let Board {
        mut imu,
        mut mag,
        mut mag_i2c,
        mut led,
    } = Board::init();

    // 2. Sensor hardware init
    Timer::after(Duration::from_millis(100)).await;
    if imu.init().await.is_err() {
        defmt::error!("ICM-42688 init failed");
    }
    if mag.init(&mut mag_i2c).await.is_err() {
        defmt::error!("HMC5883L init failed");
    }

    // 3. Static gyro bias: 100 samples × 10 ms = 1 s, board must be still
    let mut gyro_bias = [0.0f32; 3];
    let mut n = 0u32;
    const CALIB_N: usize = 100;
    for i in 0..CALIB_N {
        if let Ok(sample) = imu.read_sample().await {
            for j in 0..3 {
                gyro_bias[j] += sample.gyro_rad_s[j];
            }
            n += 1;
        }
        if i % 10 == 0 {
            led.toggle();
        }
        Timer::after(Duration::from_millis(10)).await;
    }
    if n > 0 {
        for b in gyro_bias.iter_mut() {
            *b /= n as f32;
        }
    }
    led.set_high();
    defmt::info!("gyro bias [rad/s]: {}", gyro_bias);

    // 4. Estimator: a bad configuration is fatal
    let config = EstimatorConfig::default()
        .with_gyro_variance(GYRO_NOISE_VAR)
        .with_gains(ACCEL_GAIN, MAG_GAIN);
    let estimator = defmt::unwrap!(AttitudeEstimator::new(config));
    let estimator: &'static Estimator = ESTIMATOR.init(SharedEstimator::new(estimator));

    // 5. Spawn tasks
    spawner
        .spawn(gyro_task(imu, GyroTaskConfig { gyro_bias }, estimator))
        .unwrap();
    spawner
        .spawn(reference_task(mag_i2c, mag, estimator))
        .unwrap();
    spawner.spawn(telemetry_task(estimator)).unwrap();

    // 6. Main task: LED heartbeat @ 1 Hz
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
