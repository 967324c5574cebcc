//! Estimator configuration
//!
//! Fixed for the estimator's lifetime and validated once in
//! [`AttitudeEstimator::new`](crate::AttitudeEstimator::new).

use micromath::F32Ext;

use crate::error::ConfigError;
use crate::matrix::{self, Matrix};
use crate::quaternion::Quaternion;

/// Default gyro noise variance per axis, (rad/s)²
const DEFAULT_GYRO_NOISE: f32 = 1e-4;
/// Default accelerometer (tilt) correction gain
const DEFAULT_ACCEL_GAIN: f32 = 0.02;
/// Default magnetometer (heading) correction gain
const DEFAULT_MAG_GAIN: f32 = 0.01;
/// High initial uncertainty
const DEFAULT_COVARIANCE_SCALE: f32 = 10.0;
/// Diagonal of R: the fused reference quaternion is trusted far more than
/// the propagated state
const DEFAULT_MEASUREMENT_NOISE: f32 = 1e-4;

/// Relative tolerance for the symmetry and definiteness checks
const SYMMETRY_TOL: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimatorConfig {
    /// Gyro noise covariance Σ, (rad/s)². Symmetric positive semi-definite.
    pub gyro_noise: Matrix<3, 3>,
    /// Tilt correction gain in `[0, 1]`
    pub accel_gain: f32,
    /// Heading correction gain in `[0, 1]`
    pub mag_gain: f32,
    /// Starting attitude, normalized at construction
    pub initial_attitude: Quaternion,
    /// Initial covariance is `initial_covariance_scale · I`
    pub initial_covariance_scale: f32,
    /// Measurement covariance is `measurement_noise · I`
    pub measurement_noise: f32,
    /// Renormalize the state quaternion after every predict and update.
    /// With this off the norm drifts and is bounded only by small gains and
    /// noise.
    pub renormalize: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            gyro_noise: matrix::scaled_identity(DEFAULT_GYRO_NOISE),
            accel_gain: DEFAULT_ACCEL_GAIN,
            mag_gain: DEFAULT_MAG_GAIN,
            initial_attitude: Quaternion::IDENTITY,
            initial_covariance_scale: DEFAULT_COVARIANCE_SCALE,
            measurement_noise: DEFAULT_MEASUREMENT_NOISE,
            renormalize: true,
        }
    }
}

impl EstimatorConfig {
    /// Isotropic gyro noise with variance `variance` on every axis
    pub fn with_gyro_variance(mut self, variance: f32) -> Self {
        self.gyro_noise = matrix::scaled_identity(variance);
        self
    }

    pub fn with_gains(mut self, accel_gain: f32, mag_gain: f32) -> Self {
        self.accel_gain = accel_gain;
        self.mag_gain = mag_gain;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gyro_noise(&self.gyro_noise)?;

        for gain in [self.accel_gain, self.mag_gain] {
            if !(0.0..=1.0).contains(&gain) {
                return Err(ConfigError::GainOutOfRange);
            }
        }

        if !(self.initial_covariance_scale > 0.0) || !self.initial_covariance_scale.is_finite() {
            return Err(ConfigError::InvalidCovarianceScale);
        }
        if !(self.measurement_noise > 0.0) || !self.measurement_noise.is_finite() {
            return Err(ConfigError::InvalidMeasurementNoise);
        }
        if self.initial_attitude.normalized().is_none() {
            return Err(ConfigError::InvalidInitialAttitude);
        }
        Ok(())
    }
}

/// Symmetric and positive semi-definite: every principal minor of a 3×3
/// matrix must be non-negative.
fn validate_gyro_noise(m: &Matrix<3, 3>) -> Result<(), ConfigError> {
    if !matrix::is_finite(m) {
        return Err(ConfigError::GyroNoiseNotSymmetric);
    }

    let scale = m
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f32, |acc, x| acc.max(x.abs()));
    let tol = SYMMETRY_TOL * scale;

    for i in 0..3 {
        for j in (i + 1)..3 {
            let diff = m[i][j] - m[j][i];
            if diff > tol || diff < -tol {
                return Err(ConfigError::GyroNoiseNotSymmetric);
            }
        }
    }

    let minor_tol = tol * scale;
    let diagonal_ok = (0..3).all(|i| m[i][i] >= -tol);
    let pairs_ok = [(0, 1), (0, 2), (1, 2)]
        .iter()
        .all(|&(i, j)| m[i][i] * m[j][j] - m[i][j] * m[j][i] >= -minor_tol);
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);

    if diagonal_ok && pairs_ok && det >= -minor_tol * scale {
        Ok(())
    } else {
        Err(ConfigError::GyroNoiseIndefinite)
    }
}
