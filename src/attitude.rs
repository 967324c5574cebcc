//! Quaternion attitude estimator
//!
//! State: unit quaternion `q` rotating body-frame vectors into the world
//! frame (z up, x north), with a 4×4 covariance.
//!
//! - Gyro samples drive a linearized predict: `q̇ = ½ Ξ(q) ω`.
//! - Accelerometer + magnetometer pairs build a tilt-then-heading corrected
//!   reference quaternion that is fed to the update as a direct measurement
//!   of `q` (`H = I`).
//!
//! Invalid samples are rejected before they reach the filter and leave the
//! state untouched.

use crate::config::EstimatorConfig;
use crate::error::{ConfigError, EstimatorError};
use crate::kalman::KalmanFilter;
use crate::matrix::{self, Matrix};
use crate::quaternion::{self, corrective_rotation, Quaternion, Vector3};

/// World-frame specific force of a body at rest (z up)
pub const GRAVITY_REFERENCE: Vector3 = [0.0, 0.0, 1.0];
/// World-frame horizontal magnetic north
pub const NORTH_REFERENCE: Vector3 = [1.0, 0.0, 0.0];

/// Below this length the tilt-compensated field has no usable heading
const HEADING_EPS: f32 = 1e-6;

pub struct AttitudeEstimator {
    filter: KalmanFilter<4, 4>,
    config: EstimatorConfig,
    /// Measurement covariance, `measurement_noise · I`
    r: Matrix<4, 4>,
}

impl AttitudeEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let q0 = config
            .initial_attitude
            .normalized()
            .ok_or(ConfigError::InvalidInitialAttitude)?;

        let filter = KalmanFilter::new(
            q0.to_array(),
            matrix::scaled_identity(config.initial_covariance_scale),
            matrix::identity(),
            matrix::identity(),
        );

        log_debug!(
            "attitude estimator: accel_gain={} mag_gain={} p0={}",
            config.accel_gain,
            config.mag_gain,
            config.initial_covariance_scale
        );

        Ok(Self {
            filter,
            r: matrix::scaled_identity(config.measurement_noise),
            config,
        })
    }

    /// Current attitude estimate
    pub fn attitude(&self) -> Quaternion {
        Quaternion::from_array(*self.filter.state())
    }

    /// Current 4×4 covariance over `[w, x, y, z]`
    pub fn covariance(&self) -> &Matrix<4, 4> {
        self.filter.covariance()
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    // ── Predict step ─────────────────────────────────────────────────────────

    /// Propagate the attitude by a gyro sample `gyro` (rad/s, body frame)
    /// taken `dt` seconds after the previous one.
    pub fn on_angular_rate(&mut self, gyro: Vector3, dt: f32) -> Result<(), EstimatorError> {
        if let Err(err) = check_angular_rate(gyro, dt) {
            log_warn!("gyro sample rejected: {}", err);
            return Err(err);
        }

        let q = self.attitude();
        let xi = kinematics_matrix(q);

        // Control matrix: B = dt/2 * Xi(q)
        let b = matrix::scale(&xi, 0.5 * dt);

        // Noise Jacobian G = -Xi(q); Q = G * Sigma * G' * dt^2/4
        let g = matrix::scale(&xi, -1.0);
        let g_sigma = matrix::mul(&g, &self.config.gyro_noise);
        let q_noise = matrix::scale(&matrix::mul_transpose(&g_sigma, &g), 0.25 * dt * dt);

        // Zero-order hold: all rotation enters through B*u
        self.filter
            .predict(&matrix::identity(), &gyro, &b, &[0.0; 4], &q_noise);

        if self.config.renormalize {
            self.renormalize();
        }
        let q = self.attitude();
        log_trace!("predict dt={} q=[{}, {}, {}, {}]", dt, q.w, q.x, q.y, q.z);
        Ok(())
    }

    // ── Update step ──────────────────────────────────────────────────────────

    /// Correct the attitude with a body-frame accelerometer reading `accel`
    /// and magnetometer reading `mag` (any consistent units).
    pub fn on_reference_vectors(&mut self, accel: Vector3, mag: Vector3) -> Result<(), EstimatorError> {
        let measured = match self.reference_attitude(accel, mag) {
            Ok(q) => q,
            Err(err) => {
                log_warn!("reference sample rejected: {}", err);
                return Err(err);
            }
        };

        if let Err(err) = self
            .filter
            .update(&measured.to_array(), &[0.0; 4], &self.r)
        {
            log_warn!("attitude update skipped: {}", err);
            return Err(err.into());
        }

        if self.config.renormalize {
            self.renormalize();
        }
        Ok(())
    }

    /// Measurement quaternion `q_m` built from one accelerometer and
    /// magnetometer pair, starting from the current estimate.
    fn reference_attitude(&self, accel: Vector3, mag: Vector3) -> Result<Quaternion, EstimatorError> {
        if !quaternion::is_finite(accel) || !quaternion::is_finite(mag) {
            return Err(EstimatorError::NonFiniteInput);
        }
        let accel = quaternion::normalize(accel).ok_or(EstimatorError::ZeroAcceleration)?;
        let mag = quaternion::normalize(mag).ok_or(EstimatorError::ZeroMagneticField)?;

        let q = self.attitude();

        // Tilt: pull predicted gravity toward the accelerometer
        let tilt = corrective_rotation(q, GRAVITY_REFERENCE, accel, self.config.accel_gain);
        let q_g = tilt * q;

        // Heading: only the horizontal part of the field may act, so the
        // magnetometer can correct yaw but never roll or pitch.
        let down_body = q_g.conjugate().rotate(GRAVITY_REFERENCE);
        let north_body = horizontal_heading(down_body, mag).ok_or(EstimatorError::DegenerateHeading)?;

        let heading = corrective_rotation(q_g, NORTH_REFERENCE, north_body, self.config.mag_gain);
        let q_m = heading * q_g;

        // q and -q are the same rotation; keep the measurement on the
        // state's hemisphere so the innovation stays small.
        if q_m.dot(q) < 0.0 {
            Ok(Quaternion::new(-q_m.w, -q_m.x, -q_m.y, -q_m.z))
        } else {
            Ok(q_m)
        }
    }

    fn renormalize(&mut self) {
        if let Some(q) = self.attitude().normalized() {
            *self.filter.state_mut() = q.to_array();
        }
    }
}

/// Tilt-compensated magnetic north in the body frame.
///
/// Removes the component of `mag` along `down_body` with a double cross
/// product (`e = d × m`, `n = e × d`) and normalizes. The result is
/// orthogonal to `down_body`. Returns `None` when the field is parallel to
/// gravity.
pub fn horizontal_heading(down_body: Vector3, mag: Vector3) -> Option<Vector3> {
    let east = quaternion::cross(down_body, mag);
    let north = quaternion::cross(east, down_body);
    if quaternion::norm(north) <= HEADING_EPS {
        return None;
    }
    quaternion::normalize(north)
}

fn check_angular_rate(gyro: Vector3, dt: f32) -> Result<(), EstimatorError> {
    if !(dt > 0.0) || !dt.is_finite() {
        return Err(EstimatorError::NonPositiveTimeStep);
    }
    if !quaternion::is_finite(gyro) {
        return Err(EstimatorError::NonFiniteInput);
    }
    Ok(())
}

/// Ξ(q) with `q̇ = ½ Ξ(q) ω`, i.e. the matrix form of `q ⊗ (0, ω)`
fn kinematics_matrix(q: Quaternion) -> Matrix<4, 3> {
    let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
    [
        [-q1, -q2, -q3],
        [q0, -q3, q2],
        [q3, q0, -q1],
        [-q2, q1, q0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn estimator(config: EstimatorConfig) -> AttitudeEstimator {
        AttitudeEstimator::new(config).unwrap()
    }

    fn snapshot(est: &AttitudeEstimator) -> ([u32; 4], [[u32; 4]; 4]) {
        let q = est.attitude().to_array().map(f32::to_bits);
        let p = est.covariance().map(|row| row.map(f32::to_bits));
        (q, p)
    }

    fn assert_symmetric_psd(p: &Matrix<4, 4>) {
        for i in 0..4 {
            for j in 0..4 {
                assert!(p[i][j].is_finite());
                assert!(
                    (p[i][j] - p[j][i]).abs() <= 1e-6 * (1.0 + p[i][i].abs().max(p[j][j].abs())),
                    "asymmetric at ({}, {}): {:?}",
                    i,
                    j,
                    p
                );
            }
        }

        // Cholesky in f64 with a jitter proportional to the trace
        let trace: f64 = (0..4).map(|i| p[i][i] as f64).sum();
        assert!(trace >= 0.0);
        let jitter = 1e-6 * trace.max(1e-12);
        let mut l = [[0.0f64; 4]; 4];
        for i in 0..4 {
            for j in 0..=i {
                let mut sum = p[i][j] as f64;
                if i == j {
                    sum += jitter;
                }
                for k in 0..j {
                    sum -= l[i][k] * l[j][k];
                }
                if i == j {
                    assert!(sum > 0.0, "not positive semi-definite: {:?}", p);
                    l[i][i] = sum.sqrt();
                } else {
                    l[i][j] = sum / l[j][j];
                }
            }
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EstimatorConfig::default().with_gains(2.0, 0.1);
        assert!(matches!(
            AttitudeEstimator::new(config),
            Err(ConfigError::GainOutOfRange)
        ));
    }

    #[test]
    fn test_new_normalizes_initial_attitude() {
        let mut config = EstimatorConfig::default();
        config.initial_attitude = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        let est = estimator(config);
        assert_eq!(est.attitude(), Quaternion::IDENTITY);
        assert_eq!(est.covariance(), &matrix::scaled_identity::<4>(10.0));
    }

    #[test]
    fn test_kinematics_matrix_matches_hamilton_product() {
        let q = Quaternion::from_axis_angle([0.48, 0.6, 0.64], 0.9);
        let w = [0.3, -0.2, 0.7];
        let expected = q * Quaternion::new(0.0, w[0], w[1], w[2]);
        let got = matrix::mul_vec(&kinematics_matrix(q), &w);
        assert!((got[0] - expected.w).abs() < 1e-6);
        assert!((got[1] - expected.x).abs() < 1e-6);
        assert!((got[2] - expected.y).abs() < 1e-6);
        assert!((got[3] - expected.z).abs() < 1e-6);
    }

    #[test]
    fn test_zero_time_step_is_rejected_bit_for_bit() {
        let mut est = estimator(EstimatorConfig::default());
        est.on_angular_rate([0.1, 0.2, 0.3], 0.01).unwrap();
        let before = snapshot(&est);

        for dt in [0.0, -0.01, f32::NAN, f32::INFINITY] {
            assert_eq!(
                est.on_angular_rate([0.1, 0.2, 0.3], dt),
                Err(EstimatorError::NonPositiveTimeStep)
            );
            assert_eq!(snapshot(&est), before);
        }
    }

    #[test]
    fn test_non_finite_gyro_is_rejected() {
        let mut est = estimator(EstimatorConfig::default());
        let before = snapshot(&est);
        assert_eq!(
            est.on_angular_rate([f32::NAN, 0.0, 0.0], 0.01),
            Err(EstimatorError::NonFiniteInput)
        );
        assert_eq!(snapshot(&est), before);
    }

    #[test]
    fn test_invalid_reference_vectors_are_rejected() {
        let mut est = estimator(EstimatorConfig::default());
        est.on_angular_rate([0.0, 0.0, 0.5], 0.01).unwrap();
        let before = snapshot(&est);

        let cases = [
            ([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], EstimatorError::ZeroAcceleration),
            ([0.0, 0.0, 1.0], [0.0, 0.0, 0.0], EstimatorError::ZeroMagneticField),
            ([0.0, f32::INFINITY, 1.0], [1.0, 0.0, 0.0], EstimatorError::NonFiniteInput),
            ([0.0, 0.0, 1.0], [f32::NAN, 0.0, 0.0], EstimatorError::NonFiniteInput),
            // Field straight along gravity carries no heading
            ([0.0, 0.0, 1.0], [0.0, 0.0, -0.5], EstimatorError::DegenerateHeading),
        ];
        for (accel, mag, expected) in cases {
            assert_eq!(est.on_reference_vectors(accel, mag), Err(expected));
            assert_eq!(snapshot(&est), before);
        }
    }

    #[test]
    fn test_zero_rate_keeps_attitude() {
        let mut config = EstimatorConfig::default().with_gyro_variance(1e-3);
        config.initial_attitude = Quaternion::from_axis_angle([0.0, 0.6, 0.8], 0.5);
        let mut est = estimator(config);
        let q0 = est.attitude();

        let mut last_diag = [0.0f32; 4];
        for i in 0..4 {
            last_diag[i] = est.covariance()[i][i];
        }

        for _ in 0..100 {
            est.on_angular_rate([0.0; 3], 0.01).unwrap();
            let q = est.attitude();
            assert!((q.w - q0.w).abs() < 1e-6);
            assert!((q.x - q0.x).abs() < 1e-6);
            assert!((q.y - q0.y).abs() < 1e-6);
            assert!((q.z - q0.z).abs() < 1e-6);
            for i in 0..4 {
                let d = est.covariance()[i][i];
                assert!(d >= last_diag[i], "covariance shrank without a measurement");
                last_diag[i] = d;
            }
        }
    }

    #[test]
    fn test_zero_rate_without_gyro_noise_keeps_covariance() {
        let mut est = estimator(EstimatorConfig::default().with_gyro_variance(0.0));
        est.on_reference_vectors([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]).unwrap();
        let p = *est.covariance();
        for _ in 0..10 {
            est.on_angular_rate([0.0; 3], 0.02).unwrap();
        }
        assert_eq!(est.covariance(), &p);
    }

    #[test]
    fn test_constant_yaw_rate_integrates() {
        let mut est = estimator(EstimatorConfig::default());
        for _ in 0..100 {
            est.on_angular_rate([0.0, 0.0, 1.0], 0.01).unwrap();
        }
        let (roll, pitch, yaw) = est.attitude().to_euler();
        assert!((yaw - 1.0).abs() < 1e-3, "yaw {}", yaw);
        assert!(roll.abs() < 1e-6 && pitch.abs() < 1e-6);
        assert!((est.attitude().norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_end_to_end_yaw_scenario() {
        let run = || {
            let mut config = EstimatorConfig::default()
                .with_gyro_variance(0.0)
                .with_gains(0.1, 0.1);
            config.initial_covariance_scale = 10.0;
            let mut est = estimator(config);
            for _ in 0..100 {
                est.on_angular_rate([0.0, 0.0, 1.0], 0.01).unwrap();
            }
            let (_, _, yaw_before) = est.attitude().to_euler();
            est.on_reference_vectors([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]).unwrap();
            (yaw_before, est.attitude())
        };

        let (yaw_before, q) = run();
        let (roll, pitch, yaw) = q.to_euler();

        // Accel and mag both say "no rotation": a 10% pull back toward
        // identity, most of the integrated yaw retained.
        assert!((yaw_before - 1.0).abs() < 1e-3);
        assert!(yaw < yaw_before);
        assert!((yaw - 0.9 * yaw_before).abs() < 5e-3, "yaw {}", yaw);
        assert!(roll.abs() < 1e-5 && pitch.abs() < 1e-5);

        // No randomness anywhere: reruns are bit-identical
        let (_, again) = run();
        assert_eq!(q.to_array().map(f32::to_bits), again.to_array().map(f32::to_bits));
    }

    #[test]
    fn test_update_shrinks_covariance() {
        let mut est = estimator(EstimatorConfig::default());
        est.on_reference_vectors([0.0, 0.0, 9.81], [0.4, 0.0, -0.9]).unwrap();
        for i in 0..4 {
            assert!(est.covariance()[i][i] < 1e-3);
        }
    }

    #[test]
    fn test_horizontal_heading_is_orthogonal_to_gravity() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let down = quaternion::normalize([
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ])
            .unwrap();
            let mag = [
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
            ];
            if let Some(north) = horizontal_heading(down, mag) {
                assert!(quaternion::dot(north, down).abs() < 1e-5);
                assert!((quaternion::norm(north) - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_inclined_field_drops_vertical_component() {
        let down = [0.0, 0.0, 1.0];
        let north = horizontal_heading(down, [0.3, 0.0, -0.8]).unwrap();
        assert!((north[0] - 1.0).abs() < 1e-6);
        assert!(north[1].abs() < 1e-6 && north[2].abs() < 1e-6);
    }

    #[test]
    fn test_magnetometer_corrects_only_heading() {
        let mut est = estimator(EstimatorConfig::default().with_gains(0.5, 0.5));

        // Level body, field yawed by 0.3 rad with a strong downward dip
        let yaw_offset: f32 = 0.3;
        let mag = [yaw_offset.cos(), -yaw_offset.sin(), -1.5];
        for _ in 0..5 {
            est.on_reference_vectors([0.0, 0.0, 1.0], mag).unwrap();
            let (roll, pitch, _) = est.attitude().to_euler();
            assert!(roll.abs() < 1e-5, "roll {}", roll);
            assert!(pitch.abs() < 1e-5, "pitch {}", pitch);
        }
        let (_, _, yaw) = est.attitude().to_euler();
        assert!(yaw > 0.1, "yaw {}", yaw);
        assert!(yaw <= yaw_offset + 1e-4);
    }

    #[test]
    fn test_reference_magnitude_does_not_matter() {
        let mag = [0.4, 0.1, -0.9];
        let mut unit = estimator(EstimatorConfig::default());
        unit.on_reference_vectors([0.0, 0.3, 1.0], mag).unwrap();

        for scale in [1e20f32, 1e-10] {
            let mut est = estimator(EstimatorConfig::default());
            est.on_reference_vectors([0.0, 0.3 * scale, scale], mag).unwrap();
            let a = est.attitude();
            let b = unit.attitude();
            assert!(a.dot(b).abs() > 1.0 - 1e-6, "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn test_southward_field_turns_heading_around() {
        let mut est = estimator(EstimatorConfig::default().with_gains(1.0, 1.0));

        // Level body, field pointing straight back along -x
        est.on_reference_vectors([0.0, 0.0, 1.0], [-1.0, 0.0, -0.5]).unwrap();

        let (roll, pitch, yaw) = est.attitude().to_euler();
        assert!(roll.abs() < 1e-4, "roll {}", roll);
        assert!(pitch.abs() < 1e-4, "pitch {}", pitch);
        assert!((yaw.abs() - core::f32::consts::PI).abs() < 1e-3, "yaw {}", yaw);
    }

    #[test]
    fn test_accelerometer_levels_tilted_estimate() {
        let mut config = EstimatorConfig::default().with_gains(0.2, 0.0);
        config.initial_attitude = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.4);
        let mut est = estimator(config);

        // P0 >> R: the first update adopts the reference almost entirely,
        // which removes 20% of the tilt.
        est.on_reference_vectors([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]).unwrap();
        let (mut last_roll, pitch, _) = est.attitude().to_euler();
        assert!((last_roll - 0.32).abs() < 1e-3, "roll {}", last_roll);
        assert!(pitch.abs() < 1e-5);

        for _ in 0..20 {
            est.on_angular_rate([0.0; 3], 0.01).unwrap();
            est.on_reference_vectors([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]).unwrap();
            let (roll, pitch, _) = est.attitude().to_euler();
            assert!(roll < last_roll && roll > 0.0, "roll {}", roll);
            assert!(pitch.abs() < 1e-5, "pitch {}", pitch);
            last_roll = roll;
        }
    }

    #[test]
    fn test_renormalization_can_be_disabled() {
        let mut config = EstimatorConfig::default();
        config.renormalize = false;
        let mut est = estimator(config);
        for _ in 0..1000 {
            est.on_angular_rate([1.0, 0.5, -0.5], 0.01).unwrap();
        }
        // First-order integration inflates the norm when left alone
        assert!(est.attitude().norm() > 1.0 + 1e-4);
    }

    #[test]
    fn test_covariance_stays_symmetric_psd() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut est = estimator(EstimatorConfig::default().with_gyro_variance(1e-3).with_gains(0.05, 0.05));

        for step in 0..2000 {
            if step % 10 == 9 {
                let accel = [
                    rng.gen_range(-0.3..0.3),
                    rng.gen_range(-0.3..0.3),
                    rng.gen_range(0.7..1.3),
                ];
                let mag = [
                    rng.gen_range(0.2..0.5),
                    rng.gen_range(-0.2..0.2),
                    rng.gen_range(-0.9..-0.3),
                ];
                est.on_reference_vectors(accel, mag).unwrap();
            } else {
                let gyro = [
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                ];
                est.on_angular_rate(gyro, rng.gen_range(0.001..0.02)).unwrap();
            }
            assert_symmetric_psd(est.covariance());
            assert!((est.attitude().norm() - 1.0).abs() < 1e-4);
        }
    }
}
