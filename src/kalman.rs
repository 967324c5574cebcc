//! Generic linear Kalman filter
//!
//! State `x` (dimension `N`), covariance `P` (`N×N`) and a fixed
//! observation matrix `H` (`Z×N`). Transition, control and noise terms are
//! supplied on every call, so the engine carries no model of its own.
//!
//! ```text
//! predict:  x = F·x + B·u + w̄          P = F·P·Fᵀ + Q
//! update:   y = z − H·x − v̄            S = H·P·Hᵀ + R
//!           K = P·Hᵀ·S⁻¹               x = x + K·y
//!           P = (I − K·H)·P
//! ```
//!
//! No normalization of `x` happens here; quaternion callers renormalize
//! through [`KalmanFilter::state_mut`].

use crate::error::KalmanError;
use crate::matrix::{self, Matrix};

pub struct KalmanFilter<const N: usize, const Z: usize> {
    /// State vector
    x: [f32; N],
    /// Error covariance
    p: Matrix<N, N>,
    /// Observation matrix
    h: Matrix<Z, N>,
    /// Reserved: stored for a future global process-noise shaping, not
    /// applied by `predict`.
    process_noise_transform: Matrix<N, N>,
}

impl<const N: usize, const Z: usize> KalmanFilter<N, Z> {
    pub fn new(
        x0: [f32; N],
        p0: Matrix<N, N>,
        h: Matrix<Z, N>,
        process_noise_transform: Matrix<N, N>,
    ) -> Self {
        Self {
            x: x0,
            p: p0,
            h,
            process_noise_transform,
        }
    }

    pub fn state(&self) -> &[f32; N] {
        &self.x
    }

    pub fn state_mut(&mut self) -> &mut [f32; N] {
        &mut self.x
    }

    pub fn covariance(&self) -> &Matrix<N, N> {
        &self.p
    }

    pub fn observation_matrix(&self) -> &Matrix<Z, N> {
        &self.h
    }

    pub fn process_noise_transform(&self) -> &Matrix<N, N> {
        &self.process_noise_transform
    }

    // ── Predict step ─────────────────────────────────────────────────────────

    /// Time update with transition `f`, control input `u` mapped through
    /// `b`, additive process-noise mean and process covariance `q`.
    pub fn predict<const M: usize>(
        &mut self,
        f: &Matrix<N, N>,
        u: &[f32; M],
        b: &Matrix<N, M>,
        noise_mean: &[f32; N],
        q: &Matrix<N, N>,
    ) {
        let fx = matrix::mul_vec(f, &self.x);
        let bu = matrix::mul_vec(b, u);
        for i in 0..N {
            self.x[i] = fx[i] + bu[i] + noise_mean[i];
        }

        let fp = matrix::mul(f, &self.p);
        let fpft = matrix::mul_transpose(&fp, f);
        self.p = matrix::add(&fpft, q);
    }

    // ── Update step ──────────────────────────────────────────────────────────

    /// Measurement update with measurement `z`, additive measurement-noise
    /// mean and measurement covariance `r`.
    ///
    /// On a singular innovation covariance, or if the update would produce
    /// non-finite values, nothing is modified.
    pub fn update(
        &mut self,
        z: &[f32; Z],
        noise_mean: &[f32; Z],
        r: &Matrix<Z, Z>,
    ) -> Result<(), KalmanError> {
        // Innovation y = z - H*x - v
        let hx = matrix::mul_vec(&self.h, &self.x);
        let mut y = [0.0f32; Z];
        for i in 0..Z {
            y[i] = z[i] - hx[i] - noise_mean[i];
        }

        // S = H*P*H' + R
        let hp = matrix::mul(&self.h, &self.p);
        let s = matrix::add(&matrix::mul_transpose(&hp, &self.h), r);
        let s_inv = matrix::invert(&s).ok_or(KalmanError::SingularInnovation)?;

        // K = P*H'*S^-1
        let pht = matrix::mul_transpose(&self.p, &self.h);
        let k = matrix::mul(&pht, &s_inv);

        let ky = matrix::mul_vec(&k, &y);
        let mut x = self.x;
        for i in 0..N {
            x[i] += ky[i];
        }

        // P = (I - K*H)*P = P - K*(H*P)
        let mut p = matrix::sub(&self.p, &matrix::mul(&k, &hp));
        matrix::symmetrize(&mut p);

        if !x.iter().all(|v| v.is_finite()) || !matrix::is_finite(&p) {
            return Err(KalmanError::SingularInnovation);
        }

        self.x = x;
        self.p = p;
        Ok(())
    }
}
