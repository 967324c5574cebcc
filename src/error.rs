//! Error types
//!
//! Sample errors are reject-and-skip: the call is a no-op and the estimator
//! state is left untouched. Configuration errors are fatal and surface only
//! from [`AttitudeEstimator::new`](crate::AttitudeEstimator::new).

use core::fmt;

/// Why a sensor sample was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EstimatorError {
    /// `dt` was zero, negative or not finite
    NonPositiveTimeStep,
    /// An input vector contained NaN or infinity
    NonFiniteInput,
    /// Accelerometer vector has zero length
    ZeroAcceleration,
    /// Magnetometer vector has zero length
    ZeroMagneticField,
    /// Magnetic field is parallel to gravity, so it carries no heading
    DegenerateHeading,
    /// Innovation covariance could not be inverted
    SingularInnovation,
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveTimeStep => write!(f, "time step must be positive"),
            Self::NonFiniteInput => write!(f, "input contains non-finite values"),
            Self::ZeroAcceleration => write!(f, "accelerometer vector has zero length"),
            Self::ZeroMagneticField => write!(f, "magnetometer vector has zero length"),
            Self::DegenerateHeading => write!(f, "magnetic field is parallel to gravity"),
            Self::SingularInnovation => write!(f, "innovation covariance is singular"),
        }
    }
}

/// Invalid estimator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Gyro noise covariance is not symmetric or has non-finite entries
    GyroNoiseNotSymmetric,
    /// Gyro noise covariance has a negative eigenvalue
    GyroNoiseIndefinite,
    /// A correction gain lies outside `[0, 1]`
    GainOutOfRange,
    /// Initial covariance scale must be positive and finite
    InvalidCovarianceScale,
    /// Measurement noise must be positive and finite
    InvalidMeasurementNoise,
    /// Initial attitude is zero or non-finite
    InvalidInitialAttitude,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GyroNoiseNotSymmetric => write!(f, "gyro noise covariance is not symmetric"),
            Self::GyroNoiseIndefinite => {
                write!(f, "gyro noise covariance is not positive semi-definite")
            }
            Self::GainOutOfRange => write!(f, "correction gain outside [0, 1]"),
            Self::InvalidCovarianceScale => write!(f, "initial covariance scale must be positive"),
            Self::InvalidMeasurementNoise => write!(f, "measurement noise must be positive"),
            Self::InvalidInitialAttitude => write!(f, "initial attitude must be a finite non-zero quaternion"),
        }
    }
}

/// Kalman engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KalmanError {
    /// `H·P·Hᵀ + R` is singular or the update produced non-finite values
    SingularInnovation,
}

impl fmt::Display for KalmanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingularInnovation => write!(f, "innovation covariance is singular"),
        }
    }
}

impl From<KalmanError> for EstimatorError {
    fn from(err: KalmanError) -> Self {
        match err {
            KalmanError::SingularInnovation => Self::SingularInnovation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kalman_error_converts() {
        let err: EstimatorError = KalmanError::SingularInnovation.into();
        assert_eq!(err, EstimatorError::SingularInnovation);
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            format!("{}", EstimatorError::NonPositiveTimeStep),
            "time step must be positive"
        );
        assert_eq!(
            format!("{}", ConfigError::GainOutOfRange),
            "correction gain outside [0, 1]"
        );
    }
}
