//! Quaternion attitude estimation for flight controllers.
//!
//! A gyroscope-driven Kalman prediction is corrected by a tilt-and-heading
//! reference quaternion built from the accelerometer and magnetometer.
//!
//! The crate is `no_std` and allocation-free. Layers, leaves first:
//!
//! - [`quaternion`]: rotation algebra and the geometric corrective rotation.
//! - [`matrix`]: fixed-size matrix helpers.
//! - [`kalman`]: a generic linear Kalman engine.
//! - [`attitude`]: the estimator that feeds sensor samples into the engine.
//! - [`shared`]: a mutex-guarded estimator and a latest-sample hand-off
//!   for multi-task firmware.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod attitude;
pub mod config;
pub mod error;
pub mod kalman;
pub mod matrix;
pub mod quaternion;
pub mod shared;

pub use attitude::AttitudeEstimator;
pub use config::EstimatorConfig;
pub use error::{ConfigError, EstimatorError, KalmanError};
pub use kalman::KalmanFilter;
pub use quaternion::{Quaternion, Vector3};
pub use shared::{LatestSample, SharedEstimator};
