//! Estimator shared between tasks
//!
//! The gyro task (fast) and the reference-vector task (slow) usually run at
//! different rates, possibly at different priorities. Both go through one
//! blocking mutex so a predict and an update never interleave and the
//! state/covariance pair always changes as a unit.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::attitude::AttitudeEstimator;
use crate::error::EstimatorError;
use crate::quaternion::{Quaternion, Vector3};

pub struct SharedEstimator<M: RawMutex> {
    inner: Mutex<M, RefCell<AttitudeEstimator>>,
}

impl<M: RawMutex> SharedEstimator<M> {
    pub fn new(estimator: AttitudeEstimator) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(estimator)),
        }
    }

    /// Run `f` with exclusive access to the estimator
    pub fn lock<R>(&self, f: impl FnOnce(&mut AttitudeEstimator) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn on_angular_rate(&self, gyro: Vector3, dt: f32) -> Result<(), EstimatorError> {
        self.lock(|est| est.on_angular_rate(gyro, dt))
    }

    pub fn on_reference_vectors(&self, accel: Vector3, mag: Vector3) -> Result<(), EstimatorError> {
        self.lock(|est| est.on_reference_vectors(accel, mag))
    }

    pub fn attitude(&self) -> Quaternion {
        self.inner.lock(|cell| cell.borrow().attitude())
    }
}

/// Newest-value hand-off between a producer and a slower consumer.
///
/// Publishing overwrites any sample not yet taken. Taking empties the slot,
/// so a consumer never sees the same sample twice and can tell when the
/// producer has gone quiet.
pub struct LatestSample<M: RawMutex, T: Send> {
    signal: Signal<M, T>,
}

impl<M: RawMutex, T: Send> LatestSample<M, T> {
    pub const fn new() -> Self {
        Self { signal: Signal::new() }
    }

    pub fn publish(&self, sample: T) {
        self.signal.signal(sample);
    }

    /// Sample published since the last take, if any
    pub fn take(&self) -> Option<T> {
        self.signal.try_take()
    }
}

impl<M: RawMutex, T: Send> Default for LatestSample<M, T> {
    fn default() -> Self {
        Self::new()
    }
}
