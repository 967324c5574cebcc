pub mod hmc5883;
pub mod icm42688;
