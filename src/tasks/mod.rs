pub mod gyro_task;
pub mod reference_task;
pub mod telemetry_task;
