use embassy_executor::task;
use embassy_time::{Duration, Ticker};

use crate::Estimator;

/// Telemetry task: 10 Hz attitude over RTT.
#[task]
pub async fn telemetry_task(estimator: &'static Estimator) {
    let mut ticker = Ticker::every(Duration::from_hz(10));
    let mut tick: u32 = 0;

    loop {
        ticker.next().await;
        tick = tick.wrapping_add(1);

        let q = estimator.attitude();
        let (roll, pitch, yaw) = q.to_euler();

        defmt::info!(
            "[ATT] R:{=f32} P:{=f32} Y:{=f32} deg",
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees()
        );

        // Full quaternion once per second
        if tick % 10 == 0 {
            defmt::debug!("[ATT] q={}", q);
        }
    }
}
