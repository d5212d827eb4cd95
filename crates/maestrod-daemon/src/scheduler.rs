//! Timer-driven admission cycles.

use std::time::Duration;

use maestrod_scheduler::check;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{error, warn};

use crate::AppState;

/// Run admission cycles forever, one per tick.
///
/// The scheduler state is locked for the whole cycle, and the cycle itself
/// is bounded so a stuck backend call cannot stall future ticks. The bound
/// covers one status check per running build plus the provisioning calls,
/// each already capped by the HTTP client timeout.
pub async fn run(state: AppState) {
    let server = &state.config.server;
    let cycle_timeout = Duration::from_secs(
        server
            .request_timeout_secs
            .saturating_mul(server.max_builds as u64 + 6),
    );

    let mut ticker = interval(Duration::from_secs(server.check_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let mut scheduler = state.scheduler.lock().await;
        let scheduler = &mut *scheduler;
        let cycle = check(
            &state.config,
            &mut scheduler.queue,
            &mut scheduler.running,
            state.driver.as_ref(),
        );
        match timeout(cycle_timeout, cycle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(error = %err, "admission cycle failed"),
            Err(_) => warn!("admission cycle timed out"),
        }
    }
}
