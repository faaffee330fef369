use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::manager::RideManager;
use crate::provider::Provider;

/// Run the inactivity check every `period` until `shutdown` resolves.
///
/// The first check happens one full period after start.
pub async fn run_ticker<P: Provider>(
    manager: &RideManager<P>, period: Duration, shutdown: impl Future<Output = ()>,
) {
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(period_secs = period.as_secs(), "inactivity ticker started");
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("inactivity ticker stopped");
                return;
            }
            _ = interval.tick() => {
                if manager.check_inactivity().await {
                    debug!("inactivity check ended a ride");
                }
            }
        }
    }
}
