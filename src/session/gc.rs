use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::store::SessionHandler;

/// Shortest period between sweeps
pub const MIN_GC_INTERVAL: Duration = Duration::from_secs(1);

/// Runs `gc(max_lifetime_secs)` every `interval` until the task is aborted.
/// A failing sweep is logged and retried on the next tick. Intervals below
/// `MIN_GC_INTERVAL` are raised to it.
pub fn spawn_gc(
    store: Arc<dyn SessionHandler>,
    max_lifetime_secs: u64,
    interval: Duration,
) -> JoinHandle<()> {
    if interval < MIN_GC_INTERVAL {
        warn!(
            "Session GC interval {:?} is too short, using {:?}",
            interval, MIN_GC_INTERVAL
        );
    }
    let period = interval.max(MIN_GC_INTERVAL);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.gc(max_lifetime_secs).await {
                Ok(removed) => debug!("Session GC sweep finished, {} removed", removed),
                Err(e) => error!("Session GC sweep failed: {}", e),
            }
        }
    })
}
