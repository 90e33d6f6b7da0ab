//! Order lifecycle supervisor.
//!
//! A single interval task that ticks every lane with a `Sweep` command so
//! expired orders are removed from the books and their reservations
//! released. Expiry checks themselves run inside the lane, on the same
//! serialized path as placements and cancels.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::lane::LaneCommand;

/// Spawn the expiry sweep loop. The returned handle is aborted when the
/// engine is dropped.
pub(crate) fn spawn_sweeper(
    lanes: Vec<mpsc::Sender<LaneCommand>>,
    scan_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(scan_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a freshly started
        // engine does not sweep empty books.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!(lanes = lanes.len(), "expiry sweep tick");
            for lane in &lanes {
                // A closed lane has nothing left to sweep.
                let _ = lane.send(LaneCommand::Sweep).await;
            }
        }
    })
}
