//! services/api/src/reaper.rs
//!
//! Background task that retries deletion of assets parked in the ledger.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use trip_mate_core::deletion::DeletionCoordinator;

/// How many ledger entries one pass retries.
pub const REAP_BATCH: usize = 100;

/// Runs a reaper pass every `period` until `cancellation_token` fires.
///
/// The first pass runs immediately so assets orphaned before a restart are
/// retried without waiting a full period.
pub fn spawn_reaper(
    deleter: DeletionCoordinator,
    period: Duration,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "orphan reaper started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("orphan reaper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = deleter.reap(REAP_BATCH).await {
                        error!(error = %e, "reaper pass failed");
                    }
                }
            }
        }
    })
}
