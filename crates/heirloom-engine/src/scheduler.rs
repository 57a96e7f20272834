//! Reference driver for the scheduler adapter contract.
//!
//! The engine only exposes the poll contract (`scheduler_poll` /
//! `scheduler_perform` / `finalize_due`); something external has to tick it.
//! Hosts with their own automation (keepers, cron, a chain's block hook)
//! call those methods directly. Everyone else can run this loop: each tick it
//! polls for wills whose liveness timer and quorum have matured, moves them
//! to the requested state, and finalizes the ones whose timelock has expired.

use std::sync::Arc;
use std::time::Duration;

use heirloom_core::auth::Auth;
use tracing::{debug, info, warn};

use crate::engine::WillEngine;

/// Drive the engine's scheduler on a fixed interval until the task is
/// aborted. `auth` must carry the Scheduler role.
pub async fn run_scheduler(engine: Arc<WillEngine>, auth: Auth, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "scheduler running");

    loop {
        ticker.tick().await;
        let now = chrono::Utc::now().timestamp();
        tick(&engine, &auth, now);
    }
}

/// One scheduler tick: poll → perform → finalize the due. Synchronous so
/// tests and embedding hosts can drive it with their own clock.
pub fn tick(engine: &WillEngine, auth: &Auth, now: i64) {
    match engine.scheduler_poll(engine.config().scheduler_batch, now) {
        Ok((true, work)) => {
            debug!(count = work.len(), "scheduler poll found eligible wills");
            if let Err(e) = engine.scheduler_perform(auth, &work, now) {
                warn!(error = %e, "scheduler perform failed");
            }
        }
        Ok((false, _)) => {}
        Err(e) => warn!(error = %e, "scheduler poll failed"),
    }

    match engine.finalize_due(auth, now) {
        Ok(outcomes) => {
            for (will_id, outcome) in outcomes {
                match outcome {
                    Ok(finalized) => {
                        info!(
                            will_id,
                            dispatch_errors = finalized.dispatch.errors.len(),
                            "will finalized by scheduler"
                        );
                    }
                    Err(e) => warn!(will_id, error = %e, "finalize failed"),
                }
            }
        }
        Err(e) => warn!(error = %e, "finalize sweep failed"),
    }
}
