use std::time::Duration;

use tokio::sync::watch;

use crate::dispatch;
use crate::scheduler;
use crate::state::SharedState;

/// Timer-triggered runner: every interval, schedule fresh catalog content
/// and run one dispatch cycle. Overlap with manually triggered runs is safe
/// because reservation happens in the store's atomic claim, not here.
pub async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_secs(state.config.worker_interval_secs);
    tracing::info!(
        "Queue worker started (interval {}s)",
        state.config.worker_interval_secs
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            break;
        }

        match scheduler::schedule_fresh(&state, state.config.batch_size).await {
            Ok(scheduled) if scheduled > 0 => {
                tracing::debug!("Worker scheduled {scheduled} fresh URL(s)");
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Worker scheduling failed: {e}"),
        }

        match dispatch::process_batch(&state, state.config.batch_size).await {
            Ok(outcome) => {
                if outcome.processed > 0 || outcome.quota_hit {
                    tracing::info!("Worker run: {}", outcome.message);
                }
            }
            Err(e) => tracing::error!("Worker dispatch failed: {e}"),
        }
    }

    tracing::info!("Queue worker stopped");
}
