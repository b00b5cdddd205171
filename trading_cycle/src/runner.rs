//! The periodic loop around [`Cycle`].

use async_trait::async_trait;
use tokio::{
    sync::watch,
    time::{Instant, sleep_until},
};
use tracing::{error, info};

use crate::{errors::CycleError, metrics::CycleMetrics, schedule::RetrySchedule};

/// One unit of periodic work.
#[async_trait]
pub trait Cycle: Send {
    async fn run_cycle(&mut self, shutdown: &watch::Receiver<bool>)
    -> Result<CycleMetrics, CycleError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Resolves once `true` is sent on the shutdown channel. Never resolves if
/// the sender is dropped without it.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Runs `cycle` until shutdown.
///
/// A successful cycle is followed by the schedule's interval. A failed cycle
/// is logged and followed by the backoff for the current attempt plus the
/// interval. Shutdown interrupts the wait; a running cycle stops scheduling
/// new tickers and finishes what is in flight.
pub async fn run<C: Cycle>(
    cycle: &mut C,
    mut schedule: RetrySchedule,
    mut shutdown: watch::Receiver<bool>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    loop {
        if *shutdown.borrow() {
            break;
        }

        match cycle.run_cycle(&shutdown).await {
            Ok(metrics) => {
                metrics.log();
                summary.succeeded += 1;
                schedule.record_success(Instant::now());
                if metrics.interrupted {
                    break;
                }
            }
            Err(err) => {
                let attempt = schedule.attempt();
                let backoff = schedule.record_failure(Instant::now());
                summary.failed += 1;
                error!(
                    error = %err,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    "trading cycle failed"
                );
            }
        }

        tokio::select! {
            _ = sleep_until(schedule.next_due()) => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "trading loop stopped"
    );
    summary
}
