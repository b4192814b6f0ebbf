use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::LedgerHandle;
use crate::errors::LedgerError;

/// periodic overdue sweep; each tick queues a sweep on the engine like any other command
pub struct PenaltyScheduler {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PenaltyScheduler {
    /// start sweeping every `config.sweep_interval()` of the handle's engine
    pub fn start(ledger: LedgerHandle) -> Self {
        let period = ledger.config().sweep_interval();
        Self::with_period(ledger, period)
    }

    pub fn with_period(ledger: LedgerHandle, period: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick fires immediately; the engine already swept on load
            ticker.tick().await;

            tracing::info!(account = %ledger.account(), period_secs = period.as_secs(), "penalty scheduler started");

            loop {
                ticker.tick().await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }

                match ledger.sweep_now().await {
                    Ok(report) => {
                        tracing::debug!(
                            examined = report.examined,
                            changed = report.changed(),
                            failures = report.failures.len(),
                            "scheduled sweep complete"
                        );
                    }
                    Err(LedgerError::EngineStopped) => {
                        tracing::info!("ledger engine stopped, ending penalty scheduler");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "scheduled sweep failed");
                    }
                }
            }

            flag.store(false, Ordering::SeqCst);
        });

        Self { running, task }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// stop ticking; a sweep already queued still completes inside the engine
    pub async fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.task.abort();
        let _ = self.task.await;
        tracing::info!("penalty scheduler stopped");
    }
}
