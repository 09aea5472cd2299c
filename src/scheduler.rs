//! Fixed-interval poll scheduling.
//!
//! One cycle runs as soon as the scheduler starts; after that the poller
//! fires every `interval`. Cycles run inline on the scheduler task, so a
//! slow cycle delays the next fire instead of overlapping it.

use crate::poller::Poller;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Longest supported interval between cycles (one year).
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Periodic poll scheduler.
pub struct Scheduler {
    poller: Arc<Poller>,
    interval: Duration,
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    runs: Arc<AtomicU64>,
}

impl Scheduler {
    /// Intervals above [`MAX_INTERVAL`] are clamped to it.
    pub fn new(poller: Arc<Poller>, interval: Duration) -> Self {
        if interval > MAX_INTERVAL {
            warn!(
                requested_secs = interval.as_secs(),
                max_secs = MAX_INTERVAL.as_secs(),
                "Poll interval too long, clamping"
            );
        }
        Self {
            poller,
            interval: interval.min(MAX_INTERVAL),
        }
    }

    /// Spawn the scheduler task.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let runs = Arc::new(AtomicU64::new(0));
        let task_runs = Arc::clone(&runs);
        let Scheduler { poller, interval } = self;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(interval_secs = interval.as_secs(), "Scheduler started");

            poller.run_cycle().await;
            task_runs.fetch_add(1, Ordering::SeqCst);

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        debug!("Scheduled poll firing");
                        poller.run_cycle().await;
                        task_runs.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }

            info!("Scheduler stopped");
        });

        SchedulerHandle {
            shutdown,
            task,
            runs,
        }
    }
}

impl SchedulerHandle {
    /// Number of cycles run so far, successful or not.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop firing and wait for an in-flight cycle to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }
    }
}
