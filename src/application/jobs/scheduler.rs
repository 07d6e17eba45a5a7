//! SweepScheduler - runs the sweep on a fixed interval in-process.
//!
//! Deployments that trigger the sweep from an external cron hit the HTTP
//! endpoint instead; running both is harmless.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::domain::foundation::Timestamp;

use super::sweep::SweepJob;

pub struct SweepScheduler {
    job: Arc<SweepJob>,
    interval: Duration,
}

impl SweepScheduler {
    pub fn new(job: Arc<SweepJob>, interval: Duration) -> Self {
        Self { job, interval }
    }

    /// Run until the shutdown signal flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);
        // A slow pass must not be followed by a burst of catch-up passes.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; give the webhook a head start.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("sweep scheduler stopped");
                        return;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.job.run_once(Timestamp::now()).await {
                        tracing::error!(error = %e, "sweep pass failed");
                    }
                }
            }
        }
    }
}
