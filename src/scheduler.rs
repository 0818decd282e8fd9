//! Daily subscription-expiry sweep.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::state::SharedState;

pub struct Scheduler {
    state: Arc<SharedState>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn new(state: Arc<SharedState>, config: SchedulerConfig) -> Self {
        Self {
            state,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        let mut sched = JobScheduler::new().await?;

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let job = Job::new_async(self.config.sweep_cron.as_str(), move |_uuid, _lock| {
            let state = Arc::clone(&state);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                let start = std::time::Instant::now();
                info!(
                    event = "job_started",
                    job_name = "expire_subscriptions",
                    "Starting subscription expiry sweep"
                );

                match state.subscriptions.expire_due().await {
                    Ok(expired) => info!(
                        event = "job_finished",
                        job_name = "expire_subscriptions",
                        expired,
                        duration_ms =
                            u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "Subscription expiry sweep finished"
                    ),
                    Err(e) => error!(
                        event = "job_failed",
                        job_name = "expire_subscriptions",
                        error = %e,
                        "Subscription expiry sweep failed"
                    ),
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Sweep scheduled with cron: {}", self.config.sweep_cron);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// One sweep, outside the cron loop. Used by the `sweep` CLI command.
    pub async fn run_once(&self) -> Result<u64> {
        info!("Running manual subscription expiry sweep...");
        let expired = self.state.subscriptions.expire_due().await?;
        Ok(expired)
    }
}
