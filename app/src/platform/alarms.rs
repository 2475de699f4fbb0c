//! Exact wake-up alarms
//!
//! An alarm is a one-shot registration keyed by an integer token. When it
//! fires, the extras bundle handed over at registration time is delivered
//! unchanged to the `AlarmReceiver`. Registering a token that is already
//! pending replaces the earlier registration.

use crate::error::{AppError, PlatformError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Process-wide table of timed wake-ups
#[async_trait]
pub trait AlarmService: Send + Sync {
    /// Whether the user currently allows exact alarms
    fn can_schedule_exact_alarms(&self) -> bool;

    /// Register a wake-up at `trigger_at` that fires even when the device is idle
    async fn set_exact_and_allow_while_idle(
        &self,
        token: i64,
        trigger_at: DateTime<Utc>,
        extras: Value,
    ) -> std::result::Result<(), PlatformError>;

    /// Drop the registration under `token`, if any
    async fn cancel(&self, token: i64);
}

/// Invoked when a registered alarm fires
#[async_trait]
pub trait AlarmReceiver: Send + Sync {
    async fn on_receive(&self, extras: Value);
}

/// Alarm table backed by one-shot jobs on a tokio job scheduler
pub struct TokioAlarmService {
    scheduler: Arc<RwLock<JobScheduler>>,
    receiver: Arc<dyn AlarmReceiver>,
    jobs: Arc<Mutex<HashMap<i64, Uuid>>>,
    exact_alarms_allowed: AtomicBool,
}

impl TokioAlarmService {
    pub async fn new(receiver: Arc<dyn AlarmReceiver>, exact_alarms_allowed: bool) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| scheduler_error(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            receiver,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            exact_alarms_allowed: AtomicBool::new(exact_alarms_allowed),
        })
    }

    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| scheduler_error(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Alarm scheduler started");
        Ok(())
    }

    /// Grant or revoke the exact-alarm permission
    pub fn set_exact_alarm_permission(&self, allowed: bool) {
        if self.exact_alarms_allowed.swap(allowed, Ordering::SeqCst) != allowed {
            tracing::info!("Exact alarm permission set to {}", allowed);
        }
    }

    /// Tokens with a registration that has not fired yet
    pub async fn pending_tokens(&self) -> Vec<i64> {
        let mut tokens: Vec<i64> = self.jobs.lock().await.keys().copied().collect();
        tokens.sort_unstable();
        tokens
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| scheduler_error(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Alarm scheduler shutdown");
        Ok(())
    }

    fn one_shot_job(
        &self,
        token: i64,
        delay: Duration,
        extras: Value,
    ) -> std::result::Result<Job, PlatformError> {
        let receiver = Arc::clone(&self.receiver);
        let jobs = Arc::clone(&self.jobs);

        Job::new_one_shot_async(delay, move |job_id, _l| {
            let receiver = Arc::clone(&receiver);
            let jobs = Arc::clone(&jobs);
            let extras = extras.clone();
            Box::pin(async move {
                {
                    let mut jobs = jobs.lock().await;
                    if jobs.get(&token) == Some(&job_id) {
                        jobs.remove(&token);
                    }
                }

                tracing::info!("Alarm {} fired", token);
                receiver.on_receive(extras).await;
            })
        })
        .map_err(|e| PlatformError::Scheduler(format!("Failed to create alarm job: {}", e)))
    }
}

#[async_trait]
impl AlarmService for TokioAlarmService {
    fn can_schedule_exact_alarms(&self) -> bool {
        self.exact_alarms_allowed.load(Ordering::SeqCst)
    }

    async fn set_exact_and_allow_while_idle(
        &self,
        token: i64,
        trigger_at: DateTime<Utc>,
        extras: Value,
    ) -> std::result::Result<(), PlatformError> {
        if !self.can_schedule_exact_alarms() {
            return Err(PlatformError::ExactAlarmPermissionDenied);
        }

        let delay = (trigger_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let job = self.one_shot_job(token, delay, extras)?;
        let job_id = job.guid();

        let mut jobs = self.jobs.lock().await;
        let scheduler = self.scheduler.read().await;

        if let Some(previous) = jobs.remove(&token) {
            if let Err(e) = scheduler.remove(&previous).await {
                tracing::warn!("Failed to replace alarm {}: {}", token, e);
            }
        }

        scheduler
            .add(job)
            .await
            .map_err(|e| PlatformError::Scheduler(format!("Failed to register alarm: {}", e)))?;
        jobs.insert(token, job_id);

        tracing::debug!("Alarm {} registered for {}", token, trigger_at);
        Ok(())
    }

    async fn cancel(&self, token: i64) {
        let Some(job_id) = self.jobs.lock().await.remove(&token) else {
            return;
        };

        let scheduler = self.scheduler.read().await;
        if let Err(e) = scheduler.remove(&job_id).await {
            tracing::warn!("Failed to cancel alarm {}: {}", token, e);
            return;
        }

        tracing::debug!("Alarm {} cancelled", token);
    }
}

fn scheduler_error(message: String) -> AppError {
    AppError::Platform(PlatformError::Scheduler(message))
}
