//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config;
use crate::database::{create_pool, ReminderStore, Repository};
use crate::error::Result;
use crate::platform::{AlarmReceiver, AlarmService, NotificationTray, Notifier, TokioAlarmService};
use crate::services::{
    BootRehydrator, NotesService, RehydrationReport, ReminderDeliveryHandler, ReminderScheduler,
    ReminderSettings, SettingsService,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings: ReminderSettings,
    pub settings_service: SettingsService,
    pub notes_service: NotesService,
    pub scheduler: ReminderScheduler,
    pub rehydrator: BootRehydrator,
    pub alarms: Arc<TokioAlarmService>,
    pub tray: Arc<NotificationTray>,
}

impl AppState {
    /// Deliver the boot signal and hold on until rehydration finishes or
    /// the configured deadline runs out
    pub async fn boot(&self) -> Option<RehydrationReport> {
        let task = self.rehydrator.on_receive(config::ACTION_BOOT_COMPLETED)?;
        task.wait_with_deadline(Duration::from_secs(self.settings.boot_deadline_secs))
            .await
    }

    /// One reconciliation of the alarm table against storage.
    ///
    /// Reminders written by another process are armed here, and alarms whose
    /// reminder was deleted elsewhere are dropped. The exact-alarm permission
    /// is re-read from the settings file first, so it can be revoked or
    /// granted while the host runs.
    pub async fn resync(&self) -> RehydrationReport {
        match self.settings_service.get_reminders().await {
            Ok(settings) => self
                .alarms
                .set_exact_alarm_permission(settings.exact_alarms_allowed),
            Err(e) => tracing::warn!("Failed to reload reminder settings: {}", e),
        }

        let armed = self.alarms.pending_tokens().await;
        self.rehydrator.reconcile(Utc::now(), &armed).await
    }

    /// Run `resync` every `resync_interval_secs` until the handle is aborted
    pub fn start_resync(&self) -> JoinHandle<()> {
        let state = self.clone();
        let period = Duration::from_secs(self.settings.resync_interval_secs);

        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                let report = state.resync().await;
                tracing::debug!("Resync: {:?}", report);
            }
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.alarms.shutdown().await
    }
}

/// Application setup - called once on startup
pub async fn setup(app_data_dir: PathBuf) -> Result<AppState> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", app_data_dir);

    std::fs::create_dir_all(&app_data_dir)?;

    let settings_service = SettingsService::new(app_data_dir.clone());
    let mut settings = settings_service.get_reminders().await?;
    if let Err(e) = settings.validate() {
        tracing::warn!("Ignoring invalid reminder settings: {}", e);
        settings = ReminderSettings::default();
    }

    let pool = create_pool(&app_data_dir.join(config::DATABASE_FILE_NAME)).await?;
    let repo = Repository::new(pool);

    let tray = Arc::new(NotificationTray::new());
    let delivery: Arc<dyn AlarmReceiver> = Arc::new(ReminderDeliveryHandler::new(
        Arc::clone(&tray) as Arc<dyn Notifier>,
    ));

    let alarms = Arc::new(TokioAlarmService::new(delivery, settings.exact_alarms_allowed).await?);
    alarms.start().await?;

    let scheduler = ReminderScheduler::new(Arc::clone(&alarms) as Arc<dyn AlarmService>);
    let notes_service = NotesService::new(repo.clone(), scheduler.clone());
    let rehydrator = BootRehydrator::new(
        Arc::new(repo) as Arc<dyn ReminderStore>,
        scheduler.clone(),
    );

    tracing::info!("Application initialized successfully");

    Ok(AppState {
        app_data_dir,
        settings,
        settings_service,
        notes_service,
        scheduler,
        rehydrator,
        alarms,
        tray,
    })
}
