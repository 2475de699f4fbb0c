//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Reminder subsystem settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    /// Initial state of the user-revocable exact-alarm permission
    #[serde(default = "default_true")]
    pub exact_alarms_allowed: bool,
    /// Deliver the boot signal when the host starts
    #[serde(default = "default_true")]
    pub rehydrate_on_start: bool,
    /// How long the boot task may hold the process
    #[serde(default = "default_boot_deadline_secs")]
    pub boot_deadline_secs: u64,
    /// How often a running host reconciles the alarm table with storage
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_boot_deadline_secs() -> u64 {
    config::DEFAULT_BOOT_DEADLINE_SECS
}

fn default_resync_interval_secs() -> u64 {
    config::DEFAULT_RESYNC_INTERVAL_SECS
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            exact_alarms_allowed: true,
            rehydrate_on_start: true,
            boot_deadline_secs: default_boot_deadline_secs(),
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

impl ReminderSettings {
    pub fn validate(&self) -> Result<()> {
        if !(config::MIN_BOOT_DEADLINE_SECS..=config::MAX_BOOT_DEADLINE_SECS)
            .contains(&self.boot_deadline_secs)
        {
            return Err(AppError::Validation(format!(
                "Boot deadline must be between {} and {} seconds",
                config::MIN_BOOT_DEADLINE_SECS,
                config::MAX_BOOT_DEADLINE_SECS
            )));
        }
        if !(config::MIN_RESYNC_INTERVAL_SECS..=config::MAX_RESYNC_INTERVAL_SECS)
            .contains(&self.resync_interval_secs)
        {
            return Err(AppError::Validation(format!(
                "Resync interval must be between {} and {} seconds",
                config::MIN_RESYNC_INTERVAL_SECS,
                config::MAX_RESYNC_INTERVAL_SECS
            )));
        }
        Ok(())
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub reminders: ReminderSettings,
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(config::SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    pub async fn get_reminders(&self) -> Result<ReminderSettings> {
        let settings = self.load().await?;
        Ok(settings.reminders)
    }

    pub async fn update_reminders(&self, reminders: ReminderSettings) -> Result<()> {
        reminders.validate()?;

        let mut settings = self.load().await?;
        settings.reminders = reminders;
        self.save(&settings).await?;
        Ok(())
    }
}
