//! Reminder scheduler
//!
//! Turns a saved (note, reminder) pair into an exact wake-up registration.
//! The scheduling token is always the reminder's durable id, so a note's
//! reminders can be cancelled or rescheduled one at a time.
//!
//! Neither `schedule` nor `cancel` fails towards the caller: a reminder that
//! cannot be armed is logged and reported through `ScheduleOutcome`.

use crate::database::{Note, Reminder};
use crate::error::PlatformError;
use crate::platform::AlarmService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Key of a platform wake-up registration and of the notification it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReminderToken(pub i64);

impl ReminderToken {
    pub fn for_reminder(reminder: &Reminder) -> Self {
        Self(reminder.id)
    }
}

impl fmt::Display for ReminderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reminder-{}", self.0)
    }
}

/// Everything the delivery handler needs to render a notification without
/// touching storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub note_id: i64,
    #[serde(rename = "note_title")]
    pub title: String,
    #[serde(rename = "note_content")]
    pub body: String,
    pub is_task: bool,
    pub reminder_id: i64,
}

impl ReminderPayload {
    pub fn new(note: &Note, reminder: &Reminder) -> Self {
        Self {
            note_id: note.id,
            title: note.title.clone(),
            body: note.body.clone(),
            is_task: note.is_task,
            reminder_id: reminder.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduleOutcome {
    Scheduled,
    /// The reminder has no durable id yet
    NotPersisted,
    /// The reminder belongs to a different note than the one supplied
    NoteMismatch,
    /// Fire time is now or already past
    NotInFuture,
    PermissionDenied,
    PlatformFailure,
}

impl ScheduleOutcome {
    pub fn is_scheduled(self) -> bool {
        self == ScheduleOutcome::Scheduled
    }
}

/// Bridge between persisted reminders and the platform alarm table
#[derive(Clone)]
pub struct ReminderScheduler {
    alarms: Arc<dyn AlarmService>,
}

impl ReminderScheduler {
    pub fn new(alarms: Arc<dyn AlarmService>) -> Self {
        Self { alarms }
    }

    /// Whether the UI may offer reminders without first sending the user to settings
    pub fn can_schedule_exact_alarms(&self) -> bool {
        self.alarms.can_schedule_exact_alarms()
    }

    pub async fn schedule(&self, note: &Note, reminder: &Reminder) -> ScheduleOutcome {
        self.schedule_at(note, reminder, Utc::now()).await
    }

    /// Schedule against an explicit clock reading
    pub async fn schedule_at(
        &self,
        note: &Note,
        reminder: &Reminder,
        now: DateTime<Utc>,
    ) -> ScheduleOutcome {
        if !reminder.is_persisted() {
            tracing::warn!("Skipping unsaved reminder for note {}", note.id);
            return ScheduleOutcome::NotPersisted;
        }

        if reminder.note_id != note.id {
            tracing::warn!(
                "Reminder {} belongs to note {}, not note {}",
                reminder.id,
                reminder.note_id,
                note.id
            );
            return ScheduleOutcome::NoteMismatch;
        }

        let token = ReminderToken::for_reminder(reminder);

        let trigger_at = match reminder.fire_time() {
            Some(at) if at > now => at,
            _ => {
                tracing::debug!(
                    "Not scheduling {}: fire time {} is not after {}",
                    token,
                    reminder.fire_time_ms,
                    now.timestamp_millis()
                );
                return ScheduleOutcome::NotInFuture;
            }
        };

        let extras = match serde_json::to_value(ReminderPayload::new(note, reminder)) {
            Ok(extras) => extras,
            Err(e) => {
                tracing::error!("Failed to encode payload for {}: {}", token, e);
                return ScheduleOutcome::PlatformFailure;
            }
        };

        match self
            .alarms
            .set_exact_and_allow_while_idle(token.0, trigger_at, extras)
            .await
        {
            Ok(()) => {
                tracing::info!("Scheduled {} for note {} at {}", token, note.id, trigger_at);
                ScheduleOutcome::Scheduled
            }
            Err(PlatformError::ExactAlarmPermissionDenied) => {
                tracing::error!(
                    "Exact alarm permission missing, {} for note {} not scheduled",
                    token,
                    note.id
                );
                ScheduleOutcome::PermissionDenied
            }
            Err(e) => {
                tracing::error!("Failed to schedule {}: {}", token, e);
                ScheduleOutcome::PlatformFailure
            }
        }
    }

    /// Unregister the wake-up for a reminder; unknown ids are ignored
    pub async fn cancel(&self, reminder_id: i64) {
        let token = ReminderToken(reminder_id);
        self.alarms.cancel(token.0).await;
        tracing::debug!("Cancelled {}", token);
    }
}
