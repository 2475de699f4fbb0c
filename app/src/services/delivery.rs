//! Reminder delivery
//!
//! Runs when a reminder alarm fires. Everything needed for the notification
//! travels in the alarm extras, so delivery never reads the database.

use crate::config;
use crate::platform::{
    AlarmReceiver, Importance, LaunchRequest, Notification, NotificationChannel, Notifier,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Read one text field of the bundle; a missing or mistyped field is absent
fn text_extra(extras: &Value, key: &str) -> Option<String> {
    extras.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Read one positive id of the bundle
fn id_extra(extras: &Value, key: &str) -> Option<i64> {
    extras.get(key).and_then(Value::as_i64).filter(|id| *id > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Posted { notification_id: i64 },
    MalformedPayload,
    NotifyFailed,
}

#[derive(Clone)]
pub struct ReminderDeliveryHandler {
    notifier: Arc<dyn Notifier>,
}

impl ReminderDeliveryHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn deliver(&self, extras: &Value) -> DeliveryOutcome {
        let Some(note_id) = id_extra(extras, config::EXTRA_NOTE_ID) else {
            tracing::warn!("Fired reminder without a note id, nothing to show");
            return DeliveryOutcome::MalformedPayload;
        };

        // Bundles written before reminders had their own ids are keyed by note
        let notification_id = id_extra(extras, config::EXTRA_REMINDER_ID).unwrap_or(note_id);

        if let Err(e) = self.notifier.create_channel(NotificationChannel {
            id: config::REMINDER_CHANNEL_ID.to_string(),
            name: config::REMINDER_CHANNEL_NAME.to_string(),
            importance: Importance::High,
        }) {
            tracing::error!("Failed to create reminder channel: {}", e);
            return DeliveryOutcome::NotifyFailed;
        }

        let notification = Notification {
            channel_id: config::REMINDER_CHANNEL_ID.to_string(),
            title: text_extra(extras, config::EXTRA_NOTE_TITLE)
                .unwrap_or_else(|| config::DEFAULT_REMINDER_TITLE.to_string()),
            body: text_extra(extras, config::EXTRA_NOTE_CONTENT)
                .unwrap_or_else(|| config::DEFAULT_REMINDER_BODY.to_string()),
            auto_cancel: true,
            content_intent: LaunchRequest { note_id },
        };

        match self.notifier.notify(notification_id, notification) {
            Ok(()) => {
                tracing::info!(
                    "Reminder notification {} posted for note {}",
                    notification_id,
                    note_id
                );
                DeliveryOutcome::Posted { notification_id }
            }
            Err(e) => {
                tracing::error!("Failed to post reminder notification: {}", e);
                DeliveryOutcome::NotifyFailed
            }
        }
    }
}

#[async_trait]
impl AlarmReceiver for ReminderDeliveryHandler {
    async fn on_receive(&self, extras: Value) {
        self.deliver(&extras);
    }
}
