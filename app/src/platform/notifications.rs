//! Notification tray
//!
//! Channels, posting and tap handling. Posting under an id that is already
//! showing replaces that notification instead of stacking a second one.

use crate::error::PlatformError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Importance {
    Default,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub importance: Importance,
}

/// Where the app should land when a notification is tapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaunchRequest {
    pub note_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub channel_id: String,
    pub title: String,
    pub body: String,
    /// Dismiss the notification once it has been tapped
    pub auto_cancel: bool,
    pub content_intent: LaunchRequest,
}

/// Posts user-visible notifications
pub trait Notifier: Send + Sync {
    /// Register a channel; re-registering an existing id is a no-op
    fn create_channel(&self, channel: NotificationChannel) -> Result<(), PlatformError>;

    /// Show a notification, replacing any already shown under `id`
    fn notify(&self, id: i64, notification: Notification) -> Result<(), PlatformError>;
}

#[derive(Default)]
struct TrayState {
    channels: HashMap<String, NotificationChannel>,
    active: HashMap<i64, Notification>,
}

/// In-process notification tray used by the host binary
#[derive(Default)]
pub struct NotificationTray {
    state: Mutex<TrayState>,
}

impl NotificationTray {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notifications currently showing, ordered by id
    pub fn active(&self) -> Vec<(i64, Notification)> {
        let mut active: Vec<_> = self
            .state()
            .active
            .iter()
            .map(|(id, n)| (*id, n.clone()))
            .collect();
        active.sort_by_key(|(id, _)| *id);
        active
    }

    pub fn channel(&self, id: &str) -> Option<NotificationChannel> {
        self.state().channels.get(id).cloned()
    }

    /// Simulate the user tapping a notification.
    ///
    /// Returns the launch request to hand to the UI layer, or `None` when
    /// nothing is showing under `id`.
    pub fn tap(&self, id: i64) -> Option<LaunchRequest> {
        let mut state = self.state();
        let notification = state.active.get(&id)?.clone();

        if notification.auto_cancel {
            state.active.remove(&id);
        }

        tracing::info!(
            "Notification {} tapped, opening note {}",
            id,
            notification.content_intent.note_id
        );
        Some(notification.content_intent)
    }
}

impl Notifier for NotificationTray {
    fn create_channel(&self, channel: NotificationChannel) -> Result<(), PlatformError> {
        let mut state = self.state();
        if !state.channels.contains_key(&channel.id) {
            tracing::debug!("Created notification channel {}", channel.id);
            state.channels.insert(channel.id.clone(), channel);
        }
        Ok(())
    }

    fn notify(&self, id: i64, notification: Notification) -> Result<(), PlatformError> {
        let mut state = self.state();

        if !state.channels.contains_key(&notification.channel_id) {
            return Err(PlatformError::Notification(format!(
                "Unknown channel: {}",
                notification.channel_id
            )));
        }

        tracing::info!(
            "Notification {}: {} - {}",
            id,
            notification.title,
            notification.body
        );

        if state.active.insert(id, notification).is_some() {
            tracing::debug!("Replaced notification {}", id);
        }
        Ok(())
    }
}
