//! Platform collaborators
//!
//! The timed wake-up table and the notification tray are process-wide OS
//! facilities. They are modelled as injected services so the reminder
//! subsystem never reaches for a global:
//! - `alarms`: exact wake-up registrations keyed by scheduling token
//! - `notifications`: notification channels, posting and tap handling

pub mod alarms;
pub mod notifications;

pub use alarms::{AlarmReceiver, AlarmService, TokioAlarmService};
pub use notifications::{
    Importance, LaunchRequest, Notification, NotificationChannel, NotificationTray, Notifier,
};
