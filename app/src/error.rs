//! Error types for the Notas application
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to the UI layer as plain strings.

use thiserror::Error;

/// Failures reported by the platform collaborators (alarm table, notification tray).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Exact alarm permission not granted")]
    ExactAlarmPermissionDenied,

    #[error("Alarm scheduler error: {0}")]
    Scheduler(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
