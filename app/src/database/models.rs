//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization to the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A note or task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub body: String,
    /// Opaque locations of attached photos, in attachment order
    #[sqlx(json)]
    pub photo_uris: Vec<String>,
    #[sqlx(json)]
    pub video_uris: Vec<String>,
    #[sqlx(json)]
    pub audio_uris: Vec<String>,
    pub is_task: bool,
    pub is_done: bool,
    /// Due date as epoch milliseconds
    pub due_date_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable fields of a note, used for both insert and update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteFields {
    pub title: String,
    pub body: String,
    pub photo_uris: Vec<String>,
    pub video_uris: Vec<String>,
    pub audio_uris: Vec<String>,
    pub is_task: bool,
    pub is_done: bool,
    pub due_date_ms: Option<i64>,
}

impl From<&Note> for NoteFields {
    fn from(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            body: note.body.clone(),
            photo_uris: note.photo_uris.clone(),
            video_uris: note.video_uris.clone(),
            audio_uris: note.audio_uris.clone(),
            is_task: note.is_task,
            is_done: note.is_done,
            due_date_ms: note.due_date_ms,
        }
    }
}

/// A single fire-time owned by a note.
///
/// `id` is 0 until the reminder is saved; only then does it get a durable
/// identity, which doubles as its scheduling token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: i64,
    pub note_id: i64,
    /// Absolute fire time as epoch milliseconds
    pub fire_time_ms: i64,
    /// Stored but never read or written after creation
    pub fired: bool,
}

impl Reminder {
    /// An unsaved reminder held in edit state
    pub fn draft(note_id: i64, fire_time_ms: i64) -> Self {
        Self {
            id: 0,
            note_id,
            fire_time_ms,
            fired: false,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    pub fn fire_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.fire_time_ms)
    }
}

/// Insert request for a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NewReminder {
    pub note_id: i64,
    pub fire_time_ms: i64,
}
