//! Repository layer for database operations
//!
//! CRUD for notes and reminders, plus a change feed so callers can follow a
//! note's reminder list live. Removing a note cascades to its reminders in
//! the schema itself.

use super::models::*;
use crate::error::{AppError, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use sqlx::types::Json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::watch;

/// The slice of persistence the reminder subsystem depends on.
///
/// Scheduling, rehydration and the edit flow only ever talk to storage
/// through this trait; `Repository` is the SQLite-backed implementation.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn get_note_by_id(&self, note_id: i64) -> Result<Option<Note>>;

    async fn insert_reminder(&self, reminder: NewReminder) -> Result<i64>;

    async fn insert_reminders(&self, reminders: &[NewReminder]) -> Result<Vec<i64>>;

    async fn delete_reminders_for_note(&self, note_id: i64) -> Result<u64>;

    async fn delete_reminder(&self, id: i64) -> Result<()>;

    async fn get_reminder_by_id(&self, id: i64) -> Result<Option<Reminder>>;

    async fn list_reminders_for_note(&self, note_id: i64) -> Result<Vec<Reminder>>;

    /// One-shot read of every reminder firing strictly after `now_ms`
    async fn get_future_reminders(&self, now_ms: i64) -> Result<Vec<Reminder>>;
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    /// Bumped on every write that can change a reminder list
    reminder_changes: Arc<watch::Sender<u64>>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        let (reminder_changes, _) = watch::channel(0);
        Self {
            pool,
            reminder_changes: Arc::new(reminder_changes),
        }
    }

    fn reminders_changed(&self) {
        self.reminder_changes.send_modify(|version| *version += 1);
    }

    /// Insert a new note; the store assigns its id
    pub async fn insert_note(&self, fields: &NoteFields) -> Result<Note> {
        let now = Utc::now();

        let note = sqlx::query_as::<_, Note>(
            r#"
            INSERT INTO notes (title, body, photo_uris, video_uris, audio_uris,
                               is_task, is_done, due_date_ms, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.body)
        .bind(Json(&fields.photo_uris))
        .bind(Json(&fields.video_uris))
        .bind(Json(&fields.audio_uris))
        .bind(fields.is_task)
        .bind(fields.is_done)
        .bind(fields.due_date_ms)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Inserted note: {}", note.id);
        Ok(note)
    }

    /// Overwrite every editable field of an existing note, keeping its id
    pub async fn update_note(&self, id: i64, fields: &NoteFields) -> Result<Note> {
        let note = sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET title = ?, body = ?, photo_uris = ?, video_uris = ?, audio_uris = ?,
                is_task = ?, is_done = ?, due_date_ms = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.body)
        .bind(Json(&fields.photo_uris))
        .bind(Json(&fields.video_uris))
        .bind(Json(&fields.audio_uris))
        .bind(fields.is_task)
        .bind(fields.is_done)
        .bind(fields.due_date_ms)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NoteNotFound(id))?;

        tracing::debug!("Updated note: {}", id);
        Ok(note)
    }

    /// Flip the completion flag of a note
    pub async fn set_note_done(&self, id: i64, is_done: bool) -> Result<()> {
        let rows = sqlx::query("UPDATE notes SET is_done = ?, updated_at = ? WHERE id = ?")
            .bind(is_done)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NoteNotFound(id));
        }

        tracing::debug!("Set note {} done = {}", id, is_done);
        Ok(())
    }

    /// Permanently delete a note; its reminders go with it
    pub async fn delete_note(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NoteNotFound(id));
        }

        self.reminders_changed();
        tracing::debug!("Deleted note: {}", id);
        Ok(())
    }

    pub async fn get_note_by_id(&self, id: i64) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }

    pub async fn get_note(&self, id: i64) -> Result<Note> {
        self.get_note_by_id(id)
            .await?
            .ok_or(AppError::NoteNotFound(id))
    }

    /// List all notes, newest first
    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>("SELECT * FROM notes ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(notes)
    }

    pub async fn insert_reminder(&self, reminder: NewReminder) -> Result<i64> {
        let id = sqlx::query("INSERT INTO reminders (note_id, fire_time_ms, fired) VALUES (?, ?, 0)")
            .bind(reminder.note_id)
            .bind(reminder.fire_time_ms)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        self.reminders_changed();
        tracing::debug!("Inserted reminder {} for note {}", id, reminder.note_id);
        Ok(id)
    }

    /// Insert a batch of reminders in one transaction, returning their ids in order
    pub async fn insert_reminders(&self, reminders: &[NewReminder]) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(reminders.len());

        for reminder in reminders {
            let id = sqlx::query(
                "INSERT INTO reminders (note_id, fire_time_ms, fired) VALUES (?, ?, 0)",
            )
            .bind(reminder.note_id)
            .bind(reminder.fire_time_ms)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            ids.push(id);
        }

        tx.commit().await?;

        self.reminders_changed();
        tracing::debug!("Inserted {} reminders", ids.len());
        Ok(ids)
    }

    pub async fn delete_reminders_for_note(&self, note_id: i64) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM reminders WHERE note_id = ?")
            .bind(note_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        self.reminders_changed();
        tracing::debug!("Deleted {} reminders of note {}", rows, note_id);
        Ok(rows)
    }

    pub async fn delete_reminder(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ReminderNotFound(id));
        }

        self.reminders_changed();
        tracing::debug!("Deleted reminder: {}", id);
        Ok(())
    }

    pub async fn get_reminder_by_id(&self, id: i64) -> Result<Option<Reminder>> {
        let reminder = sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(reminder)
    }

    pub async fn list_reminders_for_note(&self, note_id: i64) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders WHERE note_id = ? ORDER BY fire_time_ms ASC, id ASC",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    pub async fn get_future_reminders(&self, now_ms: i64) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders WHERE fire_time_ms > ? ORDER BY fire_time_ms ASC, id ASC",
        )
        .bind(now_ms)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    /// Live view of a note's reminders.
    ///
    /// Yields the current list immediately, then a fresh list after every
    /// write that touches the reminders table.
    pub fn reminders_stream(&self, note_id: i64) -> BoxStream<'static, Result<Vec<Reminder>>> {
        let repo = self.clone();
        let mut changes = self.reminder_changes.subscribe();

        Box::pin(try_stream! {
            loop {
                let _ = changes.borrow_and_update();
                let reminders = repo.list_reminders_for_note(note_id).await?;
                yield reminders;

                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

#[async_trait]
impl ReminderStore for Repository {
    async fn get_note_by_id(&self, note_id: i64) -> Result<Option<Note>> {
        Repository::get_note_by_id(self, note_id).await
    }

    async fn insert_reminder(&self, reminder: NewReminder) -> Result<i64> {
        Repository::insert_reminder(self, reminder).await
    }

    async fn insert_reminders(&self, reminders: &[NewReminder]) -> Result<Vec<i64>> {
        Repository::insert_reminders(self, reminders).await
    }

    async fn delete_reminders_for_note(&self, note_id: i64) -> Result<u64> {
        Repository::delete_reminders_for_note(self, note_id).await
    }

    async fn delete_reminder(&self, id: i64) -> Result<()> {
        Repository::delete_reminder(self, id).await
    }

    async fn get_reminder_by_id(&self, id: i64) -> Result<Option<Reminder>> {
        Repository::get_reminder_by_id(self, id).await
    }

    async fn list_reminders_for_note(&self, note_id: i64) -> Result<Vec<Reminder>> {
        Repository::list_reminders_for_note(self, note_id).await
    }

    async fn get_future_reminders(&self, now_ms: i64) -> Result<Vec<Reminder>> {
        Repository::get_future_reminders(self, now_ms).await
    }
}
