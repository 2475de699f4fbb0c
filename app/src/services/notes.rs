//! Notes service
//!
//! Note lifecycle as far as reminders are concerned: saving a note rewrites
//! its reminder set and arms it, deleting a note disarms its reminders before
//! the store cascades them away.

use crate::database::{NewReminder, Note, NoteFields, Reminder, Repository};
use crate::error::{AppError, Result};
use crate::services::scheduler::{ReminderScheduler, ScheduleOutcome};

/// Result of a save: the stored note, its stored reminders and how each
/// reminder fared with the scheduler (same order)
#[derive(Debug, Clone)]
pub struct SavedNote {
    pub note: Note,
    pub reminders: Vec<Reminder>,
    pub outcomes: Vec<ScheduleOutcome>,
}

/// Service for managing notes
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
    scheduler: ReminderScheduler,
}

impl NotesService {
    pub fn new(repo: Repository, scheduler: ReminderScheduler) -> Self {
        Self { repo, scheduler }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Save a note together with its complete reminder list.
    ///
    /// Existing reminders are disarmed and deleted before the new list is
    /// inserted and armed, so stored reminders end up exactly equal to
    /// `reminders`. The two phases are not one transaction: a crash in
    /// between leaves the note without reminders until its next save.
    pub async fn save_note(
        &self,
        note_id: Option<i64>,
        fields: NoteFields,
        reminders: &[Reminder],
    ) -> Result<SavedNote> {
        if fields.title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }

        let note = match note_id {
            Some(id) => self.repo.update_note(id, &fields).await?,
            None => self.repo.insert_note(&fields).await?,
        };

        if note_id.is_some() {
            for old in self.repo.list_reminders_for_note(note.id).await? {
                self.scheduler.cancel(old.id).await;
            }
            self.repo.delete_reminders_for_note(note.id).await?;
        }

        let new_reminders: Vec<NewReminder> = reminders
            .iter()
            .map(|r| NewReminder {
                note_id: note.id,
                fire_time_ms: r.fire_time_ms,
            })
            .collect();
        let ids = self.repo.insert_reminders(&new_reminders).await?;

        let mut saved = Vec::with_capacity(ids.len());
        let mut outcomes = Vec::with_capacity(ids.len());
        for (id, new) in ids.into_iter().zip(&new_reminders) {
            let reminder = Reminder {
                id,
                note_id: note.id,
                fire_time_ms: new.fire_time_ms,
                fired: false,
            };
            outcomes.push(self.scheduler.schedule(&note, &reminder).await);
            saved.push(reminder);
        }

        tracing::info!(
            "Saved note {} with {} reminders ({} scheduled)",
            note.id,
            saved.len(),
            outcomes.iter().filter(|o| o.is_scheduled()).count()
        );

        Ok(SavedNote {
            note,
            reminders: saved,
            outcomes,
        })
    }

    pub async fn get_note(&self, id: i64) -> Result<Note> {
        self.repo.get_note(id).await
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        self.repo.list_notes().await
    }

    pub async fn reminders_for_note(&self, note_id: i64) -> Result<Vec<Reminder>> {
        self.repo.list_reminders_for_note(note_id).await
    }

    pub async fn set_done(&self, id: i64, is_done: bool) -> Result<()> {
        tracing::debug!("Marking note {} done = {}", id, is_done);
        self.repo.set_note_done(id, is_done).await
    }

    /// Disarm and delete one stored reminder
    pub async fn delete_reminder(&self, id: i64) -> Result<()> {
        self.scheduler.cancel(id).await;
        self.repo.delete_reminder(id).await
    }

    /// Delete a note; its reminders are disarmed first, then cascade-deleted
    pub async fn delete_note(&self, id: i64) -> Result<()> {
        tracing::info!("Deleting note: {}", id);

        for reminder in self.repo.list_reminders_for_note(id).await? {
            self.scheduler.cancel(reminder.id).await;
        }
        self.repo.delete_note(id).await?;

        tracing::info!("Note deleted successfully: {}", id);
        Ok(())
    }
}
