//! Edit session for a single note
//!
//! Holds the note and its reminder list in memory while the user edits.
//! Nothing is persisted until `save`; reminders added here have no durable
//! id until then.

use crate::database::{NoteFields, Reminder};
use crate::error::Result;
use crate::services::notes::{NotesService, SavedNote};
use chrono::{DateTime, Duration, LocalResult, NaiveTime, TimeZone, Utc};

/// Combine a picked date with a picked wall-clock time.
///
/// Date pickers hand back midnight UTC of the chosen day, so the year, month
/// and day are read as calendar fields in UTC and placed at `hour:minute` in
/// `zone`. Converting the instant itself would land on the previous day
/// anywhere west of UTC. A time skipped by a DST jump moves forward an hour.
pub fn combine_date_and_time<Tz: TimeZone>(
    date_utc_ms: i64,
    hour: u32,
    minute: u32,
    zone: &Tz,
) -> Option<DateTime<Utc>> {
    let day = DateTime::<Utc>::from_timestamp_millis(date_utc_ms)?.date_naive();
    let local = day.and_time(NaiveTime::from_hms_opt(hour, minute, 0)?);

    let resolved = match zone.from_local_datetime(&local) {
        LocalResult::Single(at) => at,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => zone
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()?,
    };

    Some(resolved.with_timezone(&Utc))
}

pub struct NoteEditor {
    service: NotesService,
    note_id: Option<i64>,
    fields: NoteFields,
    reminders: Vec<Reminder>,
    /// Date chosen in the reminder date picker, waiting for a time
    pending_reminder_date: Option<i64>,
}

impl NoteEditor {
    pub fn new_note(service: NotesService) -> Self {
        Self {
            service,
            note_id: None,
            fields: NoteFields::default(),
            reminders: Vec::new(),
            pending_reminder_date: None,
        }
    }

    /// Load an existing note and its stored reminders
    pub async fn open(service: NotesService, note_id: i64) -> Result<Self> {
        let note = service.get_note(note_id).await?;
        let reminders = service.reminders_for_note(note_id).await?;

        Ok(Self {
            service,
            note_id: Some(note.id),
            fields: NoteFields::from(&note),
            reminders,
            pending_reminder_date: None,
        })
    }

    pub fn note_id(&self) -> Option<i64> {
        self.note_id
    }

    pub fn fields(&self) -> &NoteFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut NoteFields {
        &mut self.fields
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn add_reminder_at(&mut self, fire_time_ms: i64) {
        let note_id = self.note_id.unwrap_or(0);
        self.reminders.push(Reminder::draft(note_id, fire_time_ms));
    }

    /// First step of the reminder picker; `None` dismisses the picker
    pub fn pick_reminder_date(&mut self, date_utc_ms: Option<i64>) {
        self.pending_reminder_date = date_utc_ms;
    }

    /// Second step of the reminder picker, in the device's zone
    pub fn pick_reminder_time(&mut self, hour: u32, minute: u32) -> Option<i64> {
        self.pick_reminder_time_in(hour, minute, &chrono::Local)
    }

    /// Second step of the reminder picker, in an explicit zone.
    ///
    /// Adds the combined reminder and returns its fire time; does nothing
    /// without a pending date.
    pub fn pick_reminder_time_in<Tz: TimeZone>(
        &mut self,
        hour: u32,
        minute: u32,
        zone: &Tz,
    ) -> Option<i64> {
        let date = self.pending_reminder_date.take()?;
        let fire_time_ms = combine_date_and_time(date, hour, minute, zone)?.timestamp_millis();
        self.add_reminder_at(fire_time_ms);
        Some(fire_time_ms)
    }

    /// Set the task due date from the date and time pickers, in the device's
    /// zone. `None` clears it.
    pub fn set_due_date(&mut self, picked: Option<(i64, u32, u32)>) -> Option<i64> {
        self.set_due_date_in(picked, &chrono::Local)
    }

    pub fn set_due_date_in<Tz: TimeZone>(
        &mut self,
        picked: Option<(i64, u32, u32)>,
        zone: &Tz,
    ) -> Option<i64> {
        self.fields.due_date_ms = picked.and_then(|(date, hour, minute)| {
            combine_date_and_time(date, hour, minute, zone).map(|at| at.timestamp_millis())
        });
        self.fields.due_date_ms
    }

    /// Remove a reminder from the list. A reminder that was already saved is
    /// disarmed right away; its row goes on the next save.
    pub async fn remove_reminder(&mut self, index: usize) -> Option<Reminder> {
        if index >= self.reminders.len() {
            return None;
        }

        let removed = self.reminders.remove(index);
        if removed.is_persisted() {
            self.service.scheduler().cancel(removed.id).await;
        }
        Some(removed)
    }

    /// Persist the note and its reminder list, then arm the reminders
    pub async fn save(&mut self, is_task: bool) -> Result<SavedNote> {
        self.fields.is_task = is_task;

        let saved = self
            .service
            .save_note(self.note_id, self.fields.clone(), &self.reminders)
            .await?;

        self.note_id = Some(saved.note.id);
        self.reminders = saved.reminders.clone();
        Ok(saved)
    }
}
