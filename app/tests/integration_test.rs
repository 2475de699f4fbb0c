//! Integration tests for Notas
//!
//! These tests verify end-to-end reminder behaviour:
//! - Saving notes arms exactly the stored reminders
//! - Deleting notes cascades and disarms
//! - Boot rehydration re-arms only live, future reminders
//! - Fired alarms become deduplicated notifications that open the note
//! - A running host arms reminders written by another process

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use futures::StreamExt;
use notas::database::{create_pool, NewReminder, NoteFields, ReminderStore, Repository};
use notas::error::PlatformError;
use notas::platform::{AlarmService, LaunchRequest, NotificationTray, Notifier};
use notas::services::{
    BootRehydrator, NoteEditor, NotesService, ReminderDeliveryHandler, ReminderScheduler,
    ScheduleOutcome,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Alarm table that records registrations and can fire them on demand
#[derive(Default)]
struct CapturingAlarms {
    denied: Mutex<bool>,
    registered: Mutex<BTreeMap<i64, (DateTime<Utc>, Value)>>,
}

impl CapturingAlarms {
    fn tokens(&self) -> Vec<i64> {
        self.registered.lock().unwrap().keys().copied().collect()
    }

    fn extras(&self, token: i64) -> Value {
        self.registered.lock().unwrap()[&token].1.clone()
    }

    /// Clear every registration, as a reboot does
    fn reboot(&self) {
        self.registered.lock().unwrap().clear();
    }

    fn fire(&self, token: i64, handler: &ReminderDeliveryHandler) {
        let (_, extras) = self.registered.lock().unwrap().remove(&token).unwrap();
        handler.deliver(&extras);
    }
}

#[async_trait]
impl AlarmService for CapturingAlarms {
    fn can_schedule_exact_alarms(&self) -> bool {
        !*self.denied.lock().unwrap()
    }

    async fn set_exact_and_allow_while_idle(
        &self,
        token: i64,
        trigger_at: DateTime<Utc>,
        extras: Value,
    ) -> Result<(), PlatformError> {
        if !self.can_schedule_exact_alarms() {
            return Err(PlatformError::ExactAlarmPermissionDenied);
        }
        self.registered
            .lock()
            .unwrap()
            .insert(token, (trigger_at, extras));
        Ok(())
    }

    async fn cancel(&self, token: i64) {
        self.registered.lock().unwrap().remove(&token);
    }
}

struct Harness {
    repo: Repository,
    alarms: Arc<CapturingAlarms>,
    notes: NotesService,
    rehydrator: BootRehydrator,
    tray: Arc<NotificationTray>,
    delivery: ReminderDeliveryHandler,
    _temp: TempDir,
}

async fn harness() -> Harness {
    let temp = TempDir::new().unwrap();
    let pool = create_pool(&temp.path().join("test.db")).await.unwrap();
    let repo = Repository::new(pool);

    let alarms = Arc::new(CapturingAlarms::default());
    let scheduler = ReminderScheduler::new(Arc::clone(&alarms) as Arc<dyn AlarmService>);
    let notes = NotesService::new(repo.clone(), scheduler.clone());
    let rehydrator = BootRehydrator::new(
        Arc::new(repo.clone()) as Arc<dyn ReminderStore>,
        scheduler,
    );
    let tray = Arc::new(NotificationTray::new());
    let delivery = ReminderDeliveryHandler::new(Arc::clone(&tray) as Arc<dyn Notifier>);

    Harness {
        repo,
        alarms,
        notes,
        rehydrator,
        tray,
        delivery,
        _temp: temp,
    }
}

fn in_seconds(seconds: i64) -> i64 {
    (Utc::now() + chrono::Duration::seconds(seconds)).timestamp_millis()
}

#[tokio::test]
async fn test_resave_leaves_exactly_the_final_reminder() {
    let h = harness().await;

    let mut editor = NoteEditor::new_note(h.notes.clone());
    editor.fields_mut().title = "Renew passport".to_string();
    editor.add_reminder_at(in_seconds(600));
    editor.add_reminder_at(in_seconds(1200));
    let first = editor.save(true).await.unwrap();
    assert_eq!(h.alarms.tokens().len(), 2);

    let mut editor = NoteEditor::open(h.notes.clone(), first.note.id).await.unwrap();
    assert_eq!(editor.reminders().len(), 2);
    editor.remove_reminder(1).await.unwrap();
    editor.remove_reminder(0).await.unwrap();
    editor.add_reminder_at(in_seconds(1800));
    let second = editor.save(true).await.unwrap();

    let stored = h.repo.list_reminders_for_note(first.note.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored, second.reminders);
    assert_eq!(h.alarms.tokens(), vec![stored[0].id]);
    assert!(first.reminders.iter().all(|r| r.id != stored[0].id));
}

#[tokio::test]
async fn test_removing_saved_reminder_disarms_it_before_save() {
    let h = harness().await;

    let mut editor = NoteEditor::new_note(h.notes.clone());
    editor.fields_mut().title = "Gym".to_string();
    editor.add_reminder_at(in_seconds(600));
    editor.add_reminder_at(in_seconds(1200));
    let saved = editor.save(false).await.unwrap();

    let removed = editor.remove_reminder(0).await.unwrap();

    assert_eq!(removed.id, saved.reminders[0].id);
    assert_eq!(h.alarms.tokens(), vec![saved.reminders[1].id]);
    // Row stays until the next save
    assert_eq!(h.repo.list_reminders_for_note(saved.note.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_note_cascades() {
    let h = harness().await;

    let saved = h
        .notes
        .save_note(
            None,
            NoteFields {
                title: "Conference".to_string(),
                ..NoteFields::default()
            },
            &[
                notas::database::Reminder::draft(0, in_seconds(60)),
                notas::database::Reminder::draft(0, in_seconds(120)),
            ],
        )
        .await
        .unwrap();

    h.notes.delete_note(saved.note.id).await.unwrap();

    assert!(h.repo.list_reminders_for_note(saved.note.id).await.unwrap().is_empty());
    assert!(h.repo.get_future_reminders(0).await.unwrap().is_empty());
    assert!(h.alarms.tokens().is_empty());
}

#[tokio::test]
async fn test_rehydration_after_reboot() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("orphans.db");
    // Build the schema, then reopen on a single connection without
    // foreign keys so an orphaned reminder can be planted.
    create_pool(&db_path).await.unwrap().close().await;
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}", db_path.display()))
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&pool)
        .await
        .unwrap();
    let repo = Repository::new(pool);

    let note = repo
        .insert_note(&NoteFields {
            title: "Water plants".to_string(),
            body: "Balcony first".to_string(),
            ..NoteFields::default()
        })
        .await
        .unwrap();

    let now = Utc::now();
    let at = |seconds: i64| (now + chrono::Duration::seconds(seconds)).timestamp_millis();

    repo.insert_reminder(NewReminder { note_id: note.id, fire_time_ms: at(-10) })
        .await
        .unwrap();
    let live = repo
        .insert_reminder(NewReminder { note_id: note.id, fire_time_ms: at(60) })
        .await
        .unwrap();
    repo.insert_reminder(NewReminder { note_id: note.id + 100, fire_time_ms: at(120) })
        .await
        .unwrap();

    let alarms = Arc::new(CapturingAlarms::default());
    let scheduler = ReminderScheduler::new(Arc::clone(&alarms) as Arc<dyn AlarmService>);
    let rehydrator = BootRehydrator::new(Arc::new(repo) as Arc<dyn ReminderStore>, scheduler);

    let report = rehydrator.rehydrate(now).await;

    assert_eq!(report.candidates, 2);
    assert_eq!(report.scheduled, 1);
    assert_eq!(report.skipped_missing_note, 1);
    assert_eq!(report.failed, 0);
    assert!(!report.aborted);
    assert_eq!(alarms.tokens(), vec![live]);
}

#[tokio::test]
async fn test_boot_signal_restores_lost_alarms() {
    let h = harness().await;

    let saved = h
        .notes
        .save_note(
            None,
            NoteFields {
                title: "Call the bank".to_string(),
                ..NoteFields::default()
            },
            &[
                notas::database::Reminder::draft(0, in_seconds(300)),
                notas::database::Reminder::draft(0, in_seconds(900)),
            ],
        )
        .await
        .unwrap();
    let before = h.alarms.tokens();

    h.alarms.reboot();
    assert!(h.alarms.tokens().is_empty());

    let task = h
        .rehydrator
        .on_receive(notas::config::ACTION_BOOT_COMPLETED)
        .unwrap();
    let report = task.wait().await;

    assert_eq!(report.scheduled, 2);
    assert_eq!(h.alarms.tokens(), before);
    let ids: Vec<i64> = saved.reminders.iter().map(|r| r.id).collect();
    assert_eq!(before, ids);
}

#[tokio::test]
async fn test_fired_alarm_carries_payload_to_notification() {
    let h = harness().await;

    let saved = h
        .notes
        .save_note(
            None,
            NoteFields {
                title: "Pick up kids".to_string(),
                body: "School closes at 3".to_string(),
                is_task: true,
                ..NoteFields::default()
            },
            &[notas::database::Reminder::draft(0, in_seconds(60))],
        )
        .await
        .unwrap();
    let token = saved.reminders[0].id;

    let extras = h.alarms.extras(token);
    assert_eq!(extras["note_id"], saved.note.id);
    assert_eq!(extras["note_title"], "Pick up kids");
    assert_eq!(extras["note_content"], "School closes at 3");
    assert_eq!(extras["reminder_id"], token);

    // Delivery must not need the store: drop the note before firing
    h.repo.delete_note(saved.note.id).await.unwrap();
    h.alarms.fire(token, &h.delivery);
    h.delivery.deliver(&extras);

    let active = h.tray.active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].0, token);
    assert_eq!(active[0].1.title, "Pick up kids");
    assert_eq!(active[0].1.body, "School closes at 3");

    assert_eq!(h.tray.tap(token), Some(LaunchRequest { note_id: saved.note.id }));
    assert!(h.tray.active().is_empty());
}

#[tokio::test]
async fn test_permission_denied_stores_but_does_not_arm() {
    let h = harness().await;
    *h.alarms.denied.lock().unwrap() = true;

    let saved = h
        .notes
        .save_note(
            None,
            NoteFields {
                title: "No alarms".to_string(),
                ..NoteFields::default()
            },
            &[notas::database::Reminder::draft(0, in_seconds(60))],
        )
        .await
        .unwrap();

    assert_eq!(saved.outcomes, vec![ScheduleOutcome::PermissionDenied]);
    assert!(h.alarms.tokens().is_empty());
    assert_eq!(h.repo.list_reminders_for_note(saved.note.id).await.unwrap().len(), 1);

    // Once granted, the next boot picks the reminder up
    *h.alarms.denied.lock().unwrap() = false;
    let report = h.rehydrator.rehydrate(Utc::now()).await;
    assert_eq!(report.scheduled, 1);
}

#[tokio::test]
async fn test_picked_date_and_time_become_one_reminder() {
    let h = harness().await;
    let zone = FixedOffset::west_opt(3 * 3600).unwrap();
    let picked_day = NaiveDate::from_ymd_opt(2031, 7, 4).unwrap();
    let picker_value = picked_day
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis();

    let mut editor = NoteEditor::new_note(h.notes.clone());
    editor.fields_mut().title = "Fireworks".to_string();

    assert!(editor.pick_reminder_time_in(20, 0, &zone).is_none());

    editor.pick_reminder_date(Some(picker_value));
    let fire_time_ms = editor.pick_reminder_time_in(20, 15, &zone).unwrap();

    let local = DateTime::<Utc>::from_timestamp_millis(fire_time_ms)
        .unwrap()
        .with_timezone(&zone);
    assert_eq!(local.date_naive(), picked_day);
    assert_eq!((local.hour(), local.minute()), (20, 15));

    let saved = editor.save(false).await.unwrap();
    assert_eq!(saved.reminders[0].fire_time_ms, fire_time_ms);
    assert_eq!(h.alarms.tokens(), vec![saved.reminders[0].id]);
}

#[tokio::test]
async fn test_reminder_stream_sees_save() {
    let h = harness().await;

    let saved = h
        .notes
        .save_note(
            None,
            NoteFields {
                title: "Watched".to_string(),
                ..NoteFields::default()
            },
            &[],
        )
        .await
        .unwrap();

    let mut stream = h.repo.reminders_stream(saved.note.id);
    assert!(stream.next().await.unwrap().unwrap().is_empty());

    h.notes
        .save_note(
            Some(saved.note.id),
            NoteFields {
                title: "Watched".to_string(),
                ..NoteFields::default()
            },
            &[notas::database::Reminder::draft(saved.note.id, in_seconds(60))],
        )
        .await
        .unwrap();

    // The save touches the table twice; the stream settles on the final list
    let mut latest = stream.next().await.unwrap().unwrap();
    while latest.is_empty() {
        latest = stream.next().await.unwrap().unwrap();
    }
    assert_eq!(latest.len(), 1);
}

#[tokio::test]
async fn test_due_date_keeps_picked_day() {
    let h = harness().await;
    let zone = FixedOffset::west_opt(8 * 3600).unwrap();
    let picked_day = NaiveDate::from_ymd_opt(2030, 1, 20).unwrap();
    let picker_value = picked_day
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis();

    let mut editor = NoteEditor::new_note(h.notes.clone());
    editor.fields_mut().title = "File taxes".to_string();
    let due = editor
        .set_due_date_in(Some((picker_value, 17, 0)), &zone)
        .unwrap();

    let local = DateTime::<Utc>::from_timestamp_millis(due)
        .unwrap()
        .with_timezone(&zone);
    assert_eq!(local.date_naive(), picked_day);
    assert_eq!(local.hour(), 17);

    let saved = editor.save(true).await.unwrap();
    assert_eq!(saved.note.due_date_ms, Some(due));
    assert!(saved.note.is_task);

    assert_eq!(editor.set_due_date_in(None, &zone), None);
    let saved = editor.save(true).await.unwrap();
    assert_eq!(saved.note.due_date_ms, None);
}

/// A second writer on the same database, as a separate `notasd add` would be
async fn other_process(data_dir: &std::path::Path) -> Repository {
    let pool = create_pool(&data_dir.join(notas::config::DATABASE_FILE_NAME))
        .await
        .unwrap();
    Repository::new(pool)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_running_host_arms_reminders_written_elsewhere() {
    let temp = TempDir::new().unwrap();
    let state = notas::app::setup(temp.path().to_path_buf()).await.unwrap();
    state.boot().await.unwrap();
    assert!(state.alarms.pending_tokens().await.is_empty());

    let writer = other_process(temp.path()).await;
    let note = writer
        .insert_note(&NoteFields {
            title: "Added while running".to_string(),
            ..NoteFields::default()
        })
        .await
        .unwrap();
    let id = writer
        .insert_reminder(NewReminder { note_id: note.id, fire_time_ms: in_seconds(3600) })
        .await
        .unwrap();

    let report = state.resync().await;
    assert_eq!(report.scheduled, 1);
    assert_eq!(state.alarms.pending_tokens().await, vec![id]);

    let report = state.resync().await;
    assert_eq!(report.already_armed, 1);
    assert_eq!(report.scheduled, 0);

    writer.delete_note(note.id).await.unwrap();
    let report = state.resync().await;
    assert_eq!(report.stale_cancelled, 1);
    assert!(state.alarms.pending_tokens().await.is_empty());

    state.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_periodic_resync_picks_up_new_reminder() {
    let temp = TempDir::new().unwrap();
    notas::services::SettingsService::new(temp.path().to_path_buf())
        .update_reminders(notas::services::ReminderSettings {
            resync_interval_secs: 1,
            ..notas::services::ReminderSettings::default()
        })
        .await
        .unwrap();
    let state = notas::app::setup(temp.path().to_path_buf()).await.unwrap();
    let resync = state.start_resync();

    let writer = other_process(temp.path()).await;
    let note = writer
        .insert_note(&NoteFields {
            title: "Polled".to_string(),
            ..NoteFields::default()
        })
        .await
        .unwrap();
    let id = writer
        .insert_reminder(NewReminder { note_id: note.id, fire_time_ms: in_seconds(3600) })
        .await
        .unwrap();

    let mut armed = Vec::new();
    for _ in 0..50 {
        armed = state.alarms.pending_tokens().await;
        if !armed.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert_eq!(armed, vec![id]);

    resync.abort();
    state.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resync_applies_permission_from_settings() {
    let temp = TempDir::new().unwrap();
    let state = notas::app::setup(temp.path().to_path_buf()).await.unwrap();
    assert!(state.alarms.can_schedule_exact_alarms());

    notas::services::SettingsService::new(temp.path().to_path_buf())
        .update_reminders(notas::services::ReminderSettings {
            exact_alarms_allowed: false,
            ..notas::services::ReminderSettings::default()
        })
        .await
        .unwrap();

    let writer = other_process(temp.path()).await;
    let note = writer
        .insert_note(&NoteFields {
            title: "Needs permission".to_string(),
            ..NoteFields::default()
        })
        .await
        .unwrap();
    writer
        .insert_reminder(NewReminder { note_id: note.id, fire_time_ms: in_seconds(3600) })
        .await
        .unwrap();

    let report = state.resync().await;
    assert!(!state.alarms.can_schedule_exact_alarms());
    assert_eq!(report.not_scheduled, 1);
    assert!(state.alarms.pending_tokens().await.is_empty());

    state
        .settings_service
        .update_reminders(notas::services::ReminderSettings::default())
        .await
        .unwrap();
    let report = state.resync().await;
    assert!(state.alarms.can_schedule_exact_alarms());
    assert_eq!(report.scheduled, 1);

    state.shutdown().await.unwrap();
}
