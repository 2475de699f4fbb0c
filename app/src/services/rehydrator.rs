//! Reboot rehydration
//!
//! The platform forgets every pending alarm across a reboot. On the boot
//! signal, every reminder that still lies in the future is read back from
//! storage and handed to the scheduler again. The reminders table is the
//! source of truth; the alarm table is only a cache of it.
//!
//! The work runs as a spawned task that holds a `PendingResult` for its whole
//! lifetime. Finishing the result, on success, on failure or when the task
//! unwinds, is what lets the host release the process.

use crate::config;
use crate::database::ReminderStore;
use crate::services::scheduler::{ReminderScheduler, ScheduleOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Tally of one rehydration pass, for diagnostics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RehydrationReport {
    /// Future reminders returned by the store
    pub candidates: usize,
    pub scheduled: usize,
    /// Reminders whose note no longer exists
    pub skipped_missing_note: usize,
    /// Reminders the scheduler declined (permission, stale clock, ...)
    pub not_scheduled: usize,
    /// Reminders whose note lookup failed
    pub failed: usize,
    /// Reminders the alarm table already held, left untouched
    pub already_armed: usize,
    /// Armed tokens with no future reminder behind them, cancelled
    pub stale_cancelled: usize,
    /// The pass stopped early: query failure or the task went away
    pub aborted: bool,
}

/// Guarantees the boot task reports completion exactly once.
///
/// Dropping an unfinished result reports an aborted pass, which covers a
/// panicking rehydration loop.
struct PendingResult {
    done: Option<oneshot::Sender<RehydrationReport>>,
}

impl PendingResult {
    fn new(done: oneshot::Sender<RehydrationReport>) -> Self {
        Self { done: Some(done) }
    }

    fn finish(mut self, report: RehydrationReport) {
        if let Some(done) = self.done.take() {
            let _ = done.send(report);
        }
    }
}

impl Drop for PendingResult {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            tracing::error!("Boot task ended without finishing, releasing anyway");
            let _ = done.send(RehydrationReport {
                aborted: true,
                ..RehydrationReport::default()
            });
        }
    }
}

/// Handle the host holds while rehydration runs
pub struct BootTask {
    done: oneshot::Receiver<RehydrationReport>,
}

impl BootTask {
    pub async fn wait(self) -> RehydrationReport {
        self.done.await.unwrap_or(RehydrationReport {
            aborted: true,
            ..RehydrationReport::default()
        })
    }

    /// Wait at most `deadline`; `None` means the platform would have reclaimed
    /// the process before the pass completed
    pub async fn wait_with_deadline(self, deadline: Duration) -> Option<RehydrationReport> {
        match tokio::time::timeout(deadline, self.wait()).await {
            Ok(report) => Some(report),
            Err(_) => {
                tracing::warn!(
                    "Boot task exceeded {:?}, remaining reminders wait for the next boot",
                    deadline
                );
                None
            }
        }
    }
}

#[derive(Clone)]
pub struct BootRehydrator {
    store: Arc<dyn ReminderStore>,
    scheduler: ReminderScheduler,
}

impl BootRehydrator {
    pub fn new(store: Arc<dyn ReminderStore>, scheduler: ReminderScheduler) -> Self {
        Self { store, scheduler }
    }

    pub fn is_boot_action(action: &str) -> bool {
        config::BOOT_ACTIONS.contains(&action)
    }

    /// Entry point for the boot broadcast.
    ///
    /// Returns `None` for unrelated actions. Otherwise spawns the pass and
    /// returns the handle to hold until it completes.
    pub fn on_receive(&self, action: &str) -> Option<BootTask> {
        if !Self::is_boot_action(action) {
            tracing::debug!("Ignoring broadcast {}", action);
            return None;
        }

        tracing::info!("Device booted, rescheduling reminders");

        let (tx, rx) = oneshot::channel();
        let pending = PendingResult::new(tx);
        let rehydrator = self.clone();

        tokio::spawn(async move {
            let report = rehydrator.rehydrate(Utc::now()).await;
            pending.finish(report);
        });

        Some(BootTask { done: rx })
    }

    /// Re-arm every reminder firing after `now`.
    ///
    /// Reminders are processed independently; a failure on one never stops
    /// the rest. A failed query ends the pass, to be retried on the next boot
    /// or the next save of the note.
    pub async fn rehydrate(&self, now: DateTime<Utc>) -> RehydrationReport {
        self.reconcile(now, &[]).await
    }

    /// Bring a live alarm table in line with storage.
    ///
    /// `armed` holds the tokens the alarm table still has pending. Those are
    /// not registered again, since a second registration of an alarm that is
    /// firing right now would deliver it twice. Armed tokens whose reminder
    /// row is gone are cancelled; a row that is merely due stays armed so the
    /// pending wake-up still fires. Reminder ids are never reused and a
    /// save always writes new rows, so an armed token never carries a stale
    /// fire time or payload.
    pub async fn reconcile(&self, now: DateTime<Utc>, armed: &[i64]) -> RehydrationReport {
        let mut report = RehydrationReport::default();

        let reminders = match self.store.get_future_reminders(now.timestamp_millis()).await {
            Ok(reminders) => reminders,
            Err(e) => {
                tracing::error!("Failed to read future reminders: {}", e);
                report.aborted = true;
                return report;
            }
        };
        report.candidates = reminders.len();

        for reminder in &reminders {
            if armed.contains(&reminder.id) {
                report.already_armed += 1;
                continue;
            }

            let note = match self.store.get_note_by_id(reminder.note_id).await {
                Ok(Some(note)) => note,
                Ok(None) => {
                    tracing::warn!(
                        "Skipping reminder {}: note {} no longer exists",
                        reminder.id,
                        reminder.note_id
                    );
                    report.skipped_missing_note += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to load note {} for reminder {}: {}",
                        reminder.note_id,
                        reminder.id,
                        e
                    );
                    report.failed += 1;
                    continue;
                }
            };

            match self.scheduler.schedule_at(&note, reminder, now).await {
                ScheduleOutcome::Scheduled => report.scheduled += 1,
                _ => report.not_scheduled += 1,
            }
        }

        for token in armed {
            if reminders.iter().any(|r| r.id == *token) {
                continue;
            }

            match self.store.get_reminder_by_id(*token).await {
                Ok(None) => {
                    self.scheduler.cancel(*token).await;
                    report.stale_cancelled += 1;
                }
                Ok(Some(_)) => {}
                Err(e) => {
                    tracing::error!("Failed to look up armed reminder {}: {}", token, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Rescheduled {} of {} reminders ({} armed, {} missing notes, {} failed, {} cancelled)",
            report.scheduled,
            report.candidates,
            report.already_armed,
            report.skipped_missing_note,
            report.failed,
            report.stale_cancelled
        );

        report
    }
}
