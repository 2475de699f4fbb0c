// Notas - notes and tasks with reminders
// Process host: boot signal, alarm delivery and notification tray

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use notas::app::{self, AppState};
use notas::config;
use notas::services::NoteEditor;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "notasd")]
#[command(about = "Notes and tasks with reminders that survive restarts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the database and settings
    #[arg(long, value_name = "PATH", env = config::DATA_DIR_ENV, default_value = ".notas")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-arm stored reminders, then stay up delivering them until Ctrl-C
    Run,
    /// Re-arm stored reminders once and print the tally
    Boot,
    /// Create a note, optionally with reminders
    Add {
        title: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Save as a task instead of a plain note
        #[arg(long)]
        task: bool,
        /// Reminder this many minutes from now (repeatable)
        #[arg(long = "remind-in", value_name = "MINUTES")]
        remind_in: Vec<i64>,
        /// Reminder at an RFC 3339 timestamp (repeatable)
        #[arg(long = "remind-at", value_name = "TIME")]
        remind_at: Vec<DateTime<Utc>>,
    },
    /// Mark a task done or not done
    Done {
        id: i64,
        #[arg(long)]
        undo: bool,
    },
    /// Delete a note and its reminders
    Delete { id: i64 },
    /// List notes with their reminders
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change reminder settings; a running host picks up the
    /// exact-alarm permission on its next resync
    Settings {
        #[arg(long, value_name = "BOOL")]
        exact_alarms: Option<bool>,
        #[arg(long, value_name = "BOOL")]
        rehydrate_on_start: Option<bool>,
        #[arg(long, value_name = "SECONDS")]
        boot_deadline: Option<u64>,
        #[arg(long, value_name = "SECONDS")]
        resync_interval: Option<u64>,
    },
}

#[derive(Serialize)]
struct NoteListing {
    #[serde(flatten)]
    note: notas::database::Note,
    reminders: Vec<notas::database::Reminder>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notas=debug,notasd=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Notas");

    let state = app::setup(cli.data_dir.clone())
        .await
        .context("Failed to initialize application")?;

    let result = run_command(&state, cli.command).await;

    state.shutdown().await?;
    result
}

async fn run_command(state: &AppState, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run => {
            if state.settings.rehydrate_on_start {
                boot(state).await;
            }

            let resync = state.start_resync();

            tracing::info!("Waiting for reminders, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down");
            resync.abort();
        }
        Commands::Boot => {
            if let Some(report) = boot(state).await {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Add {
            title,
            body,
            task,
            remind_in,
            remind_at,
        } => {
            let wants_reminders = !(remind_in.is_empty() && remind_at.is_empty());
            if wants_reminders && !state.scheduler.can_schedule_exact_alarms() {
                tracing::warn!("Exact alarms are not allowed, reminders are stored but will not fire");
            }

            let mut editor = NoteEditor::new_note(state.notes_service.clone());
            editor.fields_mut().title = title;
            editor.fields_mut().body = body;

            let now = Utc::now();
            for minutes in remind_in {
                let at = now + chrono::Duration::minutes(minutes);
                editor.add_reminder_at(at.timestamp_millis());
            }
            for at in remind_at {
                editor.add_reminder_at(at.timestamp_millis());
            }

            let saved = editor.save(task).await?;
            println!("Saved note {} with {} reminder(s)", saved.note.id, saved.reminders.len());
        }
        Commands::Done { id, undo } => {
            state.notes_service.set_done(id, !undo).await?;
        }
        Commands::Delete { id } => {
            state.notes_service.delete_note(id).await?;
            println!("Deleted note {}", id);
        }
        Commands::List { json } => {
            let mut listings = Vec::new();
            for note in state.notes_service.list_notes().await? {
                let reminders = state.notes_service.reminders_for_note(note.id).await?;
                listings.push(NoteListing { note, reminders });
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&listings)?);
            } else {
                for listing in &listings {
                    let marker = match (listing.note.is_task, listing.note.is_done) {
                        (true, true) => "[x] ",
                        (true, false) => "[ ] ",
                        _ => "",
                    };
                    println!("{:>4}  {}{}", listing.note.id, marker, listing.note.title);
                    for reminder in &listing.reminders {
                        if let Some(at) = reminder.fire_time() {
                            println!("        reminder {} at {}", reminder.id, at.to_rfc3339());
                        }
                    }
                }
            }
        }
        Commands::Settings {
            exact_alarms,
            rehydrate_on_start,
            boot_deadline,
            resync_interval,
        } => {
            let mut settings = state.settings_service.get_reminders().await?;
            let changed = exact_alarms.is_some()
                || rehydrate_on_start.is_some()
                || boot_deadline.is_some()
                || resync_interval.is_some();

            if let Some(allowed) = exact_alarms {
                settings.exact_alarms_allowed = allowed;
            }
            if let Some(enabled) = rehydrate_on_start {
                settings.rehydrate_on_start = enabled;
            }
            if let Some(secs) = boot_deadline {
                settings.boot_deadline_secs = secs;
            }
            if let Some(secs) = resync_interval {
                settings.resync_interval_secs = secs;
            }

            if changed {
                state.settings_service.update_reminders(settings.clone()).await?;
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}

async fn boot(state: &AppState) -> Option<notas::services::RehydrationReport> {
    let report = state.boot().await;
    match &report {
        Some(report) => tracing::info!(
            "Boot rehydration done: {} scheduled, {} skipped",
            report.scheduled,
            report.skipped_missing_note + report.not_scheduled
        ),
        None => tracing::warn!("Boot rehydration did not finish in time"),
    }
    report
}
