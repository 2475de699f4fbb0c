//! Services module
//!
//! Business logic that sits between the platform collaborators and the
//! repository: scheduling, boot rehydration, delivery and the note edit flow.

pub mod delivery;
pub mod editor;
pub mod notes;
pub mod rehydrator;
pub mod scheduler;
pub mod settings;

pub use delivery::{DeliveryOutcome, ReminderDeliveryHandler};
pub use editor::{combine_date_and_time, NoteEditor};
pub use notes::{NotesService, SavedNote};
pub use rehydrator::{BootRehydrator, BootTask, RehydrationReport};
pub use scheduler::{ReminderPayload, ReminderScheduler, ReminderToken, ScheduleOutcome};
pub use settings::{AppSettings, ReminderSettings, SettingsService};
