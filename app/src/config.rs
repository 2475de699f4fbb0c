//! Application configuration constants
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the application.

// ===== Storage =====

/// SQLite database file name inside the app data directory
pub const DATABASE_FILE_NAME: &str = "notas.db";

/// Settings file name inside the app data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Environment variable overriding the app data directory
pub const DATA_DIR_ENV: &str = "NOTAS_DATA_DIR";

// ===== Notifications =====

/// Channel every reminder notification is posted to
pub const REMINDER_CHANNEL_ID: &str = "reminder_channel";

/// User-visible name of the reminder channel
pub const REMINDER_CHANNEL_NAME: &str = "Task reminders";

/// Title used when a fired payload carries no title
pub const DEFAULT_REMINDER_TITLE: &str = "Task";

/// Body used when a fired payload carries no content
pub const DEFAULT_REMINDER_BODY: &str = "It's time for your task.";

// ===== Alarm payload keys =====

pub const EXTRA_NOTE_ID: &str = "note_id";
pub const EXTRA_NOTE_TITLE: &str = "note_title";
pub const EXTRA_NOTE_CONTENT: &str = "note_content";
pub const EXTRA_IS_TASK: &str = "is_task";
pub const EXTRA_REMINDER_ID: &str = "reminder_id";

// ===== Boot signal =====

/// Standard boot-completed broadcast action
pub const ACTION_BOOT_COMPLETED: &str = "android.intent.action.BOOT_COMPLETED";

/// Vendor-specific quick-boot equivalent of boot-completed
pub const ACTION_QUICKBOOT_POWERON: &str = "android.intent.action.QUICKBOOT_POWERON";

/// Every action that triggers reminder rehydration
pub const BOOT_ACTIONS: &[&str] = &[ACTION_BOOT_COMPLETED, ACTION_QUICKBOOT_POWERON];

// ===== Boot task limits =====

/// Default lifetime granted to the boot task before the host may reclaim it.
/// Matches the window a platform grants a broadcast receiver that went async.
pub const DEFAULT_BOOT_DEADLINE_SECS: u64 = 10;

/// Minimum boot task lifetime in seconds
pub const MIN_BOOT_DEADLINE_SECS: u64 = 1;

/// Maximum boot task lifetime in seconds (longer holds get killed by the platform)
pub const MAX_BOOT_DEADLINE_SECS: u64 = 60;

// ===== Live resync =====

/// Default period between store/alarm reconciliations while the host runs
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 30;

pub const MIN_RESYNC_INTERVAL_SECS: u64 = 1;

pub const MAX_RESYNC_INTERVAL_SECS: u64 = 3600;
