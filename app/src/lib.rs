//! Notas library
//!
//! Notes and tasks with reminders that survive restarts. The library holds
//! all of the logic; the `notasd` binary hosts it as a long-running process.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod platform;
pub mod services;
