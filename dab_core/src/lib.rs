#![forbid(unsafe_code)]

//! Core domain model and business logic for the Dab Timer.
//!
//! This crate provides:
//! - Domain types (settings, phases, session records, ratings)
//! - Configuration, including the duration lookup tables
//! - Duration calculator
//! - Two-phase countdown state machine
//! - Persistence (CSV session log)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod calculator;
pub mod timer;
pub mod session_log;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, DurationTables};
pub use calculator::{compute_cool_seconds, compute_durations, compute_heat_seconds};
pub use timer::{PhaseTimer, TickResult};
pub use session_log::{CsvSessionLog, SessionSink};
