//! # Chorust
//!
//! Recurring chore scheduling for families. Recurrence rules (daily, weekly,
//! monthly, with optional start and end dates) are turned into dated
//! assignments for a rolling look-ahead window, without ever creating the
//! same assignment twice.
//!
//! - [`recurrence`] computes occurrence dates for a pattern.
//! - [`scheduler`] materializes occurrences into chore instances and
//!   assignments and keeps each rule's watermark.
//! - [`storage`] defines the [`storage::Store`] interface and its JSON-file
//!   and in-memory implementations.
//! - [`trigger`] runs the scheduler on rule creation and once a day.

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod scheduler;
pub mod storage;
pub mod trigger;
pub mod tui;

pub use error::{PatternError, StoreError};
pub use scheduler::{RuleOutcome, RunReport, Scheduler};
pub use storage::{JsonStore, MemoryStore, Store};
