//! Error types.

use thiserror::Error;

/// Failures raised by a [`Store`](crate::storage::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("chore not found: {0}")]
    ChoreNotFound(u64),

    #[error("recurrence rule not found: {0}")]
    RuleNotFound(u64),

    #[error("assignment already exists for chore {template_id}, member {assignee_id} on {due_date}")]
    DuplicateAssignment {
        template_id: u64,
        assignee_id: u64,
        due_date: chrono::NaiveDate,
    },

    #[error("invalid recurrence pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A recurrence rule that cannot be created as configured.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("weekly recurrence needs at least one weekday")]
    NoWeekdays,

    #[error("weekday {0} is out of range (0 = Sunday .. 6 = Saturday)")]
    WeekdayOutOfRange(u8),

    #[error("unknown weekday '{0}'")]
    UnknownWeekday(String),

    #[error("day of month {0} is out of range (1..31)")]
    DayOfMonthOutOfRange(u32),

    #[error("start date {start} is after end date {end}")]
    InvertedBounds {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("unknown recurrence '{0}'. Supported: daily, weekly, monthly")]
    UnknownFrequency(String),
}
