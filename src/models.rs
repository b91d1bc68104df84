use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub type TenantId = u64;
pub type MemberId = u64;

/// Reward difficulty of a chore.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

/// Priority carried from a recurrence rule onto the assignments it generates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Lifecycle status of an assignment. The scheduler only ever creates `Pending`;
/// the other states belong to the submission/review workflow.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    Submitted,
    Approved,
    Rejected,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(s)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentStatus::Pending => "Pending",
            AssignmentStatus::Submitted => "Submitted",
            AssignmentStatus::Approved => "Approved",
            AssignmentStatus::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

/// A template chore owned by a family.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Chore {
    /// Unique identifier for the chore.
    pub id: u64,
    pub tenant_id: TenantId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Points awarded when an assignment of this chore is approved.
    pub points: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Expected duration in minutes.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Soft-delete flag. Recurrence rules pointing at an inactive chore are skipped.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// How often a rule recurs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    /// Weekdays use 0 = Sunday .. 6 = Saturday.
    Weekly {
        #[serde(default)]
        days_of_week: BTreeSet<u8>,
    },
    Monthly {
        #[serde(default = "default_day_of_month")]
        day_of_month: u32,
    },
}

/// A recurrence pattern with optional inclusive validity bounds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecurrencePattern {
    #[serde(flatten)]
    pub frequency: Frequency,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl RecurrencePattern {
    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    pub fn weekly<I: IntoIterator<Item = u8>>(days: I) -> Self {
        Self::new(Frequency::Weekly {
            days_of_week: days.into_iter().collect(),
        })
    }

    pub fn monthly(day_of_month: u32) -> Self {
        Self::new(Frequency::Monthly { day_of_month })
    }

    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            start_date: None,
            end_date: None,
        }
    }

    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn ending(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.frequency {
            Frequency::Daily => write!(f, "daily")?,
            Frequency::Weekly { days_of_week } => {
                let names: Vec<&str> = days_of_week
                    .iter()
                    .map(|d| crate::recurrence::weekday_name(*d))
                    .collect();
                write!(f, "weekly ({})", names.join(","))?
            }
            Frequency::Monthly { day_of_month } => write!(f, "monthly (day {})", day_of_month)?,
        }
        match (self.start_date, self.end_date) {
            (Some(s), Some(e)) => write!(f, " {}..{}", s, e),
            (Some(s), None) => write!(f, " from {}", s),
            (None, Some(e)) => write!(f, " until {}", e),
            (None, None) => Ok(()),
        }
    }
}

/// A persisted recurring assignment of a chore to a family member.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecurrenceRule {
    pub id: u64,
    pub tenant_id: TenantId,
    /// The template chore this rule materializes.
    pub chore_id: u64,
    pub assignee_id: MemberId,
    pub assigner_id: MemberId,
    pub pattern: RecurrencePattern,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_true")]
    pub active: bool,
    /// All occurrences on or before this date have been materialized or
    /// deliberately skipped. Only ever moves forward.
    pub last_generated_date: NaiveDate,
}

/// Input for creating a recurrence rule.
#[derive(Debug, Clone)]
pub struct NewRecurrenceRule {
    pub tenant_id: TenantId,
    pub chore_id: u64,
    pub assignee_id: MemberId,
    pub assigner_id: MemberId,
    pub pattern: RecurrencePattern,
    pub priority: Priority,
    /// Starting watermark; see [`crate::trigger::initial_watermark`].
    pub last_generated_date: NaiveDate,
}

/// Immutable snapshot of a chore's reward fields taken at generation time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChoreInstance {
    pub id: u64,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub template_id: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub points: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

/// Instance fields before persistence assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChoreInstance {
    pub tenant_id: TenantId,
    pub template_id: Option<u64>,
    pub title: String,
    pub description: Option<String>,
    pub points: u32,
    pub difficulty: Difficulty,
    pub duration_minutes: Option<u32>,
}

impl NewChoreInstance {
    /// Snapshots the current reward fields of `chore`.
    pub fn snapshot(chore: &Chore) -> Self {
        Self {
            tenant_id: chore.tenant_id,
            template_id: Some(chore.id),
            title: chore.title.clone(),
            description: chore.description.clone(),
            points: chore.points,
            difficulty: chore.difficulty,
            duration_minutes: chore.duration_minutes,
        }
    }
}

/// One due chore for one family member.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: u64,
    pub tenant_id: TenantId,
    pub instance_id: u64,
    /// Template the instance was snapshotted from; part of the dedup key.
    #[serde(default)]
    pub template_id: Option<u64>,
    pub assignee_id: MemberId,
    pub assigner_id: MemberId,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: AssignmentStatus,
    /// Rule that generated this assignment, if any.
    #[serde(default)]
    pub rule_id: Option<u64>,
    /// Timestamp when the assignment was created (ISO 8601).
    pub created_at: String,
}

/// Assignment fields before persistence links them to an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAssignment {
    pub tenant_id: TenantId,
    pub template_id: Option<u64>,
    pub assignee_id: MemberId,
    pub assigner_id: MemberId,
    pub due_date: NaiveDate,
    pub priority: Priority,
    pub status: AssignmentStatus,
    pub rule_id: Option<u64>,
}

/// Input for creating a chore template.
#[derive(Debug, Clone)]
pub struct NewChore {
    pub tenant_id: TenantId,
    pub title: String,
    pub description: Option<String>,
    pub points: u32,
    pub difficulty: Difficulty,
    pub duration_minutes: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn default_day_of_month() -> u32 {
    1
}
