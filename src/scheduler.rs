//! Rolling-window materialization of recurring chores.
//!
//! Each run keeps `today ..= today + window_days` populated with assignments
//! for every active recurrence rule. Correctness under repeated or
//! overlapping runs rests on the dedup lookup done before every create, not on
//! a scheduler-wide lock; the watermark only saves work. Stores are expected
//! to apply each write atomically against the latest persisted state.

use chrono::{Days, Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_WINDOW_DAYS;
use crate::error::StoreError;
use crate::models::{AssignmentStatus, Chore, NewAssignment, NewChoreInstance, RecurrenceRule};
use crate::recurrence::{generate_occurrences, next_day};
use crate::storage::Store;

/// Why a rule produced nothing this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Inactive,
    TemplateMissing,
    TemplateInactive,
    /// No occurrence falls between the watermark and the window end.
    NothingDue,
}

/// Per-rule counters for a generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    pub created: Vec<NaiveDate>,
    /// Occurrences whose assignment was already present.
    pub existing: Vec<NaiveDate>,
    /// Occurrences that could not be materialized; retried next run.
    pub failed: Vec<NaiveDate>,
    /// New watermark, if it moved.
    pub watermark: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    Skipped { reason: SkipReason },
    /// The pattern's end date has passed; the rule was switched off.
    Deactivated,
    Generated(GenerationStats),
    /// A lookup or write for the rule itself failed.
    Failed { error: String },
}

/// Summary of one scheduler pass over all rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub today: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
    pub rules: usize,
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
    pub skipped: usize,
    pub deactivated: usize,
    pub rule_errors: usize,
    pub outcomes: Vec<(u64, RuleOutcome)>,
}

impl RunReport {
    fn record(&mut self, rule_id: u64, outcome: RuleOutcome) {
        self.rules += 1;
        match &outcome {
            RuleOutcome::Skipped { .. } => self.skipped += 1,
            RuleOutcome::Deactivated => self.deactivated += 1,
            RuleOutcome::Generated(stats) => {
                self.created += stats.created.len();
                self.existing += stats.existing.len();
                self.failed += stats.failed.len();
            }
            RuleOutcome::Failed { .. } => self.rule_errors += 1,
        }
        self.outcomes.push((rule_id, outcome));
    }
}

enum Materialized {
    Created,
    Existing,
}

/// The rolling-window scheduler.
pub struct Scheduler<S> {
    store: S,
    window_days: u32,
}

impl<S: Store> Scheduler<S> {
    /// Create a scheduler with the default 14-day window.
    pub fn new(store: S) -> Self {
        Self {
            store,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Last day of the look-ahead window starting at `today`.
    pub fn window_end(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.window_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Processes every active rule that is not yet generated through the
    /// window end, or that may have expired.
    ///
    /// Only a failure to list rules aborts the run; everything after that is
    /// isolated per rule and per occurrence and reported in the [`RunReport`].
    pub fn run(&self, today: NaiveDate) -> Result<RunReport, StoreError> {
        let window_end = self.window_end(today);
        let rules = self.store.list_active_rules(window_end).map_err(|e| {
            error!("scheduler run aborted, could not list rules: {e}");
            e
        })?;

        let mut report = RunReport {
            today: Some(today),
            window_end: Some(window_end),
            ..RunReport::default()
        };
        for rule in &rules {
            let outcome = self.process_rule(rule, today, window_end);
            report.record(rule.id, outcome);
        }

        info!(
            rules = report.rules,
            created = report.created,
            existing = report.existing,
            failed = report.failed,
            deactivated = report.deactivated,
            rule_errors = report.rule_errors,
            %window_end,
            "scheduler run finished"
        );
        Ok(report)
    }

    /// Generates the current window for a single, freshly created rule.
    pub fn materialize_rule(&self, rule_id: u64, today: NaiveDate) -> Result<RuleOutcome, StoreError> {
        let rule = self
            .store
            .find_rule(rule_id)?
            .ok_or(StoreError::RuleNotFound(rule_id))?;
        Ok(self.process_rule(&rule, today, self.window_end(today)))
    }

    /// Evaluates one rule against the window ending at `window_end`.
    pub fn process_rule(&self, rule: &RecurrenceRule, today: NaiveDate, window_end: NaiveDate) -> RuleOutcome {
        if !rule.active {
            return RuleOutcome::Skipped {
                reason: SkipReason::Inactive,
            };
        }

        let template = match self.store.find_template(rule.chore_id) {
            Ok(Some(chore)) if chore.active => chore,
            Ok(Some(_)) => {
                debug!(rule_id = rule.id, chore_id = rule.chore_id, "template inactive, skipping rule");
                return RuleOutcome::Skipped {
                    reason: SkipReason::TemplateInactive,
                };
            }
            Ok(None) => {
                debug!(rule_id = rule.id, chore_id = rule.chore_id, "template missing, skipping rule");
                return RuleOutcome::Skipped {
                    reason: SkipReason::TemplateMissing,
                };
            }
            Err(e) => {
                warn!(rule_id = rule.id, "template lookup failed: {e}");
                return RuleOutcome::Failed { error: e.to_string() };
            }
        };

        if rule.pattern.end_date.is_some_and(|end| end < today) {
            return match self.store.deactivate_rule(rule.id) {
                Ok(()) => {
                    info!(rule_id = rule.id, "recurrence ended, rule deactivated");
                    RuleOutcome::Deactivated
                }
                Err(e) => {
                    warn!(rule_id = rule.id, "could not deactivate expired rule: {e}");
                    RuleOutcome::Failed { error: e.to_string() }
                }
            };
        }

        self.generate(rule, &template, window_end)
    }

    fn generate(&self, rule: &RecurrenceRule, template: &Chore, window_end: NaiveDate) -> RuleOutcome {
        let from = next_day(rule.last_generated_date);
        let dates = if from > rule.last_generated_date {
            generate_occurrences(&rule.pattern, from, window_end)
        } else {
            Vec::new()
        };
        if dates.is_empty() {
            return RuleOutcome::Skipped {
                reason: SkipReason::NothingDue,
            };
        }

        let mut stats = GenerationStats::default();
        // Highest handled date below the first failure. Dates are ascending.
        let mut high_water: Option<NaiveDate> = None;
        for date in dates {
            match self.materialize_occurrence(rule, template, date) {
                Ok(kind) => {
                    match kind {
                        Materialized::Created => stats.created.push(date),
                        Materialized::Existing => {
                            debug!(rule_id = rule.id, %date, "occurrence already materialized");
                            stats.existing.push(date)
                        }
                    }
                    if stats.failed.is_empty() {
                        high_water = Some(date);
                    }
                }
                Err(e) => {
                    warn!(rule_id = rule.id, %date, "failed to materialize occurrence: {e}");
                    stats.failed.push(date);
                }
            }
        }

        if let Some(date) = high_water.filter(|d| *d > rule.last_generated_date) {
            match self.store.advance_watermark(rule.id, date) {
                Ok(()) => stats.watermark = Some(date),
                Err(e) => warn!(rule_id = rule.id, %date, "could not advance watermark: {e}"),
            }
        }

        RuleOutcome::Generated(stats)
    }

    fn materialize_occurrence(
        &self,
        rule: &RecurrenceRule,
        template: &Chore,
        date: NaiveDate,
    ) -> Result<Materialized, StoreError> {
        if self
            .store
            .find_assignment(template.id, rule.assignee_id, date)?
            .is_some()
        {
            return Ok(Materialized::Existing);
        }

        let instance = NewChoreInstance::snapshot(template);
        let assignment = NewAssignment {
            tenant_id: rule.tenant_id,
            template_id: Some(template.id),
            assignee_id: rule.assignee_id,
            assigner_id: rule.assigner_id,
            due_date: date,
            priority: rule.priority,
            status: AssignmentStatus::Pending,
            rule_id: Some(rule.id),
        };
        match self.store.create_instance_and_assignment(instance, assignment) {
            Ok(_) => Ok(Materialized::Created),
            // Lost a race with an overlapping run; the occurrence is satisfied.
            Err(StoreError::DuplicateAssignment { .. }) => Ok(Materialized::Existing),
            Err(e) => Err(e),
        }
    }
}

/// Today's date in local time.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}
