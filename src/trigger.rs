//! Entry points that invoke the scheduler: the on-demand trigger fired when a
//! rule is created, and the periodic background trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info};

use crate::error::StoreError;
use crate::models::{NewRecurrenceRule, RecurrencePattern, RecurrenceRule};
use crate::scheduler::{local_today, RuleOutcome, RunReport, Scheduler};
use crate::storage::Store;

/// Watermark for a rule created on `today`: the day before its first
/// eligible date, so that date itself is generated. Past start dates are not
/// backfilled.
pub fn initial_watermark(pattern: &RecurrencePattern, today: NaiveDate) -> NaiveDate {
    let first = match pattern.start_date {
        Some(start) if start > today => start,
        _ => today,
    };
    first.pred_opt().unwrap_or(first)
}

/// Stores a new rule and immediately materializes its first window, so the
/// first occurrences are visible without waiting for the next periodic run.
pub fn create_rule_and_materialize<S: Store>(
    scheduler: &Scheduler<S>,
    rule: NewRecurrenceRule,
    today: NaiveDate,
) -> Result<(RecurrenceRule, RuleOutcome), StoreError> {
    let rule = scheduler.store().create_rule(rule)?;
    info!(rule_id = rule.id, chore_id = rule.chore_id, "recurrence rule created");
    let outcome = scheduler.materialize_rule(rule.id, today)?;
    Ok((rule, outcome))
}

/// Periodic background trigger. Runs the scheduler once per interval
/// (daily by default) against the local date.
pub struct DailyTrigger<S> {
    scheduler: Scheduler<S>,
    interval: Duration,
}

impl<S: Store + Send + Sync + 'static> DailyTrigger<S> {
    pub fn new(scheduler: Scheduler<S>, interval: Duration) -> Self {
        Self { scheduler, interval }
    }

    /// Spawns the trigger loop. The first run happens immediately.
    ///
    /// Each pass runs on the blocking pool since store access is synchronous.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        let trigger = Arc::new(self);
        tokio::spawn(async move {
            info!(
                "daily trigger started (every {}s, {}-day window)",
                trigger.interval.as_secs(),
                trigger.scheduler.window_days()
            );
            let mut interval = tokio::time::interval(trigger.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let pass = Arc::clone(&trigger);
                if let Err(e) = tokio::task::spawn_blocking(move || pass.tick()).await {
                    error!("scheduled run did not complete: {e}");
                }
            }
        })
    }

    /// One scheduler pass for today. A run-level failure is logged and the
    /// next tick tries again.
    pub fn tick(&self) -> Option<RunReport> {
        match self.scheduler.run(local_today()) {
            Ok(report) => Some(report),
            Err(e) => {
                error!("scheduled run failed: {e}");
                None
            }
        }
    }
}
