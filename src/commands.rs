use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::models::{
    Assignment, AssignmentStatus, Chore, Difficulty, MemberId, NewChore, NewRecurrenceRule, Priority,
    RecurrencePattern, RecurrenceRule, TenantId,
};
use crate::recurrence::parse_frequency;
use crate::scheduler::{local_today, RuleOutcome, RunReport, Scheduler};
use crate::storage::{JsonStore, MemoryStore, Store};
use crate::trigger::{create_rule_and_materialize, initial_watermark};

/// Options for `rule add`, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct RuleArgs {
    pub tenant_id: TenantId,
    pub chore_id: u64,
    pub assignee_id: MemberId,
    pub assigner_id: MemberId,
    /// `daily`, `weekly` or `monthly`.
    pub every: String,
    /// Weekdays for weekly rules, names or 0..6, comma separated allowed.
    pub days: Vec<String>,
    pub day_of_month: Option<u32>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub priority: Priority,
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD.", s))
}

fn parse_opt_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(parse_date).transpose()
}

/// Adds a new chore template.
pub fn cmd_chore_add(store: &JsonStore, chore: NewChore, silent: bool) -> Result<Chore> {
    let chore = store.update(|db| Ok(db.add_chore(chore)))?;
    if !silent { println!("Chore added (id = {})", chore.id); }
    Ok(chore)
}

/// Lists chore templates, optionally for one family.
pub fn cmd_chore_list(store: &JsonStore, tenant: Option<TenantId>) -> Result<()> {
    let mut chores = store.load()?.chores;
    if let Some(t) = tenant {
        chores.retain(|c| c.tenant_id == t);
    }
    if chores.is_empty() {
        println!("No chores found.");
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["ID", "Family", "Title", "Points", "Difficulty", "Minutes", "Status"]));
    for c in chores {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(c.tenant_id),
            Cell::new(&c.title),
            Cell::new(c.points),
            Cell::new(c.difficulty),
            Cell::new(c.duration_minutes.map(|m| m.to_string()).unwrap_or_else(|| "-".into())),
            active_cell(c.active),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Soft-deletes or restores a chore template.
pub fn cmd_chore_set_active(store: &JsonStore, id: u64, active: bool, silent: bool) -> Result<()> {
    store.update(|db| db.set_chore_active(id, active))?;
    if !silent {
        println!("Chore {} {}.", id, if active { "activated" } else { "deactivated" });
    }
    Ok(())
}

/// Creates a recurrence rule and materializes its first window right away.
pub fn cmd_rule_add(store: &JsonStore, window_days: u32, args: RuleArgs, silent: bool) -> Result<(RecurrenceRule, RuleOutcome)> {
    let frequency = parse_frequency(&args.every, &args.days, args.day_of_month)?;
    let mut pattern = RecurrencePattern::new(frequency);
    pattern.start_date = parse_opt_date(args.start.as_deref())?;
    pattern.end_date = parse_opt_date(args.end.as_deref())?;

    let today = local_today();
    let new_rule = NewRecurrenceRule {
        tenant_id: args.tenant_id,
        chore_id: args.chore_id,
        assignee_id: args.assignee_id,
        assigner_id: args.assigner_id,
        last_generated_date: initial_watermark(&pattern, today),
        pattern,
        priority: args.priority,
    };

    let scheduler = Scheduler::new(store).with_window_days(window_days);
    let (rule, outcome) = create_rule_and_materialize(&scheduler, new_rule, today)?;
    if !silent {
        println!("Rule added (id = {}): {}", rule.id, rule.pattern);
        println!("{}", describe_outcome(&outcome));
    }
    Ok((rule, outcome))
}

/// Lists recurrence rules.
pub fn cmd_rule_list(store: &JsonStore, tenant: Option<TenantId>) -> Result<()> {
    let db = store.load()?;
    let rules: Vec<&RecurrenceRule> = db.rules.iter()
        .filter(|r| tenant.map_or(true, |t| r.tenant_id == t))
        .collect();
    if rules.is_empty() {
        println!("No rules found.");
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["ID", "Family", "Chore", "Assignee", "Pattern", "Priority", "Generated Through", "Status"]));
    for r in rules {
        let chore = db.chore(r.chore_id).map(|c| c.title.clone()).unwrap_or_else(|| format!("#{} (missing)", r.chore_id));
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.tenant_id),
            Cell::new(chore),
            Cell::new(r.assignee_id),
            Cell::new(&r.pattern),
            Cell::new(r.priority),
            Cell::new(r.last_generated_date),
            active_cell(r.active),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Deactivates a recurrence rule. Already generated assignments are kept.
pub fn cmd_rule_deactivate(store: &JsonStore, id: u64, silent: bool) -> Result<()> {
    store.deactivate_rule(id)?;
    if !silent { println!("Rule {} deactivated.", id); }
    Ok(())
}

/// Lists assignments sorted by due date.
pub fn cmd_assignments(store: &JsonStore, tenant: Option<TenantId>, from: Option<String>, to: Option<String>) -> Result<()> {
    let from = parse_opt_date(from.as_deref())?;
    let to = parse_opt_date(to.as_deref())?;
    let db = store.load()?;
    let assignments = db.assignments_between(tenant, from, to);
    if assignments.is_empty() {
        println!("No assignments found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["ID", "Family", "Chore", "Assignee", "Due", "Time Left", "Points", "Priority", "Status"]));

    let today = local_today();
    for a in assignments {
        let (title, points) = db.instance(a.instance_id)
            .map(|i| (i.title.clone(), i.points))
            .unwrap_or_else(|| (format!("instance #{}", a.instance_id), 0));
        let days_left = (a.due_date - today).num_days();
        let overdue = days_left < 0 && a.status == AssignmentStatus::Pending;
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(a.tenant_id),
            Cell::new(title),
            Cell::new(a.assignee_id),
            Cell::new(a.due_date),
            Cell::new(time_left(days_left)).fg(if overdue { Color::Red } else { Color::Reset }),
            Cell::new(points),
            Cell::new(a.priority).fg(priority_color(a.priority)),
            Cell::new(a.status).fg(status_color(&a)),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Runs one scheduler pass for today.
///
/// With `dry_run` the pass runs against an in-memory copy of the database, so
/// nothing is written and the report shows what would be created.
pub fn cmd_run(store: &JsonStore, window_days: u32, dry_run: bool, silent: bool) -> Result<RunReport> {
    let today = local_today();
    let report = if dry_run {
        let scratch = MemoryStore::from_database(store.load()?);
        Scheduler::new(scratch).with_window_days(window_days).run(today)?
    } else {
        Scheduler::new(store).with_window_days(window_days).run(today)?
    };
    if !silent {
        let verb = if dry_run { "would create" } else { "created" };
        println!(
            "Window {} .. {}: {} rules, {} {} assignments, {} already present, {} failed, {} rules deactivated.",
            today,
            report.window_end.unwrap_or(today),
            report.rules,
            verb,
            report.created,
            report.existing,
            report.failed,
            report.deactivated,
        );
    }
    Ok(report)
}

/// Resets the database by deleting the database file.
pub fn cmd_reset(store: &JsonStore, force: bool) -> Result<()> {
    if !force {
        print!("Are you sure you want to delete all chores, rules and assignments? This cannot be undone. [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }
    store.delete()?;
    println!("Database reset successfully.");
    Ok(())
}

/// Builds the chore input for `chore add`.
pub fn new_chore(tenant_id: TenantId, title: String, description: Option<String>, points: u32, difficulty: Difficulty, minutes: Option<u32>) -> Result<NewChore> {
    if title.trim().is_empty() {
        bail!("Chore title must not be empty.");
    }
    Ok(NewChore { tenant_id, title, description, points, difficulty, duration_minutes: minutes })
}

/// One-line summary of what a rule evaluation did.
pub fn describe_outcome(outcome: &RuleOutcome) -> String {
    match outcome {
        RuleOutcome::Generated(stats) => {
            let mut s = format!("{} assignments created", stats.created.len());
            if !stats.existing.is_empty() {
                s.push_str(&format!(", {} already present", stats.existing.len()));
            }
            if !stats.failed.is_empty() {
                s.push_str(&format!(", {} failed (will retry)", stats.failed.len()));
            }
            if let Some(w) = stats.watermark {
                s.push_str(&format!(", generated through {}", w));
            }
            s
        }
        RuleOutcome::Skipped { reason } => format!("Nothing generated ({:?}).", reason),
        RuleOutcome::Deactivated => "Rule has ended and was deactivated.".to_string(),
        RuleOutcome::Failed { error } => format!("Generation failed: {}", error),
    }
}

pub fn time_left(days_left: i64) -> String {
    if days_left < 0 {
        format!("{}d overdue", days_left.abs())
    } else if days_left == 0 {
        "Today".to_string()
    } else {
        format!("{}d", days_left)
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::new(n).add_attribute(Attribute::Bold)).collect()
}

fn active_cell(active: bool) -> Cell {
    if active {
        Cell::new("Active").fg(Color::Green)
    } else {
        Cell::new("Inactive").fg(Color::Grey)
    }
}

fn priority_color(p: Priority) -> Color {
    match p {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn status_color(a: &Assignment) -> Color {
    match a.status {
        AssignmentStatus::Pending => Color::Yellow,
        AssignmentStatus::Submitted => Color::Cyan,
        AssignmentStatus::Approved => Color::Green,
        AssignmentStatus::Rejected => Color::Red,
    }
}
