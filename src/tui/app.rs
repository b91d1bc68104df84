use ratatui::widgets::TableState;

use crate::commands::{cmd_rule_add, cmd_rule_deactivate, cmd_run, describe_outcome, RuleArgs};
use crate::models::{Assignment, ChoreInstance, RecurrenceRule};
use crate::scheduler::local_today;
use crate::storage::{Database, JsonStore};

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    Adding,
}

pub enum ViewMode {
    Assignments,
    Rules,
}

/// An assignment joined with its instance snapshot for display.
pub struct AssignmentRow {
    pub assignment: Assignment,
    pub instance: Option<ChoreInstance>,
}

/// A rule joined with its template title for display.
pub struct RuleRow {
    pub rule: RecurrenceRule,
    pub chore_title: Option<String>,
}

pub struct App {
    pub store: JsonStore,
    pub window_days: u32,
    pub assignments: Vec<AssignmentRow>,
    pub rules: Vec<RuleRow>,
    pub state: TableState,
    pub rule_state: TableState,
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub add_state: AddState,
    /// Show assignments due before today as well.
    pub show_past: bool,
    /// Last status or error line shown under the table.
    pub status: String,
}

/// State for the multi-step "Add Rule" wizard.
#[derive(Default)]
pub struct AddState {
    pub chore_id: Option<u64>,
    pub assignee_id: Option<u64>,
    pub every: String,
    pub days: Vec<String>,
    pub day_of_month: Option<u32>,
    pub step: usize, // 0: Chore, 1: Assignee, 2: Recurrence, 3: Assigner
}

impl App {
    /// Creates a new App instance and loads initial data.
    pub fn new(store: JsonStore, window_days: u32) -> App {
        let mut app = App {
            store,
            window_days,
            assignments: Vec::new(),
            rules: Vec::new(),
            state: TableState::default(),
            rule_state: TableState::default(),
            view_mode: ViewMode::Assignments,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            add_state: AddState::default(),
            show_past: false,
            status: String::new(),
        };
        app.reload();
        app
    }

    fn current_len(&self) -> usize {
        match self.view_mode {
            ViewMode::Assignments => self.assignments.len(),
            ViewMode::Rules => self.rules.len(),
        }
    }

    fn current_state(&mut self) -> &mut TableState {
        match self.view_mode {
            ViewMode::Assignments => &mut self.state,
            ViewMode::Rules => &mut self.rule_state,
        }
    }

    /// Selects the next item in the current list.
    pub fn next(&mut self) {
        let len = self.current_len();
        if len == 0 { return; }
        let state = self.current_state();
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    /// Selects the previous item in the current list.
    pub fn previous(&mut self) {
        let len = self.current_len();
        if len == 0 { return; }
        let state = self.current_state();
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    /// Reloads assignments and rules from storage.
    pub fn reload(&mut self) {
        let db = match self.store.load() {
            Ok(db) => db,
            Err(e) => {
                self.status = format!("Failed to load database: {}", e);
                Database::default()
            }
        };

        let from = if self.show_past { None } else { Some(local_today()) };
        self.assignments = db.assignments_between(None, from, None)
            .into_iter()
            .map(|a| AssignmentRow {
                instance: db.instance(a.instance_id).cloned(),
                assignment: a,
            })
            .collect();
        self.rules = db.rules.iter()
            .map(|r| RuleRow {
                chore_title: db.chore(r.chore_id).map(|c| c.title.clone()),
                rule: r.clone(),
            })
            .collect();

        clamp_selection(&mut self.state, self.assignments.len());
        clamp_selection(&mut self.rule_state, self.rules.len());
    }

    /// Runs the scheduler now and reloads.
    pub fn generate(&mut self) {
        self.status = match cmd_run(&self.store, self.window_days, false, true) {
            Ok(report) => format!(
                "Generated {} assignments ({} already present, {} failed).",
                report.created, report.existing, report.failed
            ),
            Err(e) => format!("Scheduler run failed: {}", e),
        };
        self.reload();
    }

    /// Deactivates the selected rule.
    pub fn deactivate_selected(&mut self) {
        if let ViewMode::Assignments = self.view_mode { return; }
        if let Some(row) = self.rule_state.selected().and_then(|i| self.rules.get(i)) {
            let id = row.rule.id;
            self.status = match cmd_rule_deactivate(&self.store, id, true) {
                Ok(()) => format!("Rule {} deactivated.", id),
                Err(e) => format!("Failed to deactivate rule {}: {}", id, e),
            };
            self.reload();
        }
    }

    /// Toggles the visibility of past assignments.
    pub fn toggle_past(&mut self) {
        self.show_past = !self.show_past;
        self.reload();
    }

    /// Toggles between Assignment and Rule views.
    pub fn toggle_view(&mut self) {
        self.view_mode = match self.view_mode {
            ViewMode::Assignments => ViewMode::Rules,
            ViewMode::Rules => ViewMode::Assignments,
        };
    }

    /// Initiates the "Add Rule" wizard.
    pub fn start_add(&mut self) {
        self.view_mode = ViewMode::Rules;
        self.input_mode = InputMode::Adding;
        self.add_state = AddState::default();
        self.input_buffer.clear();
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
    }

    /// Handles input for the "Add Rule" wizard.
    pub fn handle_input(&mut self) {
        let input = self.input_buffer.trim().to_string();
        match self.add_state.step {
            0 => { // Chore
                if let Ok(id) = input.parse::<u64>() {
                    self.add_state.chore_id = Some(id);
                    self.add_state.step += 1;
                }
            }
            1 => { // Assignee
                if let Ok(id) = input.parse::<u64>() {
                    self.add_state.assignee_id = Some(id);
                    self.add_state.step += 1;
                }
            }
            2 => { // Recurrence, e.g. "weekly mon,thu" or "monthly 31"
                let mut parts = input.split_whitespace();
                if let Some(every) = parts.next() {
                    self.add_state.every = every.to_string();
                    let rest: Vec<String> = parts.map(str::to_string).collect();
                    if every.eq_ignore_ascii_case("monthly") {
                        self.add_state.day_of_month = rest.first().and_then(|d| d.parse().ok());
                    } else {
                        self.add_state.days = rest;
                    }
                    self.add_state.step += 1;
                }
            }
            3 => { // Assigner (defaults to the assignee)
                self.finish_add(input.parse::<u64>().ok());
                return;
            }
            _ => {}
        }
        self.input_buffer.clear();
    }

    fn finish_add(&mut self, assigner: Option<u64>) {
        let (Some(chore_id), Some(assignee_id)) = (self.add_state.chore_id, self.add_state.assignee_id) else {
            self.cancel_input();
            return;
        };
        let tenant_id = self.store.load().ok()
            .and_then(|db| db.chore(chore_id).map(|c| c.tenant_id))
            .unwrap_or_default();
        let args = RuleArgs {
            tenant_id,
            chore_id,
            assignee_id,
            assigner_id: assigner.unwrap_or(assignee_id),
            every: self.add_state.every.clone(),
            days: self.add_state.days.clone(),
            day_of_month: self.add_state.day_of_month,
            ..RuleArgs::default()
        };
        self.status = match cmd_rule_add(&self.store, self.window_days, args, true) {
            Ok((rule, outcome)) => format!("Rule {} added: {}", rule.id, describe_outcome(&outcome)),
            Err(e) => format!("Failed to add rule: {}", e),
        };
        self.cancel_input();
        self.reload();
    }
}

fn clamp_selection(state: &mut TableState, len: usize) {
    if len == 0 {
        state.select(None);
    } else if let Some(i) = state.selected() {
        if i >= len {
            state.select(Some(len - 1));
        }
    } else {
        state.select(Some(0));
    }
}
