use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};
use crate::commands::time_left;
use crate::models::{AssignmentStatus, Priority};
use crate::scheduler::local_today;
use super::app::{App, InputMode, ViewMode};

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Status
            Constraint::Length(3)  // Help
        ].as_ref())
        .split(f.area());

    match app.view_mode {
        ViewMode::Assignments => {
            let today = local_today();

            let rows: Vec<Row> = app
                .assignments
                .iter()
                .map(|row| {
                    let a = &row.assignment;
                    let days_left = (a.due_date - today).num_days();
                    let style = if days_left < 0 && a.status == AssignmentStatus::Pending {
                        Style::default().fg(Color::Red)
                    } else {
                        match a.priority {
                            Priority::High => Style::default().fg(Color::Yellow),
                            _ => Style::default().fg(Color::Green),
                        }
                    };
                    let (title, points) = row.instance.as_ref()
                        .map(|i| (i.title.clone(), i.points.to_string()))
                        .unwrap_or_default();

                    Row::new(vec![
                        Cell::from(a.id.to_string()),
                        Cell::from(title),
                        Cell::from(a.assignee_id.to_string()),
                        Cell::from(a.due_date.to_string()),
                        Cell::from(time_left(days_left)),
                        Cell::from(points),
                        Cell::from(a.priority.to_string()),
                        Cell::from(a.status.to_string()),
                    ]).style(style)
                })
                .collect();

            let widths = [
                Constraint::Length(5),
                Constraint::Min(20),
                Constraint::Length(9),
                Constraint::Length(12),
                Constraint::Length(12),
                Constraint::Length(7),
                Constraint::Length(9),
                Constraint::Length(10),
            ];

            let title = format!("Chorust - Assignments (next {} days)", app.window_days);
            let table = Table::new(rows, widths)
                .header(Row::new(vec!["ID", "Chore", "Assignee", "Due", "Time Left", "Points", "Priority", "Status"])
                    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                    .bottom_margin(1))
                .block(Block::default().borders(Borders::ALL).title(title))
                .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
                .highlight_symbol(">> ");

            f.render_stateful_widget(table, chunks[0], &mut app.state);
        }
        ViewMode::Rules => {
            let rows: Vec<Row> = app
                .rules
                .iter()
                .map(|row| {
                    let r = &row.rule;
                    let style = if r.active {
                        Style::default()
                    } else {
                        Style::default().fg(Color::DarkGray)
                    };
                    Row::new(vec![
                        Cell::from(r.id.to_string()),
                        Cell::from(row.chore_title.clone().unwrap_or_else(|| format!("#{} (missing)", r.chore_id))),
                        Cell::from(r.assignee_id.to_string()),
                        Cell::from(r.pattern.to_string()),
                        Cell::from(r.last_generated_date.to_string()),
                        Cell::from(if r.active { "Active" } else { "Inactive" }),
                    ]).style(style)
                })
                .collect();

            let widths = [
                Constraint::Length(5),
                Constraint::Min(20),
                Constraint::Length(9),
                Constraint::Length(30),
                Constraint::Length(12),
                Constraint::Length(9),
            ];

            let table = Table::new(rows, widths)
                .header(Row::new(vec!["ID", "Chore", "Assignee", "Pattern", "Through", "Status"])
                    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                    .bottom_margin(1))
                .block(Block::default().borders(Borders::ALL).title("Chorust - Recurrence Rules"))
                .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
                .highlight_symbol(">> ");

            f.render_stateful_widget(table, chunks[0], &mut app.rule_state);
        }
    }

    let status = Paragraph::new(app.status.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(status, chunks[1]);

    let help_text = match app.input_mode {
        InputMode::Normal => match app.view_mode {
            ViewMode::Assignments => "q: Quit | g: Generate now | p: Toggle Past | r: Reload | a: Add Rule | v: View Rules",
            ViewMode::Rules => "q: Quit | a: Add Rule | d: Deactivate | g: Generate now | v: View Assignments",
        },
        InputMode::Adding => "Enter: Next Step | Esc: Cancel",
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[2]);

    if app.input_mode == InputMode::Adding {
        let area = centered_rect(60, 3, f.area()); // Fixed height of 3 (border + 1 line)
        f.render_widget(Clear, area);

        let title = match app.add_state.step {
            0 => "Add Rule: Enter Chore ID",
            1 => "Add Rule: Enter Assignee ID",
            2 => "Add Rule: Recurrence (daily | weekly mon,thu | monthly 31)",
            3 => "Add Rule: Enter Assigner ID (Optional)",
            _ => "Add Rule",
        };

        let input = Paragraph::new(app.input_buffer.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(title));

        f.render_widget(input, area);
    }
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let margin = r.height.saturating_sub(height) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(margin),
            Constraint::Length(height),
            Constraint::Length(margin),
        ].as_ref())
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ].as_ref())
        .split(popup_layout[1])[1]
}
