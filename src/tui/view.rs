// File: ./src/tui/view.rs
// Renders the TUI: auth forms, the dashboard and course boards, and the
// input popups layered on top of them.

use crate::model::{AssigneeChoice, Priority, Task};
use crate::tui::state::{AppState, InputMode, Screen};
use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

pub fn draw(f: &mut Frame, state: &mut AppState) {
    match state.screen {
        Screen::Login | Screen::Register | Screen::ForgotPassword => draw_auth(f, state),
        Screen::Dashboard | Screen::Course => draw_board(f, state),
    }
}

fn draw_auth(f: &mut Frame, state: &AppState) {
    let (title, percent_y, fields): (&str, u16, &[(&str, bool)]) = match state.screen {
        Screen::Register => (
            " StudySync: create account ",
            70,
            &[
                (" Email ", false),
                (" Password ", true),
                (" Display name (optional) ", false),
            ],
        ),
        Screen::ForgotPassword => (" StudySync: reset password ", 40, &[(" Email ", false)]),
        _ => (
            " StudySync: log in ",
            60,
            &[(" Email ", false), (" Password ", true)],
        ),
    };

    let area = centered_rect(50, percent_y, f.area());
    f.render_widget(Clear, area);
    let frame_block = Block::default().borders(Borders::ALL).title(title);
    let inner = frame_block.inner(area);
    f.render_widget(frame_block, area);

    let mut constraints: Vec<Constraint> = fields.iter().map(|_| Constraint::Length(3)).collect();
    constraints.push(Constraint::Length(2));
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(1));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (idx, (label, masked)) in fields.iter().enumerate() {
        let value = state.form.fields.get(idx).map(String::as_str).unwrap_or("");
        render_input_field(
            f,
            chunks[idx],
            label,
            value,
            *masked,
            state.form.focus == idx,
            state.form.cursor_position,
        );
    }

    let message = Paragraph::new(state.message.clone())
        .style(Style::default().fg(Color::Cyan))
        .wrap(Wrap { trim: true });
    f.render_widget(message, chunks[fields.len()]);

    let hints = match state.screen {
        Screen::Register => "Enter:Create account  Esc:Back",
        Screen::ForgotPassword => "Enter:Send reset link  Esc:Back",
        _ => "Enter:Log in  ^R:Register  ^F:Forgot password  Esc:Quit",
    };
    let hints = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    f.render_widget(hints, chunks[fields.len() + 2]);
}

fn draw_board(f: &mut Frame, state: &mut AppState) {
    let full_help_text = help_lines();
    let footer_height = if state.show_full_help {
        Constraint::Length(full_help_text.len() as u16 + 2)
    } else {
        Constraint::Length(3)
    };

    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), footer_height])
        .split(f.area());

    // A course page without its course renders a placeholder instead of
    // the task list: "Loading" until the first snapshot, "not found" after.
    let placeholder = if state.screen == Screen::Course {
        if !state.course_loaded {
            Some("Loading course...")
        } else if state.store.course.is_none() {
            Some("Course not found.")
        } else {
            None
        }
    } else {
        None
    };

    if let Some(text) = placeholder {
        let body = Paragraph::new(format!("\n{}", text))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" StudySync "));
        f.render_widget(body, v_chunks[0]);
    } else {
        draw_task_list(f, state, v_chunks[0]);
    }

    draw_footer(f, state, v_chunks[1], &full_help_text);

    match state.mode {
        InputMode::TaskForm => draw_task_form(f, state),
        InputMode::EditingDue => draw_due_editor(f, state),
        InputMode::ConfirmDelete => draw_confirm_delete(f, state),
        InputMode::Normal => {}
    }
}

fn draw_task_list(f: &mut Frame, state: &mut AppState, area: Rect) {
    // Details height follows the selected description so short notes do
    // not eat half the screen.
    let details_source = details_markdown(state);
    let details_width = area.width.saturating_sub(2).max(1) as usize;
    let required_lines: usize = details_source
        .lines()
        .map(|line| {
            let line_len = line.chars().count();
            if line_len == 0 {
                1
            } else {
                line_len.div_ceil(details_width)
            }
        })
        .sum::<usize>()
        .max(1);
    let max_details_height = (area.height / 2).max(3);
    let details_height = (required_lines as u16 + 2).clamp(3, max_details_height);

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(details_height)])
        .split(area);

    let list_title = match state.screen {
        Screen::Course => {
            let course_title = state
                .store
                .course
                .as_ref()
                .map(|c| c.title.clone())
                .unwrap_or_default();
            format!(" {}: tasks ({}) ", course_title, state.visible.len())
        }
        _ => format!(" All my tasks ({}) ", state.visible.len()),
    };
    let filter_bar = match state.screen {
        Screen::Course => format!(
            " Status: {} | Priority: {} | Assignee: {} | Sort: {} ",
            state.settings.status,
            state.settings.priority,
            state.settings.assignee,
            state.settings.sort
        ),
        _ => format!(
            " Status: {} | Priority: {} | Sort: {} ",
            state.settings.status, state.settings.priority, state.settings.sort
        ),
    };
    let list_block = Block::default()
        .borders(Borders::ALL)
        .title(list_title)
        .title_bottom(filter_bar);

    if state.visible.is_empty() {
        let empty = Paragraph::new("\nNo tasks found with the current filters.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(list_block);
        f.render_widget(empty, main_chunks[0]);
    } else {
        let items: Vec<ListItem> = state.visible.iter().map(|t| task_row(state, t)).collect();
        let task_list = List::new(items).block(list_block).highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::Green)
                .fg(Color::Black),
        );
        f.render_stateful_widget(task_list, main_chunks[0], &mut state.list_state);
    }

    let details_text = tui_markdown::from_str(&details_source);
    let details = Paragraph::new(details_text)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Details "));
    f.render_widget(details, main_chunks[1]);
}

fn task_row(state: &AppState, task: &Task) -> ListItem<'static> {
    let done = task.status.is_done();
    let base_style = if done {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default()
    };

    let mut spans = vec![Span::raw(if done { "[x] " } else { "[ ] " })];
    if state.screen == Screen::Dashboard {
        spans.push(Span::styled(
            format!("{}: ", state.store.course_title(&task.course_id)),
            Style::default().fg(Color::Cyan),
        ));
    }
    spans.push(Span::styled(task.title.clone(), base_style));
    spans.push(Span::styled(
        format!(" [{}]", task.priority),
        if done {
            base_style
        } else {
            priority_style(task.priority)
        },
    ));
    if let Some(due) = &task.due {
        let due_style = if !done && *due < Utc::now() {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Blue)
        };
        spans.push(Span::styled(
            format!(" @{}", due.date_naive().format("%Y-%m-%d")),
            due_style,
        ));
    }
    if state.screen == Screen::Course {
        spans.push(Span::styled(
            format!(
                " · {}",
                state.store.assignee_label(task.assigned_to.as_deref())
            ),
            Style::default().fg(Color::DarkGray),
        ));
    }
    ListItem::new(Line::from(spans))
}

fn details_markdown(state: &AppState) -> String {
    let Some(task) = state.get_selected_task() else {
        return "No details.".to_string();
    };
    let mut md = String::new();
    if !task.description.trim().is_empty() {
        md.push_str(task.description.trim());
        md.push_str("\n\n");
    }
    md.push_str(&format!(
        "**Assigned to:** {}  \n**Created:** {}",
        state.store.assignee_label(task.assigned_to.as_deref()),
        task.created_at.date_naive().format("%Y-%m-%d"),
    ));
    md
}

fn draw_footer(f: &mut Frame, state: &AppState, area: Rect, full_help_text: &[Line]) {
    if state.show_full_help {
        let help = Paragraph::new(full_help_text.to_vec())
            .block(Block::default().borders(Borders::ALL).title(" Help "));
        f.render_widget(help, area);
        return;
    }

    let footer_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let status = Paragraph::new(state.message.clone())
        .style(Style::default().fg(Color::Cyan))
        .block(
            Block::default()
                .borders(Borders::LEFT | Borders::TOP | Borders::BOTTOM)
                .title(" Status "),
        );
    f.render_widget(status, footer_chunks[0]);

    let actions_text = match (state.screen, state.mode) {
        (_, InputMode::TaskForm) => "Tab:Next field ^P:Priority ^A:Assignee ↵:Save Esc:Cancel",
        (_, InputMode::EditingDue) => "↵:Save Esc:Cancel",
        (_, InputMode::ConfirmDelete) => "y:Delete N:Keep",
        (Screen::Dashboard, _) => {
            "?:Help ↵:Open Spc:Done P:Priority D:Due s/p/o:Filters L:Log out q:Quit"
        }
        _ => "?:Help Esc:Back n:New e:Edit d:Delete Spc:Done s/p/a/o:Filters q:Quit",
    };
    let actions = Paragraph::new(actions_text)
        .alignment(Alignment::Right)
        .block(
            Block::default()
                .borders(Borders::RIGHT | Borders::TOP | Borders::BOTTOM)
                .title(" Actions "),
        );
    f.render_widget(actions, footer_chunks[1]);
}

fn help_lines() -> Vec<Line<'static>> {
    vec![
        Line::from(vec![
            Span::styled(
                " GLOBAL ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" ?:Toggle help  q:Quit  L:Log out"),
        ]),
        Line::from(vec![
            Span::styled(
                " NAVIGATION ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" j/k:Up/Down  Enter:Open course or edit task  Esc:Back to dashboard"),
        ]),
        Line::from(vec![
            Span::styled(
                " DASHBOARD ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" Space:Toggle done  P:Cycle priority  D:Edit due date"),
        ]),
        Line::from(vec![
            Span::styled(
                " COURSE ",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" n:New task  e:Edit task  d:Delete task  Space:Toggle done"),
        ]),
        Line::from(vec![
            Span::styled(
                " FILTERS ",
                Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" s:Status  p:Priority  a:Assignee (course only)  o:Sort order"),
        ]),
        Line::from(vec![
            Span::styled(
                " FORMS ",
                Style::default()
                    .fg(Color::LightCyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" Tab:Next field  Ctrl-P:Priority  Ctrl-A:Assignee  Enter:Save  Esc:Cancel"),
        ]),
    ]
}

fn draw_task_form(f: &mut Frame, state: &AppState) {
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);
    let title = if state.editing_task.is_some() {
        " Edit task "
    } else {
        " New task "
    };
    let frame_block = Block::default().borders(Borders::ALL).title(title);
    let inner = frame_block.inner(area);
    f.render_widget(frame_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let labels = [" Title ", " Description ", " Due date (YYYY-MM-DD) "];
    for (idx, label) in labels.iter().enumerate() {
        let value = state.form.fields.get(idx).map(String::as_str).unwrap_or("");
        render_input_field(
            f,
            chunks[idx],
            label,
            value,
            false,
            state.form.focus == idx,
            state.form.cursor_position,
        );
    }

    let priority_line = Paragraph::new(Line::from(vec![
        Span::raw(" Priority: "),
        Span::styled(
            state.form_priority.to_string(),
            priority_style(state.form_priority),
        ),
        Span::styled("  (Ctrl-P to cycle)", Style::default().fg(Color::DarkGray)),
    ]));
    f.render_widget(priority_line, chunks[3]);

    let assignee = match &state.form_assignee {
        AssigneeChoice::Unassigned => "Unassigned".to_string(),
        AssigneeChoice::Member(uid) => state.store.assignee_label(Some(uid)),
    };
    let assignee_line = Paragraph::new(Line::from(vec![
        Span::raw(" Assignee: "),
        Span::styled(assignee, Style::default().fg(Color::Cyan)),
        Span::styled("  (Ctrl-A to cycle)", Style::default().fg(Color::DarkGray)),
    ]));
    f.render_widget(assignee_line, chunks[4]);
}

fn draw_due_editor(f: &mut Frame, state: &AppState) {
    let area = centered_rect(44, 22, f.area());
    f.render_widget(Clear, area);
    let frame_block = Block::default()
        .borders(Borders::ALL)
        .title(" Change due date ");
    let inner = frame_block.inner(area);
    f.render_widget(frame_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(inner);
    render_input_field(
        f,
        chunks[0],
        " YYYY-MM-DD (empty clears) ",
        state.form.value(),
        false,
        true,
        state.form.cursor_position,
    );
}

fn draw_confirm_delete(f: &mut Frame, state: &AppState) {
    let Some(task) = &state.pending_delete else {
        return;
    };
    let area = centered_rect(44, 22, f.area());
    f.render_widget(Clear, area);
    let lines = vec![
        Line::from(Span::styled(
            task.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Delete this task? (y/N)"),
    ];
    let confirm = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Confirm ")
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(confirm, area);
}

/// One bordered single-line input. The focused field owns the terminal
/// cursor; its x offset is the display width of the text left of the
/// caret, not the char count, so wide glyphs stay under the cursor.
fn render_input_field(
    f: &mut Frame,
    area: Rect,
    label: &str,
    value: &str,
    masked: bool,
    focused: bool,
    cursor: usize,
) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let shown: String = if masked {
        "•".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let input = Paragraph::new(shown).block(
        Block::default()
            .borders(Borders::ALL)
            .title(label.to_string())
            .border_style(border_style),
    );
    f.render_widget(input, area);

    if focused {
        let cursor_cols: u16 = if masked {
            cursor as u16
        } else {
            value
                .chars()
                .take(cursor)
                .map(|c| c.width().unwrap_or(0) as u16)
                .sum()
        };
        let cursor_x = area.x + 1 + cursor_cols;
        f.set_cursor_position((
            cursor_x.min(area.x + area.width.saturating_sub(2)),
            area.y + 1,
        ));
    }
}

fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::DarkGray),
    }
}

/// Helper function to create a centered rect using up certain percentage of the available rect `r`
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
