// File: src/tui/handlers.rs
// Handles keyboard input and app events for the TUI.
use crate::model::{AssigneeChoice, parse_due_input};
use crate::projection::next_option;
use crate::tui::action::{Action, AppEvent};
use crate::tui::state::{
    AppState, FIELD_DISPLAY_NAME, FIELD_EMAIL, FIELD_PASSWORD, InputMode, Screen,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub fn handle_app_event(state: &mut AppState, event: AppEvent) {
    match event {
        AppEvent::Status(s) => state.message = s,
        AppEvent::Error(s) => {
            state.message = format!("Error: {}", s);
            state.loading = false;
        }
        AppEvent::SignedIn(identity) => {
            let email = identity.email.clone();
            state.store.identity = Some(identity);
            state.loading = false;
            state.goto(Screen::Dashboard);
            state.message = format!("Signed in as {}.", email);
        }
        AppEvent::AuthFailed(msg) => {
            state.message = msg;
            state.loading = false;
        }
        AppEvent::Registered => {
            state.goto(Screen::Login);
            state.message =
                "Registration successful! Please check your email and verify your account before logging in."
                    .to_string();
        }
        AppEvent::ResetRequested => {
            state.message =
                "If an account with that email exists, a reset link has been sent.".to_string();
        }
        AppEvent::SignedOut => {
            state.store.clear();
            state.loading = false;
            state.goto(Screen::Login);
        }
        AppEvent::CoursesChanged(courses) => {
            state.store.courses = courses;
            state.refresh_visible();
        }
        AppEvent::UsersChanged(users) => {
            // Labels only; the visible rows do not depend on the directory.
            state.store.users = users;
        }
        AppEvent::CourseChanged(course) => {
            state.course_loaded = true;
            let missing = course.is_none();
            state.store.course = course;
            if missing && state.screen == Screen::Course {
                state.message = "Course not found.".to_string();
            }
            state.refresh_visible();
        }
        AppEvent::CourseTasksChanged(tasks) => {
            state.store.course_tasks = tasks;
            state.refresh_visible();
        }
        AppEvent::AllTasksChanged(tasks) => {
            state.store.all_tasks = tasks;
            state.refresh_visible();
        }
    }
}

pub fn handle_key_event(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    // --- SANITY CHECK ---
    // Prevent out-of-bounds panics if cursor drift happened
    let char_count = state.form.value().chars().count();
    if state.form.cursor_position > char_count {
        state.form.cursor_position = char_count;
    }

    match state.screen {
        Screen::Login | Screen::Register | Screen::ForgotPassword => handle_auth_key(key, state),
        Screen::Dashboard | Screen::Course => handle_board_key(key, state),
    }
}

// --- AUTH SCREENS ---

fn handle_auth_key(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Tab | KeyCode::Down => state.form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => state.form.focus_previous(),
        KeyCode::Left => state.form.move_cursor_left(),
        KeyCode::Right => state.form.move_cursor_right(),
        KeyCode::Backspace => state.form.delete_char(),
        KeyCode::Enter => return submit_auth_form(state),
        KeyCode::Esc => {
            if state.screen == Screen::Login {
                return Some(Action::Quit);
            }
            state.goto(Screen::Login);
        }
        KeyCode::Char('r') if ctrl && state.screen == Screen::Login => {
            state.goto(Screen::Register);
        }
        KeyCode::Char('f') if ctrl && state.screen == Screen::Login => {
            state.goto(Screen::ForgotPassword);
        }
        KeyCode::Char(c) if !ctrl => state.form.enter_char(c),
        _ => {}
    }
    None
}

fn submit_auth_form(state: &mut AppState) -> Option<Action> {
    let field = |idx: usize| state.form.fields.get(idx).cloned().unwrap_or_default();
    match state.screen {
        Screen::Login => {
            let email = field(FIELD_EMAIL).trim().to_string();
            let password = field(FIELD_PASSWORD);
            if email.is_empty() || password.is_empty() {
                state.message = "Email and password are required.".to_string();
                return None;
            }
            state.loading = true;
            Some(Action::SignIn { email, password })
        }
        Screen::Register => {
            let email = field(FIELD_EMAIL).trim().to_string();
            let password = field(FIELD_PASSWORD);
            let display_name = field(FIELD_DISPLAY_NAME).trim().to_string();
            if email.is_empty() || password.is_empty() {
                state.message = "Email and password are required.".to_string();
                return None;
            }
            state.loading = true;
            Some(Action::SignUp {
                email,
                password,
                display_name,
            })
        }
        Screen::ForgotPassword => {
            let email = field(FIELD_EMAIL).trim().to_string();
            if email.is_empty() {
                state.message = "Email is required.".to_string();
                return None;
            }
            Some(Action::RequestReset { email })
        }
        _ => None,
    }
}

// --- DASHBOARD / COURSE ---

fn handle_board_key(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    if state.show_full_help {
        state.show_full_help = false;
        return None;
    }

    match state.mode {
        InputMode::Normal => handle_normal_key(key, state),
        InputMode::TaskForm => handle_task_form_key(key, state),
        InputMode::EditingDue => handle_due_key(key, state),
        InputMode::ConfirmDelete => handle_confirm_key(key, state),
    }
}

fn leave_course(state: &mut AppState) -> Option<Action> {
    state.store.leave_course();
    state.goto(Screen::Dashboard);
    Some(Action::LeaveCourse)
}

fn handle_normal_key(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    // Course gone while open: only navigation still applies.
    if state.screen == Screen::Course && state.course_loaded && state.store.course.is_none() {
        match key.code {
            KeyCode::Esc => return leave_course(state),
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Char('L') => return Some(Action::SignOut),
            KeyCode::Char('?') => state.show_full_help = true,
            _ => {}
        }
        return None;
    }

    match key.code {
        KeyCode::Char('q') => return Some(Action::Quit),
        KeyCode::Char('?') => state.show_full_help = true,
        KeyCode::Char('j') | KeyCode::Down => state.next(),
        KeyCode::Char('k') | KeyCode::Up => state.previous(),
        KeyCode::Char('s') => {
            state.settings.status = next_option(state.settings.status);
            state.refresh_visible();
        }
        KeyCode::Char('p') => {
            state.settings.priority = next_option(state.settings.priority);
            state.refresh_visible();
        }
        KeyCode::Char('a') if state.screen == Screen::Course => {
            state.settings.assignee = next_option(state.settings.assignee);
            state.refresh_visible();
        }
        KeyCode::Char('o') => {
            state.settings.sort = next_option(state.settings.sort);
            state.refresh_visible();
        }
        KeyCode::Char(' ') => {
            if let Some(task) = state.get_selected_task() {
                return Some(Action::ToggleTask(task.clone()));
            }
        }
        KeyCode::Char('P') if state.screen == Screen::Dashboard => {
            if let Some(task) = state.get_selected_task() {
                let task = task.clone();
                let next = next_option(task.priority);
                return Some(Action::ChangePriority(task, next));
            }
        }
        KeyCode::Char('D') if state.screen == Screen::Dashboard => {
            if let Some(task) = state.get_selected_task() {
                let task = task.clone();
                state.begin_due_edit(&task);
            }
        }
        KeyCode::Char('e') if state.screen == Screen::Course => {
            if let Some(task) = state.get_selected_task() {
                let task = task.clone();
                state.begin_task_form(Some(&task));
            }
        }
        KeyCode::Char('n') if state.screen == Screen::Course => {
            if state.store.course.is_some() {
                state.begin_task_form(None);
            }
        }
        KeyCode::Char('d') if state.screen == Screen::Course => {
            if let Some(task) = state.get_selected_task() {
                state.pending_delete = Some(task.clone());
                state.mode = InputMode::ConfirmDelete;
            }
        }
        KeyCode::Char('L') => return Some(Action::SignOut),
        KeyCode::Enter => match state.screen {
            Screen::Dashboard => {
                if let Some(task) = state.get_selected_task() {
                    let course_id = task.course_id.clone();
                    state.store.leave_course();
                    state.goto(Screen::Course);
                    return Some(Action::OpenCourse(course_id));
                }
            }
            _ => {
                if let Some(task) = state.get_selected_task() {
                    let task = task.clone();
                    state.begin_task_form(Some(&task));
                }
            }
        },
        KeyCode::Esc if state.screen == Screen::Course => return leave_course(state),
        _ => {}
    }
    None
}

fn cycle_assignee(state: &mut AppState) {
    let mut choices = vec![AssigneeChoice::Unassigned];
    choices.extend(
        state
            .store
            .member_options()
            .into_iter()
            .map(|(uid, _)| AssigneeChoice::Member(uid)),
    );
    let idx = choices
        .iter()
        .position(|c| *c == state.form_assignee)
        .unwrap_or(0);
    state.form_assignee = choices[(idx + 1) % choices.len()].clone();
}

fn handle_task_form_key(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => state.cancel_input(),
        KeyCode::Tab | KeyCode::Down => state.form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => state.form.focus_previous(),
        KeyCode::Left => state.form.move_cursor_left(),
        KeyCode::Right => state.form.move_cursor_right(),
        KeyCode::Backspace => state.form.delete_char(),
        KeyCode::Char('p') if ctrl => state.form_priority = next_option(state.form_priority),
        KeyCode::Char('a') if ctrl => cycle_assignee(state),
        KeyCode::Enter => return submit_task_form(state),
        KeyCode::Char(c) if !ctrl => state.form.enter_char(c),
        _ => {}
    }
    None
}

fn submit_task_form(state: &mut AppState) -> Option<Action> {
    let form = state.task_form();
    if form.title.trim().is_empty() {
        state.message = "Title is required.".to_string();
        return None;
    }
    // Reject a bad date here so the form stays open with its contents.
    if let Err(e) = parse_due_input(&form.due_input) {
        state.message = e;
        return None;
    }

    let action = match &state.editing_task {
        Some(task) => Action::SaveEdits {
            course_id: task.course_id.clone(),
            task_id: task.id.clone(),
            form,
        },
        None => {
            let course_id = state.store.course.as_ref()?.id.clone();
            Action::CreateTask { course_id, form }
        }
    };
    state.cancel_input();
    Some(action)
}

fn handle_due_key(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => state.cancel_input(),
        KeyCode::Left => state.form.move_cursor_left(),
        KeyCode::Right => state.form.move_cursor_right(),
        KeyCode::Backspace => state.form.delete_char(),
        KeyCode::Enter => {
            let input = state.form.value().to_string();
            if let Err(e) = parse_due_input(&input) {
                state.message = e;
                return None;
            }
            let task = state.editing_task.clone()?;
            state.cancel_input();
            return Some(Action::ChangeDue(task, input));
        }
        KeyCode::Char(c) if !ctrl => state.form.enter_char(c),
        _ => {}
    }
    None
}

fn handle_confirm_key(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            let pending = state.pending_delete.take();
            state.mode = InputMode::Normal;
            if let Some(task) = pending {
                return Some(Action::DeleteTask {
                    course_id: task.course_id,
                    task_id: task.id,
                });
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => state.cancel_input(),
        _ => {}
    }
    None
}
