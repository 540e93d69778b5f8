// File: ./src/tui/state.rs
// Manages the application state for the TUI.
use crate::model::{AssigneeChoice, Priority, Task, TaskForm};
use crate::projection::ViewSettings;
use crate::store::TaskStore;
use ratatui::widgets::ListState;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Screen {
    Login,
    Register,
    ForgotPassword,
    Dashboard,
    Course,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum InputMode {
    Normal,
    TaskForm,
    EditingDue,
    ConfirmDelete,
}

// Form field indices shared by the handlers and the view. The auth
// screens and the task form reuse the same FormState, so the meaning
// of an index depends on the current screen and mode.
pub const FIELD_EMAIL: usize = 0;
pub const FIELD_PASSWORD: usize = 1;
pub const FIELD_DISPLAY_NAME: usize = 2;

pub const FIELD_TITLE: usize = 0;
pub const FIELD_DESCRIPTION: usize = 1;
pub const FIELD_DUE: usize = 2;

/// A focused stack of text fields with a single cursor. Only the
/// focused field is editable; Tab moves the focus.
pub struct FormState {
    pub fields: Vec<String>,
    pub focus: usize,
    pub cursor_position: usize,
}

impl FormState {
    pub fn new(field_count: usize) -> Self {
        Self {
            fields: vec![String::new(); field_count],
            focus: 0,
            cursor_position: 0,
        }
    }

    pub fn with_values(values: Vec<String>) -> Self {
        let cursor = values.first().map(|v| v.chars().count()).unwrap_or(0);
        Self {
            fields: values,
            focus: 0,
            cursor_position: cursor,
        }
    }

    /// The currently focused field, or "" when the form has no fields.
    pub fn value(&self) -> &str {
        self.fields.get(self.focus).map(String::as_str).unwrap_or("")
    }

    pub fn focus_next(&mut self) {
        if self.fields.is_empty() {
            return;
        }
        self.focus = (self.focus + 1) % self.fields.len();
        self.cursor_position = self.value().chars().count();
    }

    pub fn focus_previous(&mut self) {
        if self.fields.is_empty() {
            return;
        }
        self.focus = if self.focus == 0 {
            self.fields.len() - 1
        } else {
            self.focus - 1
        };
        self.cursor_position = self.value().chars().count();
    }

    pub fn move_cursor_left(&mut self) {
        let cursor_moved_left = self.cursor_position.saturating_sub(1);
        self.cursor_position = self.clamp_cursor(cursor_moved_left);
    }

    pub fn move_cursor_right(&mut self) {
        let cursor_moved_right = self.cursor_position.saturating_add(1);
        self.cursor_position = self.clamp_cursor(cursor_moved_right);
    }

    pub fn enter_char(&mut self, new_char: char) {
        let cursor = self.cursor_position;
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        // Safe insertion for UTF-8 strings
        let byte_index = field
            .char_indices()
            .map(|(i, _)| i)
            .nth(cursor)
            .unwrap_or(field.len());
        field.insert(byte_index, new_char);
        self.move_cursor_right();
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        let current_index = self.cursor_position;
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        let before = field.chars().take(current_index - 1);
        let after = field.chars().skip(current_index);
        *field = before.chain(after).collect();
        self.move_cursor_left();
    }

    fn clamp_cursor(&self, new_cursor_pos: usize) -> usize {
        new_cursor_pos.clamp(0, self.value().chars().count())
    }
}

pub struct AppState {
    // Data
    pub store: TaskStore,
    /// The projected rows currently on screen (dashboard or course).
    pub visible: Vec<Task>,

    // UI State
    pub screen: Screen,
    pub mode: InputMode,
    pub list_state: ListState,
    pub settings: ViewSettings,
    pub message: String,
    pub loading: bool,
    /// False from entering the course screen until its first snapshot
    /// arrives; tells "still loading" apart from "course not found".
    pub course_loaded: bool,
    pub show_full_help: bool,

    // Form State
    pub form: FormState,
    pub form_priority: Priority,
    pub form_assignee: AssigneeChoice,
    /// Some while the task form or the due editor targets an existing
    /// task; None while creating.
    pub editing_task: Option<Task>,
    pub pending_delete: Option<Task>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let mut l_state = ListState::default();
        l_state.select(Some(0));

        Self {
            store: TaskStore::new(),
            visible: vec![],
            screen: Screen::Login,
            mode: InputMode::Normal,
            list_state: l_state,
            settings: ViewSettings::default(),
            message: "Restoring session...".to_string(),
            loading: true,
            course_loaded: false,
            show_full_help: false,
            form: FormState::new(2),
            form_priority: Priority::default(),
            form_assignee: AssigneeChoice::default(),
            editing_task: None,
            pending_delete: None,
        }
    }

    /// Switches screens. Filters, sort order, form contents and the list
    /// selection all start fresh, exactly as if the screen had just been
    /// opened for the first time.
    pub fn goto(&mut self, screen: Screen) {
        self.form = FormState::new(match screen {
            Screen::Login => 2,
            Screen::Register => 3,
            Screen::ForgotPassword => 1,
            Screen::Dashboard | Screen::Course => 0,
        });
        self.form_priority = Priority::default();
        self.form_assignee = AssigneeChoice::default();
        self.editing_task = None;
        self.pending_delete = None;
        self.settings = ViewSettings::default();
        self.mode = InputMode::Normal;
        self.message.clear();
        self.course_loaded = false;
        self.list_state.select(Some(0));
        self.screen = screen;
        self.refresh_visible();
    }

    /// Recomputes the visible rows from the store and the current view
    /// settings, keeping the selection in bounds.
    pub fn refresh_visible(&mut self) {
        self.visible = match self.screen {
            Screen::Course => self.store.visible_course_tasks(&self.settings),
            Screen::Dashboard => self.store.visible_dashboard_tasks(&self.settings),
            _ => Vec::new(),
        };

        let len = self.visible.len();
        if len == 0 {
            self.list_state.select(None);
        } else {
            let current = self.list_state.selected().unwrap_or(0);
            if current >= len {
                self.list_state.select(Some(len - 1)); // Clamp
            } else {
                self.list_state.select(Some(current));
            }
        }
    }

    pub fn get_selected_task(&self) -> Option<&Task> {
        if let Some(idx) = self.list_state.selected() {
            self.visible.get(idx)
        } else {
            None
        }
    }

    /// Opens the task form, seeded from `task` when editing.
    pub fn begin_task_form(&mut self, task: Option<&Task>) {
        let seed = match task {
            Some(t) => TaskForm::from_task(t),
            None => TaskForm::default(),
        };
        self.form = FormState::with_values(vec![seed.title, seed.description, seed.due_input]);
        self.form_priority = seed.priority;
        self.form_assignee = seed.assignee;
        self.editing_task = task.cloned();
        self.mode = InputMode::TaskForm;
        self.message.clear();
    }

    /// Opens the one-line due date editor for `task`.
    pub fn begin_due_edit(&mut self, task: &Task) {
        self.form = FormState::with_values(vec![task.due_input_string()]);
        self.editing_task = Some(task.clone());
        self.mode = InputMode::EditingDue;
        self.message.clear();
    }

    /// Collects the task form fields back into a TaskForm.
    pub fn task_form(&self) -> TaskForm {
        let field = |idx: usize| self.form.fields.get(idx).cloned().unwrap_or_default();
        TaskForm {
            title: field(FIELD_TITLE),
            description: field(FIELD_DESCRIPTION),
            due_input: field(FIELD_DUE),
            priority: self.form_priority,
            assignee: self.form_assignee.clone(),
        }
    }

    /// Leaves any input mode without applying it.
    pub fn cancel_input(&mut self) {
        self.form = FormState::new(0);
        self.editing_task = None;
        self.pending_delete = None;
        self.mode = InputMode::Normal;
    }

    // --- NAVIGATION ---
    pub fn next(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                if i >= self.visible.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                if i == 0 {
                    self.visible.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }
}
