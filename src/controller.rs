// File: ./src/controller.rs
//! Central logic controller for task operations.
//! All view layers delegate mutations here so validation and error
//! mapping behave the same everywhere. Validation runs before anything
//! touches the network; a validation failure never produces a remote
//! call. Remote failures keep their transport detail in the log and
//! reach the user as a generic per-operation message. No operation
//! retries: the store's live subscription is the only way a change
//! becomes visible.
use crate::backend::TaskBackend;
use crate::model::{Task, TaskDraft, TaskForm, TaskUpdate, parse_due_input};
use crate::model::Priority;
use chrono::{DateTime, Utc};

/// What a failed operation tells the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpError {
    /// Rejected locally; nothing was sent.
    Validation(String),
    /// The remote call failed. Carries the generic user-facing message;
    /// the transport detail went to the log.
    Remote(String),
}

impl std::fmt::Display for OpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpError::Validation(msg) | OpError::Remote(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for OpError {}

/// Validated create/edit form contents: trimmed title, normalized due.
struct ValidForm {
    title: String,
    description: String,
    due: Option<DateTime<Utc>>,
}

fn validate(form: &TaskForm) -> Result<ValidForm, OpError> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(OpError::Validation("Title is required.".to_string()));
    }
    let due = parse_due_input(&form.due_input).map_err(OpError::Validation)?;
    Ok(ValidForm {
        title: title.to_string(),
        description: form.description.trim().to_string(),
        due,
    })
}

fn remote_failure(message: &str, detail: String) -> OpError {
    log::error!("{} {}", message, detail);
    OpError::Remote(message.to_string())
}

#[derive(Clone)]
pub struct TaskController<B: TaskBackend> {
    backend: B,
}

impl<B: TaskBackend> TaskController<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Creates a task from a submitted form. Status is always Pending;
    /// the form does not carry one.
    pub async fn create_task(&self, course_id: &str, form: &TaskForm) -> Result<String, OpError> {
        let valid = validate(form)?;
        let draft = TaskDraft {
            title: valid.title,
            description: valid.description,
            priority: form.priority,
            due: valid.due,
            assigned_to: form.assignee.to_assigned(),
            created_at: Utc::now(),
        };
        self.backend
            .create_task(course_id, draft)
            .await
            .map_err(|e| remote_failure("Failed to create task.", e))
    }

    /// Saves an edit form over an existing task. Writes the five edit
    /// fields; status stays whatever it was.
    pub async fn save_edits(
        &self,
        course_id: &str,
        task_id: &str,
        form: &TaskForm,
    ) -> Result<(), OpError> {
        let valid = validate(form)?;
        let patch = TaskUpdate {
            title: Some(valid.title),
            description: Some(valid.description),
            due: Some(valid.due),
            priority: Some(form.priority),
            assigned_to: Some(form.assignee.to_assigned()),
            status: None,
        };
        self.backend
            .update_task(course_id, task_id, patch)
            .await
            .map_err(|e| remote_failure("Failed to update task.", e))
    }

    /// Flips Pending <-> Completed. Single-field patch; nothing else moves.
    pub async fn toggle_status(&self, task: &Task) -> Result<(), OpError> {
        self.backend
            .update_task(
                &task.course_id,
                &task.id,
                TaskUpdate::status(task.status.toggled()),
            )
            .await
            .map_err(|e| remote_failure("Failed to update task status.", e))
    }

    /// Single-field priority change, as offered inline on the dashboard.
    pub async fn change_priority(&self, task: &Task, priority: Priority) -> Result<(), OpError> {
        self.backend
            .update_task(&task.course_id, &task.id, TaskUpdate::priority(priority))
            .await
            .map_err(|e| remote_failure("Failed to update task priority.", e))
    }

    /// Single-field due-date change. An empty input clears the date.
    pub async fn change_due_date(&self, task: &Task, due_input: &str) -> Result<(), OpError> {
        let due = parse_due_input(due_input).map_err(OpError::Validation)?;
        self.backend
            .update_task(&task.course_id, &task.id, TaskUpdate::due(due))
            .await
            .map_err(|e| remote_failure("Failed to update task due date.", e))
    }

    /// Deletes outright. The confirmation prompt is the view's job;
    /// by the time this runs the user already said yes.
    pub async fn delete_task(&self, course_id: &str, task_id: &str) -> Result<(), OpError> {
        self.backend
            .delete_task(course_id, task_id)
            .await
            .map_err(|e| remote_failure("Failed to delete task.", e))
    }
}
