// File: ./src/model/item.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Pending <-> Completed. There are no other states.
    pub fn toggled(&self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Low
    }
}

/// A unit of work owned by a course.
///
/// `assigned_to`, when present, should reference a member of the owning
/// course. That is not enforced on write; the dashboard projection drops
/// tasks whose course no longer admits the viewer instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub due: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn due_input_string(&self) -> String {
        self.due
            .map(|d| d.date_naive().format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// The fields a create submission carries. Status is not among them:
/// every new task starts Pending.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskDraft {
    pub fn status(&self) -> TaskStatus {
        TaskStatus::Pending
    }
}

/// Partial update: only fields set to `Some` are written.
/// The double Option on `due`/`assigned_to` distinguishes "leave alone"
/// from "clear".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Option<String>>,
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn due(due: Option<DateTime<Utc>>) -> Self {
        Self {
            due: Some(due),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(t) = &self.title {
            task.title = t.clone();
        }
        if let Some(d) = &self.description {
            task.description = d.clone();
        }
        if let Some(due) = &self.due {
            task.due = *due;
        }
        if let Some(p) = &self.priority {
            task.priority = *p;
        }
        if let Some(a) = &self.assigned_to {
            task.assigned_to = a.clone();
        }
        if let Some(s) = &self.status {
            task.status = *s;
        }
    }
}

/// The assignee picker state of a task form. `Unassigned` maps to a null
/// assignee on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AssigneeChoice {
    #[default]
    Unassigned,
    Member(String),
}

impl AssigneeChoice {
    pub fn to_assigned(&self) -> Option<String> {
        match self {
            AssigneeChoice::Unassigned => None,
            AssigneeChoice::Member(uid) => Some(uid.clone()),
        }
    }

    pub fn from_assigned(assigned_to: Option<&str>) -> Self {
        match assigned_to {
            None => AssigneeChoice::Unassigned,
            Some(uid) => AssigneeChoice::Member(uid.to_string()),
        }
    }
}

/// Raw task form contents as the user typed them. Validation and date
/// normalization happen in the controller, before anything touches the
/// network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    /// "YYYY-MM-DD" or empty for no due date.
    pub due_input: String,
    pub priority: Priority,
    pub assignee: AssigneeChoice,
}

impl TaskForm {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            due_input: task.due_input_string(),
            priority: task.priority,
            assignee: AssigneeChoice::from_assigned(task.assigned_to.as_deref()),
        }
    }
}

/// Normalizes a user-entered due date to the canonical instant.
/// Empty input means "no due date"; a bare date becomes midnight UTC.
pub fn parse_due_input(input: &str) -> Result<Option<DateTime<Utc>>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| format!("Invalid due date '{}' (expected YYYY-MM-DD).", trimmed))?;
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => Ok(Some(midnight.and_utc())),
        None => Err(format!("Invalid due date '{}'.", trimmed)),
    }
}
