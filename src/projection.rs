// File: ./src/projection.rs
// Pure derivation of the visible task list from raw snapshots and the
// ephemeral filter/sort settings. No I/O, no hidden state: every caller
// re-runs this on any input change and gets the same answer for the
// same inputs.
use crate::model::{Course, Priority, Task, TaskStatus};
use std::cmp::Ordering;
use strum::{Display, EnumIter, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
pub enum PriorityFilter {
    #[default]
    All,
    Low,
    Medium,
    High,
}

impl PriorityFilter {
    pub fn keeps(&self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Low => priority == Priority::Low,
            PriorityFilter::Medium => priority == Priority::Medium,
            PriorityFilter::High => priority == Priority::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
pub enum AssigneeFilter {
    #[default]
    All,
    #[strum(serialize = "Mine")]
    Me,
    Unassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
pub enum SortKey {
    #[default]
    #[strum(serialize = "Due soonest")]
    DueSoon,
    #[strum(serialize = "Due latest")]
    DueLate,
    #[strum(serialize = "Unsorted")]
    None,
}

/// Ephemeral view settings. Never persisted; each screen owns its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewSettings {
    pub status: StatusFilter,
    pub priority: PriorityFilter,
    pub assignee: AssigneeFilter,
    pub sort: SortKey,
}

/// Advances an option enum to its next variant, wrapping around.
/// Drives the filter-cycling keys in the UI.
pub fn next_option<T: IntoEnumIterator + PartialEq + Copy>(current: T) -> T {
    let variants: Vec<T> = T::iter().collect();
    let idx = variants
        .iter()
        .position(|v| *v == current)
        .unwrap_or(0);
    variants[(idx + 1) % variants.len()]
}

fn passes(task: &Task, identity: Option<&str>, settings: &ViewSettings) -> bool {
    if settings.status == StatusFilter::Pending && task.status != TaskStatus::Pending {
        return false;
    }
    if settings.status == StatusFilter::Completed && task.status != TaskStatus::Completed {
        return false;
    }

    if !settings.priority.keeps(task.priority) {
        return false;
    }

    match settings.assignee {
        AssigneeFilter::All => {}
        // No identity means no task is "mine".
        AssigneeFilter::Me => match identity {
            Some(uid) => {
                if task.assigned_to.as_deref() != Some(uid) {
                    return false;
                }
            }
            None => return false,
        },
        AssigneeFilter::Unassigned => {
            if task.assigned_to.is_some() {
                return false;
            }
        }
    }

    true
}

/// Due-date ordering: a missing date sorts after every present one,
/// regardless of direction. Dates themselves are already canonical
/// instants (normalized at the decode boundary).
pub fn compare_due(a: &Task, b: &Task, key: SortKey) -> Ordering {
    match (a.due, b.due) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(da), Some(db)) => match key {
            SortKey::DueLate => db.cmp(&da),
            _ => da.cmp(&db),
        },
    }
}

fn sort_tasks(tasks: &mut [Task], key: SortKey) {
    if key == SortKey::None {
        return;
    }
    // Stable: ties keep their snapshot order.
    tasks.sort_by(|a, b| compare_due(a, b, key));
}

/// Projects one course's tasks. Input order is the snapshot order
/// (newest first), preserved when no sort is selected.
pub fn project(tasks: &[Task], identity: Option<&str>, settings: &ViewSettings) -> Vec<Task> {
    let mut visible: Vec<Task> = tasks
        .iter()
        .filter(|t| passes(t, identity, settings))
        .cloned()
        .collect();
    sort_tasks(&mut visible, settings.sort);
    visible
}

/// Cross-course projection for the dashboard. On top of the common
/// filters, drops tasks whose owning course is unknown or no longer
/// admits the viewer; stale rows linger in the raw stream after a
/// membership change. With no identity the dashboard is empty.
pub fn project_dashboard(
    tasks: &[Task],
    courses: &[Course],
    identity: Option<&str>,
    settings: &ViewSettings,
) -> Vec<Task> {
    let Some(uid) = identity else {
        return Vec::new();
    };

    let mut visible: Vec<Task> = tasks
        .iter()
        .filter(|t| {
            if t.course_id.is_empty() {
                return false;
            }
            match courses.iter().find(|c| c.id == t.course_id) {
                Some(course) => course.is_member(uid),
                None => false,
            }
        })
        .filter(|t| passes(t, identity, settings))
        .cloned()
        .collect();
    sort_tasks(&mut visible, settings.sort);
    visible
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_option_wraps() {
        assert_eq!(next_option(StatusFilter::All), StatusFilter::Pending);
        assert_eq!(next_option(StatusFilter::Completed), StatusFilter::All);
        assert_eq!(next_option(SortKey::None), SortKey::DueSoon);
    }
}
