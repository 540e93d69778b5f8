// File: ./src/store.rs
use crate::model::{Course, Directory, Task, assignee_label, course_title_label};
use crate::projection::{self, ViewSettings};
use crate::session::Identity;

/// Client-side mirror of the subscribed snapshots. Every setter replaces
/// its slice wholesale: subscriptions push complete arrays and the last
/// write wins, so there is nothing to merge. Derived views are computed
/// on demand through the projection; the store itself never reorders or
/// filters what the backend pushed.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    pub identity: Option<Identity>,
    pub courses: Vec<Course>,
    pub users: Directory,
    /// The course document currently open, if any. `Some(None)` is not
    /// modeled separately: a course that stops existing pushes `None`
    /// through its subscription and lands here as no open course.
    pub course: Option<Course>,
    pub course_tasks: Vec<Task>,
    pub all_tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.uid.as_str())
    }

    /// Tears down the per-course slices when the course screen closes
    /// or its key changes. Dashboard slices stay.
    pub fn leave_course(&mut self) {
        self.course = None;
        self.course_tasks.clear();
    }

    /// Drops everything, including the identity. Sign-out path.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// The open course's visible task list under the given settings.
    pub fn visible_course_tasks(&self, settings: &ViewSettings) -> Vec<Task> {
        projection::project(&self.course_tasks, self.uid(), settings)
    }

    /// The cross-course dashboard list under the given settings.
    pub fn visible_dashboard_tasks(&self, settings: &ViewSettings) -> Vec<Task> {
        projection::project_dashboard(&self.all_tasks, &self.courses, self.uid(), settings)
    }

    pub fn assignee_label(&self, assigned_to: Option<&str>) -> String {
        assignee_label(&self.users, assigned_to)
    }

    pub fn course_title(&self, course_id: &str) -> String {
        course_title_label(&self.courses, course_id)
    }

    /// Assignee picker entries for the open course: one `(uid, label)`
    /// per member. A member without a directory entry is labeled by
    /// their raw uid.
    pub fn member_options(&self) -> Vec<(String, String)> {
        let Some(course) = &self.course else {
            return Vec::new();
        };
        course
            .members
            .iter()
            .map(|uid| {
                let label = self
                    .users
                    .get(uid)
                    .map(|p| p.email.clone())
                    .unwrap_or_else(|| uid.clone());
                (uid.clone(), label)
            })
            .collect()
    }
}
