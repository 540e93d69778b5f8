// File: ./src/model/course.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A group of users sharing a task list. Read-only from this client's
/// perspective: membership is managed elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl Course {
    pub fn is_member(&self, uid: &str) -> bool {
        self.members.iter().any(|m| m == uid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

/// uid -> profile, as pushed by the user-directory subscription.
pub type Directory = HashMap<String, UserProfile>;

/// Display string for a task's assignee. Known users render as their
/// email, matching what course mates actually search for.
pub fn assignee_label(directory: &Directory, assigned_to: Option<&str>) -> String {
    match assigned_to {
        None => "Unassigned".to_string(),
        Some(uid) => match directory.get(uid) {
            Some(profile) => profile.email.clone(),
            None => format!("(Unknown user: {})", uid),
        },
    }
}

pub fn course_title_label(courses: &[Course], course_id: &str) -> String {
    courses
        .iter()
        .find(|c| c.id == course_id)
        .map(|c| c.title.clone())
        .unwrap_or_else(|| "(Unknown course)".to_string())
}
