// File: ./src/model/mod.rs
pub mod adapter;
pub mod course;
pub mod item;

pub use course::{Course, Directory, UserProfile, assignee_label, course_title_label};
pub use item::{
    AssigneeChoice, Priority, Task, TaskDraft, TaskForm, TaskStatus, TaskUpdate, parse_due_input,
};
