// File: ./src/tui/action.rs
// Defines actions and events for TUI interaction and state updates.
use crate::model::{Course, Directory, Priority, Task, TaskForm};
use crate::session::Identity;

#[derive(Debug)]
pub enum Action {
    SignIn { email: String, password: String },
    SignUp { email: String, password: String, display_name: String },
    RequestReset { email: String },
    SignOut,
    OpenCourse(String),
    LeaveCourse,
    CreateTask { course_id: String, form: TaskForm },
    SaveEdits { course_id: String, task_id: String, form: TaskForm },
    ToggleTask(Task),
    ChangePriority(Task, Priority),
    ChangeDue(Task, String),
    DeleteTask { course_id: String, task_id: String },
    Quit,
}

#[derive(Debug)]
pub enum AppEvent {
    SignedIn(Identity),
    AuthFailed(String),
    Registered,
    ResetRequested,
    SignedOut,
    CoursesChanged(Vec<Course>),
    UsersChanged(Directory),
    CourseChanged(Option<Course>),
    CourseTasksChanged(Vec<Task>),
    AllTasksChanged(Vec<Task>),
    Error(String),
    Status(String),
}
