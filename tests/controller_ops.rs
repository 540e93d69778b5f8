// File: tests/controller_ops.rs
// Controller semantics against the in-memory backend: validation runs
// before any write, edits never touch the status, and remote failures
// surface as their generic per-operation message.
use chrono::{TimeZone, Utc};
use studysync::backend::MemoryBackend;
use studysync::controller::{OpError, TaskController};
use studysync::model::{
    AssigneeChoice, Course, Priority, Task, TaskForm, TaskStatus,
};

fn course(id: &str, members: &[&str]) -> Course {
    Course {
        id: id.to_string(),
        title: format!("Course {}", id),
        members: members.iter().map(|m| m.to_string()).collect(),
    }
}

fn seeded_task(id: &str, course_id: &str) -> Task {
    Task {
        id: id.to_string(),
        course_id: course_id.to_string(),
        title: format!("Task {}", id),
        description: String::new(),
        status: TaskStatus::Pending,
        priority: Priority::Low,
        due: None,
        assigned_to: None,
        created_at: Utc::now(),
    }
}

fn form(title: &str) -> TaskForm {
    TaskForm {
        title: title.to_string(),
        description: String::new(),
        due_input: String::new(),
        priority: Priority::default(),
        assignee: AssigneeChoice::default(),
    }
}

fn setup() -> (MemoryBackend, TaskController<MemoryBackend>) {
    let backend = MemoryBackend::new();
    backend.add_course(course("c1", &["u1", "u2"]));
    let controller = TaskController::new(backend.clone());
    (backend, controller)
}

#[tokio::test]
async fn test_create_requires_title() {
    let (backend, controller) = setup();

    let err = controller.create_task("c1", &form("   ")).await.unwrap_err();
    assert_eq!(err, OpError::Validation("Title is required.".to_string()));
    // Rejected locally: nothing reached the store.
    assert_eq!(backend.task_count("c1"), 0);
}

#[tokio::test]
async fn test_create_rejects_bad_due_before_writing() {
    let (backend, controller) = setup();

    let mut bad = form("Read chapter 5");
    bad.due_input = "next tuesday".to_string();
    let err = controller.create_task("c1", &bad).await.unwrap_err();
    assert_eq!(
        err,
        OpError::Validation(
            "Invalid due date 'next tuesday' (expected YYYY-MM-DD).".to_string()
        )
    );
    assert_eq!(backend.task_count("c1"), 0);
}

#[tokio::test]
async fn test_create_trims_and_defaults() {
    let (backend, controller) = setup();

    let mut submitted = form("  Read chapter 5  ");
    submitted.description = "  Pages 80-110  ".to_string();
    submitted.priority = Priority::High;
    let id = controller.create_task("c1", &submitted).await.unwrap();

    let task = backend.task("c1", &id).unwrap();
    assert_eq!(task.title, "Read chapter 5");
    assert_eq!(task.description, "Pages 80-110");
    assert_eq!(task.priority, Priority::High);
    // New tasks always start pending, unassigned, undated.
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.due, None);
    assert_eq!(task.assigned_to, None);
}

#[tokio::test]
async fn test_create_carries_due_and_assignee() {
    let (backend, controller) = setup();

    let mut submitted = form("Lab report");
    submitted.due_input = "2026-03-14".to_string();
    submitted.assignee = AssigneeChoice::Member("u2".to_string());
    let id = controller.create_task("c1", &submitted).await.unwrap();

    let task = backend.task("c1", &id).unwrap();
    assert_eq!(task.due, Some(Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap()));
    assert_eq!(task.assigned_to, Some("u2".to_string()));
}

#[tokio::test]
async fn test_save_edits_preserves_status() {
    let (backend, controller) = setup();
    let mut done = seeded_task("t1", "c1");
    done.status = TaskStatus::Completed;
    backend.insert_task(done);

    let mut edit = form("Reworded");
    edit.priority = Priority::Medium;
    edit.assignee = AssigneeChoice::Member("u1".to_string());
    controller.save_edits("c1", "t1", &edit).await.unwrap();

    let task = backend.task("c1", "t1").unwrap();
    assert_eq!(task.title, "Reworded");
    assert_eq!(task.priority, Priority::Medium);
    assert_eq!(task.assigned_to, Some("u1".to_string()));
    // The edit form has no status field; completion survives the edit.
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_save_edits_can_clear_due_and_assignee() {
    let (backend, controller) = setup();
    let mut task = seeded_task("t1", "c1");
    task.due = Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
    task.assigned_to = Some("u2".to_string());
    backend.insert_task(task);

    // An empty due input and the Unassigned choice clear both fields,
    // rather than leaving them untouched.
    controller.save_edits("c1", "t1", &form("Task t1")).await.unwrap();

    let task = backend.task("c1", "t1").unwrap();
    assert_eq!(task.due, None);
    assert_eq!(task.assigned_to, None);
}

#[tokio::test]
async fn test_toggle_flips_only_the_status() {
    let (backend, controller) = setup();
    let mut task = seeded_task("t1", "c1");
    task.due = Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
    task.assigned_to = Some("u2".to_string());
    backend.insert_task(task.clone());

    controller.toggle_status(&task).await.unwrap();
    let toggled = backend.task("c1", "t1").unwrap();
    assert_eq!(toggled.status, TaskStatus::Completed);
    assert_eq!(toggled.due, task.due);
    assert_eq!(toggled.assigned_to, task.assigned_to);

    controller.toggle_status(&toggled).await.unwrap();
    assert_eq!(backend.task("c1", "t1").unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_change_priority_inline() {
    let (backend, controller) = setup();
    let task = seeded_task("t1", "c1");
    backend.insert_task(task.clone());

    controller.change_priority(&task, Priority::High).await.unwrap();
    assert_eq!(backend.task("c1", "t1").unwrap().priority, Priority::High);
}

#[tokio::test]
async fn test_change_due_date_sets_and_clears() {
    let (backend, controller) = setup();
    let task = seeded_task("t1", "c1");
    backend.insert_task(task.clone());

    controller.change_due_date(&task, "2026-06-30").await.unwrap();
    assert_eq!(
        backend.task("c1", "t1").unwrap().due,
        Some(Utc.with_ymd_and_hms(2026, 6, 30, 0, 0, 0).unwrap())
    );

    controller.change_due_date(&task, "").await.unwrap();
    assert_eq!(backend.task("c1", "t1").unwrap().due, None);

    let err = controller.change_due_date(&task, "30/06/2026").await.unwrap_err();
    assert!(matches!(err, OpError::Validation(_)));
}

#[tokio::test]
async fn test_delete_task() {
    let (backend, controller) = setup();
    backend.insert_task(seeded_task("t1", "c1"));

    controller.delete_task("c1", "t1").await.unwrap();
    assert!(backend.task("c1", "t1").is_none());
}

#[tokio::test]
async fn test_remote_failures_use_generic_messages() {
    let (_backend, controller) = setup();

    // The backend's detail ("No such course") stays in the log; the
    // caller sees the operation's own message.
    let err = controller.create_task("ghost", &form("Lost")).await.unwrap_err();
    assert_eq!(err, OpError::Remote("Failed to create task.".to_string()));

    let err = controller
        .save_edits("c1", "ghost", &form("Lost"))
        .await
        .unwrap_err();
    assert_eq!(err, OpError::Remote("Failed to update task.".to_string()));

    let ghost = seeded_task("ghost", "c1");
    let err = controller.toggle_status(&ghost).await.unwrap_err();
    assert_eq!(
        err,
        OpError::Remote("Failed to update task status.".to_string())
    );
}
