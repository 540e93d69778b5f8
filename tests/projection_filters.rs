// Tests for the status/priority/assignee filters and the dashboard's
// membership gate.
use chrono::Utc;
use studysync::model::{Course, Priority, Task, TaskStatus};
use studysync::projection::{
    AssigneeFilter, PriorityFilter, SortKey, StatusFilter, ViewSettings, project,
    project_dashboard,
};

fn task(id: &str, course_id: &str) -> Task {
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

fn course(id: &str, members: &[&str]) -> Course {
    Course {
        id: id.to_string(),
        title: format!("Course {}", id),
        members: members.iter().map(|m| m.to_string()).collect(),
    }
}

fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

// Unsorted so the assertions only exercise the filters.
fn unsorted() -> ViewSettings {
    ViewSettings {
        sort: SortKey::None,
        ..ViewSettings::default()
    }
}

#[test]
fn test_status_filter_splits_pending_and_completed() {
    let mut done = task("done", "c1");
    done.status = TaskStatus::Completed;
    let tasks = vec![task("open", "c1"), done];

    let pending = ViewSettings {
        status: StatusFilter::Pending,
        ..unsorted()
    };
    let completed = ViewSettings {
        status: StatusFilter::Completed,
        ..unsorted()
    };

    assert_eq!(ids(&project(&tasks, None, &unsorted())), vec!["open", "done"]);
    assert_eq!(ids(&project(&tasks, None, &pending)), vec!["open"]);
    assert_eq!(ids(&project(&tasks, None, &completed)), vec!["done"]);
}

#[test]
fn test_priority_filter_keeps_one_level() {
    let mut high = task("high", "c1");
    high.priority = Priority::High;
    let mut medium = task("medium", "c1");
    medium.priority = Priority::Medium;
    let tasks = vec![task("low", "c1"), medium, high];

    let settings = ViewSettings {
        priority: PriorityFilter::Medium,
        ..unsorted()
    };
    assert_eq!(ids(&project(&tasks, None, &settings)), vec!["medium"]);
}

#[test]
fn test_assignee_mine_matches_only_my_tasks() {
    let mut mine = task("mine", "c1");
    mine.assigned_to = Some("u1".to_string());
    let mut theirs = task("theirs", "c1");
    theirs.assigned_to = Some("u2".to_string());
    let tasks = vec![mine, theirs, task("nobody", "c1")];

    let settings = ViewSettings {
        assignee: AssigneeFilter::Me,
        ..unsorted()
    };
    assert_eq!(ids(&project(&tasks, Some("u1"), &settings)), vec!["mine"]);
}

#[test]
fn test_assignee_mine_without_identity_matches_nothing() {
    let mut assigned = task("assigned", "c1");
    assigned.assigned_to = Some("u1".to_string());
    let tasks = vec![assigned, task("nobody", "c1")];

    let settings = ViewSettings {
        assignee: AssigneeFilter::Me,
        ..unsorted()
    };
    assert!(project(&tasks, None, &settings).is_empty());
}

#[test]
fn test_assignee_unassigned_filter() {
    let mut assigned = task("assigned", "c1");
    assigned.assigned_to = Some("u1".to_string());
    let tasks = vec![assigned, task("nobody", "c1")];

    let settings = ViewSettings {
        assignee: AssigneeFilter::Unassigned,
        ..unsorted()
    };
    assert_eq!(ids(&project(&tasks, Some("u1"), &settings)), vec!["nobody"]);
}

#[test]
fn test_dashboard_requires_identity() {
    let courses = vec![course("c1", &["u1"])];
    let tasks = vec![task("t1", "c1")];

    assert!(project_dashboard(&tasks, &courses, None, &unsorted()).is_empty());
}

#[test]
fn test_dashboard_drops_foreign_and_unknown_courses() {
    // u1 is a member of c1 only; c2 belongs to someone else and the rest
    // of the tasks point at courses we never received.
    let courses = vec![course("c1", &["u1", "u2"]), course("c2", &["u2"])];
    let tasks = vec![
        task("visible", "c1"),
        task("foreign", "c2"),
        task("orphan", "ghost"),
        task("homeless", ""),
    ];

    let visible = project_dashboard(&tasks, &courses, Some("u1"), &unsorted());
    assert_eq!(ids(&visible), vec!["visible"]);
}

#[test]
fn test_dashboard_keeps_unassigned_tasks() {
    // The dashboard is scoped by membership, not by assignment: tasks
    // nobody picked up still show.
    let courses = vec![course("c1", &["u1"])];
    let mut theirs = task("theirs", "c1");
    theirs.assigned_to = Some("u2".to_string());
    let tasks = vec![task("nobody", "c1"), theirs];

    let visible = project_dashboard(&tasks, &courses, Some("u1"), &unsorted());
    assert_eq!(ids(&visible), vec!["nobody", "theirs"]);
}

#[test]
fn test_dashboard_applies_common_filters_after_membership() {
    let courses = vec![course("c1", &["u1"]), course("c2", &["u2"])];
    let mut done = task("done", "c1");
    done.status = TaskStatus::Completed;
    let mut foreign_open = task("foreign", "c2");
    foreign_open.status = TaskStatus::Pending;
    let tasks = vec![task("open", "c1"), done, foreign_open];

    let settings = ViewSettings {
        status: StatusFilter::Pending,
        ..unsorted()
    };
    let visible = project_dashboard(&tasks, &courses, Some("u1"), &settings);
    assert_eq!(ids(&visible), vec!["open"]);
}
