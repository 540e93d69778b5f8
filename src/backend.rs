// File: ./src/backend.rs
// The document-store seam. Consumers hold a TaskBackend and open
// scoped subscriptions against it; the cloud gateway and the in-memory
// backend both live behind this trait, so nothing above it can tell
// pushed snapshots from polled ones.
use crate::model::{Course, Directory, Task, TaskDraft, TaskUpdate, UserProfile};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use uuid::Uuid;

/// A live stream of snapshots for one collection or document.
///
/// Dropping the subscription releases it: the backend stops tracking
/// the watcher (memory) or aborts the poll task (cloud). Each snapshot
/// replaces the previous one wholesale; last write wins.
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
    // True when the channel was seeded with real data. The cloud
    // backend seeds with a placeholder until its first poll lands and
    // constructs with `pending` instead.
    primed: bool,
    _guard: SubscriptionGuard,
}

impl<T: Clone> Subscription<T> {
    pub fn new(rx: watch::Receiver<T>, guard: SubscriptionGuard) -> Self {
        Self {
            rx,
            primed: true,
            _guard: guard,
        }
    }

    /// A subscription whose seeded value is a placeholder; `next` skips
    /// it and waits for the first pushed snapshot.
    pub fn pending(rx: watch::Receiver<T>, guard: SubscriptionGuard) -> Self {
        Self {
            rx,
            primed: false,
            _guard: guard,
        }
    }

    /// Latest snapshot, marking it seen.
    pub fn current(&mut self) -> T {
        self.rx.borrow_and_update().clone()
    }

    /// Waits for a snapshot newer than the last one seen. Returns false
    /// once the producer side is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// The next authoritative snapshot: the seeded one first when the
    /// subscription is primed, then every pushed change. `None` once
    /// the producer side is gone.
    pub async fn next(&mut self) -> Option<T> {
        if self.primed {
            self.primed = false;
            return Some(self.rx.borrow_and_update().clone());
        }
        if self.rx.changed().await.is_ok() {
            Some(self.rx.borrow_and_update().clone())
        } else {
            None
        }
    }
}

/// Releases the backend-side registration on drop.
pub struct SubscriptionGuard {
    label: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    pub fn new(label: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        let label = label.into();
        log::debug!("opened {} subscription", label);
        Self {
            label,
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        log::debug!("released {} subscription", self.label);
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("label", &self.label)
            .finish()
    }
}

/// The typed document-store surface: subscribable collections plus
/// per-document create/update/delete. Mutations are fire-and-forget
/// from the caller's perspective; the changed data comes back through
/// the subscriptions, never through the call's return value.
pub trait TaskBackend: Clone + Send + Sync + 'static {
    /// Courses whose member list contains `uid`.
    fn subscribe_courses(&self, uid: &str) -> Subscription<Vec<Course>>;

    /// The full user directory (uid -> profile).
    fn subscribe_users(&self) -> Subscription<Directory>;

    /// A single course document; `None` while absent or after deletion.
    fn subscribe_course(&self, course_id: &str) -> Subscription<Option<Course>>;

    /// One course's tasks, newest first.
    fn subscribe_course_tasks(&self, course_id: &str) -> Subscription<Vec<Task>>;

    /// Every task across all courses, newest first, each carrying its
    /// owning course id.
    fn subscribe_all_tasks(&self) -> Subscription<Vec<Task>>;

    fn create_task(
        &self,
        course_id: &str,
        draft: TaskDraft,
    ) -> impl Future<Output = Result<String, String>> + Send;

    fn update_task(
        &self,
        course_id: &str,
        task_id: &str,
        patch: TaskUpdate,
    ) -> impl Future<Output = Result<(), String>> + Send;

    fn delete_task(
        &self,
        course_id: &str,
        task_id: &str,
    ) -> impl Future<Output = Result<(), String>> + Send;
}

// --- IN-MEMORY BACKEND ---

type Watcher<T> = (u64, watch::Sender<T>);

#[derive(Default)]
struct WatcherSet {
    courses: Vec<(u64, String, watch::Sender<Vec<Course>>)>,
    users: Vec<Watcher<Directory>>,
    course_docs: Vec<(u64, String, watch::Sender<Option<Course>>)>,
    course_tasks: Vec<(u64, String, watch::Sender<Vec<Task>>)>,
    all_tasks: Vec<Watcher<Vec<Task>>>,
}

#[derive(Default)]
struct MemoryState {
    courses: HashMap<String, Course>,
    profiles: HashMap<String, UserProfile>,
    tasks: HashMap<String, Vec<Task>>,
    watchers: WatcherSet,
    next_watcher_id: u64,
}

/// In-process backend with real push semantics. Mutations recompute the
/// affected snapshots synchronously and hand them to every registered
/// watcher before returning, which makes subscription behavior fully
/// deterministic under test.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // --- SEEDING / DIRECT MUTATION (used by tests and the session
    // provider's profile write) ---

    pub fn add_course(&self, course: Course) {
        let mut state = self.lock();
        state.courses.insert(course.id.clone(), course);
        notify_courses(&state);
    }

    pub fn set_course_members(&self, course_id: &str, members: Vec<String>) {
        let mut state = self.lock();
        if let Some(course) = state.courses.get_mut(course_id) {
            course.members = members;
        }
        notify_courses(&state);
    }

    pub fn add_profile(&self, profile: UserProfile) {
        let mut state = self.lock();
        state.profiles.insert(profile.id.clone(), profile);
        for (_, tx) in &state.watchers.users {
            let _ = tx.send(state.profiles.clone());
        }
    }

    /// Inserts a fully-formed task, bypassing draft defaults. Test setup
    /// needs exact field control.
    pub fn insert_task(&self, task: Task) {
        let mut state = self.lock();
        let course_id = task.course_id.clone();
        state.tasks.entry(course_id.clone()).or_default().push(task);
        sort_newest_first(state.tasks.get_mut(&course_id).map(|v| v.as_mut_slice()));
        notify_tasks(&state, &course_id);
    }

    pub fn task(&self, course_id: &str, task_id: &str) -> Option<Task> {
        let state = self.lock();
        state
            .tasks
            .get(course_id)
            .and_then(|list| list.iter().find(|t| t.id == task_id).cloned())
    }

    pub fn task_count(&self, course_id: &str) -> usize {
        let state = self.lock();
        state.tasks.get(course_id).map(|l| l.len()).unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    // Snapshot and registration happen under one lock so no mutation
    // can fall between the initial value and the first notification.
    fn register<T: Clone>(
        &self,
        label: String,
        snapshot: impl FnOnce(&MemoryState) -> T,
        attach: impl FnOnce(&mut WatcherSet, u64, watch::Sender<T>),
    ) -> Subscription<T> {
        let (id, rx) = {
            let mut state = self.lock();
            let id = state.next_watcher_id;
            state.next_watcher_id += 1;
            let (tx, rx) = watch::channel(snapshot(&state));
            attach(&mut state.watchers, id, tx);
            (id, rx)
        };
        let state_ref = Arc::clone(&self.state);
        let guard = SubscriptionGuard::new(label, move || {
            if let Ok(mut state) = state_ref.lock() {
                detach_watcher(&mut state.watchers, id);
            }
        });
        Subscription::new(rx, guard)
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

fn detach_watcher(watchers: &mut WatcherSet, id: u64) {
    watchers.courses.retain(|(wid, _, _)| *wid != id);
    watchers.users.retain(|(wid, _)| *wid != id);
    watchers.course_docs.retain(|(wid, _, _)| *wid != id);
    watchers.course_tasks.retain(|(wid, _, _)| *wid != id);
    watchers.all_tasks.retain(|(wid, _)| *wid != id);
}

fn sort_newest_first(tasks: Option<&mut [Task]>) {
    if let Some(tasks) = tasks {
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

fn courses_for(state: &MemoryState, uid: &str) -> Vec<Course> {
    let mut list: Vec<Course> = state
        .courses
        .values()
        .filter(|c| c.is_member(uid))
        .cloned()
        .collect();
    list.sort_by(|a, b| a.id.cmp(&b.id));
    list
}

fn all_tasks_snapshot(state: &MemoryState) -> Vec<Task> {
    let mut all: Vec<Task> = state.tasks.values().flatten().cloned().collect();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    all
}

fn notify_courses(state: &MemoryState) {
    for (_, uid, tx) in &state.watchers.courses {
        let _ = tx.send(courses_for(state, uid));
    }
    for (_, cid, tx) in &state.watchers.course_docs {
        let _ = tx.send(state.courses.get(cid).cloned());
    }
}

fn notify_tasks(state: &MemoryState, course_id: &str) {
    let course_snapshot = state.tasks.get(course_id).cloned().unwrap_or_default();
    for (_, cid, tx) in &state.watchers.course_tasks {
        if cid == course_id {
            let _ = tx.send(course_snapshot.clone());
        }
    }

    let all = all_tasks_snapshot(state);
    for (_, tx) in &state.watchers.all_tasks {
        let _ = tx.send(all.clone());
    }
}

impl TaskBackend for MemoryBackend {
    fn subscribe_courses(&self, uid: &str) -> Subscription<Vec<Course>> {
        let uid = uid.to_string();
        let key = uid.clone();
        self.register(
            format!("courses[{}]", uid),
            move |state| courses_for(state, &key),
            move |watchers, id, tx| watchers.courses.push((id, uid, tx)),
        )
    }

    fn subscribe_users(&self) -> Subscription<Directory> {
        self.register(
            "users".to_string(),
            |state| state.profiles.clone(),
            |watchers, id, tx| watchers.users.push((id, tx)),
        )
    }

    fn subscribe_course(&self, course_id: &str) -> Subscription<Option<Course>> {
        let course_id = course_id.to_string();
        let key = course_id.clone();
        self.register(
            format!("course[{}]", course_id),
            move |state| state.courses.get(&key).cloned(),
            move |watchers, id, tx| watchers.course_docs.push((id, course_id, tx)),
        )
    }

    fn subscribe_course_tasks(&self, course_id: &str) -> Subscription<Vec<Task>> {
        let course_id = course_id.to_string();
        let key = course_id.clone();
        self.register(
            format!("tasks[{}]", course_id),
            move |state| state.tasks.get(&key).cloned().unwrap_or_default(),
            move |watchers, id, tx| watchers.course_tasks.push((id, course_id, tx)),
        )
    }

    fn subscribe_all_tasks(&self) -> Subscription<Vec<Task>> {
        self.register(
            "all-tasks".to_string(),
            all_tasks_snapshot,
            |watchers, id, tx| watchers.all_tasks.push((id, tx)),
        )
    }

    async fn create_task(&self, course_id: &str, draft: TaskDraft) -> Result<String, String> {
        let mut state = self.lock();
        if !state.courses.contains_key(course_id) {
            return Err(format!("No such course: {}", course_id));
        }
        let task = Task {
            id: Uuid::new_v4().to_string(),
            course_id: course_id.to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: draft.status(),
            priority: draft.priority,
            due: draft.due,
            assigned_to: draft.assigned_to.clone(),
            created_at: draft.created_at,
        };
        let id = task.id.clone();
        state
            .tasks
            .entry(course_id.to_string())
            .or_default()
            .push(task);
        sort_newest_first(state.tasks.get_mut(course_id).map(|v| v.as_mut_slice()));
        notify_tasks(&state, course_id);
        Ok(id)
    }

    async fn update_task(
        &self,
        course_id: &str,
        task_id: &str,
        patch: TaskUpdate,
    ) -> Result<(), String> {
        let mut state = self.lock();
        let Some(task) = state
            .tasks
            .get_mut(course_id)
            .and_then(|list| list.iter_mut().find(|t| t.id == task_id))
        else {
            return Err(format!("No such task: {}/{}", course_id, task_id));
        };
        patch.apply_to(task);
        notify_tasks(&state, course_id);
        Ok(())
    }

    async fn delete_task(&self, course_id: &str, task_id: &str) -> Result<(), String> {
        let mut state = self.lock();
        // Deleting an absent document succeeds; delete is idempotent in
        // the remote store too.
        if let Some(list) = state.tasks.get_mut(course_id) {
            list.retain(|t| t.id != task_id);
        }
        notify_tasks(&state, course_id);
        Ok(())
    }
}
