// File: ./src/tui/network.rs
// Manages background network operations for the TUI.
use crate::backend::{Subscription, TaskBackend};
use crate::cache::Cache;
use crate::context::AppContext;
use crate::controller::TaskController;
use crate::model::{Course, Task};
use crate::session::{Identity, SessionProvider};
use crate::tui::action::{Action, AppEvent};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;

/// Pumps one subscription into the UI event channel. Aborting the task
/// drops the subscription, which releases it backend-side.
fn forward<T, F>(mut sub: Subscription<T>, event_tx: Sender<AppEvent>, mut wrap: F) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
    F: FnMut(T) -> AppEvent + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(snapshot) = sub.next().await {
            if event_tx.send(wrap(snapshot)).await.is_err() {
                break;
            }
        }
    })
}

/// The subscriptions currently held open, split by scope. Course
/// subscriptions close when the course screen is left; account
/// subscriptions close on sign-out.
#[derive(Default)]
struct ActiveSubscriptions {
    account: Vec<JoinHandle<()>>,
    course: Vec<JoinHandle<()>>,
}

impl ActiveSubscriptions {
    fn close_course(&mut self) {
        for handle in self.course.drain(..) {
            handle.abort();
        }
    }

    fn close_all(&mut self) {
        self.close_course();
        for handle in self.account.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ActiveSubscriptions {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Mirrors the account-wide snapshots to disk so the next launch can
/// draw the dashboard before the first live snapshot lands.
struct DashboardCacheWriter {
    ctx: Arc<dyn AppContext>,
    uid: String,
    last: Mutex<(Vec<Course>, Vec<Task>)>,
}

impl DashboardCacheWriter {
    fn new(ctx: Arc<dyn AppContext>, uid: &str) -> Self {
        Self {
            ctx,
            uid: uid.to_string(),
            last: Mutex::new((vec![], vec![])),
        }
    }

    fn set_courses(&self, courses: &[Course]) {
        let mut last = self.last.lock().unwrap();
        last.0 = courses.to_vec();
        self.save(&last);
    }

    fn set_tasks(&self, tasks: &[Task]) {
        let mut last = self.last.lock().unwrap();
        last.1 = tasks.to_vec();
        self.save(&last);
    }

    fn save(&self, last: &(Vec<Course>, Vec<Task>)) {
        if let Err(e) = Cache::save_dashboard(self.ctx.as_ref(), &self.uid, &last.0, &last.1) {
            log::warn!("Failed to save dashboard cache: {}", e);
        }
    }
}

/// Replays the cached dashboard, if any, ahead of the live snapshots.
async fn warm_start(ctx: &Arc<dyn AppContext>, uid: &str, event_tx: &Sender<AppEvent>) {
    match Cache::load_dashboard(ctx.as_ref(), uid) {
        Ok((courses, tasks)) => {
            if !courses.is_empty() || !tasks.is_empty() {
                let _ = event_tx.send(AppEvent::CoursesChanged(courses)).await;
                let _ = event_tx.send(AppEvent::AllTasksChanged(tasks)).await;
            }
        }
        Err(e) => log::warn!("Failed to load dashboard cache: {}", e),
    }
}

fn open_account_subscriptions<B: TaskBackend>(
    backend: &B,
    ctx: &Arc<dyn AppContext>,
    uid: &str,
    event_tx: &Sender<AppEvent>,
) -> Vec<JoinHandle<()>> {
    let writer = Arc::new(DashboardCacheWriter::new(Arc::clone(ctx), uid));
    let courses_writer = Arc::clone(&writer);
    let tasks_writer = Arc::clone(&writer);
    vec![
        forward(
            backend.subscribe_courses(uid),
            event_tx.clone(),
            move |courses: Vec<Course>| {
                courses_writer.set_courses(&courses);
                AppEvent::CoursesChanged(courses)
            },
        ),
        forward(
            backend.subscribe_users(),
            event_tx.clone(),
            AppEvent::UsersChanged,
        ),
        forward(
            backend.subscribe_all_tasks(),
            event_tx.clone(),
            move |tasks: Vec<Task>| {
                tasks_writer.set_tasks(&tasks);
                AppEvent::AllTasksChanged(tasks)
            },
        ),
    ]
}

/// Cache replay first, then the live subscriptions, then the signed-in
/// event itself. The UI applies snapshots in arrival order, so cached
/// data is already in the store by the time the dashboard first draws.
async fn open_session<B: TaskBackend>(
    backend: &B,
    ctx: &Arc<dyn AppContext>,
    subs: &mut ActiveSubscriptions,
    identity: Identity,
    event_tx: &Sender<AppEvent>,
) {
    subs.close_all();
    warm_start(ctx, &identity.uid, event_tx).await;
    subs.account = open_account_subscriptions(backend, ctx, &identity.uid, event_tx);
    let _ = event_tx.send(AppEvent::SignedIn(identity)).await;
}

pub async fn run_network_actor<B, S>(
    backend: B,
    session: S,
    ctx: Arc<dyn AppContext>,
    mut action_rx: Receiver<Action>,
    event_tx: Sender<AppEvent>,
) where
    B: TaskBackend,
    S: SessionProvider,
{
    let controller = TaskController::new(backend.clone());
    let mut subs = ActiveSubscriptions::default();

    // The runner resumed any persisted session before spawning us; the
    // identity channel holds the outcome.
    let restored = session.watch_identity().borrow().clone();
    match restored {
        Some(identity) => open_session(&backend, &ctx, &mut subs, identity, &event_tx).await,
        None => {
            let _ = event_tx.send(AppEvent::SignedOut).await;
        }
    }

    while let Some(action) = action_rx.recv().await {
        match action {
            Action::Quit => break,

            Action::SignIn { email, password } => {
                let _ = event_tx
                    .send(AppEvent::Status("Signing in...".to_string()))
                    .await;
                match session.sign_in(&email, &password).await {
                    Ok(identity) => {
                        open_session(&backend, &ctx, &mut subs, identity, &event_tx).await;
                    }
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::AuthFailed(e.to_string())).await;
                    }
                }
            }

            Action::SignUp {
                email,
                password,
                display_name,
            } => {
                let _ = event_tx
                    .send(AppEvent::Status("Creating account...".to_string()))
                    .await;
                match session.sign_up(&email, &password, &display_name).await {
                    Ok(_) => {
                        let _ = event_tx.send(AppEvent::Registered).await;
                    }
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::AuthFailed(e.to_string())).await;
                    }
                }
            }

            Action::RequestReset { email } => {
                match session.request_password_reset(&email).await {
                    Ok(()) => {
                        let _ = event_tx.send(AppEvent::ResetRequested).await;
                    }
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::AuthFailed(e.to_string())).await;
                    }
                }
            }

            Action::SignOut => {
                subs.close_all();
                session.sign_out().await;
                let _ = event_tx.send(AppEvent::SignedOut).await;
            }

            Action::OpenCourse(course_id) => {
                subs.close_course();
                subs.course = vec![
                    forward(
                        backend.subscribe_course(&course_id),
                        event_tx.clone(),
                        AppEvent::CourseChanged,
                    ),
                    forward(
                        backend.subscribe_course_tasks(&course_id),
                        event_tx.clone(),
                        AppEvent::CourseTasksChanged,
                    ),
                ];
            }

            Action::LeaveCourse => {
                subs.close_course();
            }

            Action::CreateTask { course_id, form } => {
                match controller.create_task(&course_id, &form).await {
                    Ok(_) => {
                        let _ = event_tx
                            .send(AppEvent::Status("Task created.".to_string()))
                            .await;
                    }
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::Error(e.to_string())).await;
                    }
                }
            }

            Action::SaveEdits {
                course_id,
                task_id,
                form,
            } => match controller.save_edits(&course_id, &task_id, &form).await {
                Ok(()) => {
                    let _ = event_tx
                        .send(AppEvent::Status("Task updated.".to_string()))
                        .await;
                }
                Err(e) => {
                    let _ = event_tx.send(AppEvent::Error(e.to_string())).await;
                }
            },

            Action::ToggleTask(task) => {
                if let Err(e) = controller.toggle_status(&task).await {
                    let _ = event_tx.send(AppEvent::Error(e.to_string())).await;
                }
            }

            Action::ChangePriority(task, priority) => {
                if let Err(e) = controller.change_priority(&task, priority).await {
                    let _ = event_tx.send(AppEvent::Error(e.to_string())).await;
                }
            }

            Action::ChangeDue(task, due_input) => {
                if let Err(e) = controller.change_due_date(&task, &due_input).await {
                    let _ = event_tx.send(AppEvent::Error(e.to_string())).await;
                }
            }

            Action::DeleteTask { course_id, task_id } => {
                match controller.delete_task(&course_id, &task_id).await {
                    Ok(()) => {
                        let _ = event_tx
                            .send(AppEvent::Status("Task deleted.".to_string()))
                            .await;
                    }
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::Error(e.to_string())).await;
                    }
                }
            }
        }
    }
}
