// File: ./src/client/firestore.rs
// Document-store gateway: typed calls over the Firestore v1 REST surface,
// plus the poll-based CloudBackend that presents them as live
// subscriptions.
use crate::backend::{Subscription, SubscriptionGuard, TaskBackend};
use crate::client::auth::TokenSource;
use crate::client::core::{HttpClient, response_error};
use crate::config::Config;
use crate::model::{Course, Directory, Task, TaskDraft, TaskUpdate, adapter};
use chrono::Utc;
use http::{Method, StatusCode};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};

#[derive(Clone)]
pub struct FirestoreClient {
    http: HttpClient,
    /// `{firestore_url}/projects/{pid}/databases/(default)/documents`
    base_url: String,
    tokens: TokenSource,
}

impl FirestoreClient {
    pub fn new(http: HttpClient, config: &Config, tokens: TokenSource) -> Self {
        Self {
            http,
            base_url: format!("{}/{}", config.firestore_url, config.documents_root()),
            tokens,
        }
    }

    async fn request(
        &self,
        op: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), String> {
        let bearer = self.tokens.bearer().await?;
        self.http
            .request_json(method, url, Some(&bearer), body)
            .await
            .map_err(|e| format!("{} failed: {}", op, e))
    }

    /// Runs a structured query against `parent` (empty for the root) and
    /// decodes the matched documents.
    async fn run_query(&self, op: &str, parent: &str, query: Value) -> Result<Vec<Value>, String> {
        let url = if parent.is_empty() {
            format!("{}:runQuery", self.base_url)
        } else {
            format!("{}/{}:runQuery", self.base_url, parent)
        };
        let body = json!({"structuredQuery": query});
        let (status, value) = self.request(op, Method::POST, &url, Some(&body)).await?;
        if !status.is_success() {
            return Err(response_error(op, status, &value));
        }
        // The response is an array of result entries; rows matched by the
        // query carry a "document" key, trailing entries only a readTime.
        let rows = value.as_array().cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("document").cloned())
            .collect())
    }

    fn decode_document<T>(doc: &Value, decode: impl Fn(&str, &Value) -> Option<T>) -> Option<T> {
        let name = doc.get("name")?.as_str()?;
        let fields = doc.get("fields").cloned().unwrap_or_else(|| json!({}));
        decode(name, &fields)
    }

    // --- READS ---

    pub async fn list_courses_for(&self, uid: &str) -> Result<Vec<Course>, String> {
        let query = json!({
            "from": [{"collectionId": "courses"}],
            "where": {"fieldFilter": {
                "field": {"fieldPath": "members"},
                "op": "ARRAY_CONTAINS",
                "value": {"stringValue": uid},
            }},
        });
        let docs = self.run_query("List courses", "", query).await?;
        Ok(docs
            .iter()
            .filter_map(|d| Self::decode_document(d, adapter::course_from_document))
            .collect())
    }

    pub async fn list_users(&self) -> Result<Directory, String> {
        let mut directory = Directory::new();
        let mut page_token = String::new();
        loop {
            let url = if page_token.is_empty() {
                format!("{}/users?pageSize=300", self.base_url)
            } else {
                format!("{}/users?pageSize=300&pageToken={}", self.base_url, page_token)
            };
            let (status, value) = self.request("List users", Method::GET, &url, None).await?;
            if !status.is_success() {
                return Err(response_error("List users", status, &value));
            }
            if let Some(docs) = value.get("documents").and_then(Value::as_array) {
                for doc in docs {
                    if let Some(profile) =
                        Self::decode_document(doc, adapter::profile_from_document)
                    {
                        directory.insert(profile.id.clone(), profile);
                    }
                }
            }
            match value.get("nextPageToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = token.to_string(),
                _ => break,
            }
        }
        Ok(directory)
    }

    pub async fn get_course(&self, course_id: &str) -> Result<Option<Course>, String> {
        let url = format!("{}/courses/{}", self.base_url, course_id);
        let (status, value) = self.request("Load course", Method::GET, &url, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(response_error("Load course", status, &value));
        }
        Ok(Self::decode_document(&value, adapter::course_from_document))
    }

    pub async fn list_course_tasks(&self, course_id: &str) -> Result<Vec<Task>, String> {
        let query = json!({
            "from": [{"collectionId": "tasks"}],
            "orderBy": [{"field": {"fieldPath": "createdAt"}, "direction": "DESCENDING"}],
        });
        let parent = format!("courses/{}", course_id);
        let docs = self.run_query("List tasks", &parent, query).await?;
        Ok(docs
            .iter()
            .filter_map(|d| Self::decode_document(d, adapter::task_from_document))
            .collect())
    }

    /// Collection-group query: every `tasks` document regardless of the
    /// owning course.
    pub async fn list_all_tasks(&self) -> Result<Vec<Task>, String> {
        let query = json!({
            "from": [{"collectionId": "tasks", "allDescendants": true}],
            "orderBy": [{"field": {"fieldPath": "createdAt"}, "direction": "DESCENDING"}],
        });
        let docs = self.run_query("List tasks", "", query).await?;
        Ok(docs
            .iter()
            .filter_map(|d| Self::decode_document(d, adapter::task_from_document))
            .collect())
    }

    // --- WRITES ---

    pub async fn create_task(&self, course_id: &str, draft: &TaskDraft) -> Result<String, String> {
        let url = format!("{}/courses/{}/tasks", self.base_url, course_id);
        let body = adapter::draft_to_fields(draft);
        let (status, value) = self
            .request("Create task", Method::POST, &url, Some(&body))
            .await?;
        if !status.is_success() {
            return Err(response_error("Create task", status, &value));
        }
        value
            .get("name")
            .and_then(Value::as_str)
            .map(adapter::document_id)
            .ok_or_else(|| "Create task failed: response carried no document name".to_string())
    }

    pub async fn update_task(
        &self,
        course_id: &str,
        task_id: &str,
        patch: &TaskUpdate,
    ) -> Result<(), String> {
        let (body, mask) = adapter::update_to_fields(patch);
        if mask.is_empty() {
            return Ok(());
        }
        let mask_params: Vec<String> = mask
            .iter()
            .map(|f| format!("updateMask.fieldPaths={}", f))
            .collect();
        // currentDocument.exists so a patch never resurrects a deleted task.
        let url = format!(
            "{}/courses/{}/tasks/{}?{}&currentDocument.exists=true",
            self.base_url,
            course_id,
            task_id,
            mask_params.join("&")
        );
        let (status, value) = self
            .request("Update task", Method::PATCH, &url, Some(&body))
            .await?;
        if !status.is_success() {
            return Err(response_error("Update task", status, &value));
        }
        Ok(())
    }

    pub async fn delete_task(&self, course_id: &str, task_id: &str) -> Result<(), String> {
        let url = format!("{}/courses/{}/tasks/{}", self.base_url, course_id, task_id);
        let (status, value) = self
            .request("Delete task", Method::DELETE, &url, None)
            .await?;
        if !status.is_success() {
            return Err(response_error("Delete task", status, &value));
        }
        Ok(())
    }

    /// Profile write during registration. Runs under the freshly minted
    /// sign-up token, before any token is installed in the shared source.
    pub async fn write_user_profile(
        &self,
        bearer: &str,
        uid: &str,
        email: &str,
        display_name: &str,
    ) -> Result<(), String> {
        let url = format!("{}/users/{}", self.base_url, uid);
        let body = adapter::profile_to_fields(email, display_name, Utc::now());
        let (status, value) = self
            .http
            .request_json(Method::PATCH, &url, Some(bearer), Some(&body))
            .await
            .map_err(|e| format!("Save profile failed: {}", e))?;
        if !status.is_success() {
            return Err(response_error("Save profile", status, &value));
        }
        Ok(())
    }
}

/// Live subscriptions over a poll loop. Each subscription owns a tokio
/// task that re-fetches its snapshot every `poll_secs` (or immediately
/// after a local mutation, via the shared `Notify`) and pushes it into a
/// watch channel only when it actually changed, so consumers never see
/// spurious wakeups.
#[derive(Clone)]
pub struct CloudBackend {
    store: FirestoreClient,
    poll_interval: Duration,
    refresh: Arc<Notify>,
}

impl CloudBackend {
    pub fn new(store: FirestoreClient, poll_secs: u64) -> Self {
        Self {
            store,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            refresh: Arc::new(Notify::new()),
        }
    }

    fn spawn_poll<T, F, Fut>(&self, label: String, initial: T, fetch: F) -> Subscription<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, String>> + Send,
    {
        let (tx, rx) = watch::channel(initial);
        let interval = self.poll_interval;
        let refresh = Arc::clone(&self.refresh);
        let poll_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut confirmed = false;
            loop {
                match fetch().await {
                    Ok(snapshot) => {
                        if confirmed {
                            tx.send_if_modified(|current| {
                                if *current != snapshot {
                                    *current = snapshot;
                                    true
                                } else {
                                    false
                                }
                            });
                        } else {
                            // The first fetch always notifies, even when it
                            // matches the placeholder: consumers wait on it
                            // to tell "still loading" from "really empty".
                            confirmed = true;
                            tx.send_replace(snapshot);
                        }
                    }
                    // Polls carry no retry logic of their own; the next tick
                    // is the retry.
                    Err(e) => log::warn!("{} poll failed: {}", poll_label, e),
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = refresh.notified() => {}
                }
            }
        });
        Subscription::pending(rx, SubscriptionGuard::new(label, move || handle.abort()))
    }

    /// Wakes every active poll loop so a local mutation is reflected
    /// without waiting out the interval.
    fn poke(&self) {
        self.refresh.notify_waiters();
    }
}

impl TaskBackend for CloudBackend {
    fn subscribe_courses(&self, uid: &str) -> Subscription<Vec<Course>> {
        let store = self.store.clone();
        let uid = uid.to_string();
        let label = format!("courses[{}]", uid);
        self.spawn_poll(label, Vec::new(), move || {
            let store = store.clone();
            let uid = uid.clone();
            async move { store.list_courses_for(&uid).await }
        })
    }

    fn subscribe_users(&self) -> Subscription<Directory> {
        let store = self.store.clone();
        self.spawn_poll("users".to_string(), Directory::new(), move || {
            let store = store.clone();
            async move { store.list_users().await }
        })
    }

    fn subscribe_course(&self, course_id: &str) -> Subscription<Option<Course>> {
        let store = self.store.clone();
        let course_id = course_id.to_string();
        let label = format!("course[{}]", course_id);
        self.spawn_poll(label, None, move || {
            let store = store.clone();
            let course_id = course_id.clone();
            async move { store.get_course(&course_id).await }
        })
    }

    fn subscribe_course_tasks(&self, course_id: &str) -> Subscription<Vec<Task>> {
        let store = self.store.clone();
        let course_id = course_id.to_string();
        let label = format!("tasks[{}]", course_id);
        self.spawn_poll(label, Vec::new(), move || {
            let store = store.clone();
            let course_id = course_id.clone();
            async move { store.list_course_tasks(&course_id).await }
        })
    }

    fn subscribe_all_tasks(&self) -> Subscription<Vec<Task>> {
        let store = self.store.clone();
        self.spawn_poll("all-tasks".to_string(), Vec::new(), move || {
            let store = store.clone();
            async move { store.list_all_tasks().await }
        })
    }

    async fn create_task(&self, course_id: &str, draft: TaskDraft) -> Result<String, String> {
        let id = self.store.create_task(course_id, &draft).await?;
        self.poke();
        Ok(id)
    }

    async fn update_task(
        &self,
        course_id: &str,
        task_id: &str,
        patch: TaskUpdate,
    ) -> Result<(), String> {
        self.store.update_task(course_id, task_id, &patch).await?;
        self.poke();
        Ok(())
    }

    async fn delete_task(&self, course_id: &str, task_id: &str) -> Result<(), String> {
        self.store.delete_task(course_id, task_id).await?;
        self.poke();
        Ok(())
    }
}
