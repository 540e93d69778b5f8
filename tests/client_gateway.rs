// File: tests/client_gateway.rs
// Wire-level behavior of the auth and document gateways against a mock
// server: request shapes, response decoding and provider error mapping.
use chrono::{Duration, TimeZone, Utc};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use studysync::client::auth::{AuthGateway, TokenBundle, TokenSource};
use studysync::client::{FirestoreClient, HttpClient};
use studysync::config::Config;
use studysync::model::{Priority, TaskDraft, TaskStatus, TaskUpdate};
use studysync::session::AuthError;

const DOCS: &str = "/projects/studysync-test/databases/(default)/documents";

fn test_config(url: &str) -> Config {
    Config {
        api_key: "key-123".to_string(),
        project_id: "studysync-test".to_string(),
        auth_url: url.to_string(),
        token_url: url.to_string(),
        firestore_url: url.to_string(),
        poll_secs: 1,
    }
}

fn gateway(server: &ServerGuard) -> AuthGateway {
    let http = HttpClient::new().unwrap();
    AuthGateway::new(http, &test_config(&server.url()))
}

/// A document client with a long-lived bearer token already installed,
/// so no request triggers a refresh.
async fn authorized_store(server: &ServerGuard) -> FirestoreClient {
    let http = HttpClient::new().unwrap();
    let config = test_config(&server.url());
    let tokens = TokenSource::new(AuthGateway::new(http.clone(), &config));
    tokens
        .install(&TokenBundle {
            id_token: "tok-abc".to_string(),
            refresh_token: "rt-1".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            uid: "u1".to_string(),
        })
        .await;
    FirestoreClient::new(http, &config, tokens)
}

fn key_query() -> Matcher {
    Matcher::UrlEncoded("key".into(), "key-123".into())
}

#[tokio::test]
async fn test_sign_in_decodes_token_bundle() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", "/accounts:signInWithPassword")
        .match_query(key_query())
        .match_body(Matcher::PartialJson(json!({
            "email": "ada@example.edu",
            "returnSecureToken": true,
        })))
        .with_status(200)
        .with_body(
            json!({
                "idToken": "tok-abc",
                "refreshToken": "rt-1",
                "expiresIn": "3600",
                "localId": "u1",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let bundle = gateway(&server)
        .sign_in("ada@example.edu", "hunter22")
        .await
        .unwrap();

    m.assert_async().await;
    assert_eq!(bundle.id_token, "tok-abc");
    assert_eq!(bundle.refresh_token, "rt-1");
    assert_eq!(bundle.uid, "u1");
    assert!(bundle.expires_at > Utc::now());
}

#[tokio::test]
async fn test_sign_in_maps_credential_errors() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/accounts:signInWithPassword")
        .match_query(key_query())
        .with_status(400)
        .with_body(json!({"error": {"message": "INVALID_LOGIN_CREDENTIALS"}}).to_string())
        .create_async()
        .await;

    let err = gateway(&server)
        .sign_in("ada@example.edu", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
    assert_eq!(err.to_string(), "Incorrect email or password.");
}

#[tokio::test]
async fn test_sign_up_passes_through_unmapped_codes() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/accounts:signUp")
        .match_query(key_query())
        .with_status(400)
        .with_body(
            json!({
                "error": {"message": "WEAK_PASSWORD : Password should be at least 6 characters"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = gateway(&server).sign_up("ada@example.edu", "ab").await.unwrap_err();
    // Unmapped codes surface as received, detail included.
    assert_eq!(
        err,
        AuthError::Provider(
            "WEAK_PASSWORD : Password should be at least 6 characters".to_string()
        )
    );
}

#[tokio::test]
async fn test_refresh_posts_form_encoded_grant() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", "/token")
        .match_query(key_query())
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::Exact(
            "grant_type=refresh_token&refresh_token=rt-9".to_string(),
        ))
        .with_status(200)
        .with_body(
            json!({
                "id_token": "tok-next",
                "refresh_token": "rt-10",
                "expires_in": "3600",
                "user_id": "u1",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let bundle = gateway(&server).refresh("rt-9").await.unwrap();

    m.assert_async().await;
    // The endpoint rotates the refresh token; callers must keep the new one.
    assert_eq!(bundle.refresh_token, "rt-10");
    assert_eq!(bundle.id_token, "tok-next");
}

#[tokio::test]
async fn test_password_reset_hides_unknown_accounts() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/accounts:sendOobCode")
        .match_query(key_query())
        .with_status(400)
        .with_body(json!({"error": {"message": "EMAIL_NOT_FOUND"}}).to_string())
        .create_async()
        .await;

    // Reported as success so the endpoint cannot be used to probe which
    // accounts exist.
    gateway(&server)
        .send_password_reset("nobody@example.edu")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_check_connection_rejects_bad_api_key() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/accounts:signInWithPassword")
        .match_query(key_query())
        .with_status(400)
        .with_body(
            json!({
                "error": {"message": "API key not valid. Please pass a valid API key."}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = gateway(&server).check_connection().await.unwrap_err();
    assert!(err.to_string().starts_with("API key not valid"));
}

#[tokio::test]
async fn test_check_connection_accepts_validation_rejection() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/accounts:signInWithPassword")
        .match_query(key_query())
        .with_status(400)
        .with_body(json!({"error": {"message": "MISSING_EMAIL"}}).to_string())
        .create_async()
        .await;

    // The probe sends an empty sign-in; a validation code means the key
    // itself was accepted.
    gateway(&server).check_connection().await.unwrap();
}

#[tokio::test]
async fn test_list_course_tasks_decodes_documents() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", format!("{}/courses/c1:runQuery", DOCS).as_str())
        .match_header("authorization", "Bearer tok-abc")
        .match_body(Matcher::PartialJson(json!({
            "structuredQuery": {"from": [{"collectionId": "tasks"}]}
        })))
        .with_status(200)
        .with_body(
            json!([
                {"document": {
                    "name": "projects/studysync-test/databases/(default)/documents/courses/c1/tasks/t-new",
                    "fields": {
                        "title": {"stringValue": "Lab 3"},
                        "description": {"stringValue": "Finish the write-up"},
                        "status": {"stringValue": "Pending"},
                        "priority": {"stringValue": "High"},
                        "dueDate": {"timestampValue": "2026-03-14T00:00:00Z"},
                        "assignedTo": {"stringValue": "u2"},
                        "createdAt": {"timestampValue": "2026-02-01T10:00:00Z"},
                    },
                }},
                {"document": {
                    "name": "projects/studysync-test/databases/(default)/documents/courses/c1/tasks/t-old",
                    "fields": {
                        "title": {"stringValue": "Quiz prep"},
                        "status": {"stringValue": "Completed"},
                        "dueDate": {"stringValue": "2026-02-20"},
                        "createdAt": {"timestampValue": "2026-01-15T08:30:00Z"},
                    },
                }},
                {"readTime": "2026-02-01T12:00:00Z"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let store = authorized_store(&server).await;
    let tasks = store.list_course_tasks("c1").await.unwrap();

    m.assert_async().await;
    // The trailing readTime-only row is not a document.
    assert_eq!(tasks.len(), 2);

    assert_eq!(tasks[0].id, "t-new");
    assert_eq!(tasks[0].course_id, "c1");
    assert_eq!(tasks[0].priority, Priority::High);
    assert_eq!(tasks[0].assigned_to, Some("u2".to_string()));
    assert_eq!(
        tasks[0].due,
        Some(Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap())
    );

    // Legacy documents store the due date as a plain YYYY-MM-DD string;
    // both shapes decode to the same midnight instant.
    assert_eq!(tasks[1].id, "t-old");
    assert_eq!(tasks[1].status, TaskStatus::Completed);
    assert_eq!(tasks[1].assigned_to, None);
    assert_eq!(
        tasks[1].due,
        Some(Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_get_course_treats_404_as_absent() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("{}/courses/ghost", DOCS).as_str())
        .match_header("authorization", "Bearer tok-abc")
        .with_status(404)
        .with_body(json!({"error": {"message": "Document not found"}}).to_string())
        .create_async()
        .await;

    let store = authorized_store(&server).await;
    assert_eq!(store.get_course("ghost").await.unwrap(), None);
}

#[tokio::test]
async fn test_create_task_sends_fields_and_returns_id() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", format!("{}/courses/c1/tasks", DOCS).as_str())
        .match_header("authorization", "Bearer tok-abc")
        // The field map sits at the top level of the body.
        .match_body(Matcher::PartialJson(json!({
            "fields": {
                "title": {"stringValue": "Lab 3"},
                "status": {"stringValue": "Pending"},
            }
        })))
        .with_status(200)
        .with_body(
            json!({
                "name": "projects/studysync-test/databases/(default)/documents/courses/c1/tasks/t-42",
                "fields": {},
            })
            .to_string(),
        )
        .create_async()
        .await;

    let draft = TaskDraft {
        title: "Lab 3".to_string(),
        description: String::new(),
        priority: Priority::Low,
        due: None,
        assigned_to: None,
        created_at: Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap(),
    };
    let store = authorized_store(&server).await;
    let id = store.create_task("c1", &draft).await.unwrap();

    m.assert_async().await;
    assert_eq!(id, "t-42");
}

#[tokio::test]
async fn test_update_task_patches_with_field_mask() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("PATCH", format!("{}/courses/c1/tasks/t-1", DOCS).as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("updateMask.fieldPaths".into(), "status".into()),
            Matcher::UrlEncoded("currentDocument.exists".into(), "true".into()),
        ]))
        .match_header("authorization", "Bearer tok-abc")
        .match_body(Matcher::PartialJson(json!({
            "fields": {"status": {"stringValue": "Completed"}}
        })))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let store = authorized_store(&server).await;
    store
        .update_task("c1", "t-1", &TaskUpdate::status(TaskStatus::Completed))
        .await
        .unwrap();

    m.assert_async().await;
}

#[tokio::test]
async fn test_list_users_follows_page_tokens() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", format!("{}/users", DOCS).as_str())
        .match_query(Matcher::Exact("pageSize=300".to_string()))
        .match_header("authorization", "Bearer tok-abc")
        .with_status(200)
        .with_body(
            json!({
                "documents": [{
                    "name": "projects/studysync-test/databases/(default)/documents/users/u1",
                    "fields": {
                        "email": {"stringValue": "ada@example.edu"},
                        "displayName": {"stringValue": "Ada"},
                    },
                }],
                "nextPageToken": "page-2",
            })
            .to_string(),
        )
        .create_async()
        .await;
    let second = server
        .mock("GET", format!("{}/users", DOCS).as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("pageSize".into(), "300".into()),
            Matcher::UrlEncoded("pageToken".into(), "page-2".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "documents": [{
                    "name": "projects/studysync-test/databases/(default)/documents/users/u2",
                    "fields": {
                        "email": {"stringValue": "grace@example.edu"},
                    },
                }],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let store = authorized_store(&server).await;
    let directory = store.list_users().await.unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(directory.len(), 2);
    assert_eq!(directory["u1"].email, "ada@example.edu");
    assert_eq!(directory["u1"].display_name, "Ada");
    assert_eq!(directory["u2"].email, "grace@example.edu");
}
