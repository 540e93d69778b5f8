// File: tests/session_restore.rs
// CloudSession lifecycle against a mock identity provider: resuming a
// persisted session, refresh-token rotation, and the verified-email gate.
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use studysync::client::HttpClient;
use studysync::config::Config;
use studysync::context::{AppContext, TestContext};
use studysync::session::{AuthError, CloudSession, SessionProvider};
use studysync::storage::{SessionStore, StoredSession};

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

fn session_for(server: &ServerGuard, ctx: &TestContext) -> CloudSession {
    let http = HttpClient::new().unwrap();
    CloudSession::new(http, &test_config(&server.url()), ctx)
}

fn seed_session_file(ctx: &TestContext, refresh_token: &str) {
    let path = ctx.get_session_path().unwrap();
    let stored = StoredSession {
        refresh_token: refresh_token.to_string(),
        uid: "u1".to_string(),
        email: "ada@example.edu".to_string(),
        display_name: "Ada".to_string(),
    };
    SessionStore::save(&path, &stored).unwrap();
}

async fn mock_refresh(server: &mut ServerGuard, old_token: &str, new_token: &str) -> Mock {
    server
        .mock("POST", "/token")
        .match_query(Matcher::Any)
        .match_body(Matcher::Exact(format!(
            "grant_type=refresh_token&refresh_token={}",
            old_token
        )))
        .with_status(200)
        .with_body(
            json!({
                "id_token": "tok-next",
                "refresh_token": new_token,
                "expires_in": "3600",
                "user_id": "u1",
            })
            .to_string(),
        )
        .create_async()
        .await
}

async fn mock_lookup(server: &mut ServerGuard, verified: bool) -> Mock {
    server
        .mock("POST", "/accounts:lookup")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({"idToken": "tok-next"})))
        .with_status(200)
        .with_body(
            json!({
                "users": [{
                    "localId": "u1",
                    "email": "ada@example.edu",
                    "displayName": "Ada",
                    "emailVerified": verified,
                }],
            })
            .to_string(),
        )
        .create_async()
        .await
}

#[tokio::test]
async fn test_restore_publishes_identity_and_rotates_token() {
    let mut server = Server::new_async().await;
    let ctx = TestContext::new();
    seed_session_file(&ctx, "rt-old");

    let refresh = mock_refresh(&mut server, "rt-old", "rt-new").await;
    let lookup = mock_lookup(&mut server, true).await;

    let session = session_for(&server, &ctx);
    let identity = session.restore().await.unwrap();

    refresh.assert_async().await;
    lookup.assert_async().await;
    assert_eq!(identity.uid, "u1");
    assert_eq!(identity.email, "ada@example.edu");
    assert_eq!(identity.display_name, "Ada");
    assert!(identity.email_verified);

    // The restored identity is published on the watch channel.
    assert!(session.watch_identity().borrow().is_some());

    // The exchange rotated the refresh token; the file must carry the
    // new one or the next restart logs the user out.
    let path = ctx.get_session_path().unwrap();
    let stored = SessionStore::load(&path).unwrap().unwrap();
    assert_eq!(stored.refresh_token, "rt-new");
}

#[tokio::test]
async fn test_restore_without_file_stays_logged_out() {
    let server = Server::new_async().await;
    let ctx = TestContext::new();

    let session = session_for(&server, &ctx);
    assert_eq!(session.restore().await, None);
    assert!(session.watch_identity().borrow().is_none());
}

#[tokio::test]
async fn test_restore_with_rejected_token_clears_the_file() {
    let mut server = Server::new_async().await;
    let ctx = TestContext::new();
    seed_session_file(&ctx, "rt-dead");

    server
        .mock("POST", "/token")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(json!({"error": {"message": "TOKEN_EXPIRED"}}).to_string())
        .create_async()
        .await;

    let session = session_for(&server, &ctx);
    assert_eq!(session.restore().await, None);

    // The stale file is gone, so the next start skips the doomed refresh.
    let path = ctx.get_session_path().unwrap();
    assert_eq!(SessionStore::load(&path).unwrap(), None);
}

#[tokio::test]
async fn test_restore_logs_out_unverified_accounts() {
    let mut server = Server::new_async().await;
    let ctx = TestContext::new();
    seed_session_file(&ctx, "rt-old");

    let _refresh = mock_refresh(&mut server, "rt-old", "rt-new").await;
    let _lookup = mock_lookup(&mut server, false).await;

    let session = session_for(&server, &ctx);
    assert_eq!(session.restore().await, None);
    assert!(session.watch_identity().borrow().is_none());

    let path = ctx.get_session_path().unwrap();
    assert_eq!(SessionStore::load(&path).unwrap(), None);
}

#[tokio::test]
async fn test_sign_in_persists_session_and_sign_out_clears_it() {
    let mut server = Server::new_async().await;
    let ctx = TestContext::new();

    server
        .mock("POST", "/accounts:signInWithPassword")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "idToken": "tok-next",
                "refreshToken": "rt-1",
                "expiresIn": "3600",
                "localId": "u1",
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _lookup = mock_lookup(&mut server, true).await;

    let session = session_for(&server, &ctx);
    let identity = session.sign_in("ada@example.edu", "hunter22").await.unwrap();
    assert_eq!(identity.uid, "u1");
    assert!(session.watch_identity().borrow().is_some());

    let path = ctx.get_session_path().unwrap();
    let stored = SessionStore::load(&path).unwrap().unwrap();
    assert_eq!(stored.refresh_token, "rt-1");
    assert_eq!(stored.email, "ada@example.edu");

    session.sign_out().await;
    assert!(session.watch_identity().borrow().is_none());
    assert_eq!(SessionStore::load(&path).unwrap(), None);
}

#[tokio::test]
async fn test_sign_in_gates_unverified_email() {
    let mut server = Server::new_async().await;
    let ctx = TestContext::new();

    server
        .mock("POST", "/accounts:signInWithPassword")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "idToken": "tok-next",
                "refreshToken": "rt-1",
                "expiresIn": "3600",
                "localId": "u1",
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _lookup = mock_lookup(&mut server, false).await;

    let session = session_for(&server, &ctx);
    let err = session
        .sign_in("ada@example.edu", "hunter22")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::UnverifiedEmail);

    // Nothing was published or persisted; the account stays logged out.
    assert!(session.watch_identity().borrow().is_none());
    let path = ctx.get_session_path().unwrap();
    assert_eq!(SessionStore::load(&path).unwrap(), None);
}
