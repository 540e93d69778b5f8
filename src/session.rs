// File: ./src/session.rs
// The authentication seam: current identity, the identity-change stream,
// and the sign-in/up/out flows. CloudSession speaks the Identity Toolkit
// REST surface; MemorySession is the in-process stand-in used by tests.
use crate::backend::MemoryBackend;
use crate::client::auth::{AuthGateway, TokenSource};
use crate::client::core::HttpClient;
use crate::client::firestore::FirestoreClient;
use crate::config::Config;
use crate::context::AppContext;
use crate::model::UserProfile;
use crate::storage::{SessionStore, StoredSession};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use uuid::Uuid;

/// The authenticated user as the rest of the app sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
}

/// Authentication failures, mapped per provider code where the product
/// has a specific message, with raw passthrough otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    EmailExists,
    InvalidCredentials,
    UnverifiedEmail,
    UserDisabled,
    TooManyAttempts,
    /// Unmapped provider code; shown as received.
    Provider(String),
    /// Transport-level failure before any provider answer.
    Network(String),
}

impl AuthError {
    /// Maps a provider error message to the typed variant. Provider
    /// messages lead with the code, sometimes followed by detail
    /// ("WEAK_PASSWORD : Password should be at least 6 characters").
    pub fn from_provider(raw: &str) -> Self {
        let code = raw
            .split_whitespace()
            .next()
            .unwrap_or(raw)
            .trim_end_matches(':');
        match code {
            "EMAIL_EXISTS" => AuthError::EmailExists,
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
                AuthError::InvalidCredentials
            }
            "USER_DISABLED" => AuthError::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
            _ => AuthError::Provider(raw.to_string()),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::EmailExists => {
                write!(f, "That email is already registered. Try logging in instead.")
            }
            AuthError::InvalidCredentials => write!(f, "Incorrect email or password."),
            AuthError::UnverifiedEmail => write!(
                f,
                "Your email is not verified yet. Please check your inbox and click the verification link."
            ),
            AuthError::UserDisabled => write!(f, "This account has been disabled."),
            AuthError::TooManyAttempts => {
                write!(f, "Too many attempts. Please try again later.")
            }
            AuthError::Provider(raw) => write!(f, "{}", raw),
            AuthError::Network(e) => write!(f, "Connection failed: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

/// Supplies the current identity and the flows that change it.
///
/// `watch_identity` is the identity-change stream: `None` while logged
/// out, `Some` after a verified sign-in, `None` again after sign-out.
/// Dropping the receiver unsubscribes.
pub trait SessionProvider: Clone + Send + Sync + 'static {
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>>;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Creates the account, sets its display name, writes the profile
    /// record, and sends the verification email. The new identity is
    /// returned but NOT published: the user signs in after verifying.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    fn request_password_reset(&self, email: &str)
    -> impl Future<Output = Result<(), AuthError>> + Send;

    fn sign_out(&self) -> impl Future<Output = ()> + Send;
}

// --- IN-MEMORY PROVIDER ---

struct MemoryAccount {
    uid: String,
    password: String,
    display_name: String,
    verified: bool,
}

/// In-process accounts with the same gating rules as the cloud provider.
/// Optionally wired to a [`MemoryBackend`] so sign-up writes the profile
/// record the way the real flow does.
#[derive(Clone)]
pub struct MemorySession {
    accounts: Arc<Mutex<HashMap<String, MemoryAccount>>>,
    identity_tx: Arc<watch::Sender<Option<Identity>>>,
    backend: Option<MemoryBackend>,
}

impl MemorySession {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            identity_tx: Arc::new(tx),
            backend: None,
        }
    }

    /// Sign-ups write their profile record into `backend`.
    pub fn connected(backend: MemoryBackend) -> Self {
        let mut session = Self::new();
        session.backend = Some(backend);
        session
    }

    /// Seeds an account directly, returning its uid.
    pub fn seed_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        verified: bool,
    ) -> String {
        let uid = Uuid::new_v4().to_string();
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            MemoryAccount {
                uid: uid.clone(),
                password: password.to_string(),
                display_name: display_name.to_string(),
                verified,
            },
        );
        if let Some(backend) = &self.backend {
            backend.add_profile(UserProfile {
                id: uid.clone(),
                email: email.to_string(),
                display_name: display_name.to_string(),
            });
        }
        uid
    }

    /// Simulates the user clicking the verification link.
    pub fn mark_verified(&self, email: &str) {
        if let Some(account) = self.accounts.lock().unwrap().get_mut(email) {
            account.verified = true;
        }
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProvider for MemorySession {
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = {
            let accounts = self.accounts.lock().unwrap();
            let Some(account) = accounts.get(email) else {
                return Err(AuthError::InvalidCredentials);
            };
            if account.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            if !account.verified {
                return Err(AuthError::UnverifiedEmail);
            }
            Identity {
                uid: account.uid.clone(),
                email: email.to_string(),
                display_name: account.display_name.clone(),
                email_verified: true,
            }
        };
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let uid = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(AuthError::EmailExists);
            }
            let uid = Uuid::new_v4().to_string();
            accounts.insert(
                email.to_string(),
                MemoryAccount {
                    uid: uid.clone(),
                    password: password.to_string(),
                    display_name: display_name.to_string(),
                    verified: false,
                },
            );
            uid
        };
        if let Some(backend) = &self.backend {
            backend.add_profile(UserProfile {
                id: uid.clone(),
                email: email.to_string(),
                display_name: display_name.to_string(),
            });
        }
        Ok(Identity {
            uid,
            email: email.to_string(),
            display_name: display_name.to_string(),
            email_verified: false,
        })
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), AuthError> {
        // Neutral outcome either way; existence is never disclosed.
        Ok(())
    }

    async fn sign_out(&self) {
        self.identity_tx.send_replace(None);
    }
}

// --- CLOUD PROVIDER ---

/// Identity Toolkit REST sessions with refresh-token persistence.
#[derive(Clone)]
pub struct CloudSession {
    gateway: AuthGateway,
    store: FirestoreClient,
    tokens: TokenSource,
    identity_tx: Arc<watch::Sender<Option<Identity>>>,
    session_path: Option<PathBuf>,
}

impl CloudSession {
    pub fn new(http: HttpClient, config: &Config, ctx: &dyn AppContext) -> Self {
        let gateway = AuthGateway::new(http.clone(), config);
        let tokens = TokenSource::new(gateway.clone());
        let store = FirestoreClient::new(http, config, tokens.clone());
        let (tx, _) = watch::channel(None);
        Self {
            gateway,
            store,
            tokens,
            identity_tx: Arc::new(tx),
            session_path: ctx.get_session_path(),
        }
    }

    /// The token cache the document gateway authenticates with.
    pub fn token_source(&self) -> TokenSource {
        self.tokens.clone()
    }

    /// Resumes the persisted session, if any. Every failure here falls
    /// back to the logged-out state; the user can always just log in
    /// again.
    pub async fn restore(&self) -> Option<Identity> {
        let path = self.session_path.as_deref()?;
        let stored = match SessionStore::load(path) {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Could not read session file: {}", e);
                return None;
            }
        };

        let bundle = match self.gateway.refresh(&stored.refresh_token).await {
            Ok(bundle) => bundle,
            Err(e) => {
                log::warn!("Stored session rejected, logging out: {}", e);
                let _ = SessionStore::clear(path);
                return None;
            }
        };
        self.tokens.install(&bundle).await;

        let snapshot = match self.gateway.lookup(&bundle.id_token).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Account lookup failed during restore: {}", e);
                self.tokens.clear().await;
                let _ = SessionStore::clear(path);
                return None;
            }
        };
        if !snapshot.email_verified {
            self.tokens.clear().await;
            let _ = SessionStore::clear(path);
            return None;
        }

        // The exchange rotates the refresh token; persist the new one.
        self.persist(&bundle.refresh_token, &snapshot.uid, &snapshot.email, &snapshot.display_name);

        let identity = Identity {
            uid: snapshot.uid,
            email: snapshot.email,
            display_name: snapshot.display_name,
            email_verified: true,
        };
        self.identity_tx.send_replace(Some(identity.clone()));
        Some(identity)
    }

    fn persist(&self, refresh_token: &str, uid: &str, email: &str, display_name: &str) {
        let Some(path) = self.session_path.as_deref() else {
            return;
        };
        let stored = StoredSession {
            refresh_token: refresh_token.to_string(),
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
        };
        if let Err(e) = SessionStore::save(path, &stored) {
            // Sign-in still works for this run; only resume is lost.
            log::warn!("Could not persist session: {}", e);
        }
    }
}

impl SessionProvider for CloudSession {
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let bundle = self.gateway.sign_in(email, password).await?;
        let snapshot = self.gateway.lookup(&bundle.id_token).await?;
        if !snapshot.email_verified {
            // Discard the minted tokens; the account stays logged out.
            return Err(AuthError::UnverifiedEmail);
        }
        self.tokens.install(&bundle).await;
        self.persist(&bundle.refresh_token, &snapshot.uid, &snapshot.email, &snapshot.display_name);
        let identity = Identity {
            uid: snapshot.uid,
            email: snapshot.email,
            display_name: snapshot.display_name,
            email_verified: true,
        };
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let bundle = self.gateway.sign_up(email, password).await?;
        self.gateway
            .set_display_name(&bundle.id_token, display_name)
            .await?;
        self.store
            .write_user_profile(&bundle.id_token, &bundle.uid, email, display_name)
            .await
            .map_err(AuthError::Network)?;
        self.gateway
            .send_verification_email(&bundle.id_token)
            .await?;
        Ok(Identity {
            uid: bundle.uid,
            email: email.to_string(),
            display_name: display_name.to_string(),
            email_verified: false,
        })
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.gateway.send_password_reset(email).await
    }

    async fn sign_out(&self) {
        self.tokens.clear().await;
        if let Some(path) = self.session_path.as_deref()
            && let Err(e) = SessionStore::clear(path)
        {
            log::warn!("Could not clear session file: {}", e);
        }
        self.identity_tx.send_replace(None);
    }
}
