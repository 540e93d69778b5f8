// File: ./src/client/auth.rs
// Identity Toolkit endpoints (sign-up/sign-in/lookup/oob codes) plus the
// refresh-token exchange and the shared bearer-token cache.
use crate::client::core::{HttpClient, error_message};
use crate::config::Config;
use crate::session::AuthError;
use chrono::{DateTime, Duration, Utc};
use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;

// Refresh this long before the ID token actually expires.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Tokens minted by a successful sign-up, sign-in, or refresh.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub uid: String,
}

/// Account state as the provider reports it.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "idToken")]
    id_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    #[serde(rename = "expiresIn")]
    expires_in: String,
    #[serde(rename = "localId")]
    local_id: String,
}

// The securetoken endpoint uses snake_case names.
#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
struct LookupUser {
    #[serde(rename = "localId")]
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default, rename = "displayName")]
    display_name: String,
    #[serde(default, rename = "emailVerified")]
    email_verified: bool,
}

fn expiry(expires_in: &str) -> DateTime<Utc> {
    let secs = expires_in.parse::<i64>().unwrap_or(3600);
    Utc::now() + Duration::seconds(secs)
}

fn provider_error(op: &str, status: StatusCode, body: &Value) -> AuthError {
    match error_message(body) {
        Some(msg) => AuthError::from_provider(msg),
        None => AuthError::Network(format!("{} failed: HTTP {}", op, status.as_u16())),
    }
}

#[derive(Clone, Debug)]
pub struct AuthGateway {
    http: HttpClient,
    api_key: String,
    auth_url: String,
    token_url: String,
}

impl AuthGateway {
    pub fn new(http: HttpClient, config: &Config) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
        }
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/accounts:{}?key={}", self.auth_url, op, self.api_key)
    }

    async fn call(&self, op: &str, body: Value) -> Result<Value, AuthError> {
        let url = self.endpoint(op);
        let (status, value) = self
            .http
            .request_json(Method::POST, &url, None, Some(&body))
            .await
            .map_err(AuthError::Network)?;
        if !status.is_success() {
            return Err(provider_error(op, status, &value));
        }
        Ok(value)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<TokenBundle, AuthError> {
        let value = self
            .call(
                "signUp",
                json!({"email": email, "password": password, "returnSecureToken": true}),
            )
            .await?;
        let resp: TokenResponse = serde_json::from_value(value)
            .map_err(|e| AuthError::Network(format!("Malformed signUp response: {}", e)))?;
        Ok(TokenBundle {
            expires_at: expiry(&resp.expires_in),
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
            uid: resp.local_id,
        })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TokenBundle, AuthError> {
        let value = self
            .call(
                "signInWithPassword",
                json!({"email": email, "password": password, "returnSecureToken": true}),
            )
            .await?;
        let resp: TokenResponse = serde_json::from_value(value)
            .map_err(|e| AuthError::Network(format!("Malformed signIn response: {}", e)))?;
        Ok(TokenBundle {
            expires_at: expiry(&resp.expires_in),
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
            uid: resp.local_id,
        })
    }

    pub async fn set_display_name(
        &self,
        id_token: &str,
        display_name: &str,
    ) -> Result<(), AuthError> {
        self.call(
            "update",
            json!({"idToken": id_token, "displayName": display_name, "returnSecureToken": false}),
        )
        .await?;
        Ok(())
    }

    pub async fn send_verification_email(&self, id_token: &str) -> Result<(), AuthError> {
        self.call(
            "sendOobCode",
            json!({"requestType": "VERIFY_EMAIL", "idToken": id_token}),
        )
        .await?;
        Ok(())
    }

    /// Requests a password-reset email. An unknown address is reported as
    /// success so this call cannot be used to probe which accounts exist.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        match self
            .call(
                "sendOobCode",
                json!({"requestType": "PASSWORD_RESET", "email": email}),
            )
            .await
        {
            Ok(_) => Ok(()),
            // EMAIL_NOT_FOUND arrives mapped as InvalidCredentials; it is
            // the only credentials-class code this endpoint returns.
            Err(AuthError::InvalidCredentials) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn lookup(&self, id_token: &str) -> Result<AccountSnapshot, AuthError> {
        let value = self.call("lookup", json!({"idToken": id_token})).await?;
        let resp: LookupResponse = serde_json::from_value(value)
            .map_err(|e| AuthError::Network(format!("Malformed lookup response: {}", e)))?;
        let user = resp
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::Network("Account lookup returned no user".to_string()))?;
        Ok(AccountSnapshot {
            uid: user.local_id,
            email: user.email,
            display_name: user.display_name,
            email_verified: user.email_verified,
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, AuthError> {
        let url = format!("{}/token?key={}", self.token_url, self.api_key);
        let form = format!("grant_type=refresh_token&refresh_token={}", refresh_token);
        let (status, value) = self
            .http
            .post_form(&url, form)
            .await
            .map_err(AuthError::Network)?;
        if !status.is_success() {
            return Err(provider_error("token", status, &value));
        }
        let resp: RefreshResponse = serde_json::from_value(value)
            .map_err(|e| AuthError::Network(format!("Malformed token response: {}", e)))?;
        Ok(TokenBundle {
            expires_at: expiry(&resp.expires_in),
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
            uid: resp.user_id,
        })
    }

    /// Probes the auth endpoint without touching any account. An empty
    /// sign-in request always fails; what matters is who rejects it. A
    /// provider code such as MISSING_EMAIL means the API key was
    /// accepted and the request got as far as validation, while a bad
    /// key is rejected before the request body is looked at.
    pub async fn check_connection(&self) -> Result<(), AuthError> {
        match self.call("signInWithPassword", json!({})).await {
            Ok(_) => Ok(()),
            Err(AuthError::Provider(raw)) if raw.starts_with("API key not valid") => {
                Err(AuthError::Provider(raw))
            }
            Err(AuthError::Network(e)) => Err(AuthError::Network(e)),
            Err(_) => Ok(()),
        }
    }
}

#[derive(Clone)]
struct TokenState {
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

/// Shared bearer-token cache. `bearer()` hands out the current ID token
/// and transparently exchanges the refresh token when it is close to
/// expiry; the write lock is held across the exchange so concurrent
/// callers do not stampede the token endpoint.
#[derive(Clone)]
pub struct TokenSource {
    gateway: AuthGateway,
    state: Arc<RwLock<Option<TokenState>>>,
}

impl TokenSource {
    pub fn new(gateway: AuthGateway) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn install(&self, bundle: &TokenBundle) {
        let mut state = self.state.write().await;
        *state = Some(TokenState {
            id_token: bundle.id_token.clone(),
            refresh_token: bundle.refresh_token.clone(),
            expires_at: bundle.expires_at,
        });
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = None;
    }

    /// The refresh token to persist, if signed in.
    pub async fn current_refresh_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
    }

    pub async fn bearer(&self) -> Result<String, String> {
        let margin = Duration::seconds(REFRESH_MARGIN_SECS);
        {
            let state = self.state.read().await;
            if let Some(s) = state.as_ref()
                && Utc::now() + margin < s.expires_at
            {
                return Ok(s.id_token.clone());
            }
        }

        let mut state = self.state.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(s) = state.as_ref()
            && Utc::now() + margin < s.expires_at
        {
            return Ok(s.id_token.clone());
        }
        let Some(current) = state.as_ref() else {
            return Err("Not signed in".to_string());
        };
        let bundle = self
            .gateway
            .refresh(&current.refresh_token)
            .await
            .map_err(|e| e.to_string())?;
        let id_token = bundle.id_token.clone();
        *state = Some(TokenState {
            id_token: bundle.id_token,
            refresh_token: bundle.refresh_token,
            expires_at: bundle.expires_at,
        });
        Ok(id_token)
    }
}
