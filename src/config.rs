// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;

fn default_auth_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

fn default_token_url() -> String {
    "https://securetoken.googleapis.com/v1".to_string()
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_poll_secs() -> u64 {
    5
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// Web API key of the backend project.
    pub api_key: String,
    /// Project id; document paths are rooted at
    /// `projects/{project_id}/databases/(default)/documents`.
    pub project_id: String,
    /// Base URLs, overridable to point at an emulator or a mock server.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
    /// Seconds between snapshot polls per live subscription.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            // Match the serde defaults
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            firestore_url: default_firestore_url(),
            poll_secs: 5,
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        // Explicitly detect missing file so callers (onboarding) can behave accordingly.
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        // Read the file with contextualized error (covers permission/IO issues).
        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        // Parse TOML with contextualized error (covers syntax issues).
        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Helper to detect whether an anyhow::Error indicates that the config file was missing.
    /// This tries multiple strategies:
    ///  - Fast path: check for our explicit "Config file not found" message
    ///  - Look for underlying IO NotFound errors in the error chain
    ///
    /// The goal is to avoid brittle substring checks spread across the codebase.
    pub fn is_missing_config_error(err: &Error) -> bool {
        // Fast textual check for the explicit not-found message.
        if err.to_string().contains("Config file not found") {
            return true;
        }

        // Check if the top-level error is an io::Error with NotFound kind.
        if let Some(io_err) = err.downcast_ref::<std::io::Error>()
            && io_err.kind() == std::io::ErrorKind::NotFound
        {
            return true;
        }

        // Walk the error chain and look for an underlying IO NotFound.
        // `chain()` yields references to the error chain; check each for io::Error.
        // This makes detection robust even when errors are wrapped.
        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    /// Get the path string using an explicit context.
    pub fn get_path_string(ctx: &dyn AppContext) -> Result<String> {
        let path = ctx.get_config_file_path()?;
        Ok(path.to_string_lossy().to_string())
    }

    /// Root of the document tree for this project.
    pub fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.project_id
        )
    }
}
