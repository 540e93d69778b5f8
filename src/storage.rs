// File: ./src/storage.rs
// Manages local file storage for the persisted session.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to StoredSession require incrementing SESSION_STORE_VERSION
// below so stale files are discarded instead of misread.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use fs2::FileExt;

// Increment this when making breaking changes to the session serialization format
// Version history:
// - v1: refresh_token + uid/email/display_name
const SESSION_STORE_VERSION: u32 = 1;

/// What survives a restart: enough to resume the session without
/// credentials. ID tokens are short-lived and deliberately not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub refresh_token: String,
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

/// Wrapper struct for versioned session storage
#[derive(Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    version: u32,
    session: StoredSession,
}

pub struct LocalStorage;

impl LocalStorage {
    /// Helper to get a sidecar lock file path
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }
}

pub struct SessionStore;

impl SessionStore {
    /// Load the persisted session, if any.
    ///
    /// A missing file is the normal logged-out state. A file that cannot
    /// be read or parsed, or that carries an unknown version, is treated
    /// the same way (the recovery path is simply to log in again), but
    /// the reason is logged so corruption never disappears silently.
    pub fn load(path: &Path) -> Result<Option<StoredSession>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = LocalStorage::with_lock(path, || Ok(fs::read_to_string(path)?))?;
        match serde_json::from_str::<SessionFile>(&json) {
            Ok(file) if file.version == SESSION_STORE_VERSION => Ok(Some(file.session)),
            Ok(file) => {
                log::warn!(
                    "Discarding session file '{}': version {} (supported: {})",
                    path.display(),
                    file.version,
                    SESSION_STORE_VERSION
                );
                Ok(None)
            }
            Err(e) => {
                log::warn!(
                    "Discarding unreadable session file '{}': {}",
                    path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    pub fn save(path: &Path, session: &StoredSession) -> Result<()> {
        LocalStorage::with_lock(path, || {
            let file = SessionFile {
                version: SESSION_STORE_VERSION,
                session: session.clone(),
            };
            let json = serde_json::to_string_pretty(&file)?;
            LocalStorage::atomic_write(path, json)?;
            Ok(())
        })
    }

    /// Remove the persisted session (sign-out). Missing file is fine.
    pub fn clear(path: &Path) -> Result<()> {
        if path.exists() {
            LocalStorage::with_lock(path, || {
                fs::remove_file(path)?;
                Ok(())
            })?;
        }
        Ok(())
    }
}
