// File: ./src/cache.rs
// Caching mechanism for warm-starting the dashboard from the last seen
// snapshots while the first poll is in flight.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to Task/Course serialization require incrementing CACHE_VERSION
// below to invalidate stale caches.
use crate::context::AppContext;
use crate::model::{Course, Task};
use crate::storage::LocalStorage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

// Increment this whenever Task or Course changes to invalidate old caches
const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct DashboardCache {
    // If this field is missing in the JSON (old cache), it defaults to 0.
    #[serde(default)]
    version: u32,
    courses: Vec<Course>,
    tasks: Vec<Task>,
}

pub struct Cache;

impl Cache {
    // One cache file per account; the uid is hashed so the filename stays
    // filesystem-safe.
    fn get_path(ctx: &dyn AppContext, uid: &str) -> Option<PathBuf> {
        ctx.get_cache_dir().ok().map(|dir| {
            let mut hasher = DefaultHasher::new();
            uid.hash(&mut hasher);
            let filename = format!("dashboard_{:x}.json", hasher.finish());
            dir.join(filename)
        })
    }

    pub fn save_dashboard(
        ctx: &dyn AppContext,
        uid: &str,
        courses: &[Course],
        tasks: &[Task],
    ) -> Result<()> {
        if let Some(path) = Self::get_path(ctx, uid) {
            LocalStorage::with_lock(&path, || {
                let data = DashboardCache {
                    version: CACHE_VERSION,
                    courses: courses.to_vec(),
                    tasks: tasks.to_vec(),
                };
                let json = serde_json::to_string_pretty(&data)?;
                LocalStorage::atomic_write(&path, json)?;
                Ok(())
            })?;
        }
        Ok(())
    }

    pub fn load_dashboard(ctx: &dyn AppContext, uid: &str) -> Result<(Vec<Course>, Vec<Task>)> {
        if let Some(path) = Self::get_path(ctx, uid)
            && path.exists()
        {
            return LocalStorage::with_lock(&path, || {
                let json = fs::read_to_string(&path)?;
                // Try parsing the versioned format first
                if let Ok(cache) = serde_json::from_str::<DashboardCache>(&json)
                    && cache.version == CACHE_VERSION
                {
                    return Ok((cache.courses, cache.tasks));
                }
                // If version mismatch or any parsing error occurs, treat cache as
                // invalid; the next snapshot overwrites it.
                Ok((vec![], vec![]))
            });
        }
        Ok((vec![], vec![]))
    }
}
