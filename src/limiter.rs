// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding window rate limiter for the report endpoint.
//!
//! One window is shared by every caller of the deployment. The window is a
//! list of admitted Unix timestamps (seconds), optionally persisted as a
//! JSON array so it survives restarts. Loading, pruning, the admission
//! decision and persistence all happen under a single lock, so concurrent
//! requests within the process cannot overshoot `max_requests`.

use crate::config::RateLimitConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Result of an admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is admitted and recorded
    Allowed {
        /// Admissions left in the current window
        remaining: u32,
    },
    /// Request is rejected and not recorded
    Limited {
        /// Time until the oldest admission leaves the window
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// On-disk shapes accepted when loading a window.
///
/// Older deployments filtered the list in place before re-encoding it,
/// which left a JSON object keyed by array index instead of an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredWindow {
    List(Vec<i64>),
    Keyed(BTreeMap<String, i64>),
}

impl StoredWindow {
    fn into_timestamps(self) -> Vec<i64> {
        match self {
            StoredWindow::List(list) => list,
            StoredWindow::Keyed(map) => map.into_values().collect(),
        }
    }
}

/// Where the admitted timestamps live between requests.
#[derive(Debug)]
enum WindowStore {
    /// Record file, plus the window last admitted in this process while
    /// the file could not be written.
    File {
        path: PathBuf,
        unsaved: Option<Vec<i64>>,
    },
    Memory(Vec<i64>),
}

impl WindowStore {
    async fn load(&self) -> Vec<i64> {
        match self {
            WindowStore::Memory(window) => window.clone(),
            // The file is stale or absent after a failed write
            WindowStore::File {
                unsaved: Some(window),
                ..
            } => window.clone(),
            WindowStore::File { path, unsaved: None } => load_file(path).await,
        }
    }

    async fn save(&mut self, window: Vec<i64>) {
        match self {
            WindowStore::Memory(stored) => *stored = window,
            WindowStore::File { path, unsaved } => match save_file(path, &window).await {
                Ok(()) => *unsaved = None,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to persist rate limit record, keeping window in memory"
                    );
                    *unsaved = Some(window);
                }
            },
        }
    }
}

async fn load_file(path: &Path) -> Vec<i64> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No rate limit record yet");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Rate limit record unreadable, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<StoredWindow>(&bytes) {
        Ok(stored) => stored.into_timestamps(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Rate limit record malformed, starting empty");
            Vec::new()
        }
    }
}

async fn save_file(path: &Path, window: &[i64]) -> std::io::Result<()> {
    let encoded = serde_json::to_vec(window)?;

    // Write beside the target and rename so readers never see a torn file
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &encoded).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Thread-safe sliding window rate limiter.
pub struct RateLimiter {
    /// Configuration
    config: RateLimitConfig,
    /// Admitted timestamps, guarded for the whole read-modify-write
    store: Mutex<WindowStore>,
}

impl RateLimiter {
    /// Create a rate limiter, persisting to `storage_path` when configured.
    pub fn new(config: RateLimitConfig) -> Self {
        let store = match &config.storage_path {
            Some(path) => WindowStore::File {
                path: path.clone(),
                unsaved: None,
            },
            None => WindowStore::Memory(Vec::new()),
        };

        Self {
            config,
            store: Mutex::new(store),
        }
    }

    /// Try to admit one request at the current wall-clock time.
    pub async fn try_admit(&self) -> RateLimitResult {
        self.try_admit_at(chrono::Utc::now().timestamp()).await
    }

    /// Try to admit one request at `now` (Unix seconds).
    ///
    /// Entries at or before `now - window_secs` are discarded. If the
    /// remaining count has reached `max_requests` the request is limited and
    /// the record is left untouched; otherwise `now` is appended and the
    /// record persisted before returning.
    pub async fn try_admit_at(&self, now: i64) -> RateLimitResult {
        let window_secs = i64::try_from(self.config.window_secs).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(window_secs);
        let max = self.config.max_requests as usize;

        let mut store = self.store.lock().await;
        let mut window = store.load().await;
        window.retain(|&t| t > cutoff);

        if window.len() >= max {
            let oldest = window.iter().copied().min().unwrap_or(now);
            let wait = oldest.saturating_add(window_secs).saturating_sub(now).max(1);
            debug!(count = window.len(), max, retry_after_secs = wait, "Rate limit window full");
            return RateLimitResult::Limited {
                retry_after: Duration::from_secs(wait as u64),
            };
        }

        window.push(now);
        let remaining = (max - window.len()) as u32;
        store.save(window).await;

        RateLimitResult::Allowed { remaining }
    }

    /// Current contents of the record, as the next admission would load it.
    pub async fn snapshot(&self) -> Vec<i64> {
        self.store.lock().await.load().await
    }
}
