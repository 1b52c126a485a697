use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::Result;

/// Success and failure counts of digest resolutions.
#[derive(Debug, Default)]
pub struct ResolutionStats {
    success: AtomicU64,
    failure: AtomicU64,
    updated_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`ResolutionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStats {
    pub success: u64,
    pub failure: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ResolutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters continuing from an earlier snapshot.
    pub fn from_snapshot(snapshot: HashStats) -> Self {
        Self {
            success: AtomicU64::new(snapshot.success),
            failure: AtomicU64::new(snapshot.failure),
            updated_at: Mutex::new(snapshot.updated_at),
        }
    }

    pub fn record(&self, success: bool) {
        if success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut updated_at) = self.updated_at.lock() {
            *updated_at = Some(Utc::now());
        }
    }

    pub fn snapshot(&self) -> HashStats {
        HashStats {
            success: self.success.load(Ordering::Relaxed),
            failure: self.failure.load(Ordering::Relaxed),
            updated_at: self.updated_at.lock().ok().and_then(|t| *t),
        }
    }
}

impl HashStats {
    /// Fraction of resolutions that succeeded, or `None` before the first one.
    pub fn success_ratio(&self) -> Option<f64> {
        let total = self.success + self.failure;
        (total > 0).then(|| self.success as f64 / total as f64)
    }

    /// Reads a snapshot written by [`HashStats::save`]; `None` if the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the snapshot as JSON, replacing the file in one rename.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}
