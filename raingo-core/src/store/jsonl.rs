use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::memory::RecordIndex;
use super::{Count, Store};
use crate::error::{Error, Result};
use crate::record::Record;

/// File-backed store: one JSON encoded [`Record`] per line.
///
/// The file is read once on open and appended to on every insert. Reads are
/// served from memory.
pub struct JsonlStore {
    name: String,
    path: PathBuf,
    approximate_count: bool,
    state: Mutex<State>,
}

struct State {
    index: RecordIndex,
    file: File,
    /// Length of the file up to the last complete line.
    len: u64,
}

impl JsonlStore {
    /// Opens (creating if needed) the store at `path`.
    ///
    /// Lines that fail to parse are skipped with a warning.
    pub async fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| Error::store(&name, e))?;
        }

        let mut index = RecordIndex::default();
        let mut torn_tail = None;
        match fs::read_to_string(&path).await {
            Ok(contents) => {
                let tail_start = contents.rfind('\n').map_or(0, |i| i + 1);
                let tail = &contents[tail_start..];
                if !tail.trim().is_empty() {
                    torn_tail = Some((tail_start as u64, serde_json::from_str::<Record>(tail).is_ok()));
                }
                for (line_num, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Record>(line) {
                        Ok(record) => index.push(record),
                        Err(e) => warn!(
                            store = %name,
                            "skipping malformed line {} in {}: {}",
                            line_num + 1,
                            path.display(),
                            e
                        ),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::store(&name, e)),
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::store(&name, e))?;

        // an unterminated last line would swallow the next append
        match torn_tail {
            Some((_, true)) => file.write_all(b"\n").await.map_err(|e| Error::store(&name, e))?,
            Some((tail_start, false)) => {
                warn!(store = %name, "truncating torn last line of {}", path.display());
                file.set_len(tail_start).await.map_err(|e| Error::store(&name, e))?;
            }
            None => {}
        }
        let len = file.metadata().await.map_err(|e| Error::store(&name, e))?.len();

        info!(store = %name, records = index.len(), "opened {}", path.display());
        Ok(Self {
            name,
            path,
            approximate_count: false,
            state: Mutex::new(State { index, file, len }),
        })
    }

    /// Report counts as estimates, the way a large shared store would.
    pub fn with_approximate_count(mut self) -> Self {
        self.approximate_count = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Store for JsonlStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<Record>> {
        Ok(self.state.lock().await.index.get(digest).cloned())
    }

    async fn insert_if_absent(&self, records: &[Record]) -> Result<usize> {
        let mut state = self.state.lock().await;
        let fresh: Vec<Record> = state.index.absent(records).into_iter().cloned().collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut buf = Vec::with_capacity(fresh.len() * 128);
        for record in &fresh {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        if let Err(e) = append(&mut state.file, &buf).await {
            // drop whatever part of the write landed
            if let Err(truncate) = state.file.set_len(state.len).await {
                warn!(store = %self.name, "could not roll back partial write: {}", truncate);
            }
            return Err(Error::store(&self.name, e));
        }
        state.len += buf.len() as u64;

        let inserted = fresh.len();
        for record in fresh {
            state.index.push(record);
        }
        Ok(inserted)
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Record>> {
        Ok(self.state.lock().await.index.page(offset, limit))
    }

    async fn count(&self) -> Result<Count> {
        let len = self.state.lock().await.index.len() as u64;
        Ok(if self.approximate_count { Count::Approximate(len) } else { Count::Exact(len) })
    }
}

async fn append(file: &mut File, buf: &[u8]) -> std::io::Result<()> {
    file.write_all(buf).await?;
    file.flush().await
}
