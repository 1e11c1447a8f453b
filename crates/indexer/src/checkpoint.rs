use crate::error::{IndexerError, Result};
use crate::scanner::STATE_DIR_NAME;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const CHECKPOINT_FILE_NAME: &str = "checkpoint.jsonl";

/// One line of the checkpoint log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub path: String,
    pub completed_at_unix_ms: u64,
}

/// Per-root state directory
pub fn state_dir_for_root(root: &Path) -> PathBuf {
    root.join(STATE_DIR_NAME)
}

/// Default checkpoint location for a scan root
pub fn default_checkpoint_path(root: &Path) -> PathBuf {
    state_dir_for_root(root).join(CHECKPOINT_FILE_NAME)
}

/// Append-only log of completed relative paths.
///
/// The log is read once when opened and only appended to afterwards. The
/// file stays exclusively locked while this value is alive, so there is a
/// single writer per checkpoint. A torn trailing record (no terminating
/// newline) is dropped on open.
pub struct Checkpoint {
    path: PathBuf,
    file: File,
    completed: HashSet<String>,
    order: Vec<String>,
}

impl Checkpoint {
    /// Open (creating if needed) and lock the checkpoint at `path`.
    /// With `resume = false` any previous progress is discarded.
    pub fn open(path: impl AsRef<Path>, resume: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                IndexerError::Checkpoint(format!("open checkpoint {}: {err}", path.display()))
            })?;

        if file.try_lock_exclusive().is_err() {
            return Err(IndexerError::CheckpointLocked(path));
        }

        if !resume {
            file.set_len(0)?;
            file.sync_data()?;
            log::info!("Starting fresh checkpoint at {}", path.display());
        }

        let mut raw = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut raw)?;

        let complete_len = raw
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);
        if complete_len < raw.len() {
            log::warn!(
                "Dropping torn trailing record ({} bytes) from {}",
                raw.len() - complete_len,
                path.display()
            );
            file.set_len(complete_len as u64)?;
            file.sync_data()?;
        }

        let (completed, order) = parse_records(&raw[..complete_len], &path);
        file.seek(SeekFrom::End(0))?;

        if resume && !order.is_empty() {
            log::info!(
                "Loaded {} completed files from {}",
                order.len(),
                path.display()
            );
        }

        Ok(Self {
            path,
            file,
            completed,
            order,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `relative_path` finished in this or an earlier run
    pub fn contains(&self, relative_path: &str) -> bool {
        self.completed.contains(relative_path)
    }

    /// Completed paths in the order they were recorded
    pub fn completed(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Durably append `relative_path`. Recording a path twice is a no-op.
    pub fn record(&mut self, relative_path: &str) -> Result<()> {
        if self.completed.contains(relative_path) {
            return Ok(());
        }

        let record = CheckpointRecord {
            path: relative_path.to_string(),
            completed_at_unix_ms: unix_now_ms(),
        };
        let mut line = serde_json::to_vec(&record)
            .map_err(|err| IndexerError::Checkpoint(format!("encode record: {err}")))?;
        line.push(b'\n');

        self.file.write_all(&line).map_err(|err| {
            IndexerError::Checkpoint(format!("append to {}: {err}", self.path.display()))
        })?;
        self.file.sync_data()?;

        self.completed.insert(record.path.clone());
        self.order.push(record.path);
        Ok(())
    }
}

impl Drop for Checkpoint {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Read a checkpoint without locking it (for inspection tools and tests)
pub fn read_checkpoint(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read(path)?;
    let complete_len = raw
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    Ok(parse_records(&raw[..complete_len], path).1)
}

fn parse_records(raw: &[u8], path: &Path) -> (HashSet<String>, Vec<String>) {
    let mut completed = HashSet::new();
    let mut order = Vec::new();

    for (idx, line) in raw.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<CheckpointRecord>(line) {
            Ok(record) => {
                if completed.insert(record.path.clone()) {
                    order.push(record.path);
                }
            }
            Err(err) => log::warn!(
                "Skipping malformed checkpoint record {}:{}: {err}",
                path.display(),
                idx + 1
            ),
        }
    }

    (completed, order)
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
