//! A ledger client that appends anchor records to a local JSON-lines file.
//!
//! Stands in for a real chain client in single-node deployments. Each line
//! is one [`JournalEntry`]; resubmitting an anchor id returns the reference
//! written the first time.

use crate::error::LedgerError;
use crate::ledger::{AnchorRecord, LedgerClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub tx_ref: String,
    pub record: AnchorRecord,
}

pub struct JournalLedger {
    path: PathBuf,
    written: Mutex<HashMap<String, String>>,
}

impl JournalLedger {
    /// Open (or create) the journal at `path`, loading already written
    /// anchor ids. A torn final line left by an interrupted append is cut off.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::Unavailable(format!("{}: {e}", parent.display())))?;
        }

        let mut written = HashMap::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                if let Some(torn_at) = load_entries(&path, &contents, &mut written)? {
                    tracing::warn!(
                        path = %path.display(),
                        offset = torn_at,
                        "dropping torn final journal line"
                    );
                    truncate(&path, torn_at as u64).await?;
                } else if !contents.is_empty() && !contents.ends_with('\n') {
                    append(&path, b"\n").await?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(LedgerError::Unavailable(format!("{}: {e}", path.display())));
            }
        }

        tracing::debug!(path = %path.display(), entries = written.len(), "opened anchor journal");
        Ok(Self {
            path,
            written: Mutex::new(written),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.written.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Load every entry in `contents`. An unparsable last line without a
/// trailing newline is an interrupted append; its byte offset is returned so
/// the caller can cut it off. Any other bad line rejects the journal.
fn load_entries(
    path: &Path,
    contents: &str,
    written: &mut HashMap<String, String>,
) -> Result<Option<usize>, LedgerError> {
    let mut offset = 0;
    for (line_no, raw) in contents.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += raw.len();
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => {
                written.insert(entry.record.anchor_id, entry.tx_ref);
            }
            Err(_) if !raw.ends_with('\n') => return Ok(Some(start)),
            Err(e) => {
                return Err(LedgerError::Rejected(format!(
                    "{} line {}: {e}",
                    path.display(),
                    line_no + 1
                )));
            }
        }
    }
    Ok(None)
}

fn unavailable(path: &Path) -> impl Fn(std::io::Error) -> LedgerError + '_ {
    move |e| LedgerError::Unavailable(format!("{}: {e}", path.display()))
}

async fn truncate(path: &Path, len: u64) -> Result<(), LedgerError> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(unavailable(path))?;
    file.set_len(len).await.map_err(unavailable(path))?;
    file.sync_data().await.map_err(unavailable(path))
}

async fn append(path: &Path, bytes: &[u8]) -> Result<(), LedgerError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(unavailable(path))?;
    file.write_all(bytes).await.map_err(unavailable(path))?;
    file.sync_data().await.map_err(unavailable(path))
}

#[async_trait]
impl LedgerClient for JournalLedger {
    async fn submit(&self, record: &AnchorRecord) -> Result<String, LedgerError> {
        let mut written = self.written.lock().await;
        if let Some(tx_ref) = written.get(&record.anchor_id) {
            return Ok(tx_ref.clone());
        }

        let sequence = written.len() as u64 + 1;
        let entry = JournalEntry {
            sequence,
            tx_ref: format!("{}:{sequence}", record.chain),
            record: record.clone(),
        };
        let mut line =
            serde_json::to_vec(&entry).map_err(|e| LedgerError::Rejected(e.to_string()))?;
        line.push(b'\n');

        append(&self.path, &line).await?;

        written.insert(record.anchor_id.clone(), entry.tx_ref.clone());
        Ok(entry.tx_ref)
    }
}
