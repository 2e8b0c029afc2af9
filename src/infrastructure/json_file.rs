use super::in_memory::upsert;
use crate::domain::actor::ActorId;
use crate::domain::ports::{ProcessStore, RequestStore};
use crate::domain::process::TaarufProcess;
use crate::domain::request::MatchRequest;
use crate::error::{Result, TaarufError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    requests: BTreeMap<ActorId, Vec<MatchRequest>>,
    #[serde(default)]
    processes: BTreeMap<ActorId, Vec<TaarufProcess>>,
}

impl Snapshot {
    fn validate(&self) -> Result<()> {
        for (owner, processes) in &self.processes {
            for process in processes {
                process.validate()?;
            }
            let active = processes.iter().filter(|p| p.is_active()).count();
            if active > 1 {
                return Err(TaarufError::ValidationError(format!(
                    "User {owner} has {active} active processes"
                )));
            }
        }
        Ok(())
    }
}

/// Keeps requests and processes in a single JSON document on disk.
///
/// The whole document is rewritten after every change, the same way the browser
/// client kept its state in local storage. There is no journaling, so a crash
/// mid-write can lose the file.
///
/// A change becomes visible only once the document was written, so a failed
/// write leaves the store as it was. Clones share the same in-memory snapshot
/// and file path.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    snapshot: Arc<RwLock<Snapshot>>,
}

impl JsonFileStore {
    /// Opens the document at `path`, starting empty if it does not exist yet.
    ///
    /// A document that does not parse, or whose processes break the progress and
    /// stage bounds, is refused with a `StorageError`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                TaarufError::StorageError(format!(
                    "Failed to load state from {}: {}",
                    path.display(),
                    e
                ))
            })?;
            snapshot.validate().map_err(|e| {
                TaarufError::StorageError(format!(
                    "Invalid state in {}: {}",
                    path.display(),
                    e
                ))
            })?;
            snapshot
        } else {
            Snapshot::default()
        };

        Ok(Self {
            path,
            snapshot: Arc::new(RwLock::new(snapshot)),
        })
    }

    /// Applies `change` to a copy of the snapshot, writes it out, then publishes it.
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Snapshot),
    {
        let mut snapshot = self.snapshot.write().await;
        let mut next = snapshot.clone();
        change(&mut next);

        let bytes = serde_json::to_vec_pretty(&next)?;
        tokio::fs::write(&self.path, bytes).await?;
        debug!(path = %self.path.display(), "state saved");

        *snapshot = next;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for JsonFileStore {
    async fn store(&self, owner: &ActorId, request: MatchRequest) -> Result<()> {
        self.update(|snapshot| {
            upsert(
                snapshot.requests.entry(owner.clone()).or_default(),
                request,
                |r| r.id.as_str(),
            )
        })
        .await
    }

    async fn get(&self, owner: &ActorId, request_id: &str) -> Result<Option<MatchRequest>> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .requests
            .get(owner)
            .and_then(|list| list.iter().find(|r| r.id == request_id))
            .cloned())
    }

    async fn all_for(&self, owner: &ActorId) -> Result<Vec<MatchRequest>> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot.requests.get(owner).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ProcessStore for JsonFileStore {
    async fn store(&self, owner: &ActorId, process: TaarufProcess) -> Result<()> {
        self.update(|snapshot| {
            upsert(
                snapshot.processes.entry(owner.clone()).or_default(),
                process,
                |p| p.id.as_str(),
            )
        })
        .await
    }

    async fn all_for(&self, owner: &ActorId) -> Result<Vec<TaarufProcess>> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot.processes.get(owner).cloned().unwrap_or_default())
    }
}
