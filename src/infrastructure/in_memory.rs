use crate::domain::actor::ActorId;
use crate::domain::candidate::CandidateProfile;
use crate::domain::ports::{CandidateDirectory, ProcessStore, RequestStore};
use crate::domain::process::TaarufProcess;
use crate::domain::request::MatchRequest;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Replaces the entry with the same id or appends a new one, keeping insertion order.
pub(crate) fn upsert<T>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &str) {
    match items.iter().position(|existing| id(existing) == id(&item)) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}

/// A thread-safe in-memory store for match requests.
///
/// Clones share the same underlying map, so a test can keep a handle while the
/// engine owns a boxed copy.
#[derive(Default, Clone)]
pub struct InMemoryRequestStore {
    requests: Arc<RwLock<HashMap<ActorId, Vec<MatchRequest>>>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn store(&self, owner: &ActorId, request: MatchRequest) -> Result<()> {
        let mut requests = self.requests.write().await;
        upsert(requests.entry(owner.clone()).or_default(), request, |r| {
            r.id.as_str()
        });
        Ok(())
    }

    async fn get(&self, owner: &ActorId, request_id: &str) -> Result<Option<MatchRequest>> {
        let requests = self.requests.read().await;
        Ok(requests
            .get(owner)
            .and_then(|list| list.iter().find(|r| r.id == request_id))
            .cloned())
    }

    async fn all_for(&self, owner: &ActorId) -> Result<Vec<MatchRequest>> {
        let requests = self.requests.read().await;
        Ok(requests.get(owner).cloned().unwrap_or_default())
    }
}

/// A thread-safe in-memory store for taaruf processes.
#[derive(Default, Clone)]
pub struct InMemoryProcessStore {
    processes: Arc<RwLock<HashMap<ActorId, Vec<TaarufProcess>>>>,
}

impl InMemoryProcessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessStore for InMemoryProcessStore {
    async fn store(&self, owner: &ActorId, process: TaarufProcess) -> Result<()> {
        let mut processes = self.processes.write().await;
        upsert(processes.entry(owner.clone()).or_default(), process, |p| {
            p.id.as_str()
        });
        Ok(())
    }

    async fn all_for(&self, owner: &ActorId) -> Result<Vec<TaarufProcess>> {
        let processes = self.processes.read().await;
        Ok(processes.get(owner).cloned().unwrap_or_default())
    }
}

/// A fixed list of published profiles.
#[derive(Default, Clone)]
pub struct InMemoryCandidateDirectory {
    profiles: Arc<Vec<CandidateProfile>>,
}

impl InMemoryCandidateDirectory {
    pub fn new(profiles: Vec<CandidateProfile>) -> Self {
        Self {
            profiles: Arc::new(profiles),
        }
    }

    /// Loads profiles from a JSON array file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let profiles: Vec<CandidateProfile> = serde_json::from_slice(&bytes)?;
        Ok(Self::new(profiles))
    }
}

#[async_trait]
impl CandidateDirectory for InMemoryCandidateDirectory {
    async fn get(&self, id: &ActorId) -> Result<Option<CandidateProfile>> {
        Ok(self.profiles.iter().find(|p| &p.id == id).cloned())
    }

    async fn all(&self) -> Result<Vec<CandidateProfile>> {
        Ok(self.profiles.as_ref().clone())
    }
}
