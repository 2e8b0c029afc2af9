use super::actor::{Actor, ActorId};
use super::candidate::CandidateProfile;
use super::notification::Notification;
use super::process::TaarufProcess;
use super::request::MatchRequest;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Supplies the identity of whoever is driving the engine.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_actor(&self) -> Option<Actor>;

    async fn is_authenticated(&self) -> bool {
        self.current_actor().await.is_some()
    }
}

/// Receives a notification for every accepted or rejected operation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Match requests as seen by each actor, in insertion order.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn store(&self, owner: &ActorId, request: MatchRequest) -> Result<()>;
    async fn get(&self, owner: &ActorId, request_id: &str) -> Result<Option<MatchRequest>>;
    async fn all_for(&self, owner: &ActorId) -> Result<Vec<MatchRequest>>;
}

/// Taaruf processes owned by each actor, oldest first.
#[async_trait]
pub trait ProcessStore: Send + Sync {
    async fn store(&self, owner: &ActorId, process: TaarufProcess) -> Result<()>;
    async fn all_for(&self, owner: &ActorId) -> Result<Vec<TaarufProcess>>;
}

/// Published profiles that requests can be addressed to.
#[async_trait]
pub trait CandidateDirectory: Send + Sync {
    async fn get(&self, id: &ActorId) -> Result<Option<CandidateProfile>>;
    async fn all(&self) -> Result<Vec<CandidateProfile>>;
}

pub type SessionProviderRef = Arc<dyn SessionProvider>;
pub type NotifierRef = Arc<dyn Notifier>;
pub type RequestStoreBox = Box<dyn RequestStore>;
pub type ProcessStoreBox = Box<dyn ProcessStore>;
pub type CandidateDirectoryBox = Box<dyn CandidateDirectory>;
