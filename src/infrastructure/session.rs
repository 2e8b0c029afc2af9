use crate::domain::actor::Actor;
use crate::domain::ports::SessionProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Session held in process memory. Set on sign-in, cleared on sign-out.
#[derive(Default, Clone)]
pub struct InMemorySession {
    actor: Arc<RwLock<Option<Actor>>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(actor: Actor) -> Self {
        Self {
            actor: Arc::new(RwLock::new(Some(actor))),
        }
    }

    pub async fn sign_in(&self, actor: Actor) {
        info!(actor = %actor.id, "signed in");
        *self.actor.write().await = Some(actor);
    }

    pub async fn sign_out(&self) {
        if let Some(actor) = self.actor.write().await.take() {
            info!(actor = %actor.id, "signed out");
        }
    }
}

#[async_trait]
impl SessionProvider for InMemorySession {
    async fn current_actor(&self) -> Option<Actor> {
        self.actor.read().await.clone()
    }
}
