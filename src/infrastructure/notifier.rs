use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::Notifier;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Emits every notification as a `tracing` event.
#[derive(Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => {
                info!(title = %notification.title, "{}", notification.message)
            }
            NotificationKind::Error => {
                warn!(title = %notification.title, "{}", notification.message)
            }
        }
    }
}

/// Keeps every notification in order. Clones share the same log.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    log: Arc<RwLock<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.log.read().await.clone()
    }

    pub async fn last(&self) -> Option<Notification> {
        self.log.read().await.last().cloned()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        TracingNotifier.notify(notification.clone()).await;
        self.log.write().await.push(notification);
    }
}
