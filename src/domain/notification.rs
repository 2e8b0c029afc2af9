use crate::error::TaarufError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// User-facing outcome of an engine operation, rendered as a toast by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl From<&TaarufError> for Notification {
    fn from(err: &TaarufError) -> Self {
        Self::error(err.title(), err.to_string())
    }
}
