use super::actor::ActorSnapshot;
use crate::error::{Result, TaarufError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a request relative to the actor viewing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        })
    }
}

/// A taaruf request between two users.
///
/// `from` is always the requester and `to` the recipient; `direction` tells which of
/// the two is the viewing actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub id: String,
    pub from: ActorSnapshot,
    pub to: ActorSnapshot,
    pub direction: RequestDirection,
    pub status: RequestStatus,
    pub message: String,
    pub request_date: DateTime<Utc>,
}

impl MatchRequest {
    pub fn new(
        id: impl Into<String>,
        from: ActorSnapshot,
        to: ActorSnapshot,
        direction: RequestDirection,
        message: &str,
    ) -> Result<Self> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TaarufError::ValidationError(
                "Request message must not be empty".to_string(),
            ));
        }
        if from.id == to.id {
            return Err(TaarufError::ValidationError(
                "Cannot send a taaruf request to yourself".to_string(),
            ));
        }
        Ok(Self {
            id: id.into(),
            from,
            to,
            direction,
            status: RequestStatus::Pending,
            message: message.to_string(),
            request_date: Utc::now(),
        })
    }

    /// The other party from the viewer's point of view.
    pub fn counterpart(&self) -> &ActorSnapshot {
        match self.direction {
            RequestDirection::Incoming => &self.from,
            RequestDirection::Outgoing => &self.to,
        }
    }

    pub fn is_pending_incoming(&self) -> bool {
        self.direction == RequestDirection::Incoming && self.status == RequestStatus::Pending
    }

    /// Checks that the viewer may resolve this request (incoming and still pending).
    pub fn ensure_resolvable(&self) -> Result<()> {
        if self.direction != RequestDirection::Incoming {
            return Err(TaarufError::NotIncoming(self.id.clone()));
        }
        if self.status.is_terminal() {
            return Err(TaarufError::RequestResolved {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn accept(&mut self) -> Result<()> {
        self.ensure_resolvable()?;
        self.status = RequestStatus::Accepted;
        Ok(())
    }

    pub fn reject(&mut self) -> Result<()> {
        self.ensure_resolvable()?;
        self.status = RequestStatus::Rejected;
        Ok(())
    }
}
