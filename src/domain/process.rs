use super::actor::ActorSnapshot;
use crate::error::{Result, TaarufError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound of `progress`.
pub const MAX_PROGRESS: u8 = 100;
/// Minimum progress required before a nadzor can be requested.
pub const ESCALATION_THRESHOLD: u8 = 50;
/// Once progress reaches this value every message advances the stage.
pub const STAGE_ADVANCE_THRESHOLD: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    InProgress,
    NadzorRequested,
    NadzorApproved,
    Completed,
    Rejected,
}

impl ProcessStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "in_progress",
            Self::NadzorRequested => "nadzor_requested",
            Self::NadzorApproved => "nadzor_approved",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[serde(rename = "user")]
    Me,
    Partner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaarufMessage {
    pub id: u32,
    pub content: String,
    pub date: String,
    pub sender: Sender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ProcessStatus,
    pub to: ProcessStatus,
    pub at: DateTime<Utc>,
}

/// An accepted taaruf between the owning actor and `partner`.
///
/// Terminal processes are kept as history and refuse every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaarufProcess {
    pub id: String,
    pub partner: ActorSnapshot,
    pub status: ProcessStatus,
    pub progress: u8,
    pub current_stage: u8,
    pub total_stages: u8,
    pub start_date: NaiveDate,
    pub messages: Vec<TaarufMessage>,
    #[serde(default)]
    pub termination_reason: Option<String>,
    #[serde(default)]
    pub transitions: Vec<StatusTransition>,
}

impl TaarufProcess {
    pub fn new(id: impl Into<String>, partner: ActorSnapshot, total_stages: u8) -> Self {
        Self {
            id: id.into(),
            partner,
            status: ProcessStatus::InProgress,
            progress: 0,
            current_stage: 1,
            total_stages: total_stages.max(1),
            start_date: Utc::now().date_naive(),
            messages: Vec::new(),
            termination_reason: None,
            transitions: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Checks the progress and stage bounds of a process loaded from outside.
    pub fn validate(&self) -> Result<()> {
        if self.total_stages == 0 {
            return Err(TaarufError::ValidationError(format!(
                "Process {} has no stages",
                self.id
            )));
        }
        if self.current_stage == 0 || self.current_stage > self.total_stages {
            return Err(TaarufError::ValidationError(format!(
                "Process {} is at stage {} of {}",
                self.id, self.current_stage, self.total_stages
            )));
        }
        if self.progress > MAX_PROGRESS {
            return Err(TaarufError::ValidationError(format!(
                "Process {} has progress {} above {}",
                self.id, self.progress, MAX_PROGRESS
            )));
        }
        Ok(())
    }

    /// Appends a message from the owner and accrues `step` progress.
    ///
    /// Progress and stage only move while the process is `InProgress`.
    pub fn send_message(&mut self, content: &str, step: u8) -> Result<&TaarufMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(TaarufError::ValidationError(
                "Message must not be empty".to_string(),
            ));
        }
        self.ensure_active("send a message")?;

        let id = self.messages.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        self.messages.push(TaarufMessage {
            id,
            content: content.to_string(),
            date: Utc::now().format("%B %-d, %Y").to_string(),
            sender: Sender::Me,
        });

        if self.status == ProcessStatus::InProgress {
            self.progress = self.progress.saturating_add(step).min(MAX_PROGRESS);
            if self.progress >= STAGE_ADVANCE_THRESHOLD {
                self.current_stage = self.current_stage.saturating_add(1).min(self.total_stages);
            }
        }

        Ok(&self.messages[self.messages.len() - 1])
    }

    /// IN_PROGRESS → NADZOR_REQUESTED, gated on progress.
    pub fn request_escalation(&mut self) -> Result<()> {
        self.require(ProcessStatus::InProgress, "request a nadzor")?;
        if self.progress < ESCALATION_THRESHOLD {
            return Err(TaarufError::NotReady {
                progress: self.progress,
                required: ESCALATION_THRESHOLD,
            });
        }
        self.transition(ProcessStatus::NadzorRequested);
        Ok(())
    }

    /// NADZOR_REQUESTED → NADZOR_APPROVED.
    pub fn approve_escalation(&mut self) -> Result<()> {
        self.require(ProcessStatus::NadzorRequested, "approve a nadzor")?;
        self.transition(ProcessStatus::NadzorApproved);
        Ok(())
    }

    /// NADZOR_APPROVED → COMPLETED.
    pub fn complete(&mut self) -> Result<()> {
        self.require(ProcessStatus::NadzorApproved, "complete the process")?;
        self.transition(ProcessStatus::Completed);
        Ok(())
    }

    /// IN_PROGRESS | NADZOR_REQUESTED → REJECTED.
    pub fn terminate(&mut self, reason: &str) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TaarufError::ValidationError(
                "A reason is required to end the process".to_string(),
            ));
        }
        match self.status {
            ProcessStatus::InProgress | ProcessStatus::NadzorRequested => {
                self.termination_reason = Some(reason.to_string());
                self.transition(ProcessStatus::Rejected);
                Ok(())
            }
            status => Err(TaarufError::InvalidTransition {
                action: "end the process",
                status,
            }),
        }
    }

    fn ensure_active(&self, action: &'static str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(TaarufError::InvalidTransition {
                action,
                status: self.status,
            });
        }
        Ok(())
    }

    fn require(&self, expected: ProcessStatus, action: &'static str) -> Result<()> {
        if self.status != expected {
            return Err(TaarufError::InvalidTransition {
                action,
                status: self.status,
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: ProcessStatus) {
        self.transitions.push(StatusTransition {
            from: self.status,
            to,
            at: Utc::now(),
        });
        self.status = to;
    }
}
