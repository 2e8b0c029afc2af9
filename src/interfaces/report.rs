use crate::application::engine::TaarufEngine;
use crate::domain::notification::Notification;
use crate::domain::process::TaarufProcess;
use crate::domain::request::MatchRequest;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// What the signed-in actor would see after a run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub current_process: Option<TaarufProcess>,
    pub incoming: Vec<MatchRequest>,
    pub outgoing: Vec<MatchRequest>,
    pub resolved: Vec<MatchRequest>,
    pub notifications: Vec<Notification>,
}

impl Report {
    pub async fn collect(engine: &TaarufEngine, notifications: Vec<Notification>) -> Result<Self> {
        Ok(Self {
            current_process: engine.current_process().await?,
            incoming: engine.list_incoming().await?,
            outgoing: engine.list_outgoing().await?,
            resolved: engine.resolved_requests().await?,
            notifications,
        })
    }
}

/// Writes reports as pretty-printed JSON.
pub struct ReportWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_report(&mut self, report: &Report) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, report)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}
