use crate::application::engine::TaarufEngine;
use crate::domain::actor::{Actor, ActorId};
use crate::error::Result;
use crate::infrastructure::session::InMemorySession;
use crate::interfaces::csv::command_reader::{CommandType, ScriptCommand};

/// Drives an engine from scenario commands on behalf of a single actor.
pub struct ScriptRunner<'a> {
    engine: &'a TaarufEngine,
    session: &'a InMemorySession,
    actor: Actor,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(engine: &'a TaarufEngine, session: &'a InMemorySession, actor: Actor) -> Self {
        Self {
            engine,
            session,
            actor,
        }
    }

    pub async fn execute(&self, command: &ScriptCommand) -> Result<()> {
        match command.command {
            CommandType::Login => self.session.sign_in(self.actor.clone()).await,
            CommandType::Logout => self.session.sign_out().await,
            CommandType::Receive => {
                self.engine
                    .receive_request(
                        command.id()?,
                        &ActorId::new(command.user()?),
                        command.text(),
                    )
                    .await?;
            }
            CommandType::Request => {
                self.engine
                    .send_request(&ActorId::new(command.user()?), command.text())
                    .await?;
            }
            CommandType::Accept => {
                self.engine.accept(command.id()?).await?;
            }
            CommandType::Reject => {
                self.engine.reject(command.id()?).await?;
            }
            CommandType::Message => {
                self.engine.send_message(command.text()).await?;
            }
            CommandType::Escalate => {
                self.engine.request_escalation().await?;
            }
            CommandType::Approve => {
                self.engine.approve_escalation().await?;
            }
            CommandType::Complete => {
                self.engine.complete_process().await?;
            }
            CommandType::Terminate => {
                self.engine.terminate(command.text()).await?;
            }
        }
        Ok(())
    }
}
