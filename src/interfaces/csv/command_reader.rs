use crate::error::{Result, TaarufError};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Login,
    Logout,
    Receive,
    Request,
    Accept,
    Reject,
    Message,
    Escalate,
    Approve,
    Complete,
    Terminate,
}

/// One row of a scenario script: `command, id, user, text`.
///
/// `id` names a request, `user` a user id and `text` carries a message or a reason.
/// Which columns are needed depends on the command.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ScriptCommand {
    pub command: CommandType,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ScriptCommand {
    pub fn id(&self) -> Result<&str> {
        self.id.as_deref().ok_or_else(|| {
            TaarufError::ValidationError(format!("{:?} requires a request id", self.command))
        })
    }

    pub fn user(&self) -> Result<&str> {
        self.user.as_deref().ok_or_else(|| {
            TaarufError::ValidationError(format!("{:?} requires a user id", self.command))
        })
    }

    /// Missing text is passed on as empty so the engine reports the validation failure.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Reads scenario commands from a CSV source.
///
/// Whitespace around fields is trimmed and short rows are accepted, so commands
/// without arguments can be written as a single column.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands, yielding an error for each malformed row.
    pub fn commands(self) -> impl Iterator<Item = Result<ScriptCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(TaarufError::from))
    }
}
