use std::io::{Error, Write};
use std::path::Path;
use std::sync::Arc;
use taaruf::application::engine::TaarufEngine;
use taaruf::domain::actor::{Actor, ActorId, Gender};
use taaruf::infrastructure::in_memory::{
    InMemoryCandidateDirectory, InMemoryProcessStore, InMemoryRequestStore,
};
use taaruf::infrastructure::notifier::RecordingNotifier;
use taaruf::infrastructure::session::InMemorySession;
use tempfile::NamedTempFile;

pub const CANDIDATES: &str = "tests/fixtures/candidates.json";

/// Writes a scenario script with the standard header followed by `rows`.
pub fn script(rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "command, id, user, text")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    file.flush()?;
    Ok(file)
}

/// Writes `count` message rows after accepting an incoming request from user 101.
pub fn conversation_script(path: &Path, count: usize) -> Result<(), Error> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "command, id, user, text")?;
    writeln!(file, "receive, R1, 101, Assalamu'alaikum")?;
    writeln!(file, "accept, R1")?;
    for i in 1..=count {
        writeln!(file, "message, , , message {i}")?;
    }
    Ok(())
}

pub fn demo_actor() -> Actor {
    Actor {
        id: ActorId::new("1"),
        display_name: "Demo User".to_string(),
        gender: Gender::Female,
        has_completed_profile: true,
    }
}

pub struct TestEngine {
    pub engine: TaarufEngine,
    pub session: InMemorySession,
    pub notifier: RecordingNotifier,
    pub processes: InMemoryProcessStore,
}

pub fn engine() -> TestEngine {
    let session = InMemorySession::signed_in(demo_actor());
    let notifier = RecordingNotifier::new();
    let processes = InMemoryProcessStore::new();
    let directory =
        InMemoryCandidateDirectory::from_path(CANDIDATES).expect("Failed to load candidates");
    let engine = TaarufEngine::new(
        Arc::new(session.clone()),
        Arc::new(notifier.clone()),
        Box::new(InMemoryRequestStore::new()),
        Box::new(processes.clone()),
        Box::new(directory),
    );
    TestEngine {
        engine,
        session,
        notifier,
        processes,
    }
}
