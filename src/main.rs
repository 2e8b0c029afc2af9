use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use taaruf::application::engine::TaarufEngine;
use taaruf::config::EngineConfig;
use taaruf::domain::actor::{Actor, ActorId, Gender};
use taaruf::domain::ports::{ProcessStoreBox, RequestStoreBox};
use taaruf::infrastructure::in_memory::{
    InMemoryCandidateDirectory, InMemoryProcessStore, InMemoryRequestStore,
};
use taaruf::infrastructure::json_file::JsonFileStore;
use taaruf::infrastructure::notifier::RecordingNotifier;
use taaruf::infrastructure::session::InMemorySession;
use taaruf::interfaces::csv::command_reader::CommandReader;
use taaruf::interfaces::report::{Report, ReportWriter};
use taaruf::interfaces::script::ScriptRunner;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario script (CSV with header `command, id, user, text`)
    script: PathBuf,

    /// Id of the user running the scenario
    #[arg(long, default_value = "1")]
    actor_id: String,

    /// Display name of the user running the scenario
    #[arg(long, default_value = "Demo User")]
    actor_name: String,

    #[arg(long, value_enum, default_value = "male")]
    gender: Gender,

    /// JSON array of candidate profiles requests can refer to
    #[arg(long)]
    directory: Option<PathBuf>,

    /// JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON state file (optional). If provided, state is loaded from and saved to it.
    #[arg(long)]
    state: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };
    let directory = match &cli.directory {
        Some(path) => InMemoryCandidateDirectory::from_path(path).into_diagnostic()?,
        None => InMemoryCandidateDirectory::default(),
    };

    let (requests, processes) = if let Some(path) = &cli.state {
        // Persist to a JSON document shared by both stores
        let store = JsonFileStore::open(path).into_diagnostic()?;
        let requests: RequestStoreBox = Box::new(store.clone());
        let processes: ProcessStoreBox = Box::new(store);
        (requests, processes)
    } else {
        let requests: RequestStoreBox = Box::new(InMemoryRequestStore::new());
        let processes: ProcessStoreBox = Box::new(InMemoryProcessStore::new());
        (requests, processes)
    };

    let actor = Actor {
        id: ActorId::new(cli.actor_id),
        display_name: cli.actor_name,
        gender: cli.gender,
        has_completed_profile: true,
    };
    let session = InMemorySession::signed_in(actor.clone());
    let notifier = RecordingNotifier::new();

    let engine = TaarufEngine::new(
        Arc::new(session.clone()),
        Arc::new(notifier.clone()),
        requests,
        processes,
        Box::new(directory),
    )
    .with_config(config);

    let file = std::fs::File::open(&cli.script).into_diagnostic()?;
    let runner = ScriptRunner::new(&engine, &session, actor.clone());
    for command in CommandReader::new(file).commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.execute(&command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    // Report from the scenario actor's point of view, even if the script signed out
    session.sign_in(actor).await;
    let report = Report::collect(&engine, notifier.notifications().await)
        .await
        .into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_report(&report).into_diagnostic()?;

    Ok(())
}
