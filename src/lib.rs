// src/lib.rs
pub mod application;
pub mod cli;
pub mod constants;
pub mod domain;
pub mod infrastructure;
pub mod util;

use std::collections::BTreeMap;
use std::path::Path;
use anyhow::{Context, Result};
use application::{Action, BatchReport, Catalog, CollectionSession, CollectionStore, NoteSubmitter, RemoteInvoker, Route, StoreOpener};
use domain::note::OneOrMany;
use domain::NoteRequest;
use infrastructure::{AnkiOpener, Config, EnvelopeClient, HttpFetcher, SessionServer};
use serde_json::json;
use tracing::{debug, info};
use crate::cli::args::{Args, Command};

pub fn run(args: Args, config: Config) -> Result<()> {
    debug!(?args, "Starting ankisubmit with arguments");

    match args.command.clone() {
        Command::Add { file, local } => handle_add_command(&args, &config, &file, local),
        Command::Models => handle_models_command(&args, &config),
        Command::Decks => handle_decks_command(&args, &config),
        Command::Status => handle_status_command(&config),
        Command::Init { force } => handle_init_command(&args, force),
        Command::Serve { note } => handle_serve_command(&args, &config, note),
    }
}

fn handle_add_command(args: &Args, config: &Config, file: &Path, local: bool) -> Result<()> {
    let requests = load_note_requests(file)?;
    info!(notes = requests.len(), ?file, "Submitting notes");

    let opener = collection_opener(args, config);
    let fetcher = HttpFetcher::new(config.media.fetch_timeout())?;
    let submitter = NoteSubmitter::new(remote_client(config)?, opener, fetcher);

    let report = if local {
        BatchReport {
            route: Route::Local { reason: None },
            outcomes: submitter.add_notes_locally(&requests),
        }
    } else {
        submitter.add_notes(&requests)
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn handle_models_command(args: &Args, config: &Config) -> Result<()> {
    let catalog = Catalog::new(collection_opener(args, config));
    let models = catalog.list_models()?;

    println!("{}", serde_json::to_string_pretty(&models)?);
    Ok(())
}

fn handle_decks_command(args: &Args, config: &Config) -> Result<()> {
    let catalog = Catalog::new(collection_opener(args, config));
    let decks: BTreeMap<String, i64> = catalog.list_decks()?.into_iter().collect();

    println!("{}", serde_json::to_string_pretty(&decks)?);
    Ok(())
}

fn handle_status_command(config: &Config) -> Result<()> {
    let version = remote_client(config)?
        .invoke(Action::Version, json!({}))
        .context("Remote service is not reachable")?;

    println!("{}: version {}", config.remote.url, version);
    Ok(())
}

fn handle_init_command(args: &Args, force: bool) -> Result<()> {
    let path = args
        .config
        .clone()
        .or_else(Config::default_path)
        .context("Could not determine config directory")?;
    if path.exists() && !force {
        anyhow::bail!("Config file already exists: {} (use --force to overwrite)", path.display());
    }

    Config::create_default(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn handle_serve_command(args: &Args, config: &Config, note: Option<i64>) -> Result<()> {
    let store = collection_opener(args, config).open()?;

    let bind_address = config.server.resolved_bind_address();
    let server = SessionServer::bind(
        (bind_address.as_str(), config.server.bind_port),
        CollectionSession::new(store, note),
        config.server.poll_interval(),
    )?
    .with_idle_timeout(config.server.idle_timeout());
    println!("Listening on {}", server.local_addr()?);

    let session = server.run()?;
    session.into_store().close()?;
    Ok(())
}

/// Read one note object or an array of notes.
pub fn load_note_requests(path: &Path) -> Result<Vec<NoteRequest>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read note file {}", path.display()))?;
    let requests: OneOrMany<NoteRequest> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse note file {}", path.display()))?;
    Ok(requests.into_vec())
}

fn remote_client(config: &Config) -> Result<EnvelopeClient> {
    Ok(EnvelopeClient::new(&config.remote.url, config.remote.timeout())?
        .with_version(config.remote.api_version)
        .with_key(&config.remote.api_key))
}

/// CLI path, then configured path, then profile discovery. Profiles are only
/// looked up when the collection is actually opened.
pub fn collection_opener(args: &Args, config: &Config) -> AnkiOpener {
    let opener = if let Some(path) = &args.collection {
        debug!(?path, "Using provided collection path");
        AnkiOpener::new(path)
    } else if !config.collection.path.is_empty() {
        AnkiOpener::new(&config.collection.path)
    } else {
        let profile = args
            .profile
            .clone()
            .or_else(|| Some(config.collection.profile.clone()).filter(|p| !p.is_empty()));
        debug!(?profile, "Collection will be found through profile lookup");
        AnkiOpener::for_profile(profile)
    };
    opener.refusing_while_anki_runs()
}

#[cfg(test)]
/// must be public to be used from integration tests
mod tests {
    use crate::util::testing;
    #[ctor::ctor]
    fn init() {
        testing::init_test_setup().expect("Failed to initialize test setup");
    }
}
