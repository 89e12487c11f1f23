//! cmr - command line client for the CMR metadata catalog.
//!
//! Searches collections and granules, and validates, ingests and deletes
//! them under the provider named in the config file. The Echo token needed
//! for ingest is minted on first use and refreshed when the server stops
//! accepting it.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cmr_core::auth::CredentialStore;
use cmr_core::config::{self, CONFIG_ENV_VAR};
use cmr_core::{metadata, CmrClient, ConfigError, ConfigStore, IngestOutcome};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "cmr", version, about = "Command line client for the CMR metadata catalog")]
struct Cli {
    /// Config file (defaults to <config dir>/cmr-client/cmr.toml)
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store the account password in the OS keychain
    Login,
    /// Remove the account password from the OS keychain
    Logout,
    #[command(flatten)]
    Client(ClientCommand),
}

/// Commands that talk to CMR through a [`CmrClient`].
#[derive(Debug, Subcommand)]
enum ClientCommand {
    /// Inspect or replace the Echo token
    #[command(subcommand)]
    Token(TokenCommand),
    /// Search collections or granules
    Search {
        kind: RecordKind,
        /// Maximum number of results
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Search parameters as key=value
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Print the raw search response for a collection short name or granule UR
    Get { kind: RecordKind, id: String },
    /// Validate a metadata document without ingesting it
    Validate { kind: RecordKind, file: PathBuf },
    /// Validate and ingest a metadata document
    Ingest { kind: RecordKind, file: PathBuf },
    /// Validate and ingest a metadata document over an existing record
    Update { kind: RecordKind, file: PathBuf },
    /// Delete a collection by dataset id or a granule by native id
    Delete { kind: RecordKind, id: String },
}

#[derive(Debug, Subcommand)]
enum TokenCommand {
    /// Report whether the server still accepts the stored token
    Status,
    /// Mint a new token and write it to the config file
    Refresh,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RecordKind {
    Collection,
    Granule,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    let path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    debug!(path = ?path, "Using config file");

    let store = match ConfigStore::open(&path) {
        Ok(store) => store,
        Err(e @ ConfigError::Inaccessible { .. }) => {
            eprintln!("[CONFIGFILE ERROR] {}", e);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    match cli.command {
        Command::Login => login(&store)?,
        Command::Logout => {
            if CredentialStore::delete(&store.config().credentials.username)? {
                println!("Password removed from keychain");
            } else {
                println!("No password stored in keychain");
            }
        }
        Command::Client(command) => {
            let client = CmrClient::new(store).await?;
            run(&client, command).await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn login(store: &ConfigStore) -> Result<()> {
    let username = &store.config().credentials.username;
    if CredentialStore::has_credentials(username) {
        println!("Replacing stored password for {}", username);
    }
    let password = rpassword::prompt_password(format!("Password for {}: ", username))?;
    CredentialStore::store(username, &password)?;
    info!(username = %username, "Password stored in keychain");
    println!("Password stored in keychain");
    Ok(())
}

async fn run(client: &CmrClient, command: ClientCommand) -> Result<()> {
    match command {
        ClientCommand::Token(TokenCommand::Status) => {
            if client.session().is_expired().await? {
                println!("expired");
            } else {
                println!("valid");
            }
        }
        ClientCommand::Token(TokenCommand::Refresh) => {
            client.session().refresh().await?;
            println!("Token replaced");
        }
        ClientCommand::Search {
            kind,
            limit,
            params,
        } => match kind {
            RecordKind::Collection => {
                for c in client.search_collections(limit, &params).await? {
                    println!("{}\t{}\t{}", c.id, c.display_name(), c.location.as_deref().unwrap_or(""));
                }
            }
            RecordKind::Granule => {
                for g in client.search_granules(limit, &params).await? {
                    println!("{}\t{}", g.id, g.display_name());
                }
            }
        },
        ClientCommand::Get { kind, id } => {
            let body = match kind {
                RecordKind::Collection => client.collection_by_short_name(&id).await?,
                RecordKind::Granule => client.granule_by_ur(&id).await?,
            };
            write_body(&body)?;
        }
        ClientCommand::Validate { kind, file } => {
            let data = metadata::read_document(&file).await?;
            let validation = match kind {
                RecordKind::Collection => {
                    let dataset_id = metadata::dataset_id(&data)?;
                    client.validate_collection(&data, &dataset_id).await?
                }
                RecordKind::Granule => {
                    let short_name = metadata::short_name(&data)?;
                    client.validate_granule(&data, &short_name).await?
                }
            };
            eprintln!("Validation status: {}", validation.status);
            write_body(&validation.body)?;
        }
        ClientCommand::Ingest { kind, file } => {
            let outcome = match kind {
                RecordKind::Collection => client.ingest_collection(&file).await?,
                RecordKind::Granule => client.ingest_granule(&file).await?,
            };
            report_ingest(&file, outcome)?;
        }
        ClientCommand::Update { kind, file } => {
            let outcome = match kind {
                RecordKind::Collection => client.update_collection(&file).await?,
                RecordKind::Granule => client.update_granule(&file).await?,
            };
            report_ingest(&file, outcome)?;
        }
        ClientCommand::Delete { kind, id } => {
            let body = match kind {
                RecordKind::Collection => client.delete_collection(&id).await?,
                RecordKind::Granule => client.delete_granule(&id).await?,
            };
            write_body(&body)?;
        }
    }
    Ok(())
}

fn report_ingest(file: &Path, outcome: IngestOutcome) -> Result<()> {
    match outcome {
        IngestOutcome::Ingested(body) => write_body(&body),
        IngestOutcome::Rejected(validation) => {
            eprintln!(
                "{} failed validation ({}), nothing was ingested",
                file.display(),
                validation.status
            );
            write_body(&validation.body)
        }
    }
}

fn write_body(body: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(body).context("Failed to write response")?;
    if !body.ends_with(b"\n") {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("short_name=CERES_EBAF").unwrap(),
            ("short_name".to_string(), "CERES_EBAF".to_string())
        );
        assert_eq!(
            parse_param("temporal=2000-01-01T00:00:00Z,").unwrap(),
            ("temporal".to_string(), "2000-01-01T00:00:00Z,".to_string())
        );
        assert!(parse_param("no-equals").is_err());
        assert!(parse_param("=value").is_err());
    }

    #[test]
    fn test_parse_search_command() {
        let cli = Cli::try_parse_from([
            "cmr",
            "--config",
            "/tmp/cmr.toml",
            "search",
            "granule",
            "--limit",
            "10",
            "short_name=CERES_EBAF",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cmr.toml")));
        match cli.command {
            Command::Client(ClientCommand::Search {
                kind: RecordKind::Granule,
                limit,
                params,
            }) => {
                assert_eq!(limit, 10);
                assert_eq!(params, vec![("short_name".to_string(), "CERES_EBAF".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_keychain_commands_need_no_client() {
        let cli = Cli::try_parse_from(["cmr", "login"]).unwrap();
        assert!(matches!(cli.command, Command::Login));
        let cli = Cli::try_parse_from(["cmr", "logout"]).unwrap();
        assert!(matches!(cli.command, Command::Logout));
        let cli = Cli::try_parse_from(["cmr", "token", "refresh"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Client(ClientCommand::Token(TokenCommand::Refresh))
        ));
    }
}
