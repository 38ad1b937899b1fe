//! Command-line interface for mirroring the public procurement portal.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

mod connect;
mod error;
mod ingest;
mod references;
mod status;

pub use error::CliError;

use ingest::{IngestArgs, run_ingest};
use references::{SyncReferencesArgs, run_sync_references};
use status::{StatusArgs, run_status};

pub(crate) const ARG_CACHE_DIR: &str = "cache-dir";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_ENDPOINT: &str = "endpoint";
pub(crate) const ARG_USER_AGENT: &str = "user-agent";
pub(crate) const ARG_TIMEOUT_SECS: &str = "timeout-secs";
pub(crate) const ENV_INGEST_CACHE_DIR: &str = "PROCURA_CMDS_INGEST_CACHE_DIR";
pub(crate) const ENV_INGEST_DATABASE: &str = "PROCURA_CMDS_INGEST_DATABASE";
pub(crate) const ENV_SYNC_DATABASE: &str = "PROCURA_CMDS_SYNC_REFERENCES_DATABASE";
pub(crate) const ENV_STATUS_CACHE_DIR: &str = "PROCURA_CMDS_STATUS_CACHE_DIR";

const DEFAULT_LOG_FILTER: &str = "info";

/// Run the procura CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Ingest(args) => run_ingest(args).map(|_| ()),
        Command::SyncReferences(args) => run_sync_references(args).map(|_| ()),
        Command::Status(args) => run_status(args),
    }
}

/// Install the stderr log subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Records emitted
/// through the `log` facade by the library crates are forwarded to it.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
    if installed.is_err() {
        log::debug!("log subscriber already installed");
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "procura",
    about = "Mirror public procurement entities and contracts into SQLite",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch entity and contract blocks, caching pages and saving records.
    Ingest(IngestArgs),
    /// Mirror the reference vocabularies (types, countries, districts, councils).
    SyncReferences(SyncReferencesArgs),
    /// Report the resume point of each resource kind from the page cache.
    Status(StatusArgs),
}

#[cfg(test)]
mod tests;
