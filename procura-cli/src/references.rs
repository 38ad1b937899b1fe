//! `sync-references` command: mirror the reference vocabularies.

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use procura_data::{HttpRemoteConfig, VocabularySummary};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_ENDPOINT, ARG_TIMEOUT_SECS, ARG_USER_AGENT, CliError, ENV_SYNC_DATABASE,
    connect::remote_config,
};

/// CLI arguments for the `sync-references` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch contract types, procedure types, countries, and the \
                 districts and councils of Portugal, creating any entry the \
                 database does not hold yet. Run this before ingesting \
                 contracts so their references resolve.",
    about = "Mirror reference vocabularies"
)]
#[ortho_config(prefix = "PROCURA")]
pub(crate) struct SyncReferencesArgs {
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Base URL of the portal's REST interface.
    #[arg(long = ARG_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) endpoint: Option<String>,
    /// User agent sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

/// Resolved `sync-references` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncReferencesConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) remote: HttpRemoteConfig,
}

impl TryFrom<SyncReferencesArgs> for SyncReferencesConfig {
    type Error = CliError;

    fn try_from(args: SyncReferencesArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_SYNC_DATABASE,
        })?;
        Ok(Self {
            database,
            remote: remote_config(args.endpoint, args.user_agent, args.timeout_secs),
        })
    }
}

pub(crate) fn resolve_sync_config(
    args: SyncReferencesArgs,
) -> Result<SyncReferencesConfig, CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    SyncReferencesConfig::try_from(merged)
}

#[cfg(feature = "store-sqlite")]
pub(super) fn run_sync_references(
    args: SyncReferencesArgs,
) -> Result<VocabularySummary, CliError> {
    let config = resolve_sync_config(args)?;
    let remote = crate::connect::build_remote(&config.remote)?;
    sync_with(&config, &remote)
}

#[cfg(not(feature = "store-sqlite"))]
pub(super) fn run_sync_references(
    args: SyncReferencesArgs,
) -> Result<VocabularySummary, CliError> {
    resolve_sync_config(args)?;
    Err(CliError::MissingFeature {
        feature: "store-sqlite",
        action: "sync-references",
    })
}

#[cfg(feature = "store-sqlite")]
pub(crate) fn sync_with<R>(
    config: &SyncReferencesConfig,
    remote: &R,
) -> Result<VocabularySummary, CliError>
where
    R: procura_data::RemoteSource,
{
    let mut store = crate::connect::open_store(&config.database)?;
    Ok(procura_data::sync_reference_vocabularies(remote, &mut store)?)
}
