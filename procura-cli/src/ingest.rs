//! `ingest` command: walk entity and contract blocks into the database.

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use procura_data::{HttpRemoteConfig, IngestReport};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_CACHE_DIR, ARG_DATABASE, ARG_ENDPOINT, ARG_TIMEOUT_SECS, ARG_USER_AGENT, CliError,
    ENV_INGEST_CACHE_DIR, ENV_INGEST_DATABASE, connect::remote_config,
};

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch entity and contract blocks from the portal, caching \
                 every page on disk and saving normalised records into SQLite. \
                 Runs resume from the highest cached block of each kind. \
                 Options can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Ingest entities and contracts"
)]
#[ortho_config(prefix = "PROCURA")]
pub(crate) struct IngestArgs {
    /// Directory holding the page cache.
    #[arg(long = ARG_CACHE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) cache_dir: Option<Utf8PathBuf>,
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
    /// Do not run the entities loop.
    #[arg(long = "skip-entities")]
    #[serde(default)]
    pub(crate) skip_entities: bool,
    /// Do not run the contracts loop.
    #[arg(long = "skip-contracts")]
    #[serde(default)]
    pub(crate) skip_contracts: bool,
    /// Run the entities and contracts loops at the same time.
    #[arg(long = "parallel")]
    #[serde(default)]
    pub(crate) parallel: bool,
}

impl IngestArgs {
    fn into_config(self) -> Result<IngestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IngestConfig::try_from(merged)
    }
}

/// Resolved `ingest` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IngestConfig {
    pub(crate) cache_dir: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) remote: HttpRemoteConfig,
    pub(crate) skip_entities: bool,
    pub(crate) skip_contracts: bool,
    pub(crate) parallel: bool,
}

impl IngestConfig {
    const fn runs_both(&self) -> bool {
        !self.skip_entities && !self.skip_contracts
    }
}

impl TryFrom<IngestArgs> for IngestConfig {
    type Error = CliError;

    fn try_from(args: IngestArgs) -> Result<Self, Self::Error> {
        let cache_dir = args.cache_dir.ok_or(CliError::MissingArgument {
            field: ARG_CACHE_DIR,
            env: ENV_INGEST_CACHE_DIR,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_INGEST_DATABASE,
        })?;
        if args.skip_entities && args.skip_contracts {
            return Err(CliError::NothingToIngest);
        }
        Ok(Self {
            cache_dir,
            database,
            remote: remote_config(args.endpoint, args.user_agent, args.timeout_secs),
            skip_entities: args.skip_entities,
            skip_contracts: args.skip_contracts,
            parallel: args.parallel,
        })
    }
}

/// Reports of the loops an `ingest` run executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct IngestOutcome {
    pub(crate) entities: Option<IngestReport>,
    pub(crate) contracts: Option<IngestReport>,
}

pub(crate) fn resolve_ingest_config(args: IngestArgs) -> Result<IngestConfig, CliError> {
    args.into_config()
}

#[cfg(feature = "store-sqlite")]
pub(super) fn run_ingest(args: IngestArgs) -> Result<IngestOutcome, CliError> {
    let config = resolve_ingest_config(args)?;
    let remote = crate::connect::build_remote(&config.remote)?;
    ingest_with(&config, &remote)
}

#[cfg(not(feature = "store-sqlite"))]
pub(super) fn run_ingest(args: IngestArgs) -> Result<IngestOutcome, CliError> {
    resolve_ingest_config(args)?;
    Err(CliError::MissingFeature {
        feature: "store-sqlite",
        action: "ingest",
    })
}

/// Run the configured loops against `remote`.
///
/// Sequential runs share one connection; `--parallel` opens a second
/// connection so each loop owns its store handle.
#[cfg(feature = "store-sqlite")]
pub(crate) fn ingest_with<R>(config: &IngestConfig, remote: &R) -> Result<IngestOutcome, CliError>
where
    R: procura_data::RemoteSource + Sync,
{
    use crate::connect::{open_cache, open_store};
    use procura_data::IngestionDriver;

    let cache = open_cache(&config.cache_dir)?;
    let driver = IngestionDriver::new(&cache, remote);
    let mut store = open_store(&config.database)?;

    let outcome = if config.parallel && config.runs_both() {
        let mut contract_store = open_store(&config.database)?;
        let (entities, contracts) = driver.update_concurrently(&mut store, &mut contract_store)?;
        IngestOutcome {
            entities: Some(entities),
            contracts: Some(contracts),
        }
    } else {
        let entities = if config.skip_entities {
            None
        } else {
            Some(driver.update_entities(&mut store)?)
        };
        let contracts = if config.skip_contracts {
            None
        } else {
            Some(driver.update_contracts(&mut store)?)
        };
        IngestOutcome {
            entities,
            contracts,
        }
    };

    for report in [outcome.entities, outcome.contracts].into_iter().flatten() {
        log::info!("{report}");
    }
    Ok(outcome)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<IngestConfig, CliError> {
    let merged = IngestArgs::merge_from_layers(layers).map_err(CliError::from)?;
    IngestConfig::try_from(merged)
}
