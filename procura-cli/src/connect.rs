//! Construction of the cache, remote source and store shared by subcommands.

use std::time::Duration;

use camino::Utf8Path;
use procura_data::{FsPageCache, HttpRemoteConfig, HttpRemoteSource};

use crate::CliError;

/// Apply the optional remote overrides on top of the defaults.
pub(crate) fn remote_config(
    endpoint: Option<String>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
) -> HttpRemoteConfig {
    let mut config = endpoint.map_or_else(HttpRemoteConfig::default, HttpRemoteConfig::new);
    if let Some(agent) = user_agent {
        config = config.with_user_agent(agent);
    }
    if let Some(secs) = timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config
}

pub(crate) fn build_remote(config: &HttpRemoteConfig) -> Result<HttpRemoteSource, CliError> {
    HttpRemoteSource::with_config(config.clone()).map_err(|source| CliError::BuildRemote {
        base_url: config.base_url.clone(),
        source,
    })
}

pub(crate) fn open_cache(path: &Utf8Path) -> Result<FsPageCache, CliError> {
    FsPageCache::open(path).map_err(|source| CliError::Cache {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(feature = "store-sqlite")]
pub(crate) fn open_store(path: &Utf8Path) -> Result<procura_core::SqliteStore, CliError> {
    procura_fs::ensure_parent_dir(path).map_err(|source| CliError::PrepareDatabaseDir {
        path: path.to_path_buf(),
        source,
    })?;
    procura_core::SqliteStore::open(path).map_err(|source| CliError::OpenStore {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}
