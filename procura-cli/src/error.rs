//! Error types emitted by the procura CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use procura_core::StoreError;
use procura_data::{CacheError, IngestError, RemoteBuildError, VocabularyError};
use thiserror::Error;

/// Errors emitted by the procura CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// Both ingestion loops were skipped, leaving nothing to do.
    #[error("--skip-entities and --skip-contracts together leave nothing to ingest")]
    NothingToIngest,
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        feature: &'static str,
        action: &'static str,
    },
    /// The cache directory passed to `status` does not exist.
    #[error("cache directory {path:?} does not exist")]
    MissingCacheDir { path: Utf8PathBuf },
    /// Creating the directory that holds the database failed.
    #[error("failed to prepare database directory for {path:?}: {source}")]
    PrepareDatabaseDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite store failed.
    #[error("failed to open database {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: Box<StoreError>,
    },
    /// Opening or reading the page cache failed.
    #[error("page cache at {path:?} is unusable: {source}")]
    Cache {
        path: Utf8PathBuf,
        #[source]
        source: CacheError,
    },
    /// Constructing the HTTP remote source failed.
    #[error("failed to build remote source for {base_url:?}: {source}")]
    BuildRemote {
        base_url: String,
        #[source]
        source: RemoteBuildError,
    },
    /// An ingestion loop failed.
    #[error("ingestion failed: {0}")]
    Ingest(#[source] Box<IngestError>),
    /// Synchronising reference vocabularies failed.
    #[error("reference sync failed: {0}")]
    SyncReferences(#[source] Box<VocabularyError>),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl From<IngestError> for CliError {
    fn from(source: IngestError) -> Self {
        Self::Ingest(Box::new(source))
    }
}

impl From<VocabularyError> for CliError {
    fn from(source: VocabularyError) -> Self {
        Self::SyncReferences(Box::new(source))
    }
}
