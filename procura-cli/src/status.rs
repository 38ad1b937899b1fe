//! `status` command: report where the next run of each loop will resume.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use procura_core::ResourceKind;
use procura_data::highest_cached_block;
use serde::{Deserialize, Serialize};

use crate::{ARG_CACHE_DIR, CliError, ENV_STATUS_CACHE_DIR, connect::open_cache};

/// CLI arguments for the `status` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Show the highest cached block of each resource kind")]
#[ortho_config(prefix = "PROCURA")]
pub(crate) struct StatusArgs {
    /// Directory holding the page cache.
    #[arg(long = ARG_CACHE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) cache_dir: Option<Utf8PathBuf>,
}

pub(super) fn run_status(args: StatusArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_status_with(args, &mut stdout)
}

pub(crate) fn run_status_with(args: StatusArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let cache_dir = merged.cache_dir.ok_or(CliError::MissingArgument {
        field: ARG_CACHE_DIR,
        env: ENV_STATUS_CACHE_DIR,
    })?;
    if !cache_dir.is_dir() {
        return Err(CliError::MissingCacheDir { path: cache_dir });
    }
    let cache = open_cache(&cache_dir)?;
    for kind in ResourceKind::ALL {
        let highest = highest_cached_block(&cache, kind).map_err(|source| CliError::Cache {
            path: cache_dir.clone(),
            source,
        })?;
        let line = match highest {
            Some(block) => format!("{kind}: highest cached block {block}, next run resumes at {block}"),
            None => format!("{kind}: nothing cached, next run starts at block 0"),
        };
        writeln!(writer, "{line}").map_err(CliError::WriteOutput)?;
    }
    Ok(())
}
