//! Focused unit tests covering CLI configuration and the status report.

use super::*;
use crate::ingest::{IngestConfig, config_from_layers_for_test};
use crate::references::{SyncReferencesArgs, SyncReferencesConfig};
use crate::status::run_status_with;
use camino::Utf8PathBuf;
use procura_core::{BLOCK_SIZE, ResourceKind};
use procura_data::{DEFAULT_BASE_URL, FsPageCache, PageCache, test_support::records};
use rstest::rstest;
use std::time::Duration;
use tempfile::TempDir;

fn workspace() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    (tmp, root)
}

#[rstest]
#[case(None, Some(Utf8PathBuf::from("procura.db")), ARG_CACHE_DIR, ENV_INGEST_CACHE_DIR)]
#[case(Some(Utf8PathBuf::from("cache")), None, ARG_DATABASE, ENV_INGEST_DATABASE)]
fn converting_without_required_fields_errors(
    #[case] cache_dir: Option<Utf8PathBuf>,
    #[case] database: Option<Utf8PathBuf>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = ingest::IngestArgs {
        cache_dir,
        database,
        ..ingest::IngestArgs::default()
    };
    let err = IngestConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn skipping_both_loops_is_rejected() {
    let args = ingest::IngestArgs {
        cache_dir: Some(Utf8PathBuf::from("cache")),
        database: Some(Utf8PathBuf::from("procura.db")),
        skip_entities: true,
        skip_contracts: true,
        ..ingest::IngestArgs::default()
    };
    let err = IngestConfig::try_from(args).expect_err("nothing to ingest");
    assert!(matches!(err, CliError::NothingToIngest), "found {err:?}");
}

#[rstest]
fn remote_options_default_to_the_public_portal() {
    let args = ingest::IngestArgs {
        cache_dir: Some(Utf8PathBuf::from("cache")),
        database: Some(Utf8PathBuf::from("procura.db")),
        ..ingest::IngestArgs::default()
    };
    let config = IngestConfig::try_from(args).expect("config should build");
    assert_eq!(config.remote.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.remote.timeout, Duration::from_secs(30));
    assert!(!config.parallel);
}

#[rstest]
fn remote_options_override_the_defaults() {
    let args = ingest::IngestArgs {
        cache_dir: Some(Utf8PathBuf::from("cache")),
        database: Some(Utf8PathBuf::from("procura.db")),
        endpoint: Some("http://localhost:8080/rest".to_owned()),
        user_agent: Some("mirror/2".to_owned()),
        timeout_secs: Some(5),
        ..ingest::IngestArgs::default()
    };
    let config = IngestConfig::try_from(args).expect("config should build");
    assert_eq!(config.remote.base_url, "http://localhost:8080/rest");
    assert_eq!(config.remote.user_agent, "mirror/2");
    assert_eq!(config.remote.timeout, Duration::from_secs(5));
}

#[rstest]
fn sync_requires_a_database() {
    let err = SyncReferencesConfig::try_from(SyncReferencesArgs::default())
        .expect_err("database missing");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_DATABASE);
            assert_eq!(env, ENV_SYNC_DATABASE);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "timeout_secs": "soon" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let (_tmp, root) = workspace();
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "cache_dir": root.join("from-file").as_str(),
            "database": root.join("file.db").as_str(),
            "endpoint": "http://from-file/rest",
        }),
        None,
    );
    composer.push_environment(json!({
        "database": root.join("env.db").as_str(),
    }));
    composer.push_cli(json!({
        "cache_dir": root.join("from-cli").as_str(),
    }));

    let config = config_from_layers_for_test(composer.layers()).expect("merged config");
    assert_eq!(config.cache_dir, root.join("from-cli"));
    assert_eq!(config.database, root.join("env.db"));
    assert_eq!(config.remote.base_url, "http://from-file/rest");
}

#[rstest]
fn status_reports_missing_cache_directory() {
    let (_tmp, root) = workspace();
    let args = status::StatusArgs {
        cache_dir: Some(root.join("absent")),
    };
    let err = run_status_with(args, &mut Vec::new()).expect_err("missing cache dir");
    assert!(matches!(err, CliError::MissingCacheDir { .. }), "found {err:?}");
}

#[rstest]
fn status_prints_the_resume_point_of_each_kind() {
    let (_tmp, root) = workspace();
    let cache = FsPageCache::open(&root).expect("open cache");
    for block in [0, 3] {
        cache
            .put_block(ResourceKind::Entities, block, &records(1, BLOCK_SIZE).into())
            .expect("seed cache");
    }

    let mut output = Vec::new();
    run_status_with(
        status::StatusArgs {
            cache_dir: Some(root),
        },
        &mut output,
    )
    .expect("status succeeds");

    let text = String::from_utf8(output).expect("utf-8 output");
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "entities: highest cached block 3, next run resumes at 3",
            "contracts: nothing cached, next run starts at block 0",
        ]
    );
}
