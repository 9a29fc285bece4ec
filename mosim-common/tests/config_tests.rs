//! Integration tests for bootstrap configuration
//!
//! Tests that touch MOSIM_ROOT_FOLDER or MOSIM_CONFIG are #[serial] so
//! they never race on the process environment.

use std::env;
use std::path::{Path, PathBuf};

use mosim_common::config::{
    config_file_path, default_root_folder, load_toml_file, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use serde::Deserialize;
use serial_test::serial;

#[derive(Debug, Default, Deserialize)]
struct BootstrapConfig {
    root_folder: Option<PathBuf>,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root, default_root_folder());
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/mosim-env-root");

    let root = RootFolderResolver::new("test-module")
        .with_toml_value(Some(PathBuf::from("/tmp/mosim-toml-root")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/mosim-env-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/mosim-env-root");

    let root = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/mosim-cli-root")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/mosim-cli-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_blank_env_falls_through_to_toml() {
    env::set_var(ROOT_FOLDER_ENV, "   ");

    let root = RootFolderResolver::new("test-module")
        .with_toml_value(Some(PathBuf::from("/tmp/mosim-toml-root")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/mosim-toml-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_config_path_from_env() {
    env::set_var(CONFIG_FILE_ENV, "/tmp/mosim-from-env.toml");

    let path = config_file_path(None, "mosim-ae.toml");
    assert_eq!(path, Some(PathBuf::from("/tmp/mosim-from-env.toml")));

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
fn test_initializer_creates_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("fresh-root");

    let init = RootFolderInitializer::new(root.clone());
    init.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(init.templates_path().is_dir());
    assert_eq!(init.database_path(), root.join("mosim.db"));

    // idempotent
    init.ensure_directory_exists().unwrap();
}

#[test]
fn test_load_toml_reads_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mosim-ae.toml");
    std::fs::write(
        &path,
        "root_folder = \"/srv/mosim\"\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let config: BootstrapConfig = load_toml_file(Some(&path)).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/mosim")));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_load_toml_without_path_uses_defaults() {
    let config: BootstrapConfig = load_toml_file(None::<&Path>).unwrap();
    assert!(config.root_folder.is_none());
    assert_eq!(config.logging.level, "info");
}
