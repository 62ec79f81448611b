//! Tests for bootstrap configuration and root folder resolution
//!
//! Missing or invalid TOML must never abort startup; resolution priority is
//! CLI argument > SHIVIR_ROOT_FOLDER > TOML > compiled default.
//!
//! Tests that touch SHIVIR_ROOT_FOLDER are marked #[serial] so they never run
//! in parallel with each other.

use serial_test::serial;
use shivir_common::config::{
    database_path, default_root_folder, LoggingConfig, RootFolderResolver, TomlConfig,
    ROOT_FOLDER_ENV,
};
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolved = RootFolderResolver::new()
        .with_toml(TomlConfig::default())
        .resolve();

    assert_eq!(resolved, default_root_folder());
}

#[test]
#[serial]
fn test_resolver_env_var_overrides_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/shivir-env-root");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/shivir-toml-root")),
        logging: LoggingConfig::default(),
    };
    let resolved = RootFolderResolver::new().with_toml(toml).resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/shivir-env-root"));
}

#[test]
#[serial]
fn test_resolver_cli_arg_takes_precedence() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/shivir-env-root");

    let resolved = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/shivir-cli-root")))
        .with_toml(TomlConfig::default())
        .resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/shivir-cli-root"));
}

#[test]
#[serial]
fn test_resolver_empty_env_var_is_ignored() {
    env::set_var(ROOT_FOLDER_ENV, "");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/shivir-toml-root")),
        logging: LoggingConfig::default(),
    };
    let resolved = RootFolderResolver::new().with_toml(toml).resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/shivir-toml-root"));
}

#[test]
fn test_database_path_inside_root() {
    let root = PathBuf::from("/srv/shivir");
    assert_eq!(database_path(&root), PathBuf::from("/srv/shivir/shivir.db"));
}

#[test]
fn test_toml_parsing_with_all_fields() {
    let config = TomlConfig::from_toml_str(
        r#"
        root_folder = "/data/shivir"

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/data/shivir")));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_toml_missing_fields_use_defaults() {
    let config = TomlConfig::from_toml_str("").unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    let result = TomlConfig::from_toml_str("root_folder = [");
    assert!(matches!(result, Err(shivir_common::Error::Config(_))));
}

#[test]
fn test_toml_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = \"/opt/shivir\"\n").unwrap();

    let config = TomlConfig::from_file(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/opt/shivir")));
}

#[test]
fn test_missing_toml_file_is_an_error_not_a_panic() {
    let dir = TempDir::new().unwrap();
    let result = TomlConfig::from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(shivir_common::Error::Io(_))));
}
