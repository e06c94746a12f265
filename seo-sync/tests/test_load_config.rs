use seo_sync::load_config::{load_config, API_BASE_URL_ENV};
use seo_sync_core::contract::FirstSyncFallback;
use seo_sync_core::scheduler::{DEFAULT_SYNC_INTERVAL, MAX_SYNC_INTERVAL};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

/// A static config plus the required env var produces a complete CliConfig.
#[test]
#[serial]
fn test_load_config_success_injects_install_id_from_env() {
    let config_file = config_file(
        r#"
api_base_url: https://api.example.com/v1
sync_interval_hours: 6
first_sync_fallback: disabled
sources:
  - id: main
    domain: example.com
    install_id_env: SEO_SYNC_TEST_MAIN_INSTALL_ID
    target_directory: ./public
  - id: blog
    domain: blog.example.com
    install_id: inline-id
    target_directory: ./public/blog
"#,
    );

    env::remove_var(API_BASE_URL_ENV);
    env::set_var("SEO_SYNC_TEST_MAIN_INSTALL_ID", "secret-install-id");

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.api_base_url, "https://api.example.com/v1");
    assert_eq!(config.sync_interval, Duration::from_secs(6 * 3600));
    assert_eq!(config.first_sync_fallback, FirstSyncFallback::Disabled);
    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.sources[0].id, "main");
    assert_eq!(config.sources[0].config.install_id, "secret-install-id");
    assert_eq!(config.sources[1].config.install_id, "inline-id");
    assert_eq!(
        config.sources[1].config.target_directory,
        PathBuf::from("./public/blog")
    );

    let registry = config.build_registry();
    assert_eq!(registry.source_ids(), vec!["blog", "main"]);
    assert!(registry.active_ids().is_empty());
    assert!(!registry.is_legacy());
}

#[test]
#[serial]
fn test_load_config_defaults_and_env_base_url_override() {
    let config_file = config_file(
        r#"
api_base_url: https://api.example.com/v1
sources:
  - id: main
    domain: example.com
    install_id: abc
    target_directory: ./public
"#,
    );

    env::set_var(API_BASE_URL_ENV, "http://localhost:9999");
    let config = load_config(config_file.path()).expect("Config should load");
    env::remove_var(API_BASE_URL_ENV);

    assert_eq!(config.api_base_url, "http://localhost:9999");
    assert_eq!(config.sync_interval, DEFAULT_SYNC_INTERVAL);
    assert_eq!(config.first_sync_fallback, FirstSyncFallback::NewOnly);
}

#[test]
#[serial]
fn test_load_config_errors_on_missing_install_id_env() {
    let config_file = config_file(
        r#"
api_base_url: https://api.example.com/v1
sources:
  - id: main
    domain: example.com
    install_id_env: SEO_SYNC_TEST_UNSET_INSTALL_ID
    target_directory: ./public
"#,
    );
    env::remove_var("SEO_SYNC_TEST_UNSET_INSTALL_ID");

    let msg = load_config(config_file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("SEO_SYNC_TEST_UNSET_INSTALL_ID"),
        "Must error for missing env var, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_config_errors_on_duplicate_ids_and_missing_base_url() {
    let duplicate = config_file(
        r#"
api_base_url: https://api.example.com/v1
sources:
  - id: main
    domain: a.example.com
    install_id: a
    target_directory: ./a
  - id: main
    domain: b.example.com
    install_id: b
    target_directory: ./b
"#,
    );
    env::remove_var(API_BASE_URL_ENV);
    let msg = load_config(duplicate.path()).unwrap_err().to_string();
    assert!(msg.contains("duplicate"), "got: {msg}");

    let no_base = config_file(
        r#"
sources:
  - id: main
    domain: a.example.com
    install_id: a
    target_directory: ./a
"#,
    );
    let msg = load_config(no_base.path()).unwrap_err().to_string();
    assert!(msg.contains("api_base_url"), "got: {msg}");
}

/// Intervals whose seconds overflow u64, or that exceed the cap, are rejected
/// instead of wrapping into a much shorter schedule.
#[test]
#[serial]
fn test_load_config_rejects_oversized_sync_interval() {
    env::remove_var(API_BASE_URL_ENV);

    for hours in ["5124095576030432", "8761"] {
        let config_file = config_file(&format!(
            r#"
api_base_url: https://api.example.com/v1
sync_interval_hours: {hours}
sources:
  - id: main
    domain: example.com
    install_id: abc
    target_directory: ./public
"#
        ));

        let msg = load_config(config_file.path()).unwrap_err().to_string();
        assert!(
            msg.contains("sync_interval_hours must be at most"),
            "hours = {hours}, got: {msg}"
        );
    }

    let at_cap = config_file(
        r#"
api_base_url: https://api.example.com/v1
sync_interval_hours: 8760
sources:
  - id: main
    domain: example.com
    install_id: abc
    target_directory: ./public
"#,
    );
    let config = load_config(at_cap.path()).expect("Interval at the cap should load");
    assert_eq!(config.sync_interval, MAX_SYNC_INTERVAL);
}

/// If the config file is not valid YAML, load_config errors and reports as such.
#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let config_file = config_file("not-yaml: [:::");

    let msg = load_config(config_file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}
