//! Unit tests for configuration file loading and environment overrides
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate ONAIR_* variables are marked with #[serial]
//! to ensure they run sequentially, not in parallel.

use onair_common::config::{env_override, env_override_args, load_section, resolve_config_path};
use onair_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
struct PollSection {
    poll_interval_ms: u64,
    failure_threshold: u32,
    stats_path: String,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 15_000,
            failure_threshold: 3,
            stats_path: "/status-json.xsl".to_string(),
        }
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn test_section_overrides_only_given_keys() {
    let file = write_config(
        r#"
        [monitor]
        failure_threshold = 5

        [playout]
        max_restarts = 9
        "#,
    );

    let section: PollSection = load_section(Some(file.path()), "monitor").unwrap();
    assert_eq!(section.failure_threshold, 5);
    // Unspecified keys keep their defaults
    assert_eq!(section.poll_interval_ms, 15_000);
    assert_eq!(section.stats_path, "/status-json.xsl");
}

#[test]
fn test_absent_section_uses_defaults() {
    let file = write_config("[playout]\nmax_restarts = 2\n");
    let section: PollSection = load_section(Some(file.path()), "monitor").unwrap();
    assert_eq!(section, PollSection::default());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let file = write_config("[monitor\nfailure_threshold = ");
    let result: Result<PollSection, Error> = load_section(Some(file.path()), "monitor");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_wrong_value_type_is_config_error() {
    let file = write_config("[monitor]\nfailure_threshold = \"lots\"\n");
    let result: Result<PollSection, Error> = load_section(Some(file.path()), "monitor");
    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("[monitor]"), "message: {}", msg),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_cli_path_beats_env_var() {
    env::set_var("ONAIR_TEST_CONFIG", "/tmp/from-env.toml");
    let resolved = resolve_config_path(Some(Path::new("/tmp/from-cli.toml")), "ONAIR_TEST_CONFIG");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-cli.toml")));
    env::remove_var("ONAIR_TEST_CONFIG");
}

#[test]
#[serial]
fn test_env_var_path_used_without_cli() {
    env::set_var("ONAIR_TEST_CONFIG", "/tmp/from-env.toml");
    let resolved = resolve_config_path(None, "ONAIR_TEST_CONFIG");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));
    env::remove_var("ONAIR_TEST_CONFIG");
}

#[test]
#[serial]
fn test_env_override_parses_value() {
    env::set_var("ONAIR_TEST_THRESHOLD", " 7 ");
    let mut threshold = 3u32;
    env_override("ONAIR_TEST_THRESHOLD", &mut threshold).unwrap();
    assert_eq!(threshold, 7);
    env::remove_var("ONAIR_TEST_THRESHOLD");
}

#[test]
#[serial]
fn test_env_override_unset_keeps_value() {
    env::remove_var("ONAIR_TEST_THRESHOLD");
    let mut threshold = 3u32;
    env_override("ONAIR_TEST_THRESHOLD", &mut threshold).unwrap();
    assert_eq!(threshold, 3);
}

#[test]
#[serial]
fn test_env_override_bad_value_names_variable() {
    env::set_var("ONAIR_TEST_RATIO", "one-fifth");
    let mut ratio = 0.2f64;
    match env_override("ONAIR_TEST_RATIO", &mut ratio) {
        Err(Error::Config(msg)) => assert!(msg.contains("ONAIR_TEST_RATIO")),
        other => panic!("Expected config error, got {:?}", other),
    }
    assert_eq!(ratio, 0.2);
    env::remove_var("ONAIR_TEST_RATIO");
}

#[test]
#[serial]
fn test_env_override_args_splits_on_whitespace() {
    env::set_var("ONAIR_TEST_ARGS", "-re  -i /tmp/onair.pcm\t-f mp3");
    let mut args = vec!["default".to_string()];
    env_override_args("ONAIR_TEST_ARGS", &mut args);
    assert_eq!(args, vec!["-re", "-i", "/tmp/onair.pcm", "-f", "mp3"]);
    env::remove_var("ONAIR_TEST_ARGS");
}
