//! Config file layering, environment overrides and dotted-key editing.
//!
//! Tests touching `KIOSK_*` variables run serially.

// Integration tests have relaxed clippy settings for test infrastructure.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use std::{fs, path::PathBuf};

use kiosk_core::{config::load_partial_toml_file, Error, KioskConfig};
use serial_test::serial;

const ENV_VARS: &[&str] = &[
    "KIOSK_MASTER_CODE",
    "KIOSK_SESSION_TIMEOUT",
    "KIOSK_LOCKER_COUNT",
    "KIOSK_CODE_LENGTH",
    "KIOSK_DATA_DIR",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn missing_files_yield_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();

    let config = KioskConfig::load_layers(&[dir.path().join("absent.toml")]).unwrap();

    assert_eq!(config, KioskConfig::default());
}

#[test]
#[serial]
fn later_layers_override_only_their_keys() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let global = write(
        &dir,
        "global.toml",
        "[security]\nmaster_code = \"1111\"\nsession_timeout = 600\n\n[lockers]\ncount = 10\n",
    );
    let project = write(&dir, "kiosk.toml", "[security]\nmaster_code = \"2222\"\n");

    let config = KioskConfig::load_layers(&[global, project]).unwrap();

    assert_eq!(config.security.master_code, "2222");
    assert_eq!(config.security.session_timeout, 600);
    assert_eq!(config.lockers.count, 10);
    assert_eq!(config.payment.prepaid_code_length, 8);
}

#[test]
#[serial]
fn environment_overrides_files() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let project = write(&dir, "kiosk.toml", "[lockers]\ncount = 10\n");
    std::env::set_var("KIOSK_LOCKER_COUNT", "4");
    std::env::set_var("KIOSK_MASTER_CODE", "7777");
    std::env::set_var("KIOSK_DATA_DIR", "/tmp/kiosk-state");

    let config = KioskConfig::load_layers(&[project]);
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.lockers.count, 4);
    assert_eq!(config.security.master_code, "7777");
    assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/kiosk-state"));
}

#[test]
#[serial]
fn malformed_environment_value_is_an_error() {
    clear_env();
    std::env::set_var("KIOSK_SESSION_TIMEOUT", "five minutes");

    let result = KioskConfig::load_layers(&[]);
    clear_env();

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
#[serial]
fn oversized_environment_timeout_fails_validation() {
    clear_env();
    std::env::set_var("KIOSK_SESSION_TIMEOUT", "10000000000000000");

    let result = KioskConfig::load_layers(&[]);
    clear_env();

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
#[serial]
fn out_of_range_values_fail_validation() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let project = write(&dir, "kiosk.toml", "[payment]\nprepaid_code_length = 0\n");

    assert!(matches!(
        KioskConfig::load_layers(&[project]),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "kiosk.toml", "[lockers\ncount = ");

    assert!(matches!(load_partial_toml_file(&path), Err(Error::Parse(_))));
}

#[test]
fn unknown_keys_in_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "kiosk.toml", "[lockers]\ncolour = \"blue\"\n");

    assert!(matches!(load_partial_toml_file(&path), Err(Error::Parse(_))));
}

#[test]
#[serial]
fn set_then_save_round_trips_through_a_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf/kiosk.toml");

    let mut config = KioskConfig::default();
    config.set("lockers.count", "12").unwrap();
    config.set("security.session_timeout", "900").unwrap();
    config.set("security.master_code", "4821").unwrap();
    config.save(&path).unwrap();

    let reloaded = KioskConfig::load_layers(&[path]).unwrap();

    assert_eq!(reloaded, config);
    assert_eq!(
        reloaded.get("security.session_timeout"),
        Some(toml::Value::Integer(900))
    );
}
