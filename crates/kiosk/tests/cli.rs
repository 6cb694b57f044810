//! End-to-end runs of the `kiosk` binary against a scratch data directory.

// Integration tests have relaxed clippy settings for test infrastructure.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use std::{fs, path::PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const MASTER: &str = "9999";

/// Isolated kiosk: its own data dir, project config and config home
struct Harness {
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("kiosk.toml")
    }

    fn kiosk(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_kiosk"));
        cmd.arg("--data-dir")
            .arg(self.data_dir())
            .arg("--config")
            .arg(self.config_path())
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config-home"))
            .env_remove("KIOSK_MASTER_CODE")
            .env_remove("KIOSK_SESSION_TIMEOUT")
            .env_remove("KIOSK_LOCKER_COUNT")
            .env_remove("KIOSK_CODE_LENGTH")
            .env_remove("KIOSK_DATA_DIR")
            .env("RUST_LOG", "warn");
        cmd
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.kiosk().arg("--json").args(args).output().unwrap();
        assert!(
            output.status.success(),
            "kiosk {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

// =============================================================================
// LOCKERS
// =============================================================================

#[test]
fn fresh_kiosk_has_every_locker_free() {
    let h = Harness::new();

    let status = h.json(&["status"]);

    assert_eq!(status["occupancy"]["available"], 8);
    assert_eq!(status["occupancy"]["occupied"], 0);
    assert_eq!(status["sessions"].as_array().unwrap().len(), 0);
    assert_eq!(status["charging_time_limit"], 7200);
}

#[test]
fn rental_lifecycle_with_chosen_code() {
    let h = Harness::new();

    h.kiosk()
        .args(["reserve", "3", "--code", "4821", "--method", "qr"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Locker 3 reserved (qr, 5.00)"))
        .stdout(predicate::str::contains("Access code: 4821"));

    h.kiosk().args(["unlock", "3", "4821"]).assert().success();
    h.kiosk()
        .args(["unlock", "3", "0000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Access denied for locker 3"));
    h.kiosk().args(["unlock", "3", MASTER]).assert().success();

    let session = h.json(&["session", "3"]);
    assert_eq!(session["payment_method"], "qr");
    assert_eq!(session["amount_paid"], 5.0);

    h.kiosk().args(["release", "3"]).assert().success();
    h.kiosk()
        .args(["release", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no active rental"));
    h.kiosk().args(["session", "3"]).assert().failure();
}

#[test]
fn reserve_without_code_issues_four_digits() {
    let h = Harness::new();

    let reservation = h.json(&["reserve", "2"]);

    let code = reservation["access_code"].as_str().unwrap();
    assert_eq!(code.len(), 4);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(reservation["payment_method"], "digicode");
    assert_eq!(reservation["amount_paid"], 0.0);

    let lockers = h.json(&["lockers"]);
    assert_eq!(lockers[1]["id"], 2);
    assert_eq!(lockers[1]["available"], false);
}

#[test]
fn occupied_or_unknown_lockers_cannot_be_reserved() {
    let h = Harness::new();
    h.kiosk().args(["reserve", "1"]).assert().success();

    h.kiosk()
        .args(["reserve", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already occupied"));
    h.kiosk()
        .args(["reserve", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn timed_out_session_is_released_by_tick() {
    let h = Harness::new();
    fs::create_dir_all(h.data_dir()).unwrap();
    fs::write(
        h.data_dir().join("sessions.json"),
        r#"[{"locker_id": 2, "user_code": "2222", "start_time": "2024-05-01T09:10:00+00:00",
             "end_time": null, "payment_method": "qr", "amount_paid": 5.0, "is_active": true}]"#,
    )
    .unwrap();

    h.kiosk()
        .arg("tick")
        .assert()
        .success()
        .stdout(predicate::str::contains("Released locker 2"));
    h.kiosk()
        .arg("tick")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to sweep"));
}

#[test]
fn watch_stops_after_max_ticks() {
    let h = Harness::new();

    h.kiosk()
        .args(["watch", "--interval", "1", "--max-ticks", "1"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success();
}

// =============================================================================
// PREPAID CODES AND ADMIN
// =============================================================================

#[test]
fn voucher_pays_for_a_rental_once() {
    let h = Harness::new();
    let issued = h.json(&["admin", "--master-code", MASTER, "generate", "7.5", "--days", "30"]);
    let code = issued["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    let value = h.json(&["code", "value", &code]);
    assert_eq!(value["value"], 7.5);

    let reservation = h.json(&["reserve", "1", "--voucher", &code]);
    assert_eq!(reservation["payment_method"], "prepaid");
    assert_eq!(reservation["amount_paid"], 7.5);

    h.kiosk()
        .args(["reserve", "2", "--voucher", &code])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be redeemed"));
    h.kiosk()
        .args(["code", "validate", &code])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already used"));
    // The refused voucher must not have taken locker 2
    assert_eq!(h.json(&["status"])["occupancy"]["occupied"], 1);
}

#[test]
fn unknown_code_is_reported() {
    let h = Harness::new();

    h.kiosk()
        .args(["code", "consume", "NOPE1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is unknown"));
    h.kiosk()
        .args(["code", "value", "NOPE1234"])
        .assert()
        .success()
        .stdout("0.00\n");
}

#[test]
fn admin_requires_master_code() {
    let h = Harness::new();

    h.kiosk()
        .args(["admin", "--master-code", "0000", "release-all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid master code"));
}

#[test]
fn admin_release_all_frees_every_locker() {
    let h = Harness::new();
    h.kiosk().args(["reserve", "1"]).assert().success();
    h.kiosk().args(["reserve", "4"]).assert().success();

    let released = h.json(&["admin", "--master-code", MASTER, "release-all"]);

    assert_eq!(released["released"], 2);
    assert_eq!(h.json(&["status"])["occupancy"]["available"], 8);
}

#[test]
fn repeated_wrong_master_codes_lock_admin_out() {
    let h = Harness::new();

    for attempt in 1..=2 {
        h.kiosk()
            .args(["admin", "--master-code", "0000", "sweep-codes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(format!(
                "Invalid master code ({attempt}/3 attempts)"
            )));
    }
    for code in ["0000", "0000", MASTER] {
        h.kiosk()
            .args(["admin", "--master-code", code, "sweep-codes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("locked out"));
    }
    // The same counter guards configuration changes
    h.kiosk()
        .args(["config", "set", "lockers.count", "4", "--master-code", MASTER])
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked out"));
}

#[test]
fn admin_lockout_expires() {
    let h = Harness::new();
    fs::create_dir_all(h.data_dir()).unwrap();
    fs::write(
        h.data_dir().join("admin.json"),
        r#"{"failed_attempts": 3, "locked_at": "2024-01-01T00:00:00+00:00"}"#,
    )
    .unwrap();

    h.kiosk()
        .args(["admin", "--master-code", MASTER, "sweep-codes"])
        .assert()
        .success();
    h.kiosk()
        .args(["admin", "--master-code", "0000", "sweep-codes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("(1/3 attempts)"));
}

#[test]
fn generate_rejects_validity_out_of_range() {
    let h = Harness::new();

    h.kiosk()
        .args(["admin", "--master-code", MASTER, "generate", "5", "--days", "4294967295"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
    assert_eq!(h.json(&["codes"]).as_array().unwrap().len(), 0);
}

#[test]
fn generate_rejects_non_positive_value() {
    let h = Harness::new();

    h.kiosk()
        .args(["admin", "--master-code", MASTER, "generate", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be positive"));
}

#[test]
fn codes_listing_shows_generated_codes() {
    let h = Harness::new();
    h.json(&["admin", "--master-code", MASTER, "generate", "3"]);
    h.json(&["admin", "--master-code", MASTER, "generate", "4"]);

    let codes = h.json(&["codes"]);

    assert_eq!(codes.as_array().unwrap().len(), 2);
    assert_eq!(codes[0]["used"], false);
    assert_eq!(codes[0]["expired"], false);
}

// =============================================================================
// PAYMENT AND CONFIG
// =============================================================================

#[test]
fn qr_payment_url_carries_amount_and_reference() {
    let h = Harness::new();

    let qr = h.json(&["pay", "qr", "--amount", "5"]);

    let reference = qr["reference"].as_str().unwrap();
    assert_eq!(reference.len(), 8);
    assert_eq!(
        qr["url"],
        format!("https://payment.example.com?amount=5&ref={reference}")
    );
}

#[test]
fn ussd_code_comes_from_config() {
    let h = Harness::new();
    fs::write(h.config_path(), "[payment]\nussd_code = \"*555#\"\n").unwrap();

    h.kiosk()
        .args(["pay", "ussd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dial *555# to pay"));
}

#[test]
fn config_set_persists_to_project_file() {
    let h = Harness::new();

    h.kiosk()
        .args(["config", "set", "lockers.count", "4", "--master-code", MASTER])
        .assert()
        .success();

    h.kiosk()
        .args(["config", "get", "lockers.count"])
        .assert()
        .success()
        .stdout("4\n");
    assert_eq!(h.json(&["lockers"]).as_array().unwrap().len(), 4);
    assert!(fs::read_to_string(h.config_path())
        .unwrap()
        .contains("count = 4"));
}

#[test]
fn config_set_rejects_bad_input() {
    let h = Harness::new();

    h.kiosk()
        .args(["config", "set", "lockers.colour", "blue", "--master-code", MASTER])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown"));
    h.kiosk()
        .args(["config", "set", "lockers.count", "many", "--master-code", MASTER])
        .assert()
        .failure();
    h.kiosk()
        .args(["config", "set", "lockers.count", "4", "--master-code", "0000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid master code"));
    assert!(!h.config_path().exists());
}

#[test]
fn oversized_session_timeout_is_refused() {
    let h = Harness::new();

    h.kiosk()
        .args([
            "config",
            "set",
            "security.session_timeout",
            "10000000000000000",
            "--master-code",
            MASTER,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session_timeout"));
    h.kiosk().arg("status").assert().success();
}

#[test]
fn malformed_config_file_is_an_error() {
    let h = Harness::new();
    fs::write(h.config_path(), "[lockers\ncount = ").unwrap();

    h.kiosk()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
