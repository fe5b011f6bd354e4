use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Four legacy filters, filter 3 inserted, calculator idle.
fn write_legacy_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[device]
kind = "legacy"
name = "xpp_att"
prefix = "XPP:ATT"
n_filters = 4

[estimator]
poll_ms = 5
settle_timeout_ms = 50

[simulation]
blade_states = [2, 2, 1, 2]
readback = 0.3
setpoint = 0.3
floor = 0.25
ceiling = 0.4
calc_pending = false
"#;
    let path = dir.path().join("legacy.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn write_at2l0_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[device]
kind = "at2l0"
prefix = "AT2L0:XTES"

[[simulation.faults]]
blade = 19
signal = "state.error"
value = 1
"#;
    let path = dir.path().join("at2l0.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["status"], 0, "inserted: true  removed: false", "stdout")]
#[case(&["status", "--no-cache"], 0, "filter # |1|2|3|4|", "stdout")]
#[case(&["bracket", "--setpoint", "0.4", "--floor", "0.2", "--ceiling", "0.45"], 0, "ceiling (GO=3)", "stdout")]
#[case(&["bracket", "--setpoint", "0.3"], 0, "floor (GO=2)", "stdout")]
#[case(&["bracket", "--setpoint", "1.5"], 4, "outside the allowed range", "stderr")]
#[case(&["bracket"], 2, "required", "stderr")]
#[case(&["move", "--transmission", "0.38"], 0, "ceiling bracket", "stdout")]
#[case(&["errors"], 5, "does not support", "stderr")]
#[case(&["self-check"], 0, "4/4 blades reporting", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_legacy_config(&dir);

    let mut cmd = Command::cargo_bin("satt_cli").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case(&["errors"], "Error summary:\nblade_19.state.error: 1")]
#[case(&["errors"], "bitmask: 0b1 (1)")]
#[case(&["reset"], "reset sent to 38 channels")]
fn plc_fault_commands(#[case] args: &[&str], #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_at2l0_config(&dir);

    let mut cmd = Command::cargo_bin("satt_cli").unwrap();
    cmd.arg("--config").arg(&cfg).args(args);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(needle));
}

#[rstest]
fn status_json_is_one_parseable_line() {
    let dir = tempdir().unwrap();
    let cfg = write_legacy_config(&dir);

    let mut cmd = Command::cargo_bin("satt_cli").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("status");

    let out = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let line = stdout.lines().next().unwrap_or("");
    let v: serde_json::Value = serde_json::from_str(line).expect("valid JSON");

    assert_eq!(v["device"], "xpp_att");
    assert_eq!(v["kind"], "legacy");
    assert_eq!(v["inserted"], true);
    assert_eq!(v["removed"], false);
    assert_eq!(v["num_in"], 1);
    assert_eq!(v["num_out"], 3);
    assert_eq!(v["blades"], serde_json::json!([1, 1, 2, 1]));
}

#[rstest]
fn json_errors_carry_reason_and_details() {
    let dir = tempdir().unwrap();
    let cfg = write_legacy_config(&dir);

    let mut cmd = Command::cargo_bin("satt_cli").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("off")
        .arg("--config")
        .arg(&cfg)
        .args(["move", "--transmission", "2"]);

    let out = cmd.assert().code(4).get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&out);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or("");
    let v: serde_json::Value = serde_json::from_str(line).expect("valid JSON");
    assert_eq!(v["reason"], "OutOfRange");
    assert_eq!(v["details"]["value"], 2.0);
}

#[rstest]
fn transmission_table_scales_inserted_blades() {
    let dir = tempdir().unwrap();
    let cfg = write_legacy_config(&dir);

    let csv = dir.path().join("table.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "blade,target,transmission").unwrap();
    writeln!(f, "3,1,0.05").unwrap();

    let mut cmd = Command::cargo_bin("satt_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--transmission")
        .arg(&csv)
        .arg("status");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("transmission: 0.050000"));
}

#[rstest]
fn cli_reports_bad_transmission_header() {
    let dir = tempdir().unwrap();
    let cfg = write_legacy_config(&dir);

    // Write a bad-header CSV
    let bad_csv = dir.path().join("table.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "filter,transmission").unwrap();
    writeln!(f, "1,0.5").unwrap();

    let mut cmd = Command::cargo_bin("satt_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--transmission")
        .arg(&bad_csv)
        .arg("self-check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn missing_config_is_explained() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("satt_cli").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("status");

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("could not be read"));
}

#[rstest]
fn invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[device]\nkind = \"legacy\"\nprefix = \"XPP:ATT\"\n").unwrap();

    let mut cmd = Command::cargo_bin("satt_cli").unwrap();
    cmd.arg("--config").arg(&path).arg("status");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("n_filters is required"));
}

#[rstest]
fn watch_stops_after_count() {
    let dir = tempdir().unwrap();
    let cfg = write_legacy_config(&dir);

    let mut cmd = Command::cargo_bin("satt_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["watch", "--interval-ms", "10", "--count", "3"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    assert_eq!(stdout.lines().filter(|l| l.starts_with("inserted:")).count(), 3);
}
