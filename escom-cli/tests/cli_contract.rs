//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("escom");
    for var in [
        "ESCOM_PORT",
        "ESCOM_BAUD",
        "ESCOM_TARGET",
        "ESCOM_PATH",
        "ESCOM_NON_INTERACTIVE",
        "RUST_LOG",
        "NO_COLOR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

const MISSING_PORT: &str = "/nonexistent/escom-test-tty";

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("escom"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn short_help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("escom"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("escom"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn short_version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stderr(predicate::str::is_empty());
}

#[test]
fn help_lists_environment_variables() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ESCOM_PORT"))
        .stdout(predicate::str::contains("ESCOM_PATH"));
}

#[test]
fn list_ports_json_returns_valid_json_array() {
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be pure JSON");
    assert!(parsed.is_array(), "should be a JSON array");
}

#[test]
fn list_ports_human_output_goes_to_stderr() {
    let mut cmd = cli_cmd();
    cmd.arg("list-ports")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Available serial ports"));
}

#[test]
fn completions_command_writes_to_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("escom"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn exit_code_two_for_unsupported_baud() {
    let mut cmd = cli_cmd();
    cmd.args(["--baud", "921600", "list-ports"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("921600"));
}

#[test]
fn exit_code_two_for_unsupported_baud_from_environment() {
    let mut cmd = cli_cmd();
    cmd.env("ESCOM_BAUD", "1234")
        .arg("list-ports")
        .assert()
        .code(2);
}

#[test]
fn exit_code_two_for_unknown_target() {
    let mut cmd = cli_cmd();
    cmd.args(["--target", "gforth", "list-ports"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("gforth"));
}

#[test]
fn target_is_case_insensitive() {
    let mut cmd = cli_cmd();
    cmd.args(["--target", "MECRISP", "list-ports", "--json"])
        .assert()
        .success();
}

#[test]
fn exit_code_two_for_unknown_command() {
    let mut cmd = cli_cmd();
    cmd.arg("definitely-not-a-command")
        .assert()
        .code(2);
}

#[test]
fn exit_code_two_for_upload_without_file() {
    let mut cmd = cli_cmd();
    cmd.arg("upload")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("<FILE>"));
}

#[test]
fn exit_code_one_when_port_cannot_be_opened() {
    let dir = tempdir().expect("tempdir should be created");
    let source = dir.path().join("blink.fs");
    fs::write(&source, ": blink ;\n").expect("source should be written");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["--port", MISSING_PORT, "upload", "blink.fs"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Unable to open serial port"));
}

#[test]
fn port_from_environment_is_used() {
    let dir = tempdir().expect("tempdir should be created");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .env("ESCOM_PORT", MISSING_PORT)
        .args(["upload", "blink.fs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(MISSING_PORT));
}

#[test]
fn port_from_config_file_is_used() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir.path().join("custom.toml");
    fs::write(
        &config,
        format!("[connection]\nserial = \"{MISSING_PORT}\"\nbaud = 115200\n"),
    )
    .expect("config should be written");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["upload", "blink.fs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(MISSING_PORT));
}

#[test]
fn local_config_file_is_picked_up() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(
        dir.path().join("escom.toml"),
        format!("[connection]\nserial = \"{MISSING_PORT}\"\n"),
    )
    .expect("config should be written");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["upload", "blink.fs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(MISSING_PORT));
}

#[test]
fn broken_config_file_falls_back_to_defaults() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[connection\nserial = ").expect("config should be written");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["list-ports", "--json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("using defaults"));
}

#[test]
fn colors_disabled_when_not_tty() {
    let mut cmd = cli_cmd();
    cmd.args(["--port", MISSING_PORT, "upload", "blink.fs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("\u{1b}[").not());
}

#[test]
fn quiet_mode_suppresses_config_warnings() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir.path().join("missing.toml");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--quiet")
        .arg("--config")
        .arg(&config)
        .args(["list-ports", "--json"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn option_terminator_allows_dash_prefixed_file() {
    let mut cmd = cli_cmd();
    cmd.args(["--port", MISSING_PORT, "upload", "--", "-odd.fs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unable to open serial port"));
}
