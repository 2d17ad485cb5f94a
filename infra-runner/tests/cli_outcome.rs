//! CLI tests for `infra-runner`.
//!
//! Spawns the binary against a fake Terraform and verifies exit codes and the
//! printed outcome code. The fake is `sh` itself: `sh plan ...` runs the
//! script named `plan` in the working directory.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use infra_runner::core::outcome::Outcome;
use infra_runner::exit_codes;

const INIT_OK: &str = "echo 'Terraform has been successfully initialized!'\n";
const PLAN_CHANGES: &str = "echo '  + azurerm_resource_group.rg'\n\
                            echo 'Plan: 1 to add, 0 to change, 0 to destroy.'\n\
                            exit 2\n";

fn write_scripts(dir: &Path, scripts: &[(&str, &str)]) {
    for (name, body) in scripts {
        fs::write(dir.join(name), body).expect("write fake terraform script");
    }
}

fn run_cli(dir: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_infra-runner"))
        .current_dir(dir)
        .arg("--terraform-bin")
        .arg("sh")
        .arg("--chdir")
        .arg(dir)
        .arg("--destroy-delay-secs")
        .arg("0")
        .args(extra)
        .output()
        .expect("run infra-runner")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn no_changes_exits_ok_without_applying() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_scripts(
        temp.path(),
        &[
            ("init", INIT_OK),
            ("plan", "echo 'No changes. Infrastructure is up-to-date.'\nexit 0\n"),
            ("apply", "touch applied\necho 'Apply complete!'\n"),
        ],
    );

    let output = run_cli(temp.path(), &["--apply"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("Infra service returned 10000"));
    assert!(!temp.path().join("applied").exists());
}

#[test]
fn retryable_apply_is_attempted_again() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_scripts(
        temp.path(),
        &[
            ("init", INIT_OK),
            ("plan", PLAN_CHANGES),
            (
                "apply",
                "n=$(cat count 2>/dev/null || echo 0)\n\
                 n=$((n + 1))\n\
                 echo \"$n\" > count\n\
                 if [ \"$n\" -lt 2 ]; then\n\
                 \x20 echo 'Error: waiting for creation: context deadline exceeded' >&2\n\
                 \x20 exit 1\n\
                 fi\n\
                 echo 'Apply complete! Resources: 1 added, 0 changed, 0 destroyed.'\n",
            ),
        ],
    );

    let output = run_cli(temp.path(), &["--apply"]);
    let text = stdout(&output);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "stdout: {text}");
    assert!(text.contains("Terraform apply attempt 2 starting"));
    assert!(text.contains("Infra service returned 10000"));
    let count = fs::read_to_string(temp.path().join("count")).expect("read count");
    assert_eq!(count.trim(), "2");
}

#[test]
fn preview_reports_apply_not_specified_as_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_scripts(temp.path(), &[("init", INIT_OK), ("plan", PLAN_CHANGES)]);

    let output = run_cli(temp.path(), &["--json"]);
    let text = stdout(&output);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(text.contains("Plan: 1 to add, 0 to change, 0 to destroy."));
    assert!(text.contains("Infra service returned 10003"));
    let json_line = text.lines().last().expect("json line");
    let value: serde_json::Value = serde_json::from_str(json_line).expect("parse json");
    assert_eq!(value["outcome"], "apply_not_specified");
    assert_eq!(value["code"], Outcome::ApplyNotSpecified.code());
}

#[test]
fn failed_plan_reports_classified_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_scripts(
        temp.path(),
        &[
            ("init", INIT_OK),
            (
                "plan",
                "echo 'Error: compute: exceeding approved Total Regional Cores quota' >&2\nexit 1\n",
            ),
        ],
    );

    let output = run_cli(temp.path(), &["--apply"]);
    let text = stdout(&output);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(text.contains("Plan failed with error 10008"));
    assert!(text.contains("Infra service returned 10008"));
}

#[test]
fn failed_init_stops_before_plan() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_scripts(
        temp.path(),
        &[
            ("init", "echo 'Error: error satisfying plugin requirements' >&2\nexit 1\n"),
            ("plan", "touch planned\nexit 0\n"),
        ],
    );

    let output = run_cli(temp.path(), &[]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(stdout(&output).contains("Infra service returned 10001"));
    assert!(!temp.path().join("planned").exists());
}

#[test]
fn missing_working_directory_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_infra-runner"))
        .current_dir(temp.path())
        .arg("--chdir")
        .arg(temp.path().join("does-not-exist"))
        .output()
        .expect("run infra-runner");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn invalid_config_file_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("infra-runner.toml"), "max_attempts = 0\n").expect("write config");

    let output = run_cli(temp.path(), &[]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_attempts"));
}
