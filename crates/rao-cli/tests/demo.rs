use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn params_prints_default_toml() {
    cargo_bin_cmd!("rao")
        .arg("params")
        .assert()
        .success()
        .stdout(predicate::str::contains("[objective_function]"))
        .stdout(predicate::str::contains("SECURE_FLOW"))
        .stdout(predicate::str::contains("dc-sensitivity"));
}

#[test]
fn demo_table_reports_every_perimeter() {
    cargo_bin_cmd!("rao")
        .args(["--log-level", "warn", "demo", "--workers", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PERIMETER"))
        .stdout(predicate::str::contains("curative/contingency"))
        .stdout(predicate::str::contains("pst-range-action=-16"))
        .stdout(predicate::str::contains("terminals-connection-action"))
        .stdout(predicate::str::contains("DEFAULT (secure)"));
}

#[test]
fn demo_json_is_machine_readable() {
    let output = cargo_bin_cmd!("rao")
        .args(["--log-level", "error", "demo", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["status"], "DEFAULT");
    assert_eq!(result["preventive"]["pst_taps"]["pst-range-action"], -16);
    let curative = &result["contingencies"][0]["perimeters"][1];
    assert_eq!(curative["instant_id"], "curative");
    assert_eq!(
        curative["activated_network_actions"][0],
        "terminals-connection-action"
    );
}

#[test]
fn demo_reads_parameters_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rao.toml");
    fs::write(
        &path,
        r#"
        [objective_function]
        type = "MAX_MIN_MARGIN"

        [range_actions]
        pst_model = "APPROXIMATED_INTEGERS"

        [search_tree]
        max_depth = 2
        "#,
    )
    .unwrap();

    cargo_bin_cmd!("rao")
        .args(["demo", "--workers", "1", "--params"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("pst-range-action=-16"));
}

#[test]
fn demo_rejects_bad_input() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[search_tree]\nleaves_in_parallel = 0\n").unwrap();

    cargo_bin_cmd!("rao")
        .args(["demo", "--params"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading RAO parameters"));

    cargo_bin_cmd!("rao")
        .args(["demo", "--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid worker count"));
}
