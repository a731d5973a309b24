use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[allow(deprecated)]
fn codelore() -> Command {
    let mut cmd = Command::cargo_bin("codelore").expect("binary");
    cmd.env_remove("CODELORE_WORKERS")
        .env_remove("CODELORE_OUTPUT_DIR")
        .env_remove("RUST_LOG");
    cmd
}

fn setup_repo() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("app")).unwrap();
    fs::create_dir_all(root.join("templates")).unwrap();
    fs::write(
        root.join("app/views.py"),
        r#"from flask import Flask, render_template
from flask_login import login_required

app = Flask(__name__)


@app.route("/dashboard")
@login_required
def dashboard():
    return render_template("dashboard.html")
"#,
    )
    .unwrap();
    fs::write(
        root.join("templates/dashboard.html"),
        "<h1>{{ current_user.name }}</h1>",
    )
    .unwrap();
    temp
}

#[test]
fn extract_writes_artifacts_and_prints_summary() {
    let temp = setup_repo();
    let out = temp.path().join("out");

    let output = codelore()
        .arg("--quiet")
        .arg("extract")
        .arg(temp.path())
        .arg("--out")
        .arg(&out)
        .output()
        .expect("command run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let summary: Value = serde_json::from_slice(&output.stdout).expect("summary json");
    assert_eq!(summary["endpoints"], 1);
    assert_eq!(summary["files"]["template"], 1);
    assert!(summary["rules_by_category"]["authorization"].as_u64().unwrap_or(0) >= 1);

    let rules: Value =
        serde_json::from_slice(&fs::read(out.join("business_rule.json")).unwrap()).unwrap();
    assert!(rules["rules"].as_array().is_some_and(|r| !r.is_empty()));
    assert!(out.join("parsed_code.json").is_file());
}

#[test]
fn rules_command_reuses_structural_artifact() {
    let temp = setup_repo();
    let out = temp.path().join("out");
    codelore()
        .args(["--quiet", "parse"])
        .arg(temp.path())
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
    assert!(!out.join("business_rule.json").exists());

    codelore()
        .args(["--quiet", "rules", "--input"])
        .arg(out.join("parsed_code.json"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rules\""));
    assert!(out.join("business_rule.json").is_file());
}

#[test]
fn missing_repository_fails_without_output() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    codelore()
        .arg("extract")
        .arg(temp.path().join("nope"))
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Repository not found"));
    assert!(!out.exists());
}

#[test]
fn zero_workers_is_rejected() {
    let temp = setup_repo();
    codelore()
        .arg("extract")
        .arg(temp.path())
        .args(["--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("workers must be at least 1"));
}

#[test]
fn schema_command_prints_json_schema() {
    let output = codelore()
        .args(["schema", "business-rules"])
        .output()
        .expect("command run");
    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout).expect("schema json");
    assert!(schema["properties"]["rules"].is_object());
}
