// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! End-to-end tests for the pipecraft binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const ONE_JOB: &str = r#"
children:
  - job:
      stage: print_date
      script: date
"#;

const BUILD_AND_TEST: &str = r#"
modifiers:
  tags: [docker]
children:
  - sequence:
      modifiers:
        initialize_image: rust:1.80
      children:
        - job: { stage: build, script: [cargo build] }
          name: build-linux
        - job: { stage: test, script: [cargo test] }
          name: test-linux
  - job: { stage: build, script: [cargo build --target x86_64-apple-darwin] }
    name: build-mac
"#;

const COLLIDING: &str = r#"
children:
  - job: { name: deploy, stage: prod, script: [./deploy.sh] }
  - job: { name: deploy, stage: prod, script: [./deploy.sh eu] }
"#;

fn pipecraft(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pipecraft").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn project(definition: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".pipecraft.yaml"), definition).unwrap();
    dir
}

#[test]
fn test_render_writes_default_output() {
    let dir = project(ONE_JOB);

    pipecraft(dir.path())
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered 1 jobs in 1 stages"));

    let written = std::fs::read_to_string(dir.path().join("generated-config.yml")).unwrap();
    assert_eq!(
        written,
        "stages:\n- print_date\nprint_date:\n  stage: print_date\n  script:\n  - date\n"
    );
}

#[test]
fn test_render_to_stdout_groups_jobs_by_stage() {
    let dir = project(BUILD_AND_TEST);

    let output = pipecraft(dir.path())
        .args(["render", "--stdout"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let yaml: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
    let keys: Vec<_> = yaml
        .as_mapping()
        .unwrap()
        .keys()
        .map(|k| k.as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["stages", "build-linux", "build-mac", "test-linux"]);
    assert_eq!(yaml["build-linux"]["image"].as_str(), Some("rust:1.80"));
    assert!(yaml["build-mac"].get("image").is_none());
    assert_eq!(yaml["test-linux"]["tags"][0].as_str(), Some("docker"));
    assert!(!dir.path().join("generated-config.yml").exists());
}

#[test]
fn test_render_json() {
    let dir = project(BUILD_AND_TEST);

    let output = pipecraft(dir.path())
        .args(["render", "--stdout", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["stages"], serde_json::json!(["build", "test"]));
    assert_eq!(json["build-mac"]["stage"], "build");
}

#[test]
fn test_render_explicit_paths() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ci.yaml"), ONE_JOB).unwrap();

    pipecraft(dir.path())
        .args(["render", "ci.yaml", "-o", "out.yml"])
        .assert()
        .success();

    assert!(dir.path().join("out.yml").exists());
}

#[test]
fn test_config_file_sets_output() {
    let dir = project(ONE_JOB);
    std::fs::write(dir.path().join(".pipecraft.toml"), "output = \"pipeline.yml\"\n").unwrap();

    pipecraft(dir.path()).arg("render").assert().success();

    assert!(dir.path().join("pipeline.yml").exists());
    assert!(!dir.path().join("generated-config.yml").exists());
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = project(ONE_JOB);

    pipecraft(dir.path())
        .args(["--config", "nope.toml", "render"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_directory_flag() {
    let dir = project(ONE_JOB);
    let elsewhere = TempDir::new().unwrap();

    pipecraft(elsewhere.path())
        .arg("-C")
        .arg(dir.path())
        .args(["render", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("print_date:"));
}

#[test]
fn test_missing_definition_fails() {
    let dir = TempDir::new().unwrap();

    pipecraft(dir.path())
        .arg("render")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Definition file not found"));
}

#[test]
fn test_render_collision_fails_without_output() {
    let dir = project(COLLIDING);

    pipecraft(dir.path())
        .arg("render")
        .assert()
        .failure()
        .stderr(predicate::str::contains("deploy"));

    assert!(!dir.path().join("generated-config.yml").exists());
}

#[test]
fn test_render_same_jobs_in_two_stages() {
    let dir = project(
        r#"
children:
  - sequence:
      children:
        - job: { stage: job1, script: [echo 1] }
        - job: { stage: job2, script: [echo 2] }
    stage: development
  - sequence:
      children:
        - job: { stage: job1, script: [echo 1] }
        - job: { stage: job2, script: [echo 2] }
    stage: test
"#,
    );

    pipecraft(dir.path())
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered 4 jobs in 2 stages"));

    let written = std::fs::read_to_string(dir.path().join("generated-config.yml")).unwrap();
    let yaml: serde_yaml::Value = serde_yaml::from_str(&written).unwrap();
    for (key, stage) in [
        ("job1-development", "development"),
        ("job2-development", "development"),
        ("job1-test", "test"),
        ("job2-test", "test"),
    ] {
        assert_eq!(yaml[key]["stage"].as_str(), Some(stage), "{}", key);
    }
}

#[test]
fn test_render_same_name_in_two_stages_fails() {
    let dir = project(
        r#"
children:
  - job: { name: compile, stage: build, script: [make] }
  - job: { name: compile, stage: release, script: [make dist] }
"#,
    );

    pipecraft(dir.path())
        .args(["render", "--stdout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("compile"));
}

#[test]
fn test_render_needs_and_exit_codes() {
    let dir = project(
        r#"
children:
  - job: { stage: build, script: [make] }
  - sequence:
      modifiers:
        needs: [build]
        override_allow_failure: { exit_codes: [3] }
      children:
        - job: { stage: deploy, script: [./deploy.sh] }
"#,
    );

    let output = pipecraft(dir.path())
        .args(["render", "--stdout"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let yaml: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(yaml["deploy"]["needs"][0]["job"].as_str(), Some("build"));
    assert_eq!(yaml["deploy"]["allow_failure"]["exit_codes"][0].as_i64(), Some(3));
    assert!(yaml["build"].get("needs").is_none());
}

#[test]
fn test_misspelled_key_is_rejected() {
    let dir = project(
        r#"
children:
  - sequence:
      childs:
        - job: { stage: build, script: [make] }
"#,
    );

    pipecraft(dir.path())
        .arg("render")
        .assert()
        .failure()
        .stderr(predicate::str::contains("childs"));

    assert!(!dir.path().join("generated-config.yml").exists());
}

#[test]
fn test_validate_reports_duplicate_job_key_with_fix() {
    let dir = project(
        r#"
children:
  - job: { name: compile, stage: build, script: [make] }
  - job: { name: compile, stage: release, script: [make dist] }
"#,
    );

    pipecraft(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("used in stage 'build' and in stage 'release'"))
        .stdout(predicate::str::contains("name: compile-release"))
        .stdout(predicate::str::contains("<any>").not());
}

#[test]
fn test_validate_clean_pipeline() {
    let dir = project(BUILD_AND_TEST);

    pipecraft(dir.path())
        .args(["validate", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Identifiers are unique"))
        .stdout(predicate::str::contains("root[0][1]"))
        .stdout(predicate::str::contains("Pipeline is valid!"));
}

#[test]
fn test_validate_reports_collision_with_fix() {
    let dir = project(COLLIDING);

    pipecraft(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Jobs at root[0] and root[1] both resolve to name 'deploy' in stage 'prod'",
        ))
        .stdout(predicate::str::contains("name: deploy-eu"));
}

#[test]
fn test_validate_warns_on_empty_script() {
    let dir = project(
        r#"
children:
  - job: { stage: lint }
"#,
    );

    pipecraft(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("has no script"))
        .stdout(predicate::str::contains("valid but has warnings"));
}

#[test]
fn test_validate_rejects_ambiguous_entry() {
    let dir = project(
        r#"
children:
  - name: orphan
"#,
    );

    pipecraft(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("neither `job` nor `sequence`"));
}

#[test]
fn test_stages_lists_first_occurrence_order() {
    let dir = project(BUILD_AND_TEST);

    pipecraft(dir.path())
        .arg("stages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stages (2)"))
        .stdout(predicate::str::is_match(r"(?s)1\. build.*build-linux.*build-mac.*2\. test.*test-linux").unwrap());
}
