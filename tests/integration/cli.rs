use agsync_cli::test_utils::{MarkdownFixture, SourceTreeFixture, TestEnvironment};
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

struct CliEnv {
    env: TestEnvironment,
    config_path: PathBuf,
}

impl CliEnv {
    fn new() -> Self {
        let env = TestEnvironment::new().unwrap();
        let config_path = env.write_config(&env.config()).unwrap();
        Self {
            env,
            config_path,
        }
    }

    fn origin(&self) -> String {
        self.env.sources_path().display().to_string()
    }

    fn agsync(&self) -> Command {
        let mut cmd = Command::cargo_bin("agsync").unwrap();
        cmd.env("HOME", &self.env.home_dir)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("AGSYNC_CONFIG")
            .env_remove("AGSYNC_PROJECT_DIR")
            .arg("--project-dir")
            .arg(self.env.project_path())
            .arg("--config")
            .arg(&self.config_path);
        cmd
    }
}

#[test]
fn test_add_list_remove_round() {
    let cli = CliEnv::new();
    SourceTreeFixture::mixed().write_to(cli.env.sources_path()).unwrap();

    cli.agsync()
        .args(["add", &cli.origin()])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 installed, 0 partial, 0 failed"));
    assert!(cli.env.file_exists(".claude/skills/pdf/SKILL.md"));

    cli.agsync()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("claude-code (3)"))
        .stdout(predicate::str::contains("ops-deploy"));

    cli.agsync()
        .args(["remove", "pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Record removed from state"));
    assert!(!cli.env.file_exists(".claude/skills/pdf"));

    cli.agsync()
        .args(["remove", "pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pdf"));
}

#[test]
fn test_json_output_is_parseable() {
    let cli = CliEnv::new();
    SourceTreeFixture::mixed().write_to(cli.env.sources_path()).unwrap();

    let output = cli.agsync().args(["--format", "json", "add", &cli.origin()]).output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["originKind"], "local");
    assert_eq!(report["items"].as_array().unwrap().len(), 3);
    assert!(report["items"].as_array().unwrap().iter().all(|i| i["status"] == "installed"));

    let output = cli.agsync().args(["list", "--tracked", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> = records.as_array().unwrap().iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["ops-deploy", "pdf", "reviewer"]);
}

#[test]
fn test_discover_does_not_install() {
    let cli = CliEnv::new();
    SourceTreeFixture::mixed().write_to(cli.env.sources_path()).unwrap();

    cli.agsync()
        .args(["discover", &cli.origin(), "--kind", "command"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ops-deploy (from deploy)"))
        .stdout(predicate::str::contains("reviewer").not());
    assert!(!cli.env.file_exists(".claude"));
}

#[test]
fn test_partial_install_exits_with_failure() {
    let cli = CliEnv::new();
    SourceTreeFixture::mixed().write_to(cli.env.sources_path()).unwrap();

    cli.agsync()
        .args(["add", &cli.origin(), "-t", "claude-code", "-t", "codex"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("reviewer"))
        .stderr(predicate::str::contains("not fully installed"));
    // Everything that could be installed was
    assert!(cli.env.file_exists(".codex/skills/pdf/SKILL.md"));
}

#[test]
fn test_history_and_rollback() {
    let cli = CliEnv::new();
    for version in ["1.0.0", "2.0.0"] {
        SourceTreeFixture::new()
            .with_file(MarkdownFixture::skill("pdf", "PDFs").versioned(version).at("pdf"))
            .write_to(cli.env.sources_path())
            .unwrap();
        cli.agsync().args(["add", &cli.origin(), "--force"]).assert().success();
    }

    cli.agsync()
        .args(["history", "pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0.0"));

    cli.agsync()
        .args(["rollback", "pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled back"))
        .stdout(predicate::str::contains("--only pdf --force"));

    cli.agsync()
        .args(["list", "--tracked"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pdf 1.0.0"));
}

#[test]
fn test_config_set_show_path_init() {
    let cli = CliEnv::new();

    cli.agsync().args(["config", "set", "history-limit", "3"]).assert().success();
    cli.agsync()
        .args(["config", "set", "preferred-consumers", "claude-code,nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nobody"));

    let output = cli.agsync().args(["config", "show", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["project"]["historyLimit"], 3);
    assert_eq!(view["project"]["preferredConsumers"][0], "claude-code");

    cli.agsync()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(cli.config_path.display().to_string()));

    // init refuses to overwrite an existing file
    cli.agsync().args(["config", "init"]).assert().failure();
    std::fs::remove_file(&cli.config_path).unwrap();
    cli.agsync().args(["config", "init"]).assert().success();
    assert!(cli.config_path.is_file());
}

#[test]
fn test_missing_origin_fails_cleanly() {
    let cli = CliEnv::new();
    let missing = cli.env.temp_dir.path().join("does-not-exist");

    cli.agsync()
        .args(["add", &missing.display().to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
    assert!(!cli.env.file_exists(".agsync/state.json"));
}

#[test]
fn test_audit_log_is_written_redacted() {
    let cli = CliEnv::new();
    SourceTreeFixture::mixed().write_to(cli.env.sources_path()).unwrap();
    cli.agsync().args(["add", &cli.origin()]).assert().success();

    let log = std::fs::read_to_string(cli.env.audit_log_path()).unwrap();
    let project = cli.env.project_path().display().to_string();
    assert!(!log.contains(&project));
    // Local origin outside every known root
    assert!(!log.contains(&cli.origin()));
    assert!(log.contains("<external>/sources"));
    for line in log.lines() {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(record["actorId"].is_string());
    }
    assert!(log.contains("\"action\":\"install\""));
}
