use agsync_cli::audit::AuditAction;
use agsync_cli::core::{InstallMode, InstallTarget, Scope};
use agsync_cli::naming::NamingStrategy;
use agsync_cli::sync::{AddOptions, ItemStatus, TargetState};
use agsync_cli::test_utils::{MarkdownFixture, SourceTreeFixture, TestEnvironment};

fn origin(env: &TestEnvironment) -> String {
    env.sources_path().display().to_string()
}

#[tokio::test]
async fn test_add_to_multiple_consumers_and_scopes() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();

    let options = AddOptions {
        targets: vec![
            InstallTarget::new("claude-code", Scope::Project, InstallMode::Copy),
            InstallTarget::new("claude-code", Scope::Global, InstallMode::Copy),
            InstallTarget::new("opencode", Scope::Project, InstallMode::Copy),
        ],
        ..AddOptions::default()
    };
    let report = service.add(&origin(&env), &options).await.unwrap();
    assert!(report.is_complete(), "{report:#?}");
    assert_eq!(report.count(ItemStatus::Installed), 3);

    assert!(env.file_exists(".claude/skills/pdf/SKILL.md"));
    assert!(env.file_exists(".claude/skills/pdf/reference.md"));
    assert!(env.file_exists(".opencode/skill/pdf/SKILL.md"));
    assert!(env.file_exists(".opencode/agent/reviewer.md"));
    assert!(env.file_exists(".opencode/command/ops-deploy.md"));
    assert!(env.home_dir.join(".claude/skills/pdf/SKILL.md").is_file());
    assert!(env.home_dir.join(".claude/agents/reviewer.md").is_file());

    let record = service.store().get("pdf").unwrap().unwrap();
    assert_eq!(record.installed_for.len(), 3);
    assert!(record.installed_for.iter().any(|l| l.scope == Scope::Global));
}

#[tokio::test]
async fn test_unsupported_target_makes_item_partial() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();

    // codex has no agent directory
    let options = AddOptions {
        targets: vec![
            InstallTarget::new("claude-code", Scope::Project, InstallMode::Copy),
            InstallTarget::new("codex", Scope::Project, InstallMode::Copy),
        ],
        ..AddOptions::default()
    };
    let report = service.add(&origin(&env), &options).await.unwrap();

    let agent = report.items.iter().find(|i| i.name == "reviewer").unwrap();
    assert_eq!(agent.status, ItemStatus::Partial);
    assert!(agent.targets.iter().any(|t| t.state == TargetState::Failed));

    let skill = report.items.iter().find(|i| i.name == "pdf").unwrap();
    assert_eq!(skill.status, ItemStatus::Installed);
    assert!(env.file_exists(".codex/skills/pdf/SKILL.md"));
    assert!(env.file_exists(".codex/prompts/ops-deploy.md"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_link_mode_points_at_source() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();

    let options = AddOptions {
        link: true,
        ..AddOptions::default()
    };
    let report = service.add(&origin(&env), &options).await.unwrap();
    assert!(report.is_complete(), "{report:#?}");

    let link = env.project_path().join(".claude/skills/pdf");
    assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    assert!(link.join("reference.md").is_file());

    let listed = service.list(Scope::Project).await;
    let pdf = listed.entries.iter().find(|e| e.name == "pdf").unwrap();
    assert_eq!(pdf.mode, InstallMode::Link);
}

#[tokio::test]
async fn test_naming_strategies_shape_install_names() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::new()
        .with_file(MarkdownFixture::skill("patterns", "React patterns").at("frontend/react/patterns"))
        .with_file(MarkdownFixture::skill("patterns", "Go patterns").at("backend/go/patterns"))
        .write_to(env.sources_path())
        .unwrap();
    let (service, _) = env.service(&env.config()).unwrap();

    // Same original name twice: both fail without disambiguation
    let options = AddOptions {
        naming: NamingStrategy::OriginalName,
        ..AddOptions::default()
    };
    let report = service.add(&origin(&env), &options).await.unwrap();
    assert_eq!(report.count(ItemStatus::Failed), 2);
    assert!(!env.file_exists(".claude/skills/patterns"));

    let options = AddOptions {
        naming: NamingStrategy::CategoryPrefix,
        ..AddOptions::default()
    };
    let report = service.add(&origin(&env), &options).await.unwrap();
    assert!(report.is_complete(), "{report:#?}");
    assert!(env.file_exists(".claude/skills/react-patterns/SKILL.md"));
    assert!(env.file_exists(".claude/skills/go-patterns/SKILL.md"));
}

#[tokio::test]
async fn test_readd_without_force_keeps_existing_install() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();

    service.add(&origin(&env), &AddOptions::default()).await.unwrap();
    env.create_file(".claude/agents/reviewer.md", "local edits").unwrap();

    let report = service.add(&origin(&env), &AddOptions::default()).await.unwrap();
    let agent = report.items.iter().find(|i| i.name == "reviewer").unwrap();
    assert_eq!(agent.status, ItemStatus::Failed);
    assert_eq!(env.read_file(".claude/agents/reviewer.md").unwrap(), "local edits");

    let forced = AddOptions {
        force: true,
        ..AddOptions::default()
    };
    let report = service.add(&origin(&env), &forced).await.unwrap();
    assert!(report.is_complete(), "{report:#?}");
    assert!(env.read_file(".claude/agents/reviewer.md").unwrap().contains("name: reviewer"));
}

#[tokio::test]
async fn test_audit_trail_is_redacted() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, sink) = env.service(&env.config()).unwrap();

    service.add(&origin(&env), &AddOptions::default()).await.unwrap();
    service.remove("pdf", None, None).await.unwrap();

    let records = sink.records();
    for action in [AuditAction::Acquire, AuditAction::Install, AuditAction::StateUpdate, AuditAction::Remove] {
        assert!(records.iter().any(|r| r.action == action), "missing {action}");
    }

    let project = env.project_path().display().to_string();
    for record in &records {
        let json = serde_json::to_string(record).unwrap();
        assert!(!json.contains(&project), "unredacted project path in {json}");
    }
    let install = records.iter().find(|r| r.action == AuditAction::Install).unwrap();
    assert!(install.target_path.as_deref().unwrap().starts_with("<project>"));
}

#[tokio::test]
async fn test_local_origin_skips_denied_entries() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::new()
        .with_file(MarkdownFixture::skill("pdf", "PDFs").at("pdf"))
        .with_file(MarkdownFixture::raw("pdf/.env", "SECRET=1"))
        .with_file(MarkdownFixture::raw("pdf/node_modules/dep/index.js", "x"))
        .write_to(env.sources_path())
        .unwrap();
    let (service, _) = env.service(&env.config()).unwrap();

    let report = service.add(&origin(&env), &AddOptions::default()).await.unwrap();
    assert!(report.is_complete(), "{report:#?}");
    assert!(env.file_exists(".claude/skills/pdf/SKILL.md"));
    assert!(!env.file_exists(".claude/skills/pdf/.env"));
    assert!(!env.file_exists(".claude/skills/pdf/node_modules"));
}
