use agsync_cli::core::{InstallMode, InstallTarget, Scope};
use agsync_cli::sync::AddOptions;
use agsync_cli::test_utils::{SourceTreeFixture, TestEnvironment};

#[tokio::test]
async fn test_list_reflects_disk_not_state() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();
    service.add(&env.sources_path().display().to_string(), &AddOptions::default()).await.unwrap();

    // Deleted behind agsync's back, and hand-written
    std::fs::remove_file(env.project_path().join(".claude/agents/reviewer.md")).unwrap();
    env.create_file(".claude/agents/handmade.md", "---\nname: handmade\ndescription: By hand\n---\n")
        .unwrap();

    let listed = service.list(Scope::Project).await;
    assert!(listed.errors.is_empty(), "{:#?}", listed.errors);
    let names: Vec<_> = listed.entries.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"handmade"));
    assert!(names.contains(&"pdf"));
    assert!(!names.contains(&"reviewer"));

    let tracked: Vec<_> = service.records().unwrap().into_iter().map(|r| r.name).collect();
    assert!(tracked.contains(&"reviewer".to_string()));
    assert!(!tracked.contains(&"handmade".to_string()));
}

#[tokio::test]
async fn test_list_is_scoped() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();
    let options = AddOptions {
        targets: vec![InstallTarget::new("cursor", Scope::Global, InstallMode::Copy)],
        only: Some(vec!["pdf".to_string()]),
        ..AddOptions::default()
    };
    service.add(&env.sources_path().display().to_string(), &options).await.unwrap();

    assert!(service.list(Scope::Project).await.entries.is_empty());
    let global = service.list(Scope::Global).await;
    assert_eq!(global.entries.len(), 1);
    assert_eq!(global.entries[0].consumer_id, "cursor");
    assert_eq!(global.entries[0].description, "Read and fill PDF forms");
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_link_is_reported_per_entry() {
    use agsync_cli::core::AgsyncError;

    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();
    service.add(&env.sources_path().display().to_string(), &AddOptions::default()).await.unwrap();

    let skills = env.project_path().join(".claude/skills");
    std::os::unix::fs::symlink(env.temp_dir.path().join("nowhere"), skills.join("ghost")).unwrap();

    let listed = service.list(Scope::Project).await;
    assert!(listed.entries.iter().any(|e| e.name == "pdf"));
    assert_eq!(listed.errors.len(), 1);
    assert!(matches!(listed.errors[0].error, Some(AgsyncError::LinkSourceMissing { .. })));
}

#[tokio::test]
async fn test_unreadable_consumer_dir_is_one_error() {
    let env = TestEnvironment::new().unwrap();
    SourceTreeFixture::mixed().write_to(env.sources_path()).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();
    let options = AddOptions {
        targets: vec![
            InstallTarget::new("claude-code", Scope::Project, InstallMode::Copy),
            InstallTarget::new("cursor", Scope::Project, InstallMode::Copy),
        ],
        ..AddOptions::default()
    };
    let report = service.add(&env.sources_path().display().to_string(), &options).await.unwrap();
    assert!(report.is_complete(), "{report:#?}");

    // A file where the agents directory should be
    let agents = env.project_path().join(".claude/agents");
    std::fs::remove_dir_all(&agents).unwrap();
    std::fs::write(&agents, "not a directory").unwrap();

    let listed = service.list(Scope::Project).await;
    assert_eq!(listed.errors.len(), 1, "{:#?}", listed.errors);
    assert_eq!(listed.errors[0].consumer_id, "claude-code");
    assert_eq!(listed.errors[0].path.as_deref(), Some(agents.as_path()));

    let listed_for = |consumer: &str, name: &str| {
        listed.entries.iter().any(|e| e.consumer_id == consumer && e.name == name)
    };
    assert!(listed_for("cursor", "reviewer"));
    assert!(listed_for("claude-code", "pdf"));
    assert!(!listed_for("claude-code", "reviewer"));
}
