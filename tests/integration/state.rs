use agsync_cli::core::AgsyncError;
use agsync_cli::state::StateConfig;
use agsync_cli::sync::AddOptions;
use agsync_cli::test_utils::{MarkdownFixture, SourceTreeFixture, TestEnvironment};

fn write_skill(env: &TestEnvironment, version: &str) {
    SourceTreeFixture::new()
        .with_file(MarkdownFixture::skill("pdf", "PDFs").versioned(version).at("pdf"))
        .write_to(env.sources_path())
        .unwrap();
}

fn forced() -> AddOptions {
    AddOptions {
        force: true,
        ..AddOptions::default()
    }
}

#[tokio::test]
async fn test_state_file_layout() {
    let env = TestEnvironment::new().unwrap();
    write_skill(&env, "1.0.0");
    let (service, _) = env.service(&env.config()).unwrap();
    service.add(&env.sources_path().display().to_string(), &AddOptions::default()).await.unwrap();

    let raw = env.read_file(".agsync/state.json").unwrap();
    let state: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(state["schemaVersion"], 1);
    assert_eq!(state["config"]["historyLimit"], 10);

    let pdf = &state["resources"]["pdf"];
    assert_eq!(pdf["kind"], "skill");
    assert_eq!(pdf["handlerId"], "skill");
    assert_eq!(pdf["version"], "1.0.0");
    assert_eq!(pdf["originKind"], "local");
    assert_eq!(pdf["installedFor"][0]["consumerId"], "claude-code");
    assert_eq!(pdf["installedFor"][0]["scope"], "project");
    assert!(pdf["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_rollback_and_persistence() {
    let env = TestEnvironment::new().unwrap();
    let origin = env.sources_path().display().to_string();
    let (service, _) = env.service(&env.config()).unwrap();

    service
        .store()
        .set_config(StateConfig {
            history_limit: 1,
            ..StateConfig::default()
        })
        .unwrap();

    for version in ["1.0.0", "1.1.0", "1.2.0"] {
        write_skill(&env, version);
        let report = service.add(&origin, &forced()).await.unwrap();
        assert!(report.is_complete(), "{report:#?}");
    }

    let history = service.history("pdf").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version.as_deref(), Some("1.1.0"));

    let rolled = service.rollback("pdf").unwrap();
    assert_eq!(rolled.version.as_deref(), Some("1.1.0"));
    assert_eq!(rolled.history[0].version.as_deref(), Some("1.2.0"));
    assert_eq!(rolled.installed_for.len(), 1);

    // A fresh service over the same project sees the rolled-back record
    let (reopened, _) = env.service(&env.config()).unwrap();
    let record = reopened.store().get("pdf").unwrap().unwrap();
    assert_eq!(record.version.as_deref(), Some("1.1.0"));
    assert_eq!(reopened.store().config().unwrap().history_limit, 1);

    let back = reopened.rollback("pdf").unwrap();
    assert_eq!(back.version.as_deref(), Some("1.2.0"));
}

#[tokio::test]
async fn test_rollback_without_history_is_not_found() {
    let env = TestEnvironment::new().unwrap();
    write_skill(&env, "1.0.0");
    let (service, _) = env.service(&env.config()).unwrap();
    service.add(&env.sources_path().display().to_string(), &AddOptions::default()).await.unwrap();

    let err = service.rollback("pdf").unwrap_err();
    assert!(matches!(err.downcast_ref::<AgsyncError>(), Some(AgsyncError::NotFound { .. })));
    let err = service.rollback("ghost").unwrap_err();
    assert!(matches!(err.downcast_ref::<AgsyncError>(), Some(AgsyncError::NotFound { .. })));
}

#[tokio::test]
async fn test_newer_schema_is_left_untouched() {
    let env = TestEnvironment::new().unwrap();
    write_skill(&env, "1.0.0");
    let original = r#"{"schemaVersion": 2, "resources": {}}"#;
    env.create_file(".agsync/state.json", original).unwrap();
    let (service, _) = env.service(&env.config()).unwrap();

    let err = service
        .add(&env.sources_path().display().to_string(), &AddOptions::default())
        .await
        .unwrap_err();
    match err.downcast_ref::<AgsyncError>() {
        Some(AgsyncError::SchemaVersionMismatch {
            expected,
            found,
            ..
        }) => {
            assert_eq!(*expected, 1);
            assert_eq!(found, "2");
        }
        other => panic!("expected schema mismatch, got {other:?}"),
    }
    assert_eq!(env.read_file(".agsync/state.json").unwrap(), original);
    assert!(!env.file_exists(".claude"));
}
