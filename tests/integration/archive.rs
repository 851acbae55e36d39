use agsync_cli::audit::AuditAction;
use agsync_cli::config::GlobalConfig;
use agsync_cli::sync::{AddOptions, ItemStatus};
use agsync_cli::test_utils::{MarkdownFixture, SourceTreeFixture, TestEnvironment, raw_tarball};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(env: &TestEnvironment, server: &MockServer) -> GlobalConfig {
    let mut config = env.config();
    config.github_archive_url = server.uri();
    config.gitlab_url = server.uri();
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

#[tokio::test]
async fn test_github_shorthand_with_ref() {
    let env = TestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    let tarball = SourceTreeFixture::mixed().to_tar_gz("skills-1.2.0").unwrap();
    Mock::given(method("GET"))
        .and(path("/acme/skills/tar.gz/v1.2.0"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball))
        .expect(1)
        .mount(&server)
        .await;

    let (service, _) = env.service(&config_for(&env, &server)).unwrap();
    let report = service.add("acme/skills@v1.2.0", &AddOptions::default()).await.unwrap();
    assert!(report.is_complete(), "{report:#?}");
    assert_eq!(report.items.len(), 3);
    assert!(report.fetched_from.ends_with("/acme/skills/tar.gz/v1.2.0"));

    // Archive contents are staged under the cache, then copied into the project
    assert!(env.file_exists(".claude/skills/pdf/reference.md"));
    assert!(env.cache_path().join("staging").is_dir());

    let record = service.store().get("pdf").unwrap().unwrap();
    assert_eq!(record.version.as_deref(), Some("v1.2.0"));
    assert_eq!(record.origin, "acme/skills@v1.2.0");
}

#[tokio::test]
async fn test_github_tree_url_selects_subpath() {
    let env = TestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    let tarball = SourceTreeFixture::mixed().to_tar_gz("skills-main").unwrap();
    Mock::given(method("GET"))
        .and(path("/acme/skills/tar.gz/main"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball))
        .mount(&server)
        .await;

    let (service, _) = env.service(&config_for(&env, &server)).unwrap();
    let report = service
        .discover("https://github.com/acme/skills/tree/main/agents", Default::default(), None)
        .await
        .unwrap();
    let names: Vec<_> = report.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["reviewer"]);
}

#[tokio::test]
async fn test_missing_subpath_is_not_found() {
    let env = TestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    let tarball = SourceTreeFixture::mixed().to_tar_gz("skills-main").unwrap();
    Mock::given(method("GET"))
        .and(path("/acme/skills/tar.gz/main"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball))
        .mount(&server)
        .await;

    let (service, _) = env.service(&config_for(&env, &server)).unwrap();
    let err = service
        .add("https://github.com/acme/skills/tree/main/nope", &AddOptions::default())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("subpath 'nope'"), "{err:#}");
    assert!(!env.file_exists(".claude"));
}

#[tokio::test]
async fn test_hostile_entries_are_skipped_and_audited() {
    let env = TestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    let skill = MarkdownFixture::skill("pdf", "PDFs");
    let tarball = raw_tarball(&[
        ("bundle/pdf/SKILL.md", skill.content.as_bytes()),
        ("bundle/../../outside.txt", b"escaped"),
        ("../outside.txt", b"escaped"),
        ("/tmp/agsync-integration-absolute.txt", b"absolute"),
    ])
    .unwrap();
    Mock::given(method("GET"))
        .and(path("/bundle.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball))
        .mount(&server)
        .await;

    let (service, sink) = env.service(&config_for(&env, &server)).unwrap();
    let origin = format!("{}/bundle.tar.gz", server.uri());
    let report = service.add(&origin, &AddOptions::default()).await.unwrap();

    assert_eq!(report.count(ItemStatus::Installed), 1);
    assert_eq!(report.warnings.len(), 3, "{:#?}", report.warnings);
    assert!(env.file_exists(".claude/skills/pdf/SKILL.md"));
    assert!(!env.temp_dir.path().join("outside.txt").exists());
    assert!(!env.cache_path().join("outside.txt").exists());

    let violations = sink.records().iter().filter(|r| r.action == AuditAction::SecurityViolation).count();
    assert_eq!(violations, 3);
}

#[tokio::test]
async fn test_corrupt_archive_fails_without_installing() {
    let env = TestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"definitely not gzip".to_vec()))
        .mount(&server)
        .await;

    let (service, sink) = env.service(&config_for(&env, &server)).unwrap();
    let origin = format!("{}/broken.tar.gz", server.uri());
    assert!(service.add(&origin, &AddOptions::default()).await.is_err());
    assert!(service.records().unwrap().is_empty());
    assert!(!env.file_exists(".agsync/state.json"));

    let acquire = sink.records().into_iter().find(|r| r.action == AuditAction::Acquire).unwrap();
    assert!(acquire.error.is_some());
}
