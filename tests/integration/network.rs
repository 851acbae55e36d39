use agsync_cli::acquire::{Fetcher, RetryPolicy};
use agsync_cli::core::AgsyncError;
use agsync_cli::sync::AddOptions;
use agsync_cli::test_utils::{SourceTreeFixture, TestEnvironment};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(fast_policy(3)).unwrap();
    let body = fetcher.fetch_bytes(&format!("{}/flaky", server.uri()), 1024, "test").await.unwrap();
    assert_eq!(body, b"payload");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_attempt_cap_surfaces_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(fast_policy(2)).unwrap();
    let err = fetcher
        .fetch_bytes(&format!("{}/down", server.uri()), 1024, "archive download")
        .await
        .unwrap_err();
    match err.downcast_ref::<AgsyncError>() {
        Some(AgsyncError::Network {
            operation,
            reason,
        }) => {
            assert_eq!(operation, "archive download");
            assert!(reason.contains("500"), "{reason}");
        }
        other => panic!("expected network error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(fast_policy(4)).unwrap();
    let err = fetcher.fetch_bytes(&format!("{}/missing", server.uri()), 1024, "test").await.unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");
}

#[tokio::test]
async fn test_oversized_body_is_refused_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 4096]))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(fast_policy(3)).unwrap();
    assert!(fetcher.fetch_bytes(&format!("{}/big", server.uri()), 1024, "test").await.is_err());
}

async fn mount_registry(server: &MockServer) {
    let tarball = SourceTreeFixture::mixed().to_tar_gz("package").unwrap();
    let metadata = json!({
        "name": "skills-pack",
        "dist-tags": { "latest": "1.1.0" },
        "versions": {
            "1.0.0": { "dist": { "tarball": format!("{}/tarballs/skills-pack-1.0.0.tgz", server.uri()) } },
            "1.1.0": { "dist": { "tarball": format!("{}/tarballs/skills-pack-1.1.0.tgz", server.uri()) } }
        }
    });
    Mock::given(method("GET"))
        .and(path("/skills-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata))
        .mount(server)
        .await;
    for version in ["1.0.0", "1.1.0"] {
        Mock::given(method("GET"))
            .and(path(format!("/tarballs/skills-pack-{version}.tgz")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball.clone()))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_registry_origin_resolves_latest_and_pinned() {
    let env = TestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    mount_registry(&server).await;

    let mut config = env.config();
    config.registry_url = server.uri();
    let (service, _) = env.service(&config).unwrap();

    let report = service.add("registry:skills-pack", &AddOptions::default()).await.unwrap();
    assert!(report.is_complete(), "{report:#?}");
    assert!(report.fetched_from.ends_with("skills-pack-1.1.0.tgz"));
    assert_eq!(service.store().get("pdf").unwrap().unwrap().version.as_deref(), Some("1.1.0"));

    let forced = AddOptions {
        force: true,
        ..AddOptions::default()
    };
    service.add("registry:skills-pack@1.0.0", &forced).await.unwrap();
    let record = service.store().get("pdf").unwrap().unwrap();
    assert_eq!(record.version.as_deref(), Some("1.0.0"));
    assert_eq!(record.history[0].version.as_deref(), Some("1.1.0"));
}

#[tokio::test]
async fn test_unknown_registry_version_is_not_found() {
    let env = TestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    mount_registry(&server).await;

    let mut config = env.config();
    config.registry_url = server.uri();
    let (service, _) = env.service(&config).unwrap();

    let err = service.add("registry:skills-pack@9.9.9", &AddOptions::default()).await.unwrap_err();
    let not_found = err.chain().any(|cause| {
        matches!(cause.downcast_ref::<AgsyncError>(), Some(AgsyncError::NotFound { .. }))
    });
    assert!(not_found, "{err:#}");
    assert!(!env.file_exists(".claude"));
}
