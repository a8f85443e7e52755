//! End-to-end lifecycle of the engine backend against a scripted engine

#![cfg(unix)]

mod common;

use common::*;
use gate_engine::domain::{DomainError, HealthPolicy, User};
use gate_engine::{Backend, XrayBackend};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn users() -> Vec<User> {
    vec![
        User::new("alice@example.com")
            .with_inbounds(["VLESS", "TROJAN", "MANUAL"])
            .with_vless(VLESS_ID, "xtls-rprx-vision")
            .with_trojan("alice-secret"),
        User::new("bob@example.com")
            .with_inbounds(["TROJAN"])
            .with_vless(VLESS_ID, ""),
    ]
}

#[tokio::test]
#[serial]
async fn test_start_renders_document_and_shutdown_stops_engine() {
    let dir = TempDir::new().unwrap();
    let executable = write_fake_engine(dir.path(), FakeEngine::Healthy);
    let api = Arc::new(RecordingApi::default());

    let backend = XrayBackend::start_with(
        engine_config(dir.path()),
        &users(),
        backend_settings(&dir, executable),
        ports(api),
    )
    .await
    .unwrap();

    assert!(backend.started().await);
    assert_eq!(backend.version(), VERSION);
    assert!(backend.pid().await.is_some());

    let document = received_config(dir.path()).await;
    assert_eq!(document["inbounds"][0]["tag"], "API_INBOUND");
    assert_eq!(document["log"]["access"], "");
    assert_eq!(document["log"]["error"], "");
    assert_eq!(rendered_emails(&document, "VLESS"), vec!["alice@example.com"]);
    assert_eq!(
        rendered_emails(&document, "TROJAN"),
        vec!["alice@example.com"]
    );
    assert_eq!(rendered_emails(&document, "MANUAL"), vec!["manual@local"]);

    // Engine output lands in the error log declared by the original document
    let error_log = std::fs::read_to_string(dir.path().join("error.log")).unwrap();
    assert!(error_log.contains("core: Xray 1.8.24 started"));

    backend.shutdown().await;
    assert!(!backend.started().await);
    assert_eq!(backend.pid().await, None);

    // A second shutdown has nothing left to stop
    backend.shutdown().await;
    assert!(!backend.started().await);
}

#[tokio::test]
#[serial]
async fn test_startup_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let executable = write_fake_engine(dir.path(), FakeEngine::Failing);

    let result = XrayBackend::start_with(
        engine_config(dir.path()),
        &[],
        backend_settings(&dir, executable),
        ports(Arc::new(RecordingApi::default())),
    )
    .await;

    match result {
        Err(DomainError::StartupFailed(reason)) => assert!(reason.contains("Failed to start")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("startup should have failed"),
    }
}

#[tokio::test]
#[serial]
async fn test_startup_timeout_tears_engine_down() {
    let dir = TempDir::new().unwrap();
    let executable = write_fake_engine(dir.path(), FakeEngine::Silent);
    let settings = backend_settings(&dir, executable).with_startup_timeout(Duration::from_millis(300));

    let result = XrayBackend::start_with(
        engine_config(dir.path()),
        &[],
        settings,
        ports(Arc::new(RecordingApi::default())),
    )
    .await;

    assert!(matches!(result, Err(DomainError::StartupTimeout)));
}

#[tokio::test]
#[serial]
async fn test_concurrent_restart_is_rejected() {
    let dir = TempDir::new().unwrap();
    let executable = write_fake_engine(dir.path(), FakeEngine::Healthy);

    let backend = XrayBackend::start_with(
        engine_config(dir.path()),
        &[],
        backend_settings(&dir, executable),
        ports(Arc::new(RecordingApi::default())),
    )
    .await
    .unwrap();
    let first_pid = backend.pid().await.unwrap();

    let (a, b) = tokio::join!(backend.restart(), backend.restart());
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(DomainError::AlreadyRestarting))));

    assert!(backend.started().await);
    assert_ne!(backend.pid().await, Some(first_pid));

    backend.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_sync_users_restarts_with_new_clients() {
    let dir = TempDir::new().unwrap();
    let executable = write_fake_engine(dir.path(), FakeEngine::Healthy);

    let backend = XrayBackend::start_with(
        engine_config(dir.path()),
        &[],
        backend_settings(&dir, executable),
        ports(Arc::new(RecordingApi::default())),
    )
    .await
    .unwrap();
    let first_pid = backend.pid().await.unwrap();

    let document = received_config(dir.path()).await;
    assert!(rendered_emails(&document, "TROJAN").is_empty());
    std::fs::remove_file(dir.path().join(RECEIVED_CONFIG)).unwrap();

    backend.sync_users(&users()).await.unwrap();
    assert_ne!(backend.pid().await, Some(first_pid));

    let document = received_config(dir.path()).await;
    assert_eq!(
        rendered_emails(&document, "TROJAN"),
        vec!["alice@example.com"]
    );
    assert_eq!(rendered_emails(&document, "VLESS"), vec!["alice@example.com"]);

    backend.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_sync_user_applies_live_and_mirrors_model() {
    let dir = TempDir::new().unwrap();
    let executable = write_fake_engine(dir.path(), FakeEngine::Healthy);
    let api = Arc::new(RecordingApi::default());

    let backend = XrayBackend::start_with(
        engine_config(dir.path()),
        &[],
        backend_settings(&dir, executable),
        ports(api.clone()),
    )
    .await
    .unwrap();
    let pid = backend.pid().await;

    let user = User::new("carol@example.com")
        .with_inbounds(["TROJAN", "MANUAL"])
        .with_trojan("carol-secret");
    backend.sync_user(&user).await.unwrap();

    assert_eq!(
        api.calls(),
        vec![
            "remove VLESS carol@example.com",
            "remove TROJAN carol@example.com",
            "add TROJAN carol@example.com",
        ]
    );
    assert!(backend
        .config()
        .inbound("TROJAN")
        .unwrap()
        .clients()
        .contains("carol@example.com"));
    assert!(!backend
        .config()
        .inbound("MANUAL")
        .unwrap()
        .clients()
        .contains("carol@example.com"));

    // Live sync never restarts the engine
    assert_eq!(backend.pid().await, pid);

    backend.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_failed_health_checks_restart_engine() {
    let dir = TempDir::new().unwrap();
    let executable = write_fake_engine(dir.path(), FakeEngine::Healthy);
    let api = Arc::new(RecordingApi::default());
    api.set_unhealthy(true);

    let settings = backend_settings(&dir, executable).with_health(
        HealthPolicy::default()
            .with_start_delay(Duration::from_millis(10))
            .with_interval(Duration::from_millis(50))
            .with_timeout(Duration::from_millis(50))
            .with_max_failures(3),
    );
    let backend = XrayBackend::start_with(engine_config(dir.path()), &[], settings, ports(api.clone()))
        .await
        .unwrap();
    let first_pid = backend.pid().await.unwrap();

    let mut restarted = false;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Some(pid) = backend.pid().await {
            if pid != first_pid {
                restarted = true;
                break;
            }
        }
    }
    assert!(restarted, "engine was not restarted after failed health checks");

    api.set_unhealthy(false);
    backend.shutdown().await;
    assert!(!backend.started().await);
}
