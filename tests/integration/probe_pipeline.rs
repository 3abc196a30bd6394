//! Integration tests for a single probe-update-alert run
//!
//! These tests verify that:
//! - Status and history follow the probe outcome
//! - Offline targets alert their owner
//! - Alert failures never affect the recorded status
//! - A failed status or history write leaves the other write and the alert intact

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use keepalive_monitor::alerts::{AlertDispatcher, AlertMode, AlertOutcome};
use keepalive_monitor::monitors::{ProbePipeline, Prober, StatusUpdater};
use keepalive_monitor::storage::{Identity, TargetStatus};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

const OWNER: Identity = Identity(7);

#[tokio::test]
async fn test_healthy_target_goes_online() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (backend, stores) = memory_stores();
    stores.admins.insert_admin_if_absent(OWNER, None).await.unwrap();
    let target = add_target(&stores, "T", &mock_server.uri(), 5, OWNER, 6).await;

    let notifier = RecordingNotifier::new();
    let pipeline = create_pipeline(&stores, notifier.clone(), AlertMode::EveryFailure);

    let report = pipeline.run(target.clone()).await;

    assert!(report.outcome.success);
    assert_eq!(report.outcome.status_code, Some(200));
    assert_eq!(report.update.current, TargetStatus::Online);
    assert_eq!(report.alert, None);

    let stored = stores.targets.get_target_by_name("T").await.unwrap().unwrap();
    assert_eq!(stored.status, TargetStatus::Online);
    assert!(stored.last_probed > target.last_probed);

    let history = backend.history().await;
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
    assert_eq!(history[0].target_id, target.id);

    assert!(notifier.messages().await.is_empty());
}

#[tokio::test]
async fn test_failing_target_goes_offline_and_alerts_owner() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let (backend, stores) = memory_stores();
    stores.admins.insert_admin_if_absent(OWNER, None).await.unwrap();
    let target = add_target(&stores, "@T", &mock_server.uri(), 5, OWNER, 6).await;

    let notifier = RecordingNotifier::new();
    let pipeline = create_pipeline(&stores, notifier.clone(), AlertMode::EveryFailure);

    let report = pipeline.run(target.clone()).await;

    assert!(!report.outcome.success);
    assert_eq!(report.outcome.status_code, Some(503));
    assert_eq!(report.update.current, TargetStatus::Offline);
    assert_eq!(report.alert, Some(AlertOutcome::Sent(OWNER)));

    let stored = stores.targets.get_target_by_name("T").await.unwrap().unwrap();
    assert_eq!(stored.status, TargetStatus::Offline);

    let history = backend.history().await;
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);

    let messages = notifier.messages().await;
    assert_eq!(messages.len(), 1);
    let (recipient, text) = &messages[0];
    assert_eq!(*recipient, OWNER);
    assert!(text.contains("T is OFFLINE"));
    assert!(text.contains(&mock_server.uri()));
    // Previous probe time, not the time of this probe
    assert!(text.contains(&target.last_probed.format("%d %b %Y %H:%M").to_string()));
}

#[tokio::test]
async fn test_redirect_to_healthy_page_is_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let (_backend, stores) = memory_stores();
    let address = format!("{}/old", mock_server.uri());
    let target = add_target(&stores, "moved", &address, 5, OWNER, 6).await;

    let pipeline = create_pipeline(&stores, RecordingNotifier::new(), AlertMode::EveryFailure);
    let report = pipeline.run(target).await;

    assert!(report.outcome.success);
    assert_eq!(report.update.current, TargetStatus::Online);
}

#[tokio::test]
async fn test_client_error_is_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (_backend, stores) = memory_stores();
    let target = add_target(&stores, "missing", &mock_server.uri(), 5, OWNER, 6).await;

    let pipeline = create_pipeline(&stores, RecordingNotifier::new(), AlertMode::EveryFailure);
    let report = pipeline.run(target).await;

    assert!(!report.outcome.success);
    assert_eq!(report.outcome.diagnostic(), "HTTP 404");
}

#[tokio::test]
async fn test_every_failure_alerts_repeatedly() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let (_backend, stores) = memory_stores();
    stores.admins.insert_admin_if_absent(OWNER, None).await.unwrap();
    add_target(&stores, "flaky", &mock_server.uri(), 5, OWNER, 6).await;

    let notifier = RecordingNotifier::new();
    let pipeline = create_pipeline(&stores, notifier.clone(), AlertMode::EveryFailure);

    for _ in 0..2 {
        let target = stores.targets.get_target_by_name("flaky").await.unwrap().unwrap();
        pipeline.run(target).await;
    }

    assert_eq!(notifier.messages().await.len(), 2);
}

#[tokio::test]
async fn test_on_transition_alerts_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let (_backend, stores) = memory_stores();
    stores.admins.insert_admin_if_absent(OWNER, None).await.unwrap();
    add_target(&stores, "flaky", &mock_server.uri(), 5, OWNER, 6).await;

    let notifier = RecordingNotifier::new();
    let pipeline = create_pipeline(&stores, notifier.clone(), AlertMode::OnTransition);

    let mut alerts = Vec::new();
    for _ in 0..3 {
        let target = stores.targets.get_target_by_name("flaky").await.unwrap().unwrap();
        alerts.push(pipeline.run(target).await.alert);
    }

    assert_eq!(alerts, vec![Some(AlertOutcome::Sent(OWNER)), None, None]);
    assert_eq!(notifier.messages().await.len(), 1);
}

#[tokio::test]
async fn test_unknown_owner_skips_alert() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let (_backend, stores) = memory_stores();
    let target = add_target(&stores, "orphan", &mock_server.uri(), 5, Identity(999), 6).await;

    let notifier = RecordingNotifier::new();
    let pipeline = create_pipeline(&stores, notifier.clone(), AlertMode::EveryFailure);
    let report = pipeline.run(target).await;

    assert_eq!(report.alert, Some(AlertOutcome::OwnerUnknown));
    assert_eq!(report.update.current, TargetStatus::Offline);
    assert!(notifier.messages().await.is_empty());
}

#[tokio::test]
async fn test_notification_failure_is_swallowed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let (_backend, stores) = memory_stores();
    stores.admins.insert_admin_if_absent(OWNER, None).await.unwrap();
    let target = add_target(&stores, "T", &mock_server.uri(), 5, OWNER, 6).await;

    let notifier = RecordingNotifier::failing();
    let pipeline = create_pipeline(&stores, notifier.clone(), AlertMode::EveryFailure);
    let report = pipeline.run(target).await;

    assert_matches!(report.alert, Some(AlertOutcome::Failed));
    assert!(report.update.status_persisted);
    assert!(report.update.history_persisted);
    assert_eq!(notifier.messages().await.len(), 1);
}

#[tokio::test]
async fn test_unreachable_target_is_offline() {
    let (_backend, stores) = memory_stores();
    let target = add_target(&stores, "down", "http://127.0.0.1:1/", 5, OWNER, 6).await;

    let pipeline = create_pipeline(&stores, RecordingNotifier::new(), AlertMode::EveryFailure);
    let report = pipeline.run(target).await;

    assert!(!report.outcome.success);
    assert_eq!(report.outcome.status_code, None);
    assert_eq!(report.update.current, TargetStatus::Offline);
}

#[tokio::test]
async fn test_status_write_failure_still_records_history_and_alerts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let (backend, stores) = memory_stores();
    stores.admins.insert_admin_if_absent(OWNER, None).await.unwrap();
    let target = add_target(&stores, "T", &mock_server.uri(), 5, OWNER, 6).await;

    let notifier = RecordingNotifier::new();
    let pipeline = ProbePipeline::new(
        Prober::with_timeout(Duration::from_secs(5)).unwrap(),
        StatusUpdater::new(Arc::new(FailingTargetStore), stores.history.clone()),
        AlertDispatcher::new(stores.admins.clone(), notifier.clone(), AlertMode::EveryFailure),
    );

    let report = pipeline.run(target.clone()).await;

    assert!(!report.update.status_persisted);
    assert!(report.update.history_persisted);
    assert_eq!(report.update.current, TargetStatus::Offline);
    assert_eq!(report.alert, Some(AlertOutcome::Sent(OWNER)));

    let history = backend.history().await;
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
    assert_eq!(history[0].target_id, target.id);

    // The stored row was never touched
    let stored = stores.targets.get_target_by_name("T").await.unwrap().unwrap();
    assert_eq!(stored.status, TargetStatus::Unknown);
    assert_eq!(notifier.messages().await.len(), 1);
}

#[tokio::test]
async fn test_history_write_failure_still_updates_status_and_alerts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let (backend, stores) = memory_stores();
    stores.admins.insert_admin_if_absent(OWNER, None).await.unwrap();
    let target = add_target(&stores, "T", &mock_server.uri(), 5, OWNER, 6).await;

    let notifier = RecordingNotifier::new();
    let pipeline = ProbePipeline::new(
        Prober::with_timeout(Duration::from_secs(5)).unwrap(),
        StatusUpdater::new(stores.targets.clone(), Arc::new(FailingHistoryStore)),
        AlertDispatcher::new(stores.admins.clone(), notifier.clone(), AlertMode::EveryFailure),
    );

    let report = pipeline.run(target).await;

    assert!(report.update.status_persisted);
    assert!(!report.update.history_persisted);
    assert_eq!(report.alert, Some(AlertOutcome::Sent(OWNER)));

    let stored = stores.targets.get_target_by_name("T").await.unwrap().unwrap();
    assert_eq!(stored.status, TargetStatus::Offline);
    assert!(backend.history().await.is_empty());
    assert_eq!(notifier.messages().await.len(), 1);
}
