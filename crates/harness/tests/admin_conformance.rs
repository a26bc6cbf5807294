mod support;

use std::sync::Arc;
use std::time::Duration;

use adminprobe::auth::Credentials;
use adminprobe::config::Endpoints;
use adminprobe::fixture::DocumentFixture;
use adminprobe::sequencer::TestSequencer;
use adminprobe::steps::{AdminContext, AdminStep};
use adminprobe::Verdict;
use support::{config_for, spawn, test_documents, MockOptions};

#[tokio::test]
async fn full_run_against_conforming_server_passes() {
    let server = spawn(MockOptions::default()).await;
    let documents = test_documents();

    let report = adminprobe::run(&config_for(&server, documents.path())).await.unwrap();

    assert_eq!(report.verdict, Verdict::Passed);
    assert_eq!(report.steps_run, 10);
    assert_eq!(report.total_steps, 10);
    assert_eq!(report.failed_step, None);
}

#[tokio::test]
async fn unauthenticated_steps_pass_without_secure_transport() {
    let server = spawn(MockOptions::default()).await;
    let documents = test_documents();
    let config = adminprobe::HarnessConfig {
        secure_transport: Some(false),
        ..config_for(&server, documents.path())
    };

    let report = adminprobe::run(&config).await.unwrap();

    assert_eq!(report.verdict, Verdict::Passed);
    assert_eq!(report.total_steps, 2);
}

#[tokio::test]
async fn misreported_user_count_fails_at_users_count() {
    let server = spawn(MockOptions { users_skew: 1, ..MockOptions::default() }).await;
    let documents = test_documents();

    let report = adminprobe::run(&config_for(&server, documents.path())).await.unwrap();

    assert_eq!(report.verdict, Verdict::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("users_count"));
    assert_eq!(report.steps_run, 6);
}

#[tokio::test]
async fn misreported_document_count_fails_at_docs_count() {
    let server = spawn(MockOptions { docs_skew: -1, ..MockOptions::default() }).await;
    let documents = test_documents();

    let report = adminprobe::run(&config_for(&server, documents.path())).await.unwrap();

    assert_eq!(report.verdict, Verdict::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("docs_count"));
    assert_eq!(report.steps_run, 7);
}

#[tokio::test]
async fn announcement_for_another_document_fails_add_doc_notify() {
    let server = spawn(MockOptions {
        wrong_doc_name: Some("other.odt".into()),
        ..MockOptions::default()
    })
    .await;
    let documents = test_documents();

    let report = adminprobe::run(&config_for(&server, documents.path())).await.unwrap();

    assert_eq!(report.verdict, Verdict::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("add_doc_notify"));
    assert_eq!(report.steps_run, 5);
}

#[tokio::test]
async fn silent_server_times_out() {
    let server = spawn(MockOptions { silent: true, ..MockOptions::default() }).await;
    let documents = test_documents();
    let config = adminprobe::HarnessConfig {
        message_timeout_ms: 300,
        ..config_for(&server, documents.path())
    };

    let report = adminprobe::run(&config).await.unwrap();

    assert_eq!(report.verdict, Verdict::TimedOut);
    assert_eq!(report.failed_step.as_deref(), Some("ws_without_auth_token"));
    assert_eq!(report.steps_run, 3);
}

#[tokio::test]
async fn insecure_session_cookie_fails_login() {
    let server = spawn(MockOptions { insecure_cookie: true, ..MockOptions::default() }).await;
    let documents = test_documents();

    let report = adminprobe::run(&config_for(&server, documents.path())).await.unwrap();

    assert_eq!(report.verdict, Verdict::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("correct_password"));
}

#[tokio::test]
async fn missing_test_documents_fail_add_doc_notify() {
    let server = spawn(MockOptions::default()).await;
    let empty = tempfile::TempDir::new().unwrap();

    let report = adminprobe::run(&config_for(&server, empty.path())).await.unwrap();

    assert_eq!(report.verdict, Verdict::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("add_doc_notify"));
}

#[tokio::test]
async fn unreachable_server_fails_first_step() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = adminprobe::HarnessConfig {
        server_url: format!("http://{addr}"),
        message_timeout_ms: 500,
        trigger_interval_ms: 10,
        ..adminprobe::HarnessConfig::default()
    };

    let report = adminprobe::run(&config).await.unwrap();

    assert_eq!(report.verdict, Verdict::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("incorrect_password"));
}

#[tokio::test]
async fn add_doc_notify_tracks_views_and_documents() {
    let server = spawn(MockOptions::default()).await;
    let documents = test_documents();
    let context = AdminContext::new(
        Endpoints::from_server_url(&server.url).unwrap(),
        Credentials { user: "admin".into(), password: "admin".into() },
        DocumentFixture::new(documents.path()),
        Duration::from_secs(5),
    )
    .unwrap();
    let sequencer = Arc::new(TestSequencer::with_steps(
        context,
        [AdminStep::CorrectPassword, AdminStep::AddDocNotify],
    ));

    let verdict =
        Arc::clone(&sequencer).run(Duration::from_millis(10), Duration::from_secs(30)).await;

    assert_eq!(verdict, Verdict::Passed);
    let mut context = sequencer.context().lock().await;
    assert!(context.has_auth_token());
    assert_eq!(context.registry().active_users(), 3);
    assert_eq!(context.registry().active_docs(), 2);

    context.close_all().await;
    assert_eq!(context.registry().active_users(), 0);
    assert_eq!(context.registry().active_docs(), 0);
}

#[tokio::test]
async fn rm_doc_notify_keeps_document_with_remaining_view() {
    let server = spawn(MockOptions::default()).await;
    let documents = test_documents();
    let context = AdminContext::new(
        Endpoints::from_server_url(&server.url).unwrap(),
        Credentials { user: "admin".into(), password: "admin".into() },
        DocumentFixture::new(documents.path()),
        Duration::from_secs(5),
    )
    .unwrap();
    let sequencer = Arc::new(TestSequencer::with_steps(
        context,
        [
            AdminStep::CorrectPassword,
            AdminStep::AddDocNotify,
            AdminStep::RmDocNotify,
            AdminStep::UsersCount,
            AdminStep::DocsCount,
        ],
    ));

    let verdict =
        Arc::clone(&sequencer).run(Duration::from_millis(10), Duration::from_secs(30)).await;

    assert_eq!(verdict, Verdict::Passed);
    let context = sequencer.context().lock().await;
    assert_eq!(context.registry().active_users(), 2);
    assert_eq!(context.registry().active_docs(), 2);
}

#[tokio::test]
async fn rmdoc_with_wrong_pid_fails_and_keeps_the_view_counted() {
    let server = spawn(MockOptions { rmdoc_pid_skew: 7, ..MockOptions::default() }).await;
    let documents = test_documents();
    let context = AdminContext::new(
        Endpoints::from_server_url(&server.url).unwrap(),
        Credentials { user: "admin".into(), password: "admin".into() },
        DocumentFixture::new(documents.path()),
        Duration::from_secs(5),
    )
    .unwrap();
    let sequencer = Arc::new(TestSequencer::with_steps(
        context,
        [AdminStep::CorrectPassword, AdminStep::AddDocNotify, AdminStep::RmDocNotify],
    ));

    let verdict =
        Arc::clone(&sequencer).run(Duration::from_millis(10), Duration::from_secs(30)).await;

    assert_eq!(verdict, Verdict::Failed);
    assert_eq!(sequencer.progress().stopped_at, Some(2));
    let context = sequencer.context().lock().await;
    assert_eq!(context.registry().active_users(), 3);
    assert_eq!(context.registry().active_docs(), 2);
}

#[tokio::test]
async fn full_run_reports_wrong_rmdoc_pid() {
    let server = spawn(MockOptions { rmdoc_pid_skew: 7, ..MockOptions::default() }).await;
    let documents = test_documents();

    let report = adminprobe::run(&config_for(&server, documents.path())).await.unwrap();

    assert_eq!(report.verdict, Verdict::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("rm_doc_notify"));
    assert_eq!(report.steps_run, 8);
}
