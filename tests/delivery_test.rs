mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{CollectorStub, SharedBuffer};
use herald::delivery::{DeliveryClient, HttpTransport};
use herald::lifecycle::UpdateReason;
use herald::logging::LogCapture;
use herald::status::{BuildStatus, BuildUpdateMessage};
use secrecy::SecretString;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;
use uuid::Uuid;

const HOST_INFORMATION: &str =
    r#"{"Job":"test","JobId":"123","Ref":"refs/heads/main","Repository":"org/herald"}"#;

fn message(token: &SecretString) -> BuildUpdateMessage<'_> {
    BuildUpdateMessage {
        access_token: Some(token),
        correlation_id: Uuid::new_v4(),
        update_reason: UpdateReason::BuildCreated,
        time_created: Utc::now(),
        status: BuildStatus {
            started: Utc::now(),
            host: "GitHubActions".to_string(),
            host_information: HOST_INFORMATION.to_string(),
            version: Some("1.4.0".to_string()),
            repository: Some("https://github.com/org/herald".to_string()),
            branch: Some("main".to_string()),
            commits: None,
            targets: Vec::new(),
            error_message: String::new(),
            exit_code: None,
        },
    }
}

fn client(endpoint: String, debug: bool) -> DeliveryClient {
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    DeliveryClient::new(Some(endpoint), debug, Box::new(transport))
}

#[test]
fn test_envelope_reaches_collector() {
    let stub = CollectorStub::start(StatusCode::OK);
    let token = SecretString::from("s3cr3t".to_string());
    let msg = message(&token);

    client(stub.endpoint(), false).deliver(&msg);

    let received = stub.received();
    assert_eq!(received.len(), 1);
    let body = &received[0];
    assert_eq!(body["AccessToken"], "s3cr3t");
    assert_eq!(body["Cookie"], msg.correlation_id.to_string());
    assert_eq!(body["UpdateReason"], "BuildCreated");
    assert_eq!(body["Status"]["Host"], "GitHubActions");
    assert_eq!(body["Status"]["HostInformation"], HOST_INFORMATION);
    assert_eq!(body["Status"]["Version"], "1.4.0");
    assert!(body["Status"]["Commits"].is_null());
    assert!(body["Status"]["ExitCode"].is_null());
}

#[test]
fn test_server_error_is_logged_not_raised() {
    let stub = CollectorStub::start(StatusCode::INTERNAL_SERVER_ERROR);
    let token = SecretString::from("s3cr3t".to_string());
    let capture = LogCapture::new();
    let endpoint = stub.endpoint();

    tracing::subscriber::with_default(Registry::default().with(capture.layer()), || {
        client(endpoint.clone(), false).deliver(&message(&token));
    });

    assert_eq!(stub.received().len(), 1);
    let warnings = capture.messages();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains(&endpoint));
}

#[test]
fn test_unreachable_collector_is_logged_not_raised() {
    let token = SecretString::from("s3cr3t".to_string());
    let capture = LogCapture::new();
    // Reserve a port, then free it so nothing is listening
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let endpoint = format!("http://127.0.0.1:{}/api/build/status", port);

    tracing::subscriber::with_default(Registry::default().with(capture.layer()), || {
        client(endpoint.clone(), false).deliver(&message(&token));
    });

    assert!(capture.joined().contains(&endpoint));
}

#[test]
fn test_debug_mode_prints_instead_of_posting() {
    let stub = CollectorStub::start(StatusCode::OK);
    let token = SecretString::from("s3cr3t".to_string());
    let buffer = SharedBuffer::default();

    client(stub.endpoint(), true)
        .with_debug_output(Box::new(buffer.clone()))
        .deliver(&message(&token));

    assert_eq!(buffer.contents(), format!("{}\n", HOST_INFORMATION));
    // Give a stray request time to land before asserting none did
    std::thread::sleep(Duration::from_millis(100));
    assert!(stub.received().is_empty());
}
