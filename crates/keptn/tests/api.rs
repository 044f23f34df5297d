//! Keptn API adapter tests against a mock Keptn server.

use std::time::Duration;

use keptn::{KeptnApiClient, KeptnClientConfig};
use serde_json::json;
use translator::{
    ApiToken, Destination, DownstreamSender, EventData, EventPayload, OutgoingEvent,
    OutgoingEventTemplate, SendError, TaskStatus,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn started_event() -> OutgoingEvent {
    OutgoingEventTemplate::new(EventPayload::DeploymentStarted(EventData {
        project: "cde".into(),
        stage: "production".into(),
        service: "podtato-head".into(),
        status: Some(TaskStatus::Unknown),
        result: None,
        message: "deployment handled by Tekton".into(),
    }))
    .build()
    .unwrap()
}

fn client() -> KeptnApiClient {
    KeptnApiClient::new(KeptnClientConfig::default()).unwrap()
}

/// The mock server's URI with an `/api` prefix and no trailing slash, the
/// way operators usually write it.
fn destination(server: &MockServer, token: &str) -> Destination {
    Destination::parse(&format!("{}/api", server.uri()), ApiToken::new(token)).unwrap()
}

#[tokio::test]
async fn posts_event_with_token_and_returns_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/event"))
        .and(header("x-token", "s3cr3t"))
        .and(body_partial_json(json!({
            "type": "sh.keptn.event.deployment.started",
            "source": "keptn-cdf-translator",
            "data": { "project": "cde", "service": "podtato-head" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "keptnContext": "ctx-123", "token": "t" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let context = client()
        .send(&started_event(), &destination(&server, "s3cr3t"))
        .await
        .unwrap();

    assert_eq!(context.as_ref().map(|c| c.as_str()), Some("ctx-123"));
}

#[tokio::test]
async fn missing_or_empty_context_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/event"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keptnContext": "" })))
        .mount(&server)
        .await;

    let context = client()
        .send(&started_event(), &destination(&server, "t"))
        .await
        .unwrap();

    assert!(context.is_none());
}

#[tokio::test]
async fn error_status_is_rejected_with_api_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/event"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "code": 401, "message": "invalid token" })),
        )
        .mount(&server)
        .await;

    let err = client()
        .send(&started_event(), &destination(&server, "wrong"))
        .await
        .unwrap_err();

    match err {
        SendError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid token");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_is_kept_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client()
        .send(&started_event(), &destination(&server, "t"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SendError::Rejected { status: 502, ref message } if message == "upstream unavailable"
    ));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = KeptnApiClient::new(KeptnClientConfig {
        timeout: Duration::from_millis(100),
        ..KeptnClientConfig::default()
    })
    .unwrap();

    let err = client
        .send(&started_event(), &destination(&server, "t"))
        .await
        .unwrap_err();

    assert!(matches!(err, SendError::Transport(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    // Nothing listens on port 9 (discard) on loopback in test environments.
    let destination = Destination::parse("http://127.0.0.1:9/api/", ApiToken::default()).unwrap();

    let err = client().send(&started_event(), &destination).await.unwrap_err();

    assert!(matches!(err, SendError::Transport(_)));
}
