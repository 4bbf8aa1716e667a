//! HTTP contract of the biometric client against a mock service.

use biometric_auth::{AuthError, BiometricApi, BiometricClient, PhoneNumber, PollOutcome};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn number() -> PhoneNumber {
    PhoneNumber::parse("+15551234567").unwrap()
}

fn client(server: &MockServer) -> BiometricClient {
    BiometricClient::new(server.uri(), Some("test-key".into()), "Test Widget")
}

async fn poll_with_status(template: ResponseTemplate) -> Result<PollOutcome, AuthError> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/biometric-auth-result"))
        .respond_with(template)
        .expect(1)
        .mount(&server)
        .await;

    client(&server).poll_result(&number()).await
}

#[tokio::test]
async fn request_sends_number_caller_and_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/biometric-auth-request"))
        .and(header("x-api-key", "test-key"))
        .and(body_json(json!({
            "mobile": "+15551234567",
            "requestFrom": "Test Widget"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": true})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).request_auth(&number()).await.unwrap();
}

#[tokio::test]
async fn request_non_success_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/biometric-auth-request"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).request_auth(&number()).await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected { status: 401 }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn request_transport_failure_is_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = BiometricClient::new(uri, None, "Test Widget");
    let err = client.request_auth(&number()).await.unwrap_err();
    assert!(matches!(err, AuthError::Http(_)));
}

#[tokio::test]
async fn poll_200_extracts_display_name() {
    let outcome = poll_with_status(
        ResponseTemplate::new(200)
            .set_body_json(json!({"data": {"details": {"name": "Ada Lovelace"}}})),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Approved {
            name: Some("Ada Lovelace".into())
        }
    );
}

#[tokio::test]
async fn poll_200_without_name_still_approves() {
    let outcome = poll_with_status(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Approved { name: None });
}

#[tokio::test]
async fn poll_200_with_unreadable_body_is_error() {
    let err = poll_with_status(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Json(_)));
}

#[tokio::test]
async fn poll_status_mapping() {
    let cases = [
        (422, PollOutcome::Pending),
        (404, PollOutcome::UserNotFound),
        (403, PollOutcome::Denied),
        (500, PollOutcome::Unexpected { status: 500 }),
        (401, PollOutcome::Unexpected { status: 401 }),
    ];

    for (status, expected) in cases {
        let outcome = poll_with_status(ResponseTemplate::new(status)).await.unwrap();
        assert_eq!(outcome, expected, "status {status}");
    }
}
