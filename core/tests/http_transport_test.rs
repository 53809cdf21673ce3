//! HTTP transport against a local mock server: wire shape and status mapping.

use std::time::Duration;

use serde_json::json;
use twostep_core::{
    ChatTransport, CompletionClient, HttpTransport, Jitter, PromptTemplater, ProviderConfig,
    ProviderFailure, RetryPolicy, TwoStepConfig, TwoStepError,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> ProviderConfig {
    let mut cfg = ProviderConfig::new(format!("{}/v1/", server.uri()), "sk-test").unwrap();
    cfg.request_timeout = Duration::from_millis(300);
    cfg
}

fn request() -> twostep_core::ChatRequest {
    CompletionClient::new(NoTransport, &TwoStepConfig::default())
        .request(PromptTemplater::default().reasoning("hello"))
}

struct NoTransport;

#[async_trait::async_trait]
impl ChatTransport for NoTransport {
    async fn send(
        &self,
        _request: &twostep_core::ChatRequest,
    ) -> twostep_core::Result<twostep_core::ChatResponse> {
        Err(TwoStepError::config("not used"))
    }
}

async fn failure_for(status: u16) -> ProviderFailure {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&provider(&server)).unwrap();
    match transport.send(&request()).await {
        Err(TwoStepError::Provider(p)) => p.kind,
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn posts_chat_completion_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 500,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": " Hi there. "}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&provider(&server)).unwrap();
    let resp = transport.send(&request()).await.unwrap();
    assert_eq!(resp.first_text(), Some("Hi there."));
    assert_eq!(resp.usage.map(|u| u.total_tokens), Some(15));
}

#[tokio::test]
async fn maps_statuses_to_failure_kinds() {
    assert_eq!(failure_for(429).await, ProviderFailure::RateLimited);
    assert_eq!(failure_for(408).await, ProviderFailure::Timeout);
    assert_eq!(failure_for(500).await, ProviderFailure::ServerError(500));
    assert_eq!(failure_for(503).await, ProviderFailure::ServerError(503));
    assert_eq!(failure_for(401).await, ProviderFailure::Rejected(401));
    assert_eq!(failure_for(400).await, ProviderFailure::Rejected(400));
}

#[tokio::test]
async fn undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&provider(&server)).unwrap();
    let err = transport.send(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        TwoStepError::Provider(ref p) if p.kind == ProviderFailure::MalformedResponse
    ));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn slow_server_times_out_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&provider(&server)).unwrap();
    let err = transport.send(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        TwoStepError::Provider(ref p) if p.kind == ProviderFailure::Timeout
    ));
    assert!(err.is_transient());
}

#[tokio::test]
async fn client_retries_server_errors_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "recovered"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&provider(&server)).unwrap();
    let client = CompletionClient::new(transport, &TwoStepConfig::default()).with_retry(
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Jitter::Full,
        },
    );
    let text = client
        .complete(PromptTemplater::default().reasoning("hello"))
        .await
        .unwrap();
    assert_eq!(text, "recovered");
}
