use blockarmor_analysis::llm::{
    AnalysisClient, LLMError, LLMProvider, LLMRequest, OpenAIProvider,
};
use blockarmor_analysis::Tier;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::with_config(
        "test-key".to_string(),
        "gpt-4o".to_string(),
        Some(format!("{}/v1", server.uri())),
    )
}

fn request() -> LLMRequest {
    LLMRequest {
        system_prompt: "You are an auditor.".to_string(),
        user_prompt: "ANALYSIS TIER: pro\ncontract C {}".to_string(),
        temperature: 0.2,
        max_tokens: 500,
        expect_json: true,
        dump_prompt: false,
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160 }
    })
}

#[tokio::test]
async fn test_chat_completion_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"ok\":true}")))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server).analyze(request()).await.unwrap();

    assert_eq!(response.content, "{\"ok\":true}");
    assert_eq!(response.model, "gpt-4o-2024-08-06");
    assert_eq!(response.usage.total_tokens, 160);
}

#[tokio::test]
async fn test_rate_limit_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "message": "Rate limit reached for requests",
                "type": "requests",
                "param": null,
                "code": "rate_limit_exceeded"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server).analyze(request()).await.unwrap_err();

    assert_eq!(err, LLMError::RateLimitExceeded);
}

#[tokio::test]
async fn test_server_error_fails_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server).analyze(request()).await.unwrap_err();

    assert!(matches!(
        err,
        LLMError::ApiError(_) | LLMError::InvalidResponse(_)
    ));
}

#[tokio::test]
async fn test_empty_content_is_declined() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let err = provider(&server).analyze(request()).await.unwrap_err();

    assert!(matches!(err, LLMError::Declined(_)));
}

#[tokio::test]
async fn test_scan_through_openai_endpoint() {
    let server = MockServer::start().await;
    let reply = r#"{"securityScore":62,"vulnerabilities":["Missing access control on setOwner()"],"suggestedFixes":["Restrict setOwner() with onlyOwner"],"tierApplied":"pro"}"#;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalysisClient::with_provider(Arc::new(provider(&server)));
    let outcome = client
        .scan_vulnerabilities(
            "contract C { address owner; function setOwner(address o) public { owner = o; } }",
            Some("pro".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(outcome.response.security_score, 62);
    assert_eq!(outcome.response.tier_applied, Tier::Pro);
    assert_eq!(outcome.metadata.usage.total_tokens, 160);
}
