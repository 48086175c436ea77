use serde_json::json;
use storyrank_providers::{
    with_retry, BackendConfig, CredentialPool, GenerationClient, GenerationRequest,
    OpenAICompatibleClient, ProviderConfig, ProviderError, RetryConfig,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn client_for(server: &MockServer) -> OpenAICompatibleClient {
    let config = ProviderConfig::new("openai")
        .with_timeout(5)
        .with_backend(
            BackendConfig::new("openai", format!("{}/openai/chat", server.uri()))
                .with_credentials(CredentialPool::from_strings(["sk-openai"])),
        )
        .with_backend(
            BackendConfig::new("groq", format!("{}/groq/chat", server.uri()))
                .with_credentials(CredentialPool::from_strings(["gsk-groq"]))
                .with_model_prefix("llama3")
                .with_model("mixtral-8x7b-32768"),
        );
    OpenAICompatibleClient::new(config).unwrap()
}

#[tokio::test]
async fn test_default_backend_receives_bearer_key_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/chat"))
        .and(header("authorization", "Bearer sk-openai"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "You are a product owner."},
                {"role": "user", "content": "Rank the stories."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ranked")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request =
        GenerationRequest::prompt("gpt-4o-mini", "You are a product owner.", "Rank the stories.");
    let text = client.generate(&request).await.unwrap();
    assert_eq!(text, "ranked");
}

#[tokio::test]
async fn test_llama_models_route_to_groq() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/groq/chat"))
        .and(header("authorization", "Bearer gsk-groq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("from groq")))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    for model in ["llama3-70b-8192", "mixtral-8x7b-32768"] {
        let request = GenerationRequest::prompt(model, "sys", "user");
        assert_eq!(client.generate(&request).await.unwrap(), "from groq");
    }
}

#[tokio::test]
async fn test_unauthorized_is_upstream_and_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate(&GenerationRequest::prompt("gpt-4o", "sys", "user"))
        .await
        .unwrap_err();

    match &err {
        ProviderError::Upstream {
            backend,
            status,
            body,
        } => {
            assert_eq!(backend, "openai");
            assert_eq!(*status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = GenerationRequest::prompt("gpt-4o", "sys", "user");
    let retry = RetryConfig {
        max_attempts: 2,
        delay_ms: 0,
    };
    let err = with_retry(&retry, || client.generate(&request))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate(&GenerationRequest::prompt("gpt-4o", "sys", "user"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_empty_choices_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate(&GenerationRequest::prompt("gpt-4o", "sys", "user"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_backend_without_keys_is_configuration_error() {
    let server = MockServer::start().await;
    let config = ProviderConfig::new("openai")
        .with_backend(BackendConfig::new("openai", format!("{}/chat", server.uri())));
    let client = OpenAICompatibleClient::new(config).unwrap();

    let err = client
        .generate(&GenerationRequest::prompt("gpt-4o", "sys", "user"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));
}
