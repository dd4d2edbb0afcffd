//! Provider Adapters (C7).
//!
//! Each adapter implements `chat_completion`/`responses`/`health_check`
//! against the OpenAI wire shape at the boundary, translating to the
//! concrete upstream vendor's format internally where it diverges.

mod adapter;
mod anthropic;
mod google;
mod openai;
mod translate;

pub use adapter::{ AdapterResponse, HealthStatus, ProviderAdapter };
pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAiAdapter;

#[cfg(test)]
mod tests
{
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{ header, method, path };
  use wiremock::{ Mock, MockServer, ResponseTemplate };

  #[tokio::test]
  async fn openai_adapter_passes_request_through_byte_identically_in_data()
  {
    let server = MockServer::start().await;
    let upstream_response = json!({ "id": "chatcmpl-1", "model": "gpt-4", "choices": [{ "message": { "content": "hi" } }] });

    Mock::given(method("POST"))
      .and(path("/v1/chat/completions"))
      .and(header("authorization", "Bearer sk-test"))
      .respond_with(ResponseTemplate::new(200).set_body_json(&upstream_response))
      .mount(&server)
      .await;

    let adapter = OpenAiAdapter::new(reqwest::Client::new(), "sk-test".to_string(), server.uri());
    let result = adapter.chat_completion(json!({ "model": "gpt-4", "messages": [] })).await.unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(result.data, upstream_response);
  }

  #[tokio::test]
  async fn openai_adapter_wraps_non_2xx_body_under_error()
  {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/v1/chat/completions")).respond_with(ResponseTemplate::new(429).set_body_json(json!({ "message": "rate limited" }))).mount(&server).await;

    let adapter = OpenAiAdapter::new(reqwest::Client::new(), "sk-test".to_string(), server.uri());
    let err = adapter.chat_completion(json!({ "model": "gpt-4", "messages": [] })).await.unwrap_err();

    match err
    {
      bg_types::BgError::Upstream { status, .. } => assert_eq!(status, axum::http::StatusCode::TOO_MANY_REQUESTS),
      other => panic!("expected Upstream error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn anthropic_adapter_translates_request_and_response()
  {
    let server = MockServer::start().await;
    let anthropic_response = json!({
      "id": "msg_1",
      "model": "claude-sonnet-4",
      "content": [{ "type": "text", "text": "hello back" }],
      "stop_reason": "end_turn",
      "usage": { "input_tokens": 3, "output_tokens": 2 },
    });

    Mock::given(method("POST"))
      .and(path("/v1/messages"))
      .and(header("anthropic-version", "2023-06-01"))
      .respond_with(ResponseTemplate::new(200).set_body_json(&anthropic_response))
      .mount(&server)
      .await;

    let adapter = AnthropicAdapter::new(reqwest::Client::new(), "ak-test".to_string(), server.uri());
    let result = adapter.chat_completion(json!({ "model": "claude-sonnet-4", "messages": [{ "role": "user", "content": "hi" }] })).await.unwrap();

    assert_eq!(result.data["choices"][0]["message"]["content"], "hello back");
    assert_eq!(result.data["usage"]["total_tokens"], 5);
  }

  #[tokio::test]
  async fn google_adapter_translates_request_and_response()
  {
    let server = MockServer::start().await;
    let google_response = json!({
      "candidates": [{ "content": { "parts": [{ "text": "hi there" }] }, "finishReason": "STOP" }],
      "usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 2 },
    });

    Mock::given(method("POST"))
      .and(path("/gemini-2.5-pro:generateContent"))
      .and(header("x-goog-api-key", "gk-test"))
      .respond_with(ResponseTemplate::new(200).set_body_json(&google_response))
      .mount(&server)
      .await;

    let adapter = GoogleAdapter::new(reqwest::Client::new(), "gk-test".to_string(), server.uri());
    let result = adapter.chat_completion(json!({ "model": "gemini-2.5-pro", "messages": [{ "role": "user", "content": "hi" }] })).await.unwrap();

    assert_eq!(result.data["choices"][0]["message"]["content"], "hi there");
  }
}
