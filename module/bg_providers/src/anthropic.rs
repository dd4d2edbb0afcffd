//! Anthropic adapter: translates the OpenAI wire shape to and from
//! Anthropic's `/v1/messages` format.

use crate::adapter::{ AdapterResponse, HealthStatus, ProviderAdapter, HEALTH_CHECK_TIMEOUT };
use crate::translate::{ anthropic_to_openai, openai_to_anthropic };
use async_trait::async_trait;
use bg_types::BgError;
use serde_json::{ json, Value };
use std::time::Instant;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter
{
  client: reqwest::Client,
  api_key: String,
  base_url: String,
}

impl AnthropicAdapter
{
  #[must_use]
  pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self
  {
    Self { client, api_key, base_url }
  }

  async fn call(&self, body: Value) -> Result<AdapterResponse, BgError>
  {
    let anthropic_body = openai_to_anthropic(&body).map_err(BgError::Validation)?;

    let response = self
      .client
      .post(format!("{}/v1/messages", self.base_url))
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", ANTHROPIC_VERSION)
      .json(&anthropic_body)
      .send()
      .await
      .map_err(|err| BgError::Upstream { status: axum::http::StatusCode::BAD_GATEWAY, body: json!({ "error": err.to_string() }) })?;

    let status = response.status();
    let data: Value = response.json().await.map_err(|err| BgError::Internal(format!("malformed upstream response: {err}")))?;

    if !status.is_success()
    {
      return Err(BgError::Upstream { status, body: json!({ "error": data }) });
    }

    let openai_shape = anthropic_to_openai(&data).map_err(BgError::Internal)?;
    Ok(AdapterResponse { status: status.as_u16(), data: openai_shape })
  }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter
{
  async fn chat_completion(&self, body: Value) -> Result<AdapterResponse, BgError>
  {
    self.call(body).await
  }

  async fn responses(&self, body: Value) -> Result<AdapterResponse, BgError>
  {
    self.call(body).await
  }

  async fn health_check(&self) -> HealthStatus
  {
    let started = Instant::now();
    let probe = json!({
      "model": "claude-3-5-haiku-20241022",
      "messages": [{ "role": "user", "content": "hi" }],
      "max_tokens": 1,
    });

    let result = self
      .client
      .post(format!("{}/v1/messages", self.base_url))
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", ANTHROPIC_VERSION)
      .json(&probe)
      .timeout(HEALTH_CHECK_TIMEOUT)
      .send()
      .await;

    let healthy = result.as_ref().is_ok_and(|response| response.status().is_success());
    let error = result.err().map(|err| err.to_string());

    HealthStatus { healthy, response_time_ms: started.elapsed().as_millis() as u64, error, last_checked: chrono::Utc::now().timestamp_millis() }
  }
}
