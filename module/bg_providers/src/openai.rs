//! OpenAI adapter: pure passthrough, since the wire format already is
//! OpenAI's own.

use crate::adapter::{ AdapterResponse, HealthStatus, ProviderAdapter, HEALTH_CHECK_TIMEOUT };
use async_trait::async_trait;
use bg_types::BgError;
use serde_json::Value;
use std::time::Instant;

pub struct OpenAiAdapter
{
  client: reqwest::Client,
  api_key: String,
  base_url: String,
}

impl OpenAiAdapter
{
  #[must_use]
  pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self
  {
    Self { client, api_key, base_url }
  }

  async fn post(&self, path: &str, body: Value) -> Result<AdapterResponse, BgError>
  {
    let response = self
      .client
      .post(format!("{}{}", self.base_url, path))
      .bearer_auth(&self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|err| BgError::Upstream { status: axum::http::StatusCode::BAD_GATEWAY, body: serde_json::json!({ "error": err.to_string() }) })?;

    let status = response.status();
    let data: Value = response.json().await.map_err(|err| BgError::Internal(format!("malformed upstream response: {err}")))?;

    if !status.is_success()
    {
      return Err(BgError::Upstream { status, body: serde_json::json!({ "error": data }) });
    }

    let well_formed_success =
      data.get("choices").and_then(Value::as_array).is_some() && data.get("id").and_then(Value::as_str).is_some() && data.get("model").and_then(Value::as_str).is_some();

    if !well_formed_success && data.get("error").is_none()
    {
      return Err(BgError::Internal("openai response missing one of choices[]/id/model and has no error".to_string()));
    }

    Ok(AdapterResponse { status: status.as_u16(), data })
  }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter
{
  async fn chat_completion(&self, body: Value) -> Result<AdapterResponse, BgError>
  {
    self.post("/v1/chat/completions", body).await
  }

  async fn responses(&self, body: Value) -> Result<AdapterResponse, BgError>
  {
    self.post("/v1/responses", body).await
  }

  async fn health_check(&self) -> HealthStatus
  {
    let started = Instant::now();
    let result = self.client.get(format!("{}/v1/models", self.base_url)).bearer_auth(&self.api_key).timeout(HEALTH_CHECK_TIMEOUT).send().await;

    let healthy = result.as_ref().is_ok_and(|response| response.status().is_success());
    let error = result.err().map(|err| err.to_string());

    HealthStatus { healthy, response_time_ms: started.elapsed().as_millis() as u64, error, last_checked: chrono::Utc::now().timestamp_millis() }
  }
}
