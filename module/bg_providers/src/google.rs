//! Google adapter: translates the OpenAI wire shape to and from
//! Gemini's `generateContent` format. No defined health check in the
//! core; absence is treated as implicit per spec.

use crate::adapter::{ AdapterResponse, HealthStatus, ProviderAdapter };
use crate::translate::{ google_to_openai, openai_to_google };
use async_trait::async_trait;
use bg_types::BgError;
use serde_json::{ json, Value };

pub struct GoogleAdapter
{
  client: reqwest::Client,
  api_key: String,
  base_url: String,
}

impl GoogleAdapter
{
  #[must_use]
  pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self
  {
    Self { client, api_key, base_url }
  }

  async fn call(&self, model: &str, body: Value) -> Result<AdapterResponse, BgError>
  {
    let google_body = openai_to_google(&body).map_err(BgError::Validation)?;

    let response = self
      .client
      .post(format!("{}/{model}:generateContent", self.base_url))
      .header("x-goog-api-key", &self.api_key)
      .json(&google_body)
      .send()
      .await
      .map_err(|err| BgError::Upstream { status: axum::http::StatusCode::BAD_GATEWAY, body: json!({ "error": err.to_string() }) })?;

    let status = response.status();
    let data: Value = response.json().await.map_err(|err| BgError::Internal(format!("malformed upstream response: {err}")))?;

    if !status.is_success()
    {
      return Err(BgError::Upstream { status, body: json!({ "error": data }) });
    }

    let openai_shape = google_to_openai(&data).map_err(BgError::Internal)?;
    Ok(AdapterResponse { status: status.as_u16(), data: openai_shape })
  }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter
{
  async fn chat_completion(&self, body: Value) -> Result<AdapterResponse, BgError>
  {
    let model = body["model"].as_str().ok_or_else(|| BgError::Validation("missing 'model'".to_string()))?.to_string();
    self.call(&model, body.clone()).await
  }

  async fn responses(&self, body: Value) -> Result<AdapterResponse, BgError>
  {
    self.chat_completion(body).await
  }

  async fn health_check(&self) -> HealthStatus
  {
    HealthStatus { healthy: true, response_time_ms: 0, error: None, last_checked: chrono::Utc::now().timestamp_millis() }
  }
}
