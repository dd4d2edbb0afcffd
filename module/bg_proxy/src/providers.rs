//! Builds the set of provider adapters from whichever credentials are
//! present in configuration. A provider with no configured key simply
//! has no entry, which the routing step turns into a `503`.

use bg_providers::{ AnthropicAdapter, GoogleAdapter, OpenAiAdapter, ProviderAdapter };
use bg_types::{ BudgetGuardConfig, Provider };
use std::sync::Arc;
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Holds one adapter per provider that has credentials configured.
#[derive(Default)]
pub struct ProviderRegistry
{
  openai: Option<Arc<dyn ProviderAdapter>>,
  anthropic: Option<Arc<dyn ProviderAdapter>>,
  google: Option<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry
{
  /// Construct adapters for every provider whose API key is present in
  /// `config`, sharing one `reqwest::Client` (connection pooling) across
  /// all of them. The shared client carries the configured total-request
  /// timeout (§5, 60s default); health checks override it per-request
  /// with a much shorter deadline so one slow upstream can't stall the
  /// liveness probe for the full duration of a real completion call.
  #[must_use]
  pub fn from_config(config: &BudgetGuardConfig) -> Self
  {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.upstream_timeout_secs))
      .build()
      .unwrap_or_default();

    Self
    {
      openai: config.openai_key.clone().map(|key| Arc::new(OpenAiAdapter::new(client.clone(), key, OPENAI_BASE_URL.to_string())) as Arc<dyn ProviderAdapter>),
      anthropic: config.anthropic_api_key.clone().map(|key| Arc::new(AnthropicAdapter::new(client.clone(), key, ANTHROPIC_BASE_URL.to_string())) as Arc<dyn ProviderAdapter>),
      google: config.google_api_key.clone().map(|key| Arc::new(GoogleAdapter::new(client.clone(), key, GOOGLE_BASE_URL.to_string())) as Arc<dyn ProviderAdapter>),
    }
  }

  /// The adapter for `provider`, or `None` if its credentials are absent
  /// from configuration.
  #[must_use]
  pub fn get(&self, provider: Provider) -> Option<&Arc<dyn ProviderAdapter>>
  {
    match provider
    {
      Provider::Openai => self.openai.as_ref(),
      Provider::Anthropic => self.anthropic.as_ref(),
      Provider::Google => self.google.as_ref(),
    }
  }
}
