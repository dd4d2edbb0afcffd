//! `ProviderAdapter` trait: the capability set every upstream vendor
//! implements, polymorphic over `{OpenAI, Anthropic, Google}`.

use async_trait::async_trait;
use bg_types::BgError;
use serde_json::Value;
use std::time::Duration;

/// Timeout applied to `health_check` probes, distinct from (and much
/// shorter than) the shared client's total-request timeout: a liveness
/// probe should fail fast rather than wait out the same deadline as a
/// real completion call.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterResponse
{
  pub status: u16,
  pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus
{
  pub healthy: bool,
  pub response_time_ms: u64,
  pub error: Option<String>,
  pub last_checked: i64,
}

/// Translates between the OpenAI wire format and a concrete upstream
/// vendor's format. `chat_completion`/`responses` both speak OpenAI
/// shape at the boundary; adapters that target a different upstream
/// wire format (Anthropic, Google) translate internally.
///
/// # Errors
///
/// Every method returns `BgError::Upstream` for a transport failure or
/// a non-2xx upstream response (body passed through verbatim), and
/// `BgError::Internal` for a response whose shape doesn't parse.
#[async_trait]
pub trait ProviderAdapter: Send + Sync
{
  async fn chat_completion(&self, body: Value) -> Result<AdapterResponse, BgError>;
  async fn responses(&self, body: Value) -> Result<AdapterResponse, BgError>;
  async fn health_check(&self) -> HealthStatus;
}
