//! Error taxonomy shared across every component, and its mapping onto
//! HTTP responses at the admission boundary.

use axum::http::StatusCode;
use axum::response::{ IntoResponse, Json, Response };
use serde::Serialize;
use thiserror::Error;

/// The seven error kinds the core signals, each mapped to a status code.
/// Every external-I/O boundary catches and classifies into one of these;
/// nothing else escapes to the client as a raw error.
#[derive(Debug, Error)]
pub enum BgError
{
  /// Missing or invalid API key.
  #[error("authentication failed")]
  Auth,

  /// Unknown model or an unroutable provider.
  #[error("routing error: {0}")]
  Routing(String),

  /// Provider credentials absent from configuration for an otherwise
  /// valid route.
  #[error("provider unavailable: {0}")]
  ProviderUnavailable(String),

  /// Sliding/fixed-window rate-limit cap exceeded.
  #[error("rate limit exceeded")]
  RateLimitExceeded,

  /// Policy evaluator returned deny.
  #[error("request denied by policy")]
  PolicyDenied,

  /// Upstream transport failure or non-2xx passthrough body.
  #[error("upstream error: {status}")]
  Upstream
  {
    status: StatusCode,
    body: serde_json::Value,
  },

  /// Malformed input the core itself rejects, e.g. `budgets` not an array.
  #[error("validation error: {0}")]
  Validation(String),

  /// Anything else: database failure in the hot path, an invariant
  /// violation, etc.
  #[error("internal error: {0}")]
  Internal(String),
}

impl BgError
{
  /// The status code this error maps to, per the error handling design.
  #[must_use]
  pub fn status_code(&self) -> StatusCode
  {
    match self
    {
      Self::Auth => StatusCode::UNAUTHORIZED,
      Self::Routing(_) => StatusCode::NOT_FOUND,
      Self::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
      Self::PolicyDenied => StatusCode::FORBIDDEN,
      Self::Upstream { status, .. } => *status,
      Self::Validation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Machine-readable error code for the JSON body, independent of the
  /// HTTP status (two kinds can share a status but not a code).
  #[must_use]
  pub fn code(&self) -> &'static str
  {
    match self
    {
      Self::Auth => "AUTH_ERROR",
      Self::Routing(_) => "ROUTING_ERROR",
      Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
      Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
      Self::PolicyDenied => "POLICY_DENIED",
      Self::Upstream { .. } => "UPSTREAM_ERROR",
      Self::Validation(_) => "VALIDATION_ERROR",
      Self::Internal(_) => "INTERNAL_ERROR",
    }
  }
}

/// JSON error body shape returned at the proxy's HTTP boundary.
#[derive(Debug, Serialize)]
struct ErrorBody
{
  error: String,
  code: &'static str,
  details: Option<serde_json::Value>,
}

impl IntoResponse for BgError
{
  fn into_response(self) -> Response
  {
    let status = self.status_code();
    let code = self.code();

    // Upstream non-2xx bodies are passed through verbatim rather than
    // wrapped, so the client sees exactly what the provider returned.
    if let Self::Upstream { body, .. } = &self
    {
      return (status, Json(body.clone())).into_response();
    }

    let body = ErrorBody
    {
      error: self.to_string(),
      code,
      details: None,
    };

    (status, Json(body)).into_response()
  }
}
