//! Axum extractor wiring the Credential Resolver into request handling.
//!
//! The extractor itself never rejects: an unauthenticated request still
//! needs to reach the admission pipeline so a denied `UsageEvent` gets
//! published for it (every terminal state, Auth included, always
//! attempts Publish). The accept/deny decision is carried forward as
//! `AuthOutcome` and decided by the pipeline, not by Axum's extractor
//! machinery.

use crate::resolver::CredentialResolver;
use axum::extract::FromRef;
use bg_types::{ ApiKeyId, TenantId };
use std::convert::Infallible;
use std::sync::Arc;

/// Identity attached to a request once its `X-API-Key` header has been
/// verified against the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiKeyAuth
{
  pub api_key_id: ApiKeyId,
  pub tenant_id: TenantId,
}

/// Result of attempting to authenticate a request. Unlike a rejecting
/// extractor, this always reaches the handler so the pipeline can
/// account for and publish a denied request rather than short-circuit
/// before any `UsageEvent` is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome
{
  Authenticated(ApiKeyAuth),
  Denied,
}

/// State required to authenticate a request, pulled out of the app's
/// top-level state via `FromRef`.
#[derive(Clone)]
pub struct AuthState
{
  pub resolver: Arc<CredentialResolver>,
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthOutcome
where
  S: Send + Sync,
  AuthState: FromRef<S>,
{
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection>
  {
    let auth_state = AuthState::from_ref(state);

    let Some(secret) = parts.headers.get("X-API-Key").and_then(|value| value.to_str().ok())
    else
    {
      return Ok(AuthOutcome::Denied);
    };

    match auth_state.resolver.authenticate(secret).await
    {
      Some(authenticated) => Ok(AuthOutcome::Authenticated(ApiKeyAuth { api_key_id: authenticated.api_key_id, tenant_id: authenticated.tenant_id })),
      None => Ok(AuthOutcome::Denied),
    }
  }
}
