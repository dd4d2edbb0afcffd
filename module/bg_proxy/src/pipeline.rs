//! The admission state machine: `Auth -> Route -> Limit -> Policy ->
//! Dispatch -> Finalize -> Publish`. The `AuthOutcome` extractor runs
//! ahead of the handler and never rejects; the actual accept/deny
//! decision for `Auth` is made right here, so a denied credential is a
//! terminal state like any other and still runs `Publish`.
//!
//! Every exit path - success or a terminal failure code, Auth denial
//! included - runs `Publish` before returning to the client, per §4.6:
//! a publish failure is logged but never surfaced.

use axum::http::{ HeaderMap, StatusCode };
use axum::response::{ IntoResponse, Json, Response };
use bg_auth::{ ApiKeyAuth, AuthOutcome };
use bg_cost::{ ActualUsage, ChatMessage, EstimateRequest, Prompt, UnitPricing };
use bg_types::{ BgError, Period, ResolvedTag, UsageEvent, UsageStatus };
use chrono::{ Timelike, Utc };
use serde_json::{ json, Value };
use sqlx::Row;

use crate::state::ProxyState;

/// Which of the two client-facing routes this request came in on.
#[derive(Debug, Clone, Copy)]
pub enum Route
{
  ChatCompletions,
  Responses,
}

impl Route
{
  #[must_use]
  pub fn as_str(self) -> &'static str
  {
    match self
    {
      Self::ChatCompletions => "/v1/chat/completions",
      Self::Responses => "/v1/responses",
    }
  }
}

/// Everything accumulated for the eventual `UsageEvent`, built up as the
/// request moves through the pipeline.
struct Accounting
{
  model: String,
  usd: f64,
  prompt_tok: u32,
  comp_tok: u32,
  status: UsageStatus,
  tags: Option<Vec<ResolvedTag>>,
}

impl Accounting
{
  fn new(model: &str) -> Self
  {
    Self { model: model.to_string(), usd: 0.0, prompt_tok: 0, comp_tok: 0, status: UsageStatus::Denied, tags: None }
  }
}

/// Entry point called by the route handlers with the `AuthOutcome`
/// the extractor produced. Always returns a response and always
/// attempts to publish a `UsageEvent`, including when `auth` is
/// `Denied` - Auth is a terminal state like any other in §4.6's state
/// machine and must still be accounted for.
pub async fn admit_and_dispatch(state: &ProxyState, auth: AuthOutcome, route: Route, headers: &HeaderMap, body: Value) -> Response
{
  let auth = match auth
  {
    AuthOutcome::Authenticated(identity) => identity,
    AuthOutcome::Denied =>
    {
      let model_hint = body.get("model").and_then(Value::as_str).unwrap_or("unknown").to_string();
      let accounting = Accounting::new(&model_hint);
      publish(state, "unknown", 0, route, headers, &accounting).await;
      return BgError::Auth.into_response();
    }
  };

  let tenant_name = match tenant_name(state, auth.tenant_id.get()).await
  {
    Ok(name) => name,
    Err(err) => return BgError::Internal(format!("tenant lookup failed: {err}")).into_response(),
  };

  let model_hint = body.get("model").and_then(Value::as_str).unwrap_or("unknown").to_string();
  let mut accounting = Accounting::new(&model_hint);

  let outcome = run(state, &auth, &tenant_name, route, headers, &body, &mut accounting).await;

  publish(state, &tenant_name, auth.tenant_id.get(), route, headers, &accounting).await;

  match outcome
  {
    Ok(data) => (StatusCode::OK, Json(data)).into_response(),
    Err(err) => err.into_response(),
  }
}

#[allow(clippy::too_many_lines)]
async fn run(state: &ProxyState, auth: &ApiKeyAuth, tenant_name: &str, route: Route, headers: &HeaderMap, body: &Value, accounting: &mut Accounting) -> Result<Value, BgError>
{
  // --- Routed ---
  let model = body.get("model").and_then(Value::as_str).ok_or_else(|| BgError::Routing("request body is missing 'model'".to_string()))?;
  accounting.model = model.to_string();

  let pricing = state.catalog.lookup(model).await.map_err(|err| BgError::Internal(format!("catalog lookup failed: {err}")))?.ok_or_else(|| BgError::Routing(format!("unknown model: {model}")))?;

  let provider = pricing.provider.ok_or_else(|| BgError::Routing(format!("model {model} has no routable provider")))?;

  let adapter = state.providers.get(provider).ok_or_else(|| BgError::ProviderUnavailable(format!("no credentials configured for provider {}", provider.as_str())))?;

  // --- Limit ---
  check_rate_limit(state, tenant_name, auth.tenant_id.get()).await?;

  // --- Tags ---
  let tags = resolve_tags(state, headers, auth.tenant_id.get()).await?;
  accounting.tags = if tags.is_empty() { None } else { Some(tags.clone()) };

  // --- Policy (Admitted) ---
  let policy_input = build_policy_input(state, tenant_name, auth.tenant_id.get(), route, &tags).await?;
  let admitted = state.policy.evaluate(&policy_input).await?;
  if !admitted
  {
    return Err(BgError::PolicyDenied);
  }

  // --- Dispatch ---
  let dispatch_result = match route
  {
    Route::ChatCompletions => adapter.chat_completion(body.clone()).await,
    Route::Responses => adapter.responses(body.clone()).await,
  };

  match dispatch_result
  {
    Ok(response) =>
    {
      // --- Accounted ---
      let estimate = estimate_cost(state, model, body, &response.data, &pricing).await;
      accounting.usd = estimate.usd;
      accounting.prompt_tok = estimate.prompt_tokens;
      accounting.comp_tok = estimate.completion_tokens;
      accounting.status = UsageStatus::Success;

      bump_usage_counter(state, tenant_name, estimate.usd).await;

      Ok(response.data)
    }
    Err(BgError::Upstream { status, body: upstream_body }) =>
    {
      // Still account tokens when the failed upstream call reported a
      // usage block (e.g. a content-policy rejection after the model
      // already ran).
      if upstream_body.get("usage").is_some()
      {
        let estimate = estimate_cost(state, model, body, &upstream_body, &pricing).await;
        accounting.usd = estimate.usd;
        accounting.prompt_tok = estimate.prompt_tokens;
        accounting.comp_tok = estimate.completion_tokens;
      }
      accounting.status = UsageStatus::Error;
      Err(BgError::Upstream { status, body: upstream_body })
    }
    Err(other) =>
    {
      accounting.status = UsageStatus::Error;
      Err(other)
    }
  }
}

async fn tenant_name(state: &ProxyState, tenant_id: i64) -> sqlx::Result<String>
{
  let row = sqlx::query("SELECT name FROM tenants WHERE id = ?1").bind(tenant_id).fetch_one(&state.pool).await?;
  Ok(row.get("name"))
}

const DEFAULT_RATE_LIMIT_PER_MIN: u32 = 60;

async fn check_rate_limit(state: &ProxyState, tenant_name: &str, tenant_id: i64) -> Result<(), BgError>
{
  let Some(cache) = &state.cache
  else
  {
    // No cache configured: rate limiting is a cache-backed capability
    // and degrades to "not enforced" rather than a hard failure.
    return Ok(());
  };

  let default_limit = state.config.max_reqs_per_min.unwrap_or(DEFAULT_RATE_LIMIT_PER_MIN);
  let limit = state.budgets.read_rate_limit(tenant_name, tenant_id, default_limit).await.map_err(|err| BgError::Internal(format!("rate limit read failed: {err}")))?;

  let bucket = Utc::now().format("%Y%m%d%H%M").to_string();
  let key = format!("ratelimit:{tenant_name}:{bucket}");

  let Some(count) = cache.incr_by_float(&key, 1.0).await
  else
  {
    return Ok(());
  };

  if (count - 1.0).abs() < f64::EPSILON
  {
    cache.expire(&key, std::time::Duration::from_secs(60)).await;
  }

  if count > f64::from(limit)
  {
    return Err(BgError::RateLimitExceeded);
  }

  Ok(())
}

async fn resolve_tags(state: &ProxyState, headers: &HeaderMap, tenant_id: i64) -> Result<Vec<ResolvedTag>, BgError>
{
  let raw = headers.get("X-Tags").and_then(|value| value.to_str().ok()).unwrap_or("");
  let names: Vec<String> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();

  if names.is_empty()
  {
    return Ok(Vec::new());
  }

  state.budgets.read_tag_set(tenant_id, &names).await
}

fn primary_period(state: &ProxyState) -> Period
{
  state.config.budget_periods.first().and_then(|raw| Period::parse(raw)).unwrap_or(Period::Monthly)
}

/// Current-period USD usage, read from the running-sum key this module
/// maintains at `usage:<tenant>:<period>` (the core's own complement to
/// the tag-scoped `tag_usage_agg:*` key named in the external-interfaces
/// section; no key name is given there for the untagged total).
async fn current_usage(state: &ProxyState, tenant_name: &str, period: Period) -> f64
{
  let Some(cache) = &state.cache
  else
  {
    return 0.0;
  };

  cache.get(&usage_key(tenant_name, period)).await.and_then(|raw| raw.parse::<f64>().ok()).unwrap_or(0.0)
}

async fn bump_usage_counter(state: &ProxyState, tenant_name: &str, usd: f64)
{
  if let Some(cache) = &state.cache
  {
    let period = primary_period(state);
    let key = usage_key(tenant_name, period);
    if let Some(new_total) = cache.incr_by_float(&key, usd).await
    {
      if (new_total - usd).abs() < f64::EPSILON
      {
        cache.expire(&key, std::time::Duration::from_secs(period.cache_ttl_seconds())).await;
      }
    }
  }
}

fn usage_key(tenant_name: &str, period: Period) -> String
{
  format!("usage:{tenant_name}:{}", period.as_str())
}

async fn build_policy_input(state: &ProxyState, tenant_name: &str, tenant_id: i64, route: Route, tags: &[ResolvedTag]) -> Result<Value, BgError>
{
  let period = primary_period(state);
  let default_usd = state.config.global_budget_fallback(period).unwrap_or(0.0);
  let budget = state.budgets.read_budget(tenant_name, tenant_id, period, default_usd).await.map_err(|err| BgError::Internal(format!("budget read failed: {err}")))?;
  let usage = current_usage(state, tenant_name, period).await;

  let configured_periods: Vec<Period> = if state.config.budget_periods.is_empty() { vec![period] } else { state.config.budget_periods.iter().filter_map(|raw| Period::parse(raw)).collect() };

  let mut budgets = Vec::new();
  for configured in configured_periods
  {
    let amount = state.budgets.read_budget(tenant_name, tenant_id, configured, state.config.global_budget_fallback(configured).unwrap_or(0.0)).await.map_err(|err| BgError::Internal(format!("budget read failed: {err}")))?;
    budgets.push(json!({ "period": configured.as_str(), "amount": amount.amount }));
  }

  for tag in tags
  {
    let tag_budgets = state.budgets.read_tag_budgets(tag.id).await.map_err(|err| BgError::Internal(format!("tag budget read failed: {err}")))?;
    for tag_budget in tag_budgets
    {
      budgets.push(json!({ "tag": tag.name, "period": tag_budget.period.as_str(), "amount": tag_budget.amount_usd, "weight": tag_budget.weight }));
    }
  }

  Ok(json!({
    "usage": usage,
    "budget": budget.amount,
    "route": route.as_str(),
    "time": Utc::now().hour(),
    "tenant": tenant_name,
    "budgets": budgets,
    "tags": tags.iter().map(|tag| json!({ "id": tag.id.get(), "name": tag.name, "weight": tag.weight })).collect::<Vec<_>>(),
  }))
}

struct Estimate
{
  usd: f64,
  prompt_tokens: u32,
  completion_tokens: u32,
}

async fn estimate_cost(state: &ProxyState, model: &str, request_body: &Value, response_body: &Value, pricing: &bg_types::ModelPricing) -> Estimate
{
  let prompt = request_body.get("messages").and_then(Value::as_array).map_or(Prompt::Text(String::new()), |messages| {
    Prompt::Messages(
      messages
        .iter()
        .map(|m| ChatMessage {
          role: m.get("role").and_then(Value::as_str).unwrap_or("user").to_string(),
          content: m.get("content").and_then(Value::as_str).unwrap_or_default().to_string(),
          name: m.get("name").and_then(Value::as_str).map(str::to_string),
        })
        .collect(),
    )
  });

  let completion = response_body.get("choices").and_then(Value::as_array).and_then(|choices| choices.first()).and_then(|choice| choice.get("message")).and_then(|message| message.get("content")).and_then(Value::as_str).map(str::to_string);

  let actual_usage = response_body.get("usage").and_then(|usage| {
    let prompt_tokens = usage.get("prompt_tokens").and_then(Value::as_u64)?;
    let total_tokens = usage.get("total_tokens").and_then(Value::as_u64)?;
    Some(ActualUsage { prompt_tokens: prompt_tokens as u32, total_tokens: total_tokens as u32 })
  });

  let request = EstimateRequest { model: model.to_string(), prompt, completion, actual_usage };
  let mut unit_pricing = UnitPricing::from(pricing);
  let mut estimate = state.cost.estimate(&request, unit_pricing);

  if let Some(effective_model) = bg_cost::effective_gemini_model(model, estimate.prompt_tokens + estimate.completion_tokens)
  {
    if let Ok(Some(effective_pricing)) = state.catalog.lookup(&effective_model).await
    {
      unit_pricing = UnitPricing::from(&effective_pricing);
      estimate = state.cost.estimate(&request, unit_pricing);
    }
  }

  Estimate { usd: estimate.usd, prompt_tokens: estimate.prompt_tokens, completion_tokens: estimate.completion_tokens }
}

async fn publish(state: &ProxyState, tenant_name: &str, tenant_id: i64, route: Route, headers: &HeaderMap, accounting: &Accounting)
{
  let Some(mut conn) = state.events.clone()
  else
  {
    return;
  };

  let event = UsageEvent {
    id: uuid::Uuid::new_v4().to_string(),
    ts: Utc::now().timestamp_millis(),
    tenant: tenant_name.to_string(),
    tenant_id: bg_types::TenantId::from(tenant_id),
    route: route.as_str().to_string(),
    model: accounting.model.clone(),
    usd: accounting.usd,
    prompt_tok: accounting.prompt_tok,
    comp_tok: accounting.comp_tok,
    status: accounting.status,
    session_id: headers.get("X-Session-Id").and_then(|value| value.to_str().ok()).map(str::to_string),
    tags: accounting.tags.clone(),
  };

  let fields: Vec<(&str, String)> = vec![
    ("ts", event.ts.to_string()),
    ("tenant", event.tenant.clone()),
    ("route", event.route.clone()),
    ("model", event.model.clone()),
    ("usd", event.usd.to_string()),
    ("promptTok", event.prompt_tok.to_string()),
    ("compTok", event.comp_tok.to_string()),
    ("status", event.status.as_str().to_string()),
    ("sessionId", event.session_id.clone().unwrap_or_default()),
    ("tags", event.tags.as_ref().map_or_else(|| "[]".to_string(), |tags| serde_json::to_string(tags).unwrap_or_default())),
  ];

  if let Err(err) = redis::cmd("XADD").arg("bg_events").arg("*").arg(&fields).query_async::<String>(&mut conn).await
  {
    tracing::warn!(%err, tenant = %tenant_name, "failed to publish usage event");
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn route_as_str_matches_external_surface()
  {
    assert_eq!(Route::ChatCompletions.as_str(), "/v1/chat/completions");
    assert_eq!(Route::Responses.as_str(), "/v1/responses");
  }

  #[test]
  fn usage_key_is_scoped_per_tenant_and_period()
  {
    assert_eq!(usage_key("acme", Period::Daily), "usage:acme:daily");
    assert_eq!(usage_key("acme", Period::Monthly), "usage:acme:monthly");
  }
}
