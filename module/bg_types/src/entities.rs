//! Core data-model entities shared across every component crate.
//!
//! Field names and invariants mirror the data model section verbatim;
//! this module is the single place they are defined so C1-C8 never
//! duplicate a struct shape.

use crate::ids::{ ApiKeyId, BudgetId, ModelPricingId, TagBudgetId, TagId, TenantId, UsageLedgerId };
use serde::{ Deserialize, Serialize };

/// A billing/authorization principal. Exactly one row per distinct `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant
{
  pub id: TenantId,
  pub name: String,
  pub rate_limit_per_min: Option<u32>,
  pub is_active: bool,
}

/// A secret granting access as a tenant. The plaintext secret is never
/// stored; only `key_prefix` (first 8 chars of the secret) and a salted
/// hash of the full secret survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey
{
  pub id: ApiKeyId,
  pub tenant_id: TenantId,
  pub key_prefix: String,
  pub key_hash: String,
  pub is_active: bool,
  pub last_used_at: Option<i64>,
}

/// Catalog entry mapping a model name to a provider and unit prices.
/// `provider = None` means the model is known but unroutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing
{
  pub id: ModelPricingId,
  pub model: String,
  pub version: String,
  pub provider: Option<Provider>,
  /// USD per 1M input tokens.
  pub input_price: f64,
  /// USD per 1M cached input tokens.
  pub cached_input_price: f64,
  /// USD per 1M output tokens.
  pub output_price: f64,
}

/// Upstream LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider
{
  Openai,
  Anthropic,
  Google,
}

impl Provider
{
  /// Parse a provider identifier stored as free text in the catalog table.
  #[must_use]
  pub fn parse(s: &str) -> Option<Self>
  {
    match s
    {
      "openai" => Some(Self::Openai),
      "anthropic" => Some(Self::Anthropic),
      "google" => Some(Self::Google),
      _ => None,
    }
  }

  /// Canonical lowercase string form, as stored in the catalog table.
  #[must_use]
  pub fn as_str(self) -> &'static str
  {
    match self
    {
      Self::Openai => "openai",
      Self::Anthropic => "anthropic",
      Self::Google => "google",
    }
  }
}

/// The window over which a `Budget` or `TagBudget` accumulates spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period
{
  Daily,
  Monthly,
  Custom,
}

impl Period
{
  #[must_use]
  pub fn as_str(self) -> &'static str
  {
    match self
    {
      Self::Daily => "daily",
      Self::Monthly => "monthly",
      Self::Custom => "custom",
    }
  }

  #[must_use]
  pub fn parse(s: &str) -> Option<Self>
  {
    match s
    {
      "daily" => Some(Self::Daily),
      "monthly" => Some(Self::Monthly),
      "custom" => Some(Self::Custom),
      _ => None,
    }
  }

  /// Cache TTL for this period's budget/rate-limit reads, per the
  /// two-tier caching rules (daily=300s, monthly=1800s, everything else
  /// including custom=3600s).
  #[must_use]
  pub fn cache_ttl_seconds(self) -> u64
  {
    match self
    {
      Self::Daily => 300,
      Self::Monthly => 1800,
      Self::Custom => 3600,
    }
  }
}

/// A spend cap for a tenant over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget
{
  pub id: BudgetId,
  pub tenant_id: TenantId,
  pub period: Period,
  pub amount_usd: f64,
  /// Required when `period == Custom`, inclusive window bounds (ms epoch).
  pub start_date: Option<i64>,
  pub end_date: Option<i64>,
}

/// Inheritance semantics for a `TagBudget` relative to its ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InheritanceMode
{
  Strict,
}

/// A spend cap scoped to a request tag rather than a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagBudget
{
  pub id: TagBudgetId,
  pub tag_id: TagId,
  pub period: Period,
  pub amount_usd: f64,
  pub weight: f64,
  pub inheritance_mode: InheritanceMode,
  pub is_active: bool,
}

/// A hierarchical request-attributable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag
{
  pub id: TagId,
  pub tenant_id: TenantId,
  pub name: String,
  pub path: String,
  pub parent_id: Option<TagId>,
  pub level: u32,
  pub is_active: bool,
}

/// A resolved `{id, name, weight}` triple, as returned by `readTagSet` and
/// carried through the admission pipeline and the published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTag
{
  pub id: TagId,
  pub name: String,
  pub weight: f64,
}

/// Outcome classification carried on a `UsageEvent`/`UsageLedger` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus
{
  Success,
  Error,
  Denied,
}

impl UsageStatus
{
  #[must_use]
  pub fn as_str(self) -> &'static str
  {
    match self
    {
      Self::Success => "success",
      Self::Error => "error",
      Self::Denied => "denied",
    }
  }
}

/// A transient record of one completed (or failed/denied) upstream call,
/// produced at response-finalize time and written to the durable event
/// stream. Consumed exactly once by the ledger consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent
{
  pub id: String,
  pub ts: i64,
  pub tenant: String,
  pub tenant_id: TenantId,
  pub route: String,
  pub model: String,
  pub usd: f64,
  pub prompt_tok: u32,
  pub comp_tok: u32,
  pub status: UsageStatus,
  pub session_id: Option<String>,
  pub tags: Option<Vec<ResolvedTag>>,
}

/// A durable, append-only row mirroring a `UsageEvent`. Never mutated
/// after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLedger
{
  pub id: UsageLedgerId,
  pub ts: i64,
  pub tenant: String,
  pub tenant_id: TenantId,
  pub route: String,
  pub model: String,
  pub usd: f64,
  pub prompt_tok: u32,
  pub comp_tok: u32,
  pub status: UsageStatus,
  pub session_id: Option<String>,
}

/// Join row attaching a resolved tag to a `UsageLedger` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTag
{
  pub usage_ledger_id: UsageLedgerId,
  pub tag_id: TagId,
  pub weight: f64,
  pub assigned_by: String,
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn provider_round_trips_through_str()
  {
    for p in [Provider::Openai, Provider::Anthropic, Provider::Google]
    {
      assert_eq!(Provider::parse(p.as_str()), Some(p));
    }
  }

  #[test]
  fn provider_parse_rejects_unknown()
  {
    assert_eq!(Provider::parse("cohere"), None);
  }

  #[test]
  fn period_cache_ttls_match_spec()
  {
    assert_eq!(Period::Daily.cache_ttl_seconds(), 300);
    assert_eq!(Period::Monthly.cache_ttl_seconds(), 1800);
    assert_eq!(Period::Custom.cache_ttl_seconds(), 3600);
  }

  #[test]
  fn usage_status_serializes_lowercase()
  {
    assert_eq!(serde_json::to_string(&UsageStatus::Denied).unwrap(), "\"denied\"");
  }
}
