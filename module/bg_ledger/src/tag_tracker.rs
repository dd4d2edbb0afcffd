//! Tag-usage tracker: maintains a running USD sum per tenant x tag x
//! period in Redis, idempotent per event so a stream replay never
//! double-counts.

use bg_store::Cache;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Covers both tracked periods; the monthly window is the longer of
/// the two, so the idempotency marker's TTL is sized to it rather than
/// tracked per period.
const IDEMPOTENCY_TTL_SECS: u64 = 31 * 24 * 60 * 60;
const DAILY_TTL_SECS: u64 = 24 * 60 * 60;
const MONTHLY_TTL_SECS: u64 = 31 * 24 * 60 * 60;

pub struct TagUsageTracker
{
  cache: Arc<dyn Cache>,
}

impl TagUsageTracker
{
  #[must_use]
  pub fn new(cache: Arc<dyn Cache>) -> Self
  {
    Self { cache }
  }

  /// Record `usd * weight` against `tenant`/`tag_id` for both the daily
  /// and monthly windows, unless `ledger_id`/`tag_id` has already been
  /// applied.
  pub async fn record(&self, tenant: &str, tag_id: i64, ledger_id: i64, usd: f64, weight: f64)
  {
    let fingerprint = format!("tag_usage_event:{ledger_id}:{tag_id}");
    if !self.cache.set_if_absent(&fingerprint, Duration::from_secs(IDEMPOTENCY_TTL_SECS)).await
    {
      tracing::debug!(ledger_id, tag_id, "duplicate usage event, skipping tag aggregate update");
      return;
    }

    let weighted = usd * weight;
    let now = Utc::now();

    self.bump(tenant, tag_id, "daily", &now.format("%Y-%m-%d").to_string(), weighted, DAILY_TTL_SECS).await;
    self.bump(tenant, tag_id, "monthly", &now.format("%Y-%m").to_string(), weighted, MONTHLY_TTL_SECS).await;
  }

  async fn bump(&self, tenant: &str, tag_id: i64, period: &str, date: &str, weighted_usd: f64, ttl_secs: u64)
  {
    let key = format!("tag_usage_agg:{tenant}:{tag_id}:{period}:{date}");
    let Some(new_total) = self.cache.incr_by_float(&key, weighted_usd).await
    else
    {
      return;
    };

    let has_ttl = self.cache.ttl(&key).await.map_or(false, |ttl| ttl >= 0);
    if !has_ttl
    {
      self.cache.expire(&key, Duration::from_secs(ttl_secs)).await;
    }

    tracing::trace!(%key, new_total, "tag usage aggregate updated");
  }
}
