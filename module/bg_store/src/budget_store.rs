//! Budget & Limit Store (C3) read API.
//!
//! Every read tries the cache first, falls through to SQLite on a miss,
//! and repopulates the cache with the period-appropriate TTL from
//! [`Period::cache_ttl_seconds`]. Write paths (`invalidate_*`) explicitly
//! drop the affected keys rather than waiting out the TTL.

use crate::cache::Cache;
use bg_types::{ BgError, InheritanceMode, Period, ResolvedTag, TagBudget, TagId };
use sqlx::{ Row, SqlitePool };
use std::sync::Arc;
use std::time::Duration;

/// Resolved `{amount, startDate, endDate}` for a tenant+period pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BudgetAmount
{
  pub amount: f64,
  pub start_date: Option<i64>,
  pub end_date: Option<i64>,
}

const TAGS_TTL_SECS: u64 = 300;
const OTHER_READS_TTL_SECS: u64 = 3600;

pub struct BudgetStore
{
  pool: SqlitePool,
  cache: Option<Arc<dyn Cache>>,
}

impl BudgetStore
{
  #[must_use]
  pub fn new(pool: SqlitePool, cache: Option<Arc<dyn Cache>>) -> Self
  {
    Self { pool, cache }
  }

  /// `readBudget(tenant, period) -> {amount, startDate, endDate}`.
  ///
  /// Resolution order: cached/stored row, then `BUDGET_<PERIOD>_<TENANT>`,
  /// then `BUDGET_<PERIOD>_USD`, then `default_usd`. The environment
  /// fallback applies only when no row exists for the pair; it is never
  /// consulted merely because a row's amount happens to be zero.
  ///
  /// # Errors
  ///
  /// Returns an error if the relational read fails (cache misses degrade
  /// silently, storage failures do not).
  pub async fn read_budget(&self, tenant: &str, tenant_id: i64, period: Period, default_usd: f64) -> sqlx::Result<BudgetAmount>
  {
    let cache_key = format!("budget:{tenant}:{}", period.as_str());

    if let Some(cache) = &self.cache
    {
      if let Some(raw) = cache.get(&cache_key).await
      {
        if let Ok(amount) = serde_json::from_str::<BudgetAmount>(&raw)
        {
          return Ok(amount);
        }
      }
    }

    let row = sqlx::query("SELECT amount_usd, start_date, end_date FROM budgets WHERE tenant_id = ?1 AND period = ?2")
      .bind(tenant_id)
      .bind(period.as_str())
      .fetch_optional(&self.pool)
      .await?;

    let amount = match row
    {
      Some(row) => BudgetAmount { amount: row.get("amount_usd"), start_date: row.get("start_date"), end_date: row.get("end_date") },
      None => BudgetAmount { amount: env_budget_fallback(tenant, period, default_usd), start_date: None, end_date: None },
    };

    if let Some(cache) = &self.cache
    {
      if let Ok(json) = serde_json::to_string(&amount)
      {
        cache.set(&cache_key, &json, Duration::from_secs(period.cache_ttl_seconds())).await;
      }
    }

    Ok(amount)
  }

  /// `readRateLimit(tenant) -> requestsPerMinute`.
  pub async fn read_rate_limit(&self, tenant: &str, tenant_id: i64, default_limit: u32) -> sqlx::Result<u32>
  {
    let cache_key = format!("ratelimit:{tenant}");

    if let Some(cache) = &self.cache
    {
      if let Some(raw) = cache.get(&cache_key).await
      {
        if let Ok(limit) = raw.parse::<u32>()
        {
          return Ok(limit);
        }
      }
    }

    let limit: Option<i64> = sqlx::query_scalar("SELECT rate_limit_per_min FROM tenants WHERE id = ?1")
      .bind(tenant_id)
      .fetch_optional(&self.pool)
      .await?
      .flatten();

    let limit = limit.map_or(default_limit, |limit| limit as u32);

    if let Some(cache) = &self.cache
    {
      cache.set(&cache_key, &limit.to_string(), Duration::from_secs(OTHER_READS_TTL_SECS)).await;
    }

    Ok(limit)
  }

  /// `readTagBudgets(tagId) -> [{period, amountUsd, weight, inheritanceMode}]`.
  pub async fn read_tag_budgets(&self, tag_id: TagId) -> sqlx::Result<Vec<TagBudget>>
  {
    let cache_key = format!("tag_session_budget:{}", tag_id.get());

    if let Some(cache) = &self.cache
    {
      if let Some(raw) = cache.get(&cache_key).await
      {
        if let Ok(budgets) = serde_json::from_str::<Vec<TagBudget>>(&raw)
        {
          return Ok(budgets);
        }
      }
    }

    let rows = sqlx::query("SELECT id, period, amount_usd, weight, inheritance_mode, is_active FROM tag_budgets WHERE tag_id = ?1 AND is_active = 1")
      .bind(tag_id.get())
      .fetch_all(&self.pool)
      .await?;

    let budgets: Vec<TagBudget> = rows
      .into_iter()
      .filter_map(|row| {
        let period = Period::parse(row.get::<String, _>("period").as_str())?;
        Some(TagBudget {
          id: row.get::<i64, _>("id").into(),
          tag_id,
          period,
          amount_usd: row.get("amount_usd"),
          weight: row.get("weight"),
          inheritance_mode: InheritanceMode::Strict,
          is_active: row.get::<i64, _>("is_active") != 0,
        })
      })
      .collect();

    if let Some(cache) = &self.cache
    {
      if let Ok(json) = serde_json::to_string(&budgets)
      {
        cache.set(&cache_key, &json, Duration::from_secs(OTHER_READS_TTL_SECS)).await;
      }
    }

    Ok(budgets)
  }

  /// `readTagSet(tenant, [tagNames]) -> [{id, name, weight}]`, erroring if
  /// any supplied name fails to resolve against the tenant's active
  /// roster.
  ///
  /// # Errors
  ///
  /// Returns `BgError::Validation` naming every unresolved tag at once
  /// if one or more names fail to resolve, or wraps a storage failure
  /// in `BgError::Internal`.
  pub async fn read_tag_set(&self, tenant_id: i64, tag_names: &[String]) -> Result<Vec<ResolvedTag>, BgError>
  {
    if tag_names.is_empty()
    {
      return Ok(Vec::new());
    }

    let mut sorted: Vec<&str> = tag_names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let tagset_key = format!("tagset:{tenant_id}:{}", sorted.join(","));

    if let Some(cache) = &self.cache
    {
      if let Some(raw) = cache.get(&tagset_key).await
      {
        if let Ok(resolved) = serde_json::from_str::<Vec<ResolvedTag>>(&raw)
        {
          return Ok(resolved);
        }
      }
    }

    let roster = self.tenant_tag_roster(tenant_id).await.map_err(|err| BgError::Internal(err.to_string()))?;

    let mut resolved = Vec::with_capacity(sorted.len());
    let mut missing = Vec::new();
    for name in &sorted
    {
      match roster.iter().find(|tag| tag.name == *name)
      {
        Some(tag) => resolved.push(tag.clone()),
        None => missing.push((*name).to_string()),
      }
    }

    if !missing.is_empty()
    {
      return Err(BgError::Validation(format!("Tags not found for this tenant: {}", missing.join(", "))));
    }

    if let Some(cache) = &self.cache
    {
      if let Ok(json) = serde_json::to_string(&resolved)
      {
        cache.set(&tagset_key, &json, Duration::from_secs(OTHER_READS_TTL_SECS)).await;
      }
    }

    Ok(resolved)
  }

  async fn tenant_tag_roster(&self, tenant_id: i64) -> sqlx::Result<Vec<ResolvedTag>>
  {
    let roster_key = format!("tags:tenant:{tenant_id}");

    if let Some(cache) = &self.cache
    {
      if let Some(raw) = cache.get(&roster_key).await
      {
        if let Ok(roster) = serde_json::from_str::<Vec<ResolvedTag>>(&raw)
        {
          return Ok(roster);
        }
      }
    }

    // `weight` is tag-level (§4.3), but a tag can own more than one
    // `tag_budgets` row (one per period). Group by tag so the roster
    // has exactly one row per tag rather than fanning out across the
    // join, which would corrupt both the cached roster and every
    // unique-name lookup `read_tag_set` does against it.
    let rows = sqlx::query(
      "SELECT tags.id AS id, tags.name AS name, COALESCE(MAX(tag_budgets.weight), 1.0) AS weight
       FROM tags
       LEFT JOIN tag_budgets ON tag_budgets.tag_id = tags.id AND tag_budgets.is_active = 1
       WHERE tags.tenant_id = ?1 AND tags.is_active = 1
       GROUP BY tags.id, tags.name",
    )
    .bind(tenant_id)
    .fetch_all(&self.pool)
    .await?;

    let roster: Vec<ResolvedTag> = rows
      .into_iter()
      .map(|row| ResolvedTag {
        id: row.get::<i64, _>("id").into(),
        name: row.get("name"),
        weight: row.try_get::<f64, _>("weight").unwrap_or(1.0),
      })
      .collect();

    if let Some(cache) = &self.cache
    {
      if let Ok(json) = serde_json::to_string(&roster)
      {
        cache.set(&roster_key, &json, Duration::from_secs(TAGS_TTL_SECS)).await;
      }
    }

    Ok(roster)
  }

  /// Invalidate the cached budget row for a tenant+period, called after
  /// an admin write.
  pub async fn invalidate_budget(&self, tenant: &str, period: Period)
  {
    if let Some(cache) = &self.cache
    {
      cache.del(&format!("budget:{tenant}:{}", period.as_str())).await;
    }
  }
}

/// `BUDGET_<PERIOD>_<TENANT>` then `BUDGET_<PERIOD>_USD` then the
/// caller-supplied default.
fn env_budget_fallback(tenant: &str, period: Period, default_usd: f64) -> f64
{
  let period_upper = period.as_str().to_uppercase();
  let tenant_upper = tenant.to_uppercase();

  std::env::var(format!("BUDGET_{period_upper}_{tenant_upper}"))
    .ok()
    .and_then(|value| value.parse().ok())
    .or_else(|| std::env::var(format!("BUDGET_{period_upper}_USD")).ok().and_then(|value| value.parse().ok()))
    .unwrap_or(default_usd)
}

#[cfg(test)]
mod tests
{
  use super::*;
  use crate::schema;
  use sqlx::sqlite::SqlitePoolOptions;
  use std::sync::Mutex;

  static ENV_LOCK: Mutex<()> = Mutex::new(());

  async fn migrated_pool() -> SqlitePool
  {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    schema::apply(&pool).await.unwrap();
    pool
  }

  #[tokio::test]
  async fn read_budget_falls_back_to_default_when_no_row_and_no_env()
  {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var("BUDGET_DAILY_ACME");
    std::env::remove_var("BUDGET_DAILY_USD");

    let store = BudgetStore::new(migrated_pool().await, None);
    let amount = store.read_budget("acme", 1, Period::Daily, 42.0).await.unwrap();
    assert_eq!(amount.amount, 42.0);
  }

  #[tokio::test]
  async fn read_budget_prefers_stored_row_over_env()
  {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("BUDGET_DAILY_USD", "999.0");

    let pool = migrated_pool().await;
    sqlx::query("INSERT INTO tenants (id, name) VALUES (1, 'acme')").execute(&pool).await.unwrap();
    sqlx::query("INSERT INTO budgets (tenant_id, period, amount_usd) VALUES (1, 'daily', 10.0)").execute(&pool).await.unwrap();

    let store = BudgetStore::new(pool, None);
    let amount = store.read_budget("acme", 1, Period::Daily, 1.0).await.unwrap();
    assert_eq!(amount.amount, 10.0);

    std::env::remove_var("BUDGET_DAILY_USD");
  }

  #[tokio::test]
  async fn read_budget_uses_tenant_specific_env_over_global()
  {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("BUDGET_DAILY_ACME", "5.0");
    std::env::set_var("BUDGET_DAILY_USD", "999.0");

    let store = BudgetStore::new(migrated_pool().await, None);
    let amount = store.read_budget("acme", 1, Period::Daily, 1.0).await.unwrap();
    assert_eq!(amount.amount, 5.0);

    std::env::remove_var("BUDGET_DAILY_ACME");
    std::env::remove_var("BUDGET_DAILY_USD");
  }

  #[tokio::test]
  async fn read_tag_set_errors_on_unknown_name()
  {
    let pool = migrated_pool().await;
    sqlx::query("INSERT INTO tenants (id, name) VALUES (1, 'acme')").execute(&pool).await.unwrap();
    sqlx::query("INSERT INTO tags (id, tenant_id, name, path) VALUES (1, 1, 'billing', 'billing')").execute(&pool).await.unwrap();

    let store = BudgetStore::new(pool, None);
    let err = store.read_tag_set(1, &["billing".to_string(), "nope".to_string()]).await.unwrap_err();
    assert!(matches!(err, BgError::Validation(_)));
  }

  #[tokio::test]
  async fn read_tag_set_resolves_known_names_with_default_weight()
  {
    let pool = migrated_pool().await;
    sqlx::query("INSERT INTO tenants (id, name) VALUES (1, 'acme')").execute(&pool).await.unwrap();
    sqlx::query("INSERT INTO tags (id, tenant_id, name, path) VALUES (1, 1, 'billing', 'billing')").execute(&pool).await.unwrap();

    let store = BudgetStore::new(pool, None);
    let resolved = store.read_tag_set(1, &["billing".to_string()]).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].weight, 1.0);
  }

  #[tokio::test]
  async fn empty_tag_name_list_resolves_to_empty_without_querying()
  {
    let store = BudgetStore::new(migrated_pool().await, None);
    assert!(store.read_tag_set(1, &[]).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn read_rate_limit_falls_back_to_default_when_tenant_has_no_override()
  {
    let pool = migrated_pool().await;
    sqlx::query("INSERT INTO tenants (id, name) VALUES (1, 'acme')").execute(&pool).await.unwrap();

    let store = BudgetStore::new(pool, None);
    assert_eq!(store.read_rate_limit("acme", 1, 60).await.unwrap(), 60);
  }
}
