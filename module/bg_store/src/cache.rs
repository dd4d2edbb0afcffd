//! Two-tier cache abstraction.
//!
//! `readBudget`/`readRateLimit`/`readTagBudgets`/`readTagSet` all try
//! this trait before the relational store. A `None` cache (Redis
//! unreachable at startup, or deliberately disabled) degrades every
//! call to a direct-store read per the "caches as optional
//! capabilities" allowance - never a hard failure.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

#[async_trait]
pub trait Cache: Send + Sync
{
  async fn get(&self, key: &str) -> Option<String>;
  async fn set(&self, key: &str, value: &str, ttl: Duration);
  async fn del(&self, key: &str);
  /// Atomically increment a decimal counter, returning the post-increment
  /// value, and report whether this call established the key's TTL (the
  /// caller sets the TTL only the first time).
  async fn incr_by_float(&self, key: &str, amount: f64) -> Option<f64>;
  /// Set `key` to `1` only if absent, returning `true` if this call won
  /// the race (the idempotency marker was not already set).
  async fn set_if_absent(&self, key: &str, ttl: Duration) -> bool;
  async fn expire(&self, key: &str, ttl: Duration);
  async fn ttl(&self, key: &str) -> Option<i64>;
}

/// Redis-backed implementation. Every method logs and swallows
/// connection errors rather than propagating them - a degraded cache is
/// never a reason to fail a request.
pub struct RedisCache
{
  manager: redis::aio::ConnectionManager,
}

impl RedisCache
{
  /// # Errors
  ///
  /// Returns an error only if the initial connection attempt fails;
  /// subsequent transient failures are handled per-call.
  pub async fn connect(redis_url: &str) -> redis::RedisResult<Self>
  {
    let client = redis::Client::open(redis_url)?;
    let manager = client.get_connection_manager().await?;
    Ok(Self { manager })
  }
}

#[async_trait]
impl Cache for RedisCache
{
  async fn get(&self, key: &str) -> Option<String>
  {
    let mut conn = self.manager.clone();
    match conn.get::<_, Option<String>>(key).await
    {
      Ok(value) => value,
      Err(err) =>
      {
        tracing::warn!(%err, %key, "redis get failed, degrading to store read");
        None
      }
    }
  }

  async fn set(&self, key: &str, value: &str, ttl: Duration)
  {
    let mut conn = self.manager.clone();
    if let Err(err) = conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await
    {
      tracing::warn!(%err, %key, "redis set failed");
    }
  }

  async fn del(&self, key: &str)
  {
    let mut conn = self.manager.clone();
    if let Err(err) = conn.del::<_, ()>(key).await
    {
      tracing::warn!(%err, %key, "redis del failed");
    }
  }

  async fn incr_by_float(&self, key: &str, amount: f64) -> Option<f64>
  {
    let mut conn = self.manager.clone();
    match conn.incr::<_, _, f64>(key, amount).await
    {
      Ok(value) => Some(value),
      Err(err) =>
      {
        tracing::warn!(%err, %key, "redis incrbyfloat failed");
        None
      }
    }
  }

  async fn set_if_absent(&self, key: &str, ttl: Duration) -> bool
  {
    let mut conn = self.manager.clone();
    match conn.set_options::<_, _, bool>(
      key,
      1,
      redis::SetOptions::default().conditional_set(redis::ExistenceCheck::NX).with_expiration(redis::SetExpiry::EX(ttl.as_secs().max(1))),
    )
    .await
    {
      Ok(won) => won,
      Err(err) =>
      {
        tracing::warn!(%err, %key, "redis set-if-absent failed");
        false
      }
    }
  }

  async fn expire(&self, key: &str, ttl: Duration)
  {
    let mut conn = self.manager.clone();
    if let Err(err) = conn.expire::<_, ()>(key, ttl.as_secs() as i64).await
    {
      tracing::warn!(%err, %key, "redis expire failed");
    }
  }

  async fn ttl(&self, key: &str) -> Option<i64>
  {
    let mut conn = self.manager.clone();
    conn.ttl(key).await.ok()
  }
}

// In-memory `Cache` used by tests and as a fallback is intentionally
// not provided - per §9, a cache outage degrades to direct-store
// reads, it does not get a fake substitute cache.
