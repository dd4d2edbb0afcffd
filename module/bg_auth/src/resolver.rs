//! Credential Resolver (C1).
//!
//! Turns a plaintext API key secret into `{api_key_id, tenant_id}`.
//! Secrets are operator-issued (pasted into a dashboard, stored in a
//! customer's own secrets manager) rather than generated by this
//! service, so verification uses bcrypt rather than a constant-time hash
//! comparison against a precomputed digest.

use crate::cache::CredentialCache;
use bg_types::{ ApiKey, ApiKeyId, TenantId };
use sqlx::{ Row, SqlitePool };

/// Secrets shorter than this can never match a real key (key generation
/// always produces longer secrets) - reject before touching storage.
const MIN_SECRET_LEN: usize = 8;

/// Length of the stored, unhashed prefix used to narrow the storage scan
/// to candidates that could plausibly match.
const PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedKey
{
  pub api_key_id: ApiKeyId,
  pub tenant_id: TenantId,
}

/// Resolves plaintext secrets against the `api_keys` table, owned and
/// migrated by `bg_store`; this crate only reads from an
/// already-migrated pool.
pub struct CredentialResolver
{
  pool: SqlitePool,
  cache: CredentialCache,
}

impl CredentialResolver
{
  #[must_use]
  pub fn new(pool: SqlitePool) -> Self
  {
    Self { pool, cache: CredentialCache::new() }
  }

  #[must_use]
  pub fn with_cache(pool: SqlitePool, cache: CredentialCache) -> Self
  {
    Self { pool, cache }
  }

  /// Authenticate `secret`.
  ///
  /// On database unavailability this fails closed to a null credential
  /// (`Ok(None)`) rather than surfacing the outage to the caller: an
  /// unreachable credential store must read the same as "no such key",
  /// not as a 500. The failure is logged so the outage is still visible
  /// in the operator's telemetry. A hash comparison error for an
  /// individual candidate row is treated as "no match" for that row,
  /// not as a fatal error for the whole call.
  ///
  /// Negative results are never cached: a newly-issued key must work on
  /// the very next request after creation.
  pub async fn authenticate(&self, secret: &str) -> Option<AuthenticatedKey>
  {
    if secret.len() < MIN_SECRET_LEN
    {
      return None;
    }

    if let Some(cached) = self.cache.get(secret)
    {
      self.maybe_touch_last_used(secret, cached.api_key_id);
      return Some(AuthenticatedKey { api_key_id: cached.api_key_id, tenant_id: cached.tenant_id });
    }

    let prefix = &secret[..PREFIX_LEN];
    let candidates = match self.fetch_active_candidates(prefix).await
    {
      Ok(candidates) => candidates,
      Err(err) =>
      {
        tracing::warn!(%err, "credential store unavailable, failing closed to no match");
        return None;
      }
    };

    for candidate in candidates
    {
      if bcrypt::verify(secret, &candidate.key_hash).unwrap_or(false)
      {
        self.cache.put(secret, candidate.id, candidate.tenant_id);
        self.maybe_touch_last_used(secret, candidate.id);
        return Some(AuthenticatedKey { api_key_id: candidate.id, tenant_id: candidate.tenant_id });
      }
    }

    None
  }

  /// Invalidate every cached positive result for `key_id`. Called after
  /// an operator deactivates a key so the change takes effect without
  /// waiting out the cache TTL.
  pub fn deactivate_cached(&self, key_id: ApiKeyId)
  {
    self.cache.deactivate(key_id);
  }

  async fn fetch_active_candidates(&self, prefix: &str) -> sqlx::Result<Vec<ApiKey>>
  {
    let rows = sqlx::query(
      "SELECT id, tenant_id, key_hash, key_prefix, is_active, last_used_at
       FROM api_keys
       WHERE key_prefix = ?1 AND is_active = 1",
    )
    .bind(prefix)
    .fetch_all(&self.pool)
    .await?;

    Ok(
      rows
        .into_iter()
        .map(|row| ApiKey {
          id: ApiKeyId::from(row.get::<i64, _>("id")),
          tenant_id: TenantId::from(row.get::<i64, _>("tenant_id")),
          key_hash: row.get("key_hash"),
          key_prefix: row.get("key_prefix"),
          is_active: row.get::<i64, _>("is_active") != 0,
          last_used_at: row.get("last_used_at"),
        })
        .collect(),
    )
  }

  /// Fire-and-forget `last_used_at` update, throttled to at most once
  /// per minute per key so every proxied request doesn't become a write.
  fn maybe_touch_last_used(&self, secret: &str, key_id: ApiKeyId)
  {
    if !self.cache.should_update_last_used(secret)
    {
      return;
    }

    let pool = self.pool.clone();
    tokio::spawn(async move {
      let _ = sqlx::query("UPDATE api_keys SET last_used_at = strftime('%s','now') WHERE id = ?1")
        .bind(key_id.get())
        .execute(&pool)
        .await;
    });
  }
}

/// Hash a plaintext secret for storage, used by key-issuance tooling
/// rather than by the request path.
pub fn hash_secret(secret: &str) -> Result<String, bcrypt::BcryptError>
{
  bcrypt::hash(secret, bcrypt::DEFAULT_COST)
}

#[cfg(test)]
mod tests
{
  use super::*;
  use sqlx::sqlite::SqlitePoolOptions;

  async fn seeded_pool(secrets: &[(&str, i64, bool)]) -> SqlitePool
  {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();

    sqlx::raw_sql(
      "CREATE TABLE api_keys (
        id INTEGER PRIMARY KEY,
        tenant_id INTEGER NOT NULL,
        key_hash TEXT NOT NULL,
        key_prefix TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        last_used_at INTEGER
      )",
    )
    .execute(&pool)
    .await
    .unwrap();

    for (id, (secret, tenant_id, is_active)) in secrets.iter().enumerate()
    {
      let hash = hash_secret(secret).unwrap();
      let prefix = &secret[..PREFIX_LEN];
      sqlx::query(
        "INSERT INTO api_keys (id, tenant_id, key_hash, key_prefix, is_active, last_used_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
      )
      .bind(id as i64 + 1)
      .bind(tenant_id)
      .bind(hash)
      .bind(prefix)
      .bind(if *is_active { 1 } else { 0 })
      .execute(&pool)
      .await
      .unwrap();
    }

    pool
  }

  #[tokio::test]
  async fn matches_correct_secret()
  {
    let pool = seeded_pool(&[("bg_live_abcdef1234", 7, true)]).await;
    let resolver = CredentialResolver::new(pool);

    let result = resolver.authenticate("bg_live_abcdef1234").await.unwrap();
    assert_eq!(result.tenant_id, TenantId::from(7));
    assert_eq!(result.api_key_id, ApiKeyId::from(1));
  }

  #[tokio::test]
  async fn rejects_wrong_secret_with_matching_prefix()
  {
    let pool = seeded_pool(&[("bg_live_abcdef1234", 7, true)]).await;
    let resolver = CredentialResolver::new(pool);

    assert!(resolver.authenticate("bg_live_abcdefWRONG").await.is_none());
  }

  #[tokio::test]
  async fn rejects_secret_below_minimum_length_without_querying()
  {
    let pool = seeded_pool(&[]).await;
    let resolver = CredentialResolver::new(pool);

    assert!(resolver.authenticate("short").await.is_none());
  }

  #[tokio::test]
  async fn inactive_key_never_matches()
  {
    let pool = seeded_pool(&[("bg_live_abcdef1234", 7, false)]).await;
    let resolver = CredentialResolver::new(pool);

    assert!(resolver.authenticate("bg_live_abcdef1234").await.is_none());
  }

  #[tokio::test]
  async fn second_call_is_served_from_cache()
  {
    let pool = seeded_pool(&[("bg_live_abcdef1234", 7, true)]).await;
    let resolver = CredentialResolver::new(pool);

    resolver.authenticate("bg_live_abcdef1234").await;
    let result = resolver.authenticate("bg_live_abcdef1234").await.unwrap();
    assert_eq!(result.tenant_id, TenantId::from(7));
  }

  #[tokio::test]
  async fn deactivate_cached_forces_recheck()
  {
    let pool = seeded_pool(&[("bg_live_abcdef1234", 7, true)]).await;
    let resolver = CredentialResolver::new(pool);

    let key_id = resolver.authenticate("bg_live_abcdef1234").await.unwrap().api_key_id;
    resolver.deactivate_cached(key_id);

    // Row in storage is still marked active (this test does not model the
    // admin-side deactivation write), but the cached positive result is
    // gone so the next call re-queries storage rather than trusting it.
    assert!(resolver.cache.get("bg_live_abcdef1234").is_none());
  }

  #[tokio::test]
  async fn closed_pool_fails_closed_to_no_match_instead_of_erroring()
  {
    let pool = seeded_pool(&[("bg_live_abcdef1234", 7, true)]).await;
    let resolver = CredentialResolver::new(pool.clone());
    pool.close().await;

    assert!(resolver.authenticate("bg_live_abcdef1234").await.is_none());
  }
}
