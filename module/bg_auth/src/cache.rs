//! Process-local credential cache.
//!
//! Keyed by the plaintext secret (never the hash — the whole point is to
//! skip bcrypt on a hit). The cache is an optimization only; every code
//! path in `resolver.rs` works correctly with an empty cache, it's just
//! slower.
//!
//! ## Known Pitfalls
//!
//! ### DashMap lock-iteration incompatibility
//!
//! As in `bg_cost`'s tracker: never hold an entry lock while calling a
//! method that iterates the whole map. `deactivate` below drops each
//! entry's lock before moving to the next rather than holding a single
//! iterator across mutation.

use bg_types::{ ApiKeyId, TenantId };
use dashmap::DashMap;
use std::time::{ SystemTime, UNIX_EPOCH };

/// TTL for a positive cache entry.
const CACHE_TTL_SECS: i64 = 5 * 60;

/// Minimum interval between `last_used_at` writes for the same key.
pub const LAST_USED_THROTTLE_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct CachedCredential
{
  pub api_key_id: ApiKeyId,
  pub tenant_id: TenantId,
  pub expires_at: i64,
  pub last_used_updated_at: i64,
  pub is_active: bool,
}

#[derive(Debug, Default)]
pub struct CredentialCache
{
  entries: DashMap<String, CachedCredential>,
}

impl CredentialCache
{
  #[must_use]
  pub fn new() -> Self
  {
    Self { entries: DashMap::new() }
  }

  /// Fresh positive hit for `secret`, if any. A hit whose `expires_at`
  /// has passed or whose `is_active` is false is treated as a miss (and
  /// removed).
  pub fn get(&self, secret: &str) -> Option<CachedCredential>
  {
    let now = now();
    let hit = self.entries.get(secret).filter(|entry| entry.expires_at > now && entry.is_active).map(|entry| entry.clone());

    if hit.is_none()
    {
      self.entries.remove(secret);
    }
    hit
  }

    /// Record a positive authentication result.
  pub fn put(&self, secret: &str, api_key_id: ApiKeyId, tenant_id: TenantId)
  {
    let now = now();
    self.entries.insert(
      secret.to_string(),
      CachedCredential { api_key_id, tenant_id, expires_at: now + CACHE_TTL_SECS, last_used_updated_at: 0, is_active: true },
    );
  }

  /// Whether `last_used_at` may be written again for `secret` right now,
  /// and if so, mark it as just-updated. Never blocks the caller: the
  /// actual write happens asynchronously regardless of cache outcome.
  pub fn should_update_last_used(&self, secret: &str) -> bool
  {
    let now = now();
    match self.entries.get_mut(secret)
    {
      Some(mut entry) if now - entry.last_used_updated_at >= LAST_USED_THROTTLE_SECS =>
      {
        entry.last_used_updated_at = now;
        true
      }
      Some(_) => false,
      // No cache entry yet (miss path not yet populated) - let the
      // caller decide; resolver treats this as "go ahead and update".
      None => true,
    }
  }

  /// Remove a single entry, forcing the next authenticate to re-query
  /// storage.
  pub fn invalidate(&self, secret: &str)
  {
    self.entries.remove(secret);
  }

  /// Flip `is_active = false` on every cached entry for `key_id`. O(n) in
  /// cache size, acceptable since deactivation is rare and the cache is
  /// bounded by active-secret count.
  pub fn deactivate(&self, key_id: ApiKeyId)
  {
    for mut entry in self.entries.iter_mut()
    {
      if entry.api_key_id == key_id
      {
        entry.is_active = false;
      }
    }
  }

  /// Drop every entry whose TTL has elapsed. Intended to run on a
  /// periodic background tick; correctness never depends on it running.
  pub fn sweep_expired(&self)
  {
    let now = now();
    self.entries.retain(|_, entry| entry.expires_at > now);
  }

  #[cfg(test)]
  pub fn len(&self) -> usize
  {
    self.entries.len()
  }
}

fn now() -> i64
{
  SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs() as i64
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn fresh_entry_is_a_hit()
  {
    let cache = CredentialCache::new();
    cache.put("secret", ApiKeyId::from(1), TenantId::from(2));
    assert!(cache.get("secret").is_some());
  }

  #[test]
  fn missing_entry_is_a_miss()
  {
    let cache = CredentialCache::new();
    assert!(cache.get("nope").is_none());
  }

  #[test]
  fn deactivate_flips_matching_entries_only()
  {
    let cache = CredentialCache::new();
    cache.put("s1", ApiKeyId::from(1), TenantId::from(9));
    cache.put("s2", ApiKeyId::from(2), TenantId::from(9));

    cache.deactivate(ApiKeyId::from(1));

    assert!(cache.get("s1").is_none(), "deactivated key should no longer hit");
    assert!(cache.get("s2").is_some(), "unrelated key is untouched");
  }

  #[test]
  fn invalidate_removes_single_entry()
  {
    let cache = CredentialCache::new();
    cache.put("secret", ApiKeyId::from(1), TenantId::from(2));
    cache.invalidate("secret");
    assert!(cache.get("secret").is_none());
  }

  #[test]
  fn sweep_drops_only_expired_entries()
  {
    let cache = CredentialCache::new();
    cache.put("fresh", ApiKeyId::from(1), TenantId::from(1));
    cache.entries.get_mut("fresh").unwrap().expires_at = now() - 1;
    cache.put("still_fresh", ApiKeyId::from(2), TenantId::from(2));

    cache.sweep_expired();

    assert_eq!(cache.len(), 1);
    assert!(cache.get("still_fresh").is_some());
  }

  #[test]
  fn last_used_throttle_allows_first_then_blocks()
  {
    let cache = CredentialCache::new();
    cache.put("secret", ApiKeyId::from(1), TenantId::from(1));

    assert!(cache.should_update_last_used("secret"));
    assert!(!cache.should_update_last_used("secret"));
  }
}
