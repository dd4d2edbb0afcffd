use arc_swap::ArcSwap;
use bg_types::{ ModelPricing, ModelPricingId, Provider };
use sqlx::{ Row, SqlitePool };
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{ SystemTime, UNIX_EPOCH };

/// Snapshot refresh interval. Pricing is read-mostly and the catalog is
/// not required to observe writes faster than this.
const REFRESH_INTERVAL_SECS: i64 = 60;

struct Snapshot
{
  models: HashMap<String, ModelPricing>,
  refreshed_at: i64,
}

/// Read-through cache in front of the `model_pricing` table.
pub struct Catalog
{
  pool: SqlitePool,
  snapshot: ArcSwap<Snapshot>,
}

impl Catalog
{
  /// Build a catalog against an already-migrated pool. The first
  /// `lookup` call populates the cache.
  #[must_use]
  pub fn from_pool(pool: SqlitePool) -> Self
  {
    Self
    {
      pool,
      snapshot: ArcSwap::from_pointee(Snapshot { models: HashMap::new(), refreshed_at: 0 }),
    }
  }

  /// `lookup(modelName) -> {provider, inputPrice, cachedInputPrice,
  /// outputPrice} | null`. A `provider = None` on the returned row means
  /// the model exists but has no adapter; callers must treat that as
  /// unroutable rather than retrying.
  ///
  /// # Errors
  ///
  /// Returns an error only if the refresh query itself fails (database
  /// unavailable); a model simply absent from the catalog is `Ok(None)`.
  pub async fn lookup(&self, model: &str) -> sqlx::Result<Option<ModelPricing>>
  {
    self.ensure_fresh().await?;
    Ok(self.snapshot.load().models.get(model).cloned())
  }

  /// Force a refresh regardless of staleness, used after an admin
  /// collaborator writes a new pricing row.
  pub async fn refresh(&self) -> sqlx::Result<()>
  {
    let rows = sqlx::query("SELECT id, model, version, provider, input_price, cached_input_price, output_price FROM model_pricing")
      .fetch_all(&self.pool)
      .await?;

    let mut models = HashMap::with_capacity(rows.len());
    for row in rows
    {
      let model: String = row.get("model");
      let provider: Option<String> = row.get("provider");
      let entry = ModelPricing
      {
        id: ModelPricingId::from(row.get::<i64, _>("id")),
        model: model.clone(),
        version: row.get("version"),
        provider: provider.as_deref().and_then(Provider::parse),
        input_price: row.get("input_price"),
        cached_input_price: row.get("cached_input_price"),
        output_price: row.get("output_price"),
      };
      models.insert(model, entry);
    }

    self.snapshot.store(Arc::new(Snapshot { models, refreshed_at: now() }));
    Ok(())
  }

  async fn ensure_fresh(&self) -> sqlx::Result<()>
  {
    let age = now() - self.snapshot.load().refreshed_at;
    if age >= REFRESH_INTERVAL_SECS
    {
      self.refresh().await?;
    }
    Ok(())
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
  use sqlx::sqlite::SqlitePoolOptions;

  async fn seeded_pool() -> SqlitePool
  {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();

    sqlx::raw_sql(
      "CREATE TABLE model_pricing (
        id INTEGER PRIMARY KEY,
        model TEXT NOT NULL UNIQUE,
        version TEXT NOT NULL,
        provider TEXT,
        input_price REAL NOT NULL,
        cached_input_price REAL NOT NULL,
        output_price REAL NOT NULL
      )",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
      "INSERT INTO model_pricing (id, model, version, provider, input_price, cached_input_price, output_price)
       VALUES (1, 'gpt-4', 'v1', 'openai', 30.0, 15.0, 60.0),
              (2, 'unroutable-model', 'v1', NULL, 1.0, 1.0, 2.0)",
    )
    .execute(&pool)
    .await
    .unwrap();

    pool
  }

  #[tokio::test]
  async fn lookup_returns_known_model()
  {
    let catalog = Catalog::from_pool(seeded_pool().await);
    let entry = catalog.lookup("gpt-4").await.unwrap().unwrap();
    assert_eq!(entry.provider, Some(Provider::Openai));
    assert_eq!(entry.input_price, 30.0);
  }

  #[tokio::test]
  async fn lookup_returns_none_for_unknown_model()
  {
    let catalog = Catalog::from_pool(seeded_pool().await);
    assert!(catalog.lookup("no-such-model").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn null_provider_is_preserved_as_unroutable()
  {
    let catalog = Catalog::from_pool(seeded_pool().await);
    let entry = catalog.lookup("unroutable-model").await.unwrap().unwrap();
    assert_eq!(entry.provider, None);
  }

  #[tokio::test]
  async fn second_lookup_within_ttl_does_not_requery()
  {
    let catalog = Catalog::from_pool(seeded_pool().await);
    catalog.lookup("gpt-4").await.unwrap();
    let refreshed_at_first = catalog.snapshot.load().refreshed_at;

    catalog.lookup("gpt-4").await.unwrap();
    let refreshed_at_second = catalog.snapshot.load().refreshed_at;

    assert_eq!(refreshed_at_first, refreshed_at_second);
  }
}
