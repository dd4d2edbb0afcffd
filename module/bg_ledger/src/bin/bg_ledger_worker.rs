//! `bg_ledger` worker entrypoint.
//!
//! A single independent process that drains the `bg_events` stream and
//! writes it to durable storage. Not horizontally scaled: the stream
//! has one consumer reading with blocking `XREAD`, not a consumer
//! group, so running more than one of these racing against the same
//! `lastId` would double count.

use bg_ledger::{ LedgerConsumer, LedgerStore, TagUsageTracker };
use bg_store::{ Cache, RedisCache };
use bg_types::BudgetGuardConfig;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>>
{
  let dotenv_result = dotenvy::dotenv();
  tracing_subscriber::fmt::init();

  match dotenv_result
  {
    Ok(path) => tracing::debug!("loaded .env from: {:?}", path),
    Err(_) => tracing::debug!("no .env file loaded (not required)"),
  }

  let config = BudgetGuardConfig::load().expect("failed to load configuration");

  let pool = SqlitePoolOptions::new().connect(&config.database_url).await.expect("failed to connect to database");
  bg_store::schema::apply(&pool).await.expect("failed to apply schema migrations");

  let redis_url = config.redis_url.as_deref().expect("REDIS_URL is required to run the ledger worker");

  let cache: Arc<dyn Cache> = Arc::new(RedisCache::connect(redis_url).await.expect("failed to connect to redis"));

  let stream_client = redis::Client::open(redis_url).expect("invalid redis url");
  let stream_conn = stream_client.get_connection_manager().await.expect("failed to connect event stream");

  let ledger = LedgerStore::new(pool);
  let tracker = TagUsageTracker::new(cache);
  let mut consumer = LedgerConsumer::new(stream_conn, ledger, tracker);

  tracing::info!("bg_ledger worker draining bg_events");
  consumer.run_forever().await;

  Ok(())
}
