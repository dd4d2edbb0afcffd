//! `bg_proxy` server entrypoint.
//!
//! Loads configuration from the environment, wires up every component
//! crate against one SQLite pool, and serves the admission pipeline on
//! `PORT` (default 8080).

use bg_auth::{ AuthState, CredentialResolver };
use bg_catalog::Catalog;
use bg_cost::TokenCounter;
use bg_policy::{ PolicyEvaluator, WasmPolicyEvaluator };
use bg_proxy::handlers::{ chat_completions, health, responses };
use bg_proxy::{ ProviderRegistry, ProxyState };
use bg_store::{ BudgetStore, Cache, RedisCache };
use bg_types::BudgetGuardConfig;
use axum::routing::{ get, post };
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Connect to Redis for the `bg_events` stream, independent of the
/// `Cache` abstraction (a key-value cache and a stream producer need
/// different underlying commands, so they aren't the same handle).
async fn connect_event_stream(redis_url: Option<&str>) -> Option<redis::aio::ConnectionManager>
{
  let url = redis_url?;
  let client = match redis::Client::open(url)
  {
    Ok(client) => client,
    Err(err) =>
    {
      tracing::warn!(%err, "invalid redis url, event publishing will be skipped");
      return None;
    }
  };

  match client.get_connection_manager().await
  {
    Ok(manager) => Some(manager),
    Err(err) =>
    {
      tracing::warn!(%err, "failed to connect event stream, event publishing will be skipped");
      None
    }
  }
}

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

  tracing::info!(database_url = %config.database_url, "connecting to store");
  let pool = SqlitePoolOptions::new().connect(&config.database_url).await.expect("failed to connect to database");
  bg_store::schema::apply(&pool).await.expect("failed to apply schema migrations");

  let cache: Option<Arc<dyn Cache>> = match &config.redis_url
  {
    Some(url) => match RedisCache::connect(url).await
    {
      Ok(redis_cache) => Some(Arc::new(redis_cache)),
      Err(err) =>
      {
        tracing::warn!(%err, "failed to connect to redis, running without a cache");
        None
      }
    },
    None => None,
  };

  let events = connect_event_stream(config.redis_url.as_deref()).await;

  let auth_state = AuthState { resolver: Arc::new(CredentialResolver::new(pool.clone())) };
  let catalog = Arc::new(Catalog::from_pool(pool.clone()));
  let budgets = Arc::new(BudgetStore::new(pool.clone(), cache.clone()));

  let policy: Arc<dyn PolicyEvaluator> = match &config.opa_policy_path
  {
    Some(path) => Arc::new(WasmPolicyEvaluator::load(path).expect("failed to load policy module")),
    None => panic!("OPA_POLICY_PATH is required to serve traffic"),
  };

  let cost = Arc::new(TokenCounter::new());
  let providers = Arc::new(ProviderRegistry::from_config(&config));

  let state = ProxyState { auth: auth_state, pool, catalog, budgets, policy, cost, providers, cache, events, config: Arc::new(config) };
  let port = state.config.port;

  let app = Router::new()
    .route("/v1/chat/completions", post(chat_completions))
    .route("/v1/responses", post(responses))
    .route("/health", get(health))
    .with_state(state)
    .layer(CorsLayer::permissive());

  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  tracing::info!("bg_proxy listening on http://{addr}");

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
