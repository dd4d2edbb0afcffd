//! Combined application state, composing every component's own state
//! behind one `axum::extract::FromRef` boundary, the same way the
//! teacher's control-api server composes `AuthState`/`TokenState`/... .

use axum::extract::FromRef;
use bg_auth::AuthState;
use bg_catalog::Catalog;
use bg_cost::TokenCounter;
use bg_policy::PolicyEvaluator;
use bg_store::{ BudgetStore, Cache };
use bg_types::BudgetGuardConfig;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::providers::ProviderRegistry;

/// Everything a request needs to pass through `Auth -> Route -> Limit ->
/// Policy -> Dispatch -> Finalize -> Publish`.
#[derive(Clone)]
pub struct ProxyState
{
  pub auth: AuthState,
  pub pool: SqlitePool,
  pub catalog: Arc<Catalog>,
  pub budgets: Arc<BudgetStore>,
  pub policy: Arc<dyn PolicyEvaluator>,
  pub cost: Arc<TokenCounter>,
  pub providers: Arc<ProviderRegistry>,
  pub cache: Option<Arc<dyn Cache>>,
  pub events: Option<redis::aio::ConnectionManager>,
  pub config: Arc<BudgetGuardConfig>,
}

impl FromRef<ProxyState> for AuthState
{
  fn from_ref(state: &ProxyState) -> Self
  {
    state.auth.clone()
  }
}
