//! Environment-variable configuration.
//!
//! Unlike `iron_token_manager::config::Config`, this loader has no TOML
//! config file layer: §6 of the core specification lists nothing but
//! flat environment variables, and a file-based layer belongs to the
//! out-of-scope admin surface. `dotenvy` still loads a local `.env` for
//! development convenience, matching how the teacher wires it up.

use std::env;

/// Default total-request timeout applied to every outbound call to an
/// upstream provider, per §5; overridable via `UPSTREAM_TIMEOUT_SECS`.
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;

/// Process-wide configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct BudgetGuardConfig
{
  pub database_url: String,
  pub redis_url: Option<String>,
  pub openai_key: Option<String>,
  pub anthropic_api_key: Option<String>,
  pub google_api_key: Option<String>,
  pub opa_policy_path: Option<String>,
  pub budget_daily_usd: Option<f64>,
  pub budget_monthly_usd: Option<f64>,
  pub budget_start_date: Option<String>,
  pub budget_end_date: Option<String>,
  pub budget_periods: Vec<String>,
  pub max_reqs_per_min: Option<u32>,
  pub default_tenant: Option<String>,
  pub default_api_key: Option<String>,
  pub port: u16,
  pub upstream_timeout_secs: u64,
}

/// Error loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError
{
  #[error("missing required environment variable: {0}")]
  Missing(&'static str),
  #[error("invalid value for {name}: {value}")]
  Invalid
  {
    name: &'static str,
    value: String,
  },
}

impl BudgetGuardConfig
{
  /// Load configuration from the process environment, loading a local
  /// `.env` file first if one is present (no-op in production where the
  /// variables are injected directly).
  ///
  /// # Errors
  ///
  /// Returns an error if `DATABASE_URL` is absent or a numeric variable
  /// fails to parse.
  pub fn load() -> Result<Self, ConfigError>
  {
    let _ = dotenvy::dotenv();
    Self::from_env()
  }

  fn from_env() -> Result<Self, ConfigError>
  {
    let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

    let budget_periods = env::var("BUDGET_PERIODS")
      .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
      .unwrap_or_default();

    Ok(Self
    {
      database_url,
      redis_url: env::var("REDIS_URL").ok(),
      openai_key: env::var("OPENAI_KEY").ok(),
      anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
      google_api_key: env::var("GOOGLE_API_KEY").ok(),
      opa_policy_path: env::var("OPA_POLICY_PATH").ok(),
      budget_daily_usd: parse_opt_f64("BUDGET_DAILY_USD")?,
      budget_monthly_usd: parse_opt_f64("BUDGET_MONTHLY_USD")?,
      budget_start_date: env::var("BUDGET_START_DATE").ok(),
      budget_end_date: env::var("BUDGET_END_DATE").ok(),
      budget_periods,
      max_reqs_per_min: parse_opt_u32("MAX_REQS_PER_MIN")?,
      default_tenant: env::var("DEFAULT_TENANT").ok(),
      default_api_key: env::var("DEFAULT_API_KEY").ok(),
      port: parse_opt_u16("PORT")?.unwrap_or(8080),
      upstream_timeout_secs: parse_opt_u64("UPSTREAM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
    })
  }

  /// Budget fallback amount for `period`, read from the fixed env-var
  /// names the store falls back to when no row exists for a tenant.
  /// Per-tenant overrides (`BUDGET_<PERIOD>_<TENANT>`) are resolved by
  /// the caller, which knows the tenant name; this only covers the
  /// global `BUDGET_<PERIOD>_USD` tier.
  #[must_use]
  pub fn global_budget_fallback(&self, period: crate::entities::Period) -> Option<f64>
  {
    match period
    {
      crate::entities::Period::Daily => self.budget_daily_usd,
      crate::entities::Period::Monthly => self.budget_monthly_usd,
      crate::entities::Period::Custom => None,
    }
  }
}

fn parse_opt_f64(name: &'static str) -> Result<Option<f64>, ConfigError>
{
  match env::var(name)
  {
    Ok(raw) => raw.parse::<f64>().map(Some).map_err(|_| ConfigError::Invalid { name, value: raw }),
    Err(_) => Ok(None),
  }
}

fn parse_opt_u32(name: &'static str) -> Result<Option<u32>, ConfigError>
{
  match env::var(name)
  {
    Ok(raw) => raw.parse::<u32>().map(Some).map_err(|_| ConfigError::Invalid { name, value: raw }),
    Err(_) => Ok(None),
  }
}

fn parse_opt_u16(name: &'static str) -> Result<Option<u16>, ConfigError>
{
  match env::var(name)
  {
    Ok(raw) => raw.parse::<u16>().map(Some).map_err(|_| ConfigError::Invalid { name, value: raw }),
    Err(_) => Ok(None),
  }
}

fn parse_opt_u64(name: &'static str) -> Result<Option<u64>, ConfigError>
{
  match env::var(name)
  {
    Ok(raw) => raw.parse::<u64>().map(Some).map_err(|_| ConfigError::Invalid { name, value: raw }),
    Err(_) => Ok(None),
  }
}

#[cfg(test)]
mod tests
{
  use super::*;
  use std::sync::Mutex;

  // Environment variables are process-global; serialize tests that touch them.
  static ENV_LOCK: Mutex<()> = Mutex::new(());

  #[test]
  fn missing_database_url_errors()
  {
    let _guard = ENV_LOCK.lock().unwrap();
    env::remove_var("DATABASE_URL");
    assert!(matches!(BudgetGuardConfig::from_env(), Err(ConfigError::Missing("DATABASE_URL"))));
  }

  #[test]
  fn parses_budget_periods_csv()
  {
    let _guard = ENV_LOCK.lock().unwrap();
    env::set_var("DATABASE_URL", "sqlite://:memory:");
    env::set_var("BUDGET_PERIODS", "daily, monthly");

    let config = BudgetGuardConfig::from_env().unwrap();
    assert_eq!(config.budget_periods, vec!["daily".to_string(), "monthly".to_string()]);

    env::remove_var("DATABASE_URL");
    env::remove_var("BUDGET_PERIODS");
  }

  #[test]
  fn invalid_numeric_value_errors()
  {
    let _guard = ENV_LOCK.lock().unwrap();
    env::set_var("DATABASE_URL", "sqlite://:memory:");
    env::set_var("BUDGET_DAILY_USD", "not-a-number");

    assert!(matches!(BudgetGuardConfig::from_env(), Err(ConfigError::Invalid { name: "BUDGET_DAILY_USD", .. })));

    env::remove_var("DATABASE_URL");
    env::remove_var("BUDGET_DAILY_USD");
  }

  #[test]
  fn defaults_port_when_absent()
  {
    let _guard = ENV_LOCK.lock().unwrap();
    env::set_var("DATABASE_URL", "sqlite://:memory:");
    env::remove_var("PORT");

    let config = BudgetGuardConfig::from_env().unwrap();
    assert_eq!(config.port, 8080);

    env::remove_var("DATABASE_URL");
  }
}
