//! `PolicyEvaluator` trait and its Wasm implementation.

use async_trait::async_trait;
use bg_types::BgError;
use serde_json::Value;

/// Abstraction over "evaluate this admission input against the
/// configured policy". The Wasm module is the production
/// implementation; tests use a pure-Rust stand-in so policy logic
/// doesn't need a compiled `.wasm` fixture to exercise the admission
/// state machine.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync
{
  async fn evaluate(&self, input: &Value) -> Result<bool, BgError>;
}

/// One `{result: bool}` entry from the module's output array.
#[derive(Debug, serde::Deserialize)]
struct ResultEntry
{
  result: bool,
}

/// `input.budgets` must be an array when present; anything else is a
/// structured validation error the caller treats as a 500, checked
/// before the input ever reaches the sandboxed module.
pub(crate) fn validate_input(input: &Value) -> Result<(), BgError>
{
  match input.get("budgets")
  {
    Some(budgets) if !budgets.is_array() => Err(BgError::Validation("policy input.budgets must be an array".to_string())),
    _ => Ok(()),
  }
}

/// Boolean is `Boolean(results[0].result)`; an empty array denies.
pub(crate) fn interpret_results(raw: &[u8]) -> Result<bool, BgError>
{
  let results: Vec<ResultEntry> = serde_json::from_slice(raw).map_err(|err| BgError::Internal(format!("malformed policy output: {err}")))?;

  Ok(results.first().map_or(false, |entry| entry.result))
}
