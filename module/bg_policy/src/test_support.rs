//! Non-Wasm evaluator for tests that exercise admission logic without a
//! compiled policy fixture.

use crate::evaluator::{ validate_input, PolicyEvaluator };
use async_trait::async_trait;
use bg_types::BgError;
use serde_json::Value;

/// Evaluates by delegating to a plain Rust closure instead of a Wasm
/// module. `input.budgets` is still validated the same way the Wasm
/// path validates it, so tests exercise the real contract.
pub struct ClosureEvaluator<F>
where
  F: Fn(&Value) -> bool + Send + Sync,
{
  decide: F,
}

impl<F> ClosureEvaluator<F>
where
  F: Fn(&Value) -> bool + Send + Sync,
{
  pub fn new(decide: F) -> Self
  {
    Self { decide }
  }
}

#[async_trait]
impl<F> PolicyEvaluator for ClosureEvaluator<F>
where
  F: Fn(&Value) -> bool + Send + Sync,
{
  async fn evaluate(&self, input: &Value) -> Result<bool, BgError>
  {
    validate_input(input)?;
    Ok((self.decide)(input))
  }
}
