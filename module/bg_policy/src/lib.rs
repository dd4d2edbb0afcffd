//! Policy Evaluator (C4).
//!
//! Delegates admission decisions to a pre-compiled Wasm module loaded
//! once at process start. [`PolicyEvaluator`] abstracts the contract so
//! tests can exercise the admission pipeline with a pure-Rust evaluator
//! instead of a compiled `.wasm` fixture.

mod evaluator;
pub mod test_support;
mod wasm;

pub use evaluator::PolicyEvaluator;
pub use wasm::WasmPolicyEvaluator;

#[cfg(test)]
mod tests
{
  use super::evaluator::{ interpret_results, validate_input };
  use serde_json::json;

  #[test]
  fn non_array_budgets_is_rejected()
  {
    let input = json!({ "usage": 1, "budget": 10, "budgets": "not-an-array" });
    assert!(validate_input(&input).is_err());
  }

  #[test]
  fn array_budgets_is_accepted()
  {
    let input = json!({ "usage": 1, "budget": 10, "budgets": [] });
    assert!(validate_input(&input).is_ok());
  }

  #[test]
  fn missing_budgets_field_is_accepted()
  {
    let input = json!({ "usage": 1, "budget": 10 });
    assert!(validate_input(&input).is_ok());
  }

  #[test]
  fn empty_result_array_denies()
  {
    assert_eq!(interpret_results(b"[]").unwrap(), false);
  }

  #[test]
  fn first_result_true_allows()
  {
    let raw = serde_json::to_vec(&json!([{ "result": true }])).unwrap();
    assert_eq!(interpret_results(&raw).unwrap(), true);
  }

  #[test]
  fn usage_below_budget_allows_matching_spec_scenario()
  {
    // evaluate({usage:1,budget:10,...}) = true
    let raw = serde_json::to_vec(&json!([{ "result": true }])).unwrap();
    assert!(interpret_results(&raw).unwrap());
  }

  #[test]
  fn usage_at_or_above_budget_denies_matching_spec_scenario()
  {
    // evaluate({usage:11,budget:10,...}) = false
    let raw = serde_json::to_vec(&json!([{ "result": false }])).unwrap();
    assert!(!interpret_results(&raw).unwrap());
  }
}
