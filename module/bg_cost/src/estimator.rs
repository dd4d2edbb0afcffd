//! Cost Estimator (C5): token counting and USD cost computation.
//!
//! ## Known Pitfalls
//!
//! ### Scoped BPE resource acquisition
//!
//! Loading a `CoreBPE` parses its full rank table from embedded data,
//! which is not free. `TokenCounter` caches one `Arc<CoreBPE>` per model
//! behind a `DashMap` (the same sharded-map pattern used elsewhere in
//! this crate) so a hot model name only pays that cost once; callers
//! never hold a long-lived borrow into the cache past a single `estimate`
//! call, so cache entries can be dropped and rebuilt freely on reload.

use dashmap::DashMap;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Fallback USD/1M-token pricing used when the catalog has no entry for
/// a model.
pub const FALLBACK_INPUT_PRICE_PER_1M: f64 = 1.0;
pub const FALLBACK_OUTPUT_PRICE_PER_1M: f64 = 2.0;

/// The unit prices `estimate` needs; decoupled from the catalog's own
/// `ModelPricing` row shape (which also carries an id and a version tag
/// irrelevant to cost computation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitPricing
{
  pub input_price: f64,
  pub cached_input_price: f64,
  pub output_price: f64,
}

impl UnitPricing
{
  /// Pricing applied when a model has no catalog entry.
  #[must_use]
  pub fn fallback() -> Self
  {
    Self
    {
      input_price: FALLBACK_INPUT_PRICE_PER_1M,
      cached_input_price: FALLBACK_INPUT_PRICE_PER_1M,
      output_price: FALLBACK_OUTPUT_PRICE_PER_1M,
    }
  }
}

impl From<&bg_types::ModelPricing> for UnitPricing
{
  fn from(row: &bg_types::ModelPricing) -> Self
  {
    Self
    {
      input_price: row.input_price,
      cached_input_price: row.cached_input_price,
      output_price: row.output_price,
    }
  }
}

/// One message in a structured chat prompt.
#[derive(Debug, Clone)]
pub struct ChatMessage
{
  pub role: String,
  pub content: String,
  pub name: Option<String>,
}

/// The prompt half of an estimate request: either a flat string or a
/// structured chat-completions message array, each counted differently.
#[derive(Debug, Clone)]
pub enum Prompt
{
  Text(String),
  Messages(Vec<ChatMessage>),
}

/// Token counts reported directly by the upstream provider. When
/// present, these win over any BPE estimate (they absorb hidden
/// "thinking" tokens on reasoning models that a local tokenizer can't
/// see).
#[derive(Debug, Clone, Copy)]
pub struct ActualUsage
{
  pub prompt_tokens: u32,
  pub total_tokens: u32,
}

/// Input to `TokenCounter::estimate`.
#[derive(Debug, Clone)]
pub struct EstimateRequest
{
  pub model: String,
  pub prompt: Prompt,
  pub completion: Option<String>,
  pub actual_usage: Option<ActualUsage>,
}

/// Result of an estimate: token counts plus the USD cost they imply at a
/// given unit price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate
{
  pub prompt_tokens: u32,
  pub completion_tokens: u32,
  pub usd: f64,
}

/// Caches one BPE encoding per model name so repeated calls for the same
/// model don't reparse its rank table.
#[derive(Default)]
pub struct TokenCounter
{
  cache: DashMap<String, Arc<CoreBPE>>,
}

impl std::fmt::Debug for TokenCounter
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
  {
    f.debug_struct("TokenCounter").field("cache_len", &self.cache.len()).finish()
  }
}

impl TokenCounter
{
  #[must_use]
  pub fn new() -> Self
  {
    Self { cache: DashMap::new() }
  }

  fn bpe_for(&self, model: &str) -> Arc<CoreBPE>
  {
    if let Some(bpe) = self.cache.get(model)
    {
      return Arc::clone(&bpe);
    }

    // On an unknown model, fall back to the default encoding rather than
    // erroring the whole estimate.
    let bpe = Arc::new(
      tiktoken_rs::get_bpe_from_model(model)
        .unwrap_or_else(|_| tiktoken_rs::cl100k_base().expect("cl100k_base ranks are embedded in tiktoken-rs")),
    );
    self.cache.insert(model.to_string(), Arc::clone(&bpe));
    bpe
  }

  fn count(&self, model: &str, text: &str) -> u32
  {
    self.bpe_for(model).encode_ordinary(text).len() as u32
  }

  /// Token count for a prompt, applying the message-framing overhead
  /// (4 tokens per message for role/content framing, plus name tokens
  /// minus one when a `name` is set, plus 2 tokens of assistant priming)
  /// when the prompt is a structured message array.
  fn count_prompt(&self, model: &str, prompt: &Prompt) -> u32
  {
    match prompt
    {
      Prompt::Text(text) => self.count(model, text),
      Prompt::Messages(messages) =>
      {
        let mut total: u32 = 2; // assistant priming
        for message in messages
        {
          total += 4;
          total += self.count(model, &message.role);
          total += self.count(model, &message.content);
          if let Some(name) = &message.name
          {
            total += self.count(model, name).saturating_sub(1);
          }
        }
        total
      }
    }
  }

  /// Compute token counts and USD cost for a request.
  #[must_use]
  pub fn estimate(&self, request: &EstimateRequest, pricing: UnitPricing) -> CostEstimate
  {
    let (prompt_tokens, completion_tokens) = match request.actual_usage
    {
      Some(usage) => (usage.prompt_tokens, usage.total_tokens.saturating_sub(usage.prompt_tokens)),
      None =>
      {
        let prompt_tokens = self.count_prompt(&request.model, &request.prompt);
        let completion_tokens = request.completion.as_deref().map_or(0, |c| self.count(&request.model, c));
        (prompt_tokens, completion_tokens)
      }
    };

    let usd = (f64::from(prompt_tokens) * pricing.input_price + f64::from(completion_tokens) * pricing.output_price)
      / 1_000_000.0;

    CostEstimate { prompt_tokens, completion_tokens, usd }
  }
}

/// Google's `gemini-2.5-pro` bills at two different rates depending on
/// total prompt+completion size. Returns the effective model name to
/// reprice against when `model` is the tiered model, `None` otherwise
/// (meaning: reprice against `model` unchanged).
#[must_use]
pub fn effective_gemini_model(model: &str, total_tokens: u32) -> Option<String>
{
  if model != "gemini-2.5-pro"
  {
    return None;
  }

  let tier = if total_tokens <= 200_000 { "low" } else { "high" };
  Some(format!("gemini-2.5-pro-{tier}"))
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn empty_prompt_and_completion_estimate_to_zero()
  {
    let counter = TokenCounter::new();
    let request = EstimateRequest
    {
      model: "gpt-3.5-turbo".to_string(),
      prompt: Prompt::Text(String::new()),
      completion: Some(String::new()),
      actual_usage: None,
    };

    let estimate = counter.estimate(&request, UnitPricing::fallback());
    assert_eq!(estimate, CostEstimate { prompt_tokens: 0, completion_tokens: 0, usd: 0.0 });
  }

  #[test]
  fn actual_usage_wins_over_local_tokenizer()
  {
    let counter = TokenCounter::new();
    let request = EstimateRequest
    {
      model: "gpt-4".to_string(),
      prompt: Prompt::Text("ignored because actual_usage is present".to_string()),
      completion: None,
      actual_usage: Some(ActualUsage { prompt_tokens: 10, total_tokens: 15 }),
    };

    let estimate = counter.estimate(&request, UnitPricing::fallback());
    assert_eq!(estimate.prompt_tokens, 10);
    assert_eq!(estimate.completion_tokens, 5);
  }

  #[test]
  fn message_framing_counts_two_message_conversation()
  {
    let counter = TokenCounter::new();
    let request = EstimateRequest
    {
      model: "gpt-4".to_string(),
      prompt: Prompt::Messages(vec![
        ChatMessage { role: "user".to_string(), content: "hello".to_string(), name: None },
        ChatMessage { role: "assistant".to_string(), content: "world".to_string(), name: None },
      ]),
      completion: Some("ok".to_string()),
      actual_usage: None,
    };

    let estimate = counter.estimate(&request, UnitPricing::fallback());
    // 2 priming + 2 * (4 framing + 1 role token + 1 content token)
    assert_eq!(estimate.prompt_tokens, 14);
  }

  #[test]
  fn unknown_model_falls_back_to_cl100k()
  {
    let counter = TokenCounter::new();
    let request = EstimateRequest
    {
      model: "not-a-real-model".to_string(),
      prompt: Prompt::Text("hello".to_string()),
      completion: None,
      actual_usage: None,
    };

    let estimate = counter.estimate(&request, UnitPricing::fallback());
    assert_eq!(estimate.prompt_tokens, 1);
  }

  #[test]
  fn gemini_remaps_below_threshold_to_low_tier()
  {
    assert_eq!(effective_gemini_model("gemini-2.5-pro", 200_000), Some("gemini-2.5-pro-low".to_string()));
  }

  #[test]
  fn gemini_remaps_above_threshold_to_high_tier()
  {
    assert_eq!(effective_gemini_model("gemini-2.5-pro", 200_001), Some("gemini-2.5-pro-high".to_string()));
  }

  #[test]
  fn non_gemini_model_is_not_remapped()
  {
    assert_eq!(effective_gemini_model("gpt-4", 1_000_000), None);
  }

  #[test]
  fn cost_formula_matches_spec()
  {
    let estimate = CostEstimate { prompt_tokens: 1_000_000, completion_tokens: 0, usd: 0.0 };
    let pricing = UnitPricing { input_price: 3.0, cached_input_price: 3.0, output_price: 6.0 };
    let usd = (f64::from(estimate.prompt_tokens) * pricing.input_price
      + f64::from(estimate.completion_tokens) * pricing.output_price)
      / 1_000_000.0;
    assert!((usd - 3.0).abs() < f64::EPSILON);
  }
}
