//! OpenAI-shape request/response translation for vendors whose wire
//! format diverges from OpenAI's.

use serde_json::{ json, Value };

/// `system` role extracted into a top-level field, `stop` mapped to
/// `stop_sequences`, `max_tokens` defaulted to 4096 when absent.
pub fn openai_to_anthropic(openai: &Value) -> Result<Value, String>
{
  let messages = openai["messages"].as_array().ok_or("missing 'messages' array")?;

  let mut system_prompt: Option<String> = None;
  let mut user_messages: Vec<Value> = Vec::new();

  for message in messages
  {
    let role = message["role"].as_str().unwrap_or("");
    if role == "system"
    {
      let content = message["content"].as_str().unwrap_or("");
      system_prompt = Some(match system_prompt
      {
        Some(existing) => format!("{existing}\n{content}"),
        None => content.to_string(),
      });
    }
    else
    {
      user_messages.push(message.clone());
    }
  }

  let mut anthropic = json!({
    "model": openai["model"],
    "messages": user_messages,
    "max_tokens": openai.get("max_tokens").or_else(|| openai.get("max_completion_tokens")).unwrap_or(&json!(4096)),
  });

  if let Some(system) = system_prompt
  {
    anthropic["system"] = json!(system);
  }

  if let Some(temperature) = openai.get("temperature")
  {
    anthropic["temperature"] = temperature.clone();
  }

  if let Some(top_p) = openai.get("top_p")
  {
    anthropic["top_p"] = top_p.clone();
  }

  if let Some(stop) = openai.get("stop")
  {
    anthropic["stop_sequences"] = if stop.is_array() { stop.clone() } else { json!([stop]) };
  }

  Ok(anthropic)
}

/// `content[]` text parts joined, `usage.{input,output}_tokens` mapped
/// to `{prompt,completion}_tokens`, `input+output = total`.
pub fn anthropic_to_openai(anthropic: &Value) -> Result<Value, String>
{
  let content = extract_anthropic_text(anthropic)?;

  let finish_reason = match anthropic["stop_reason"].as_str()
  {
    Some("max_tokens") => "length",
    _ => "stop",
  };

  let prompt_tokens = anthropic["usage"]["input_tokens"].as_i64().unwrap_or(0);
  let completion_tokens = anthropic["usage"]["output_tokens"].as_i64().unwrap_or(0);

  Ok(json!({
    "id": anthropic["id"],
    "object": "chat.completion",
    "model": anthropic["model"],
    "choices": [{
      "index": 0,
      "message": { "role": "assistant", "content": content },
      "finish_reason": finish_reason,
    }],
    "usage": {
      "prompt_tokens": prompt_tokens,
      "completion_tokens": completion_tokens,
      "total_tokens": prompt_tokens + completion_tokens,
    },
  }))
}

fn extract_anthropic_text(anthropic: &Value) -> Result<String, String>
{
  let blocks = anthropic["content"].as_array().ok_or("missing 'content' array in response")?;

  let parts: Vec<&str> = blocks.iter().filter(|block| block["type"].as_str() == Some("text")).filter_map(|block| block["text"].as_str()).collect();

  if parts.is_empty()
  {
    return Err("no text content in response".to_string());
  }

  Ok(parts.join(""))
}

/// System message folded into `systemInstruction.parts`; every other
/// message becomes a `contents[]` element with a single text part;
/// generation knobs collected under `generationConfig`.
pub fn openai_to_google(openai: &Value) -> Result<Value, String>
{
  let messages = openai["messages"].as_array().ok_or("missing 'messages' array")?;

  let mut system_parts: Vec<Value> = Vec::new();
  let mut contents: Vec<Value> = Vec::new();

  for message in messages
  {
    let role = message["role"].as_str().unwrap_or("");
    let text = message["content"].as_str().unwrap_or("");
    if role == "system"
    {
      system_parts.push(json!({ "text": text }));
    }
    else
    {
      let google_role = if role == "assistant" { "model" } else { "user" };
      contents.push(json!({ "role": google_role, "parts": [{ "text": text }] }));
    }
  }

  let mut generation_config = serde_json::Map::new();
  if let Some(max_tokens) = openai.get("max_tokens")
  {
    generation_config.insert("maxOutputTokens".to_string(), max_tokens.clone());
  }
  if let Some(temperature) = openai.get("temperature")
  {
    generation_config.insert("temperature".to_string(), temperature.clone());
  }
  if let Some(top_p) = openai.get("top_p")
  {
    generation_config.insert("topP".to_string(), top_p.clone());
  }
  if let Some(stop) = openai.get("stop")
  {
    let sequences = if stop.is_array() { stop.clone() } else { json!([stop]) };
    generation_config.insert("stopSequences".to_string(), sequences);
  }
  if let Some(thinking_budget) = openai.get("thinking_budget")
  {
    generation_config.insert("thinkingBudget".to_string(), thinking_budget.clone());
  }

  let mut google = json!({ "contents": contents });
  if !system_parts.is_empty()
  {
    google["systemInstruction"] = json!({ "parts": system_parts });
  }
  if !generation_config.is_empty()
  {
    google["generationConfig"] = Value::Object(generation_config);
  }

  Ok(google)
}

const TRUNCATED_PLACEHOLDER: &str = "[Response truncated due to token limit]";

/// Missing `candidates[0].content.parts` with `finishReason = MAX_TOKENS`
/// substitutes a placeholder rather than erroring, since a truncated
/// thinking response with no emitted text is valid, not malformed.
pub fn google_to_openai(google: &Value) -> Result<Value, String>
{
  let candidate = google["candidates"].get(0).ok_or("missing 'candidates' array in response")?;
  let finish_reason_raw = candidate["finishReason"].as_str().unwrap_or("STOP");

  let content = match candidate["content"]["parts"].as_array()
  {
    Some(parts) => parts.iter().filter_map(|part| part["text"].as_str()).collect::<Vec<_>>().join(""),
    None if finish_reason_raw == "MAX_TOKENS" => TRUNCATED_PLACEHOLDER.to_string(),
    None => return Err("missing 'content.parts' in response".to_string()),
  };

  let finish_reason = match finish_reason_raw
  {
    "MAX_TOKENS" => "length",
    _ => "stop",
  };

  let prompt_tokens = google["usageMetadata"]["promptTokenCount"].as_i64().unwrap_or(0);
  let completion_tokens = google["usageMetadata"]["candidatesTokenCount"].as_i64().unwrap_or(0);

  Ok(json!({
    "object": "chat.completion",
    "choices": [{
      "index": 0,
      "message": { "role": "assistant", "content": content },
      "finish_reason": finish_reason,
    }],
    "usage": {
      "prompt_tokens": prompt_tokens,
      "completion_tokens": completion_tokens,
      "total_tokens": prompt_tokens + completion_tokens,
    },
  }))
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn anthropic_translation_extracts_system_prompt()
  {
    let openai = json!({
      "model": "claude-sonnet-4",
      "messages": [
        { "role": "system", "content": "You are helpful" },
        { "role": "user", "content": "Hello" },
      ],
    });

    let anthropic = openai_to_anthropic(&openai).unwrap();
    assert_eq!(anthropic["system"], "You are helpful");
    assert_eq!(anthropic["messages"].as_array().unwrap().len(), 1);
    assert_eq!(anthropic["max_tokens"], 4096);
  }

  #[test]
  fn anthropic_translation_maps_string_stop_to_array()
  {
    let openai = json!({ "model": "claude-sonnet-4", "messages": [], "stop": "END" });
    let anthropic = openai_to_anthropic(&openai).unwrap();
    assert_eq!(anthropic["stop_sequences"], json!(["END"]));
  }

  #[test]
  fn anthropic_round_trip_preserves_mapped_fields()
  {
    let original = json!({
      "model": "claude-sonnet-4",
      "messages": [{ "role": "user", "content": "hi" }],
      "system": "be nice",
      "max_tokens": 256,
      "temperature": 0.5,
      "top_p": 0.9,
      "stop": ["END"],
    });

    let openai_shape = json!({
      "model": original["model"],
      "messages": [{ "role": "system", "content": original["system"] }, original["messages"][0].clone()],
      "max_tokens": original["max_tokens"],
      "temperature": original["temperature"],
      "top_p": original["top_p"],
      "stop": original["stop"],
    });

    let round_tripped = openai_to_anthropic(&openai_shape).unwrap();
    assert_eq!(round_tripped["model"], original["model"]);
    assert_eq!(round_tripped["system"], original["system"]);
    assert_eq!(round_tripped["max_tokens"], original["max_tokens"]);
    assert_eq!(round_tripped["temperature"], original["temperature"]);
    assert_eq!(round_tripped["top_p"], original["top_p"]);
    assert_eq!(round_tripped["stop_sequences"], original["stop"]);
  }

  #[test]
  fn anthropic_response_translation_joins_text_blocks()
  {
    let anthropic = json!({
      "id": "msg_1",
      "model": "claude-sonnet-4",
      "content": [{ "type": "text", "text": "a" }, { "type": "text", "text": "b" }],
      "stop_reason": "end_turn",
      "usage": { "input_tokens": 5, "output_tokens": 3 },
    });

    let openai = anthropic_to_openai(&anthropic).unwrap();
    assert_eq!(openai["choices"][0]["message"]["content"], "ab");
    assert_eq!(openai["usage"]["total_tokens"], 8);
  }

  #[test]
  fn anthropic_max_tokens_maps_to_length_finish_reason()
  {
    let anthropic = json!({
      "id": "msg_1",
      "model": "claude-sonnet-4",
      "content": [{ "type": "text", "text": "cut off" }],
      "stop_reason": "max_tokens",
      "usage": { "input_tokens": 5, "output_tokens": 100 },
    });

    let openai = anthropic_to_openai(&anthropic).unwrap();
    assert_eq!(openai["choices"][0]["finish_reason"], "length");
  }

  #[test]
  fn google_translation_folds_system_into_system_instruction()
  {
    let openai = json!({
      "model": "gemini-2.5-pro",
      "messages": [
        { "role": "system", "content": "be concise" },
        { "role": "user", "content": "hi" },
        { "role": "assistant", "content": "hello" },
      ],
      "max_tokens": 128,
    });

    let google = openai_to_google(&openai).unwrap();
    assert_eq!(google["systemInstruction"]["parts"][0]["text"], "be concise");
    assert_eq!(google["contents"].as_array().unwrap().len(), 2);
    assert_eq!(google["contents"][1]["role"], "model");
    assert_eq!(google["generationConfig"]["maxOutputTokens"], 128);
  }

  #[test]
  fn google_response_translation_joins_parts()
  {
    let google = json!({
      "candidates": [{
        "content": { "parts": [{ "text": "hello " }, { "text": "world" }] },
        "finishReason": "STOP",
      }],
      "usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 2 },
    });

    let openai = google_to_openai(&google).unwrap();
    assert_eq!(openai["choices"][0]["message"]["content"], "hello world");
    assert_eq!(openai["usage"]["total_tokens"], 6);
  }

  #[test]
  fn google_missing_parts_with_max_tokens_substitutes_placeholder()
  {
    let google = json!({
      "candidates": [{ "content": {}, "finishReason": "MAX_TOKENS" }],
      "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 0 },
    });

    let openai = google_to_openai(&google).unwrap();
    assert_eq!(openai["choices"][0]["message"]["content"], TRUNCATED_PLACEHOLDER);
    assert_eq!(openai["choices"][0]["finish_reason"], "length");
  }

  #[test]
  fn google_missing_parts_without_max_tokens_is_an_error()
  {
    let google = json!({
      "candidates": [{ "content": {}, "finishReason": "SAFETY" }],
      "usageMetadata": {},
    });

    assert!(google_to_openai(&google).is_err());
  }
}
