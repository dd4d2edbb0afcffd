//! Blocking consumer for the `bg_events` stream: one message at a time,
//! `lastId` progression, never losing a malformed entry's slot in the
//! stream (it's logged and skipped, not retried forever).
//!
//! `last_id` starts at `"0-0"` on every process start rather than
//! restoring a persisted cursor, so a restart always replays the
//! stream from the beginning. That's safe, not wasteful-but-broken:
//! `LedgerStore::insert` dedups on the stream entry id
//! (`usage_ledger.stream_id` is `UNIQUE`), so a replayed entry resolves
//! to the same ledger row instead of a duplicate one.

use crate::ledger::{ IncomingEvent, LedgerStore };
use crate::tag_tracker::TagUsageTracker;
use bg_types::{ ResolvedTag, TagId, UsageStatus };
use redis::aio::ConnectionManager;
use redis::streams::StreamReadReply;
use redis::AsyncCommands;
use std::collections::HashMap;

const STREAM_KEY: &str = "bg_events";
const BLOCK_MILLIS: usize = 5_000;

pub struct LedgerConsumer
{
  redis: ConnectionManager,
  ledger: LedgerStore,
  tracker: TagUsageTracker,
  last_id: String,
}

impl LedgerConsumer
{
  #[must_use]
  pub fn new(redis: ConnectionManager, ledger: LedgerStore, tracker: TagUsageTracker) -> Self
  {
    Self { redis, ledger, tracker, last_id: "0-0".to_string() }
  }

  /// Drain the stream forever, one blocking read at a time.
  pub async fn run_forever(&mut self)
  {
    loop
    {
      if let Err(err) = self.drain_once().await
      {
        tracing::warn!(%err, "ledger consumer read failed, retrying");
      }
    }
  }

  /// One blocking `XREAD`, processing whatever entry (if any) comes
  /// back before advancing `last_id`.
  async fn drain_once(&mut self) -> redis::RedisResult<()>
  {
    let reply: StreamReadReply = self
      .redis
      .xread_options(&[STREAM_KEY], &[self.last_id.as_str()], &redis::streams::StreamReadOptions::default().block(BLOCK_MILLIS).count(1))
      .await?;

    for stream in reply.keys
    {
      for entry in stream.ids
      {
        self.last_id.clone_from(&entry.id);

        let strings = stringify_fields(&entry.map);

        match decode_event(&entry.id, &strings)
        {
          Ok(event) => self.apply(event).await,
          Err(reason) => tracing::warn!(id = %entry.id, reason, "skipping malformed usage event"),
        }
      }
    }

    Ok(())
  }

  async fn apply(&self, event: IncomingEvent)
  {
    let tags = event.tags.clone();
    let usd = event.usd;

    let ledger_id = match self.ledger.insert(&event).await
    {
      Ok(id) => id,
      Err(err) =>
      {
        tracing::error!(%err, tenant = %event.tenant, "failed to write ledger row");
        return;
      }
    };

    for tag in tags
    {
      self.tracker.record(&event.tenant, tag.id.get(), ledger_id.get(), usd, tag.weight).await;
    }
  }
}

/// Convert a raw stream entry's field map into plain strings. Isolated
/// from `decode_event` so the parsing logic below can be exercised
/// without constructing `redis::Value`s by hand.
fn stringify_fields(map: &HashMap<String, redis::Value>) -> HashMap<String, String>
{
  map
    .iter()
    .filter_map(|(key, value)| redis::from_redis_value::<String>(value.clone()).ok().map(|decoded| (key.clone(), decoded)))
    .collect()
}

fn decode_event(id: &str, map: &HashMap<String, String>) -> Result<IncomingEvent, String>
{
  let get = |name: &str| -> Result<String, String> { map.get(name).cloned().ok_or_else(|| format!("event {id} missing field {name}")) };

  let ts: i64 = get("ts")?.parse().map_err(|_| format!("event {id} has non-numeric ts"))?;
  let tenant = get("tenant")?;
  let route = get("route")?;
  let model = get("model")?;
  let usd: f64 = get("usd")?.parse().map_err(|_| format!("event {id} has non-numeric usd"))?;
  let prompt_tok: u32 = get("promptTok")?.parse().map_err(|_| format!("event {id} has non-numeric promptTok"))?;
  let comp_tok: u32 = get("compTok")?.parse().map_err(|_| format!("event {id} has non-numeric compTok"))?;
  let status = match get("status")?.as_str()
  {
    "success" => UsageStatus::Success,
    "error" => UsageStatus::Error,
    "denied" => UsageStatus::Denied,
    other => return Err(format!("event {id} has unknown status {other}")),
  };

  let session_id = get("sessionId").ok().filter(|s| !s.is_empty());

  let tags_raw = get("tags").unwrap_or_else(|_| "[]".to_string());
  let tags: Vec<ResolvedTagField> = serde_json::from_str(&tags_raw).map_err(|err| format!("event {id} has malformed tags: {err}"))?;
  let tags = tags.into_iter().map(|t| ResolvedTag { id: TagId::from(t.id), name: t.name, weight: t.weight }).collect();

  Ok(IncomingEvent { stream_id: id.to_string(), ts, tenant, route, model, usd, prompt_tok, comp_tok, status, session_id, tags })
}

#[derive(serde::Deserialize)]
struct ResolvedTagField
{
  id: i64,
  name: String,
  weight: f64,
}
