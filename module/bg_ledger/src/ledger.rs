//! Durable write side: upserts the tenant, inserts the immutable
//! `UsageLedger` row and one `RequestTag` row per attached tag.

use bg_types::{ RequestTag, ResolvedTag, TenantId, UsageLedgerId, UsageStatus };
use sqlx::{ Row, SqlitePool };

/// A decoded `bg_events` stream entry, ready to persist.
#[derive(Debug, Clone)]
pub struct IncomingEvent
{
  /// The Redis stream entry id this event was decoded from (e.g.
  /// `"1700000000000-0"`), used as `insert`'s dedup key so a consumer
  /// restart that replays the stream from the beginning can't
  /// double-insert an event it has already persisted.
  pub stream_id: String,
  pub ts: i64,
  pub tenant: String,
  pub route: String,
  pub model: String,
  pub usd: f64,
  pub prompt_tok: u32,
  pub comp_tok: u32,
  pub status: UsageStatus,
  pub session_id: Option<String>,
  pub tags: Vec<ResolvedTag>,
}

pub struct LedgerStore
{
  pool: SqlitePool,
}

impl LedgerStore
{
  #[must_use]
  pub fn new(pool: SqlitePool) -> Self
  {
    Self { pool }
  }

  /// Upsert the tenant by name, insert the ledger row and its
  /// `RequestTag` rows, and return the row's id.
  ///
  /// Idempotent on `event.stream_id`: a stream replay (consumer
  /// restart with no persisted cursor) re-delivers entries this store
  /// has already persisted, and `usage_ledger.stream_id` is `UNIQUE`
  /// so the insert becomes a no-op on conflict rather than a duplicate
  /// row. `RequestTag` rows are only written on a genuinely new
  /// insert, mirroring that same "exactly once" guarantee.
  ///
  /// # Errors
  ///
  /// Returns an error if any of the inserts or the conflict-path lookup
  /// fail.
  pub async fn insert(&self, event: &IncomingEvent) -> sqlx::Result<UsageLedgerId>
  {
    let tenant_id = self.upsert_tenant(&event.tenant).await?;

    let result = sqlx::query(
      "INSERT INTO usage_ledger (tenant_id, tenant, route, model, usd, prompt_tokens, completion_tokens, status, session_id, recorded_at, stream_id)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
       ON CONFLICT(stream_id) DO NOTHING",
    )
    .bind(tenant_id.get())
    .bind(&event.tenant)
    .bind(&event.route)
    .bind(&event.model)
    .bind(event.usd)
    .bind(i64::from(event.prompt_tok))
    .bind(i64::from(event.comp_tok))
    .bind(event.status.as_str())
    .bind(&event.session_id)
    .bind(event.ts)
    .bind(&event.stream_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0
    {
      let row = sqlx::query("SELECT id FROM usage_ledger WHERE stream_id = ?1").bind(&event.stream_id).fetch_one(&self.pool).await?;
      return Ok(UsageLedgerId::from(row.get::<i64, _>("id")));
    }

    let ledger_id = UsageLedgerId::from(result.last_insert_rowid());

    for tag in &event.tags
    {
      self.insert_request_tag(&RequestTag { usage_ledger_id: ledger_id, tag_id: tag.id, weight: tag.weight, assigned_by: "header".to_string() }).await?;
    }

    Ok(ledger_id)
  }

  async fn insert_request_tag(&self, request_tag: &RequestTag) -> sqlx::Result<()>
  {
    sqlx::query("INSERT INTO request_tags (usage_ledger_id, tag_id, weight, assigned_by) VALUES (?1, ?2, ?3, ?4)")
      .bind(request_tag.usage_ledger_id.get())
      .bind(request_tag.tag_id.get())
      .bind(request_tag.weight)
      .bind(&request_tag.assigned_by)
      .execute(&self.pool)
      .await?;

    Ok(())
  }

  async fn upsert_tenant(&self, name: &str) -> sqlx::Result<TenantId>
  {
    sqlx::query("INSERT INTO tenants (name) VALUES (?1) ON CONFLICT(name) DO NOTHING").bind(name).execute(&self.pool).await?;

    let row = sqlx::query("SELECT id FROM tenants WHERE name = ?1").bind(name).fetch_one(&self.pool).await?;
    Ok(TenantId::from(row.get::<i64, _>("id")))
  }
}
