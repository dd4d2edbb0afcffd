//! Schema migrations.
//!
//! One guard table per migration, checked before the migration runs, so
//! re-running `apply` against an already-migrated database is a no-op
//! rather than a destructive re-create.

use sqlx::SqlitePool;

struct Migration
{
  guard_table: &'static str,
  sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
  guard_table: "_migration_001_completed",
  sql: include_str!("../migrations/001_initial_schema.sql"),
}];

/// Apply every migration that hasn't already run against `pool`.
///
/// # Errors
///
/// Returns an error if a migration statement fails or the guard-table
/// check itself fails (database unreachable).
pub async fn apply(pool: &SqlitePool) -> sqlx::Result<()>
{
  for migration in MIGRATIONS
  {
    let already_applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")
      .bind(migration.guard_table)
      .fetch_one(pool)
      .await?;

    if already_applied > 0
    {
      continue;
    }

    sqlx::raw_sql(migration.sql).execute(pool).await?;
    sqlx::raw_sql(&format!("CREATE TABLE {} (applied_at INTEGER)", migration.guard_table)).execute(pool).await?;
  }

  Ok(())
}

#[cfg(test)]
mod tests
{
  use super::*;
  use sqlx::sqlite::SqlitePoolOptions;

  #[tokio::test]
  async fn apply_creates_expected_tables()
  {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    apply(&pool).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table'")
      .fetch_all(&pool)
      .await
      .unwrap();

    for expected in ["tenants", "api_keys", "model_pricing", "budgets", "tags", "tag_budgets", "usage_ledger", "request_tags"]
    {
      assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
    }
  }

  #[tokio::test]
  async fn apply_is_idempotent()
  {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    apply(&pool).await.unwrap();
    apply(&pool).await.unwrap();
  }
}
