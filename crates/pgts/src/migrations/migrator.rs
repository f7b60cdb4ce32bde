//! Applies migrations and tracks which ones have run.

use tokio_postgres::Transaction;
use tracing::{debug, info};

use crate::error::{MigrationError, StorageResult, pg_error};

use super::Migration;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS pgts_migrations (
    name TEXT PRIMARY KEY,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const IS_APPLIED_SQL: &str = "SELECT EXISTS (SELECT 1 FROM pgts_migrations WHERE name = $1)";

/// Advisory lock key held while a migration is applied or reverted.
const MIGRATION_LOCK_KEY: i64 = 0x7067_7473;

/// Applies and reverts [`Migration`]s against one database.
///
/// Applied migration names are kept in the `pgts_migrations` table. Apply and
/// revert hold a transaction-scoped advisory lock, so concurrent runs of the
/// same migration execute its SQL once.
#[derive(Debug, Default, Clone, Copy)]
pub struct Migrator;

impl Migrator {
    /// Creates the bookkeeping table if it does not exist yet.
    pub async fn ensure_table(client: &deadpool_postgres::Client) -> StorageResult<()> {
        client
            .execute(CREATE_TABLE_SQL, &[])
            .await
            .map_err(|e| pg_error("Failed to create pgts_migrations table", e))?;
        Ok(())
    }

    /// Takes the migration lock and reports whether `name` is recorded.
    async fn lock_and_check(tx: &Transaction<'_>, name: &str) -> StorageResult<bool> {
        tx.execute("SELECT pg_advisory_xact_lock($1)", &[&MIGRATION_LOCK_KEY])
            .await
            .map_err(|e| pg_error("Failed to take migration lock", e))?;
        tx.execute(CREATE_TABLE_SQL, &[])
            .await
            .map_err(|e| pg_error("Failed to create pgts_migrations table", e))?;
        let row = tx
            .query_one(IS_APPLIED_SQL, &[&name])
            .await
            .map_err(|e| pg_error("Failed to query pgts_migrations", e))?;
        Ok(row.get(0))
    }

    /// Names of applied migrations, oldest first.
    pub async fn applied(client: &deadpool_postgres::Client) -> StorageResult<Vec<String>> {
        Self::ensure_table(client).await?;
        let rows = client
            .query(
                "SELECT name FROM pgts_migrations ORDER BY applied_at, name",
                &[],
            )
            .await
            .map_err(|e| pg_error("Failed to list applied migrations", e))?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    /// Whether `name` has been applied.
    pub async fn is_applied(client: &deadpool_postgres::Client, name: &str) -> StorageResult<bool> {
        Self::ensure_table(client).await?;
        let row = client
            .query_one(IS_APPLIED_SQL, &[&name])
            .await
            .map_err(|e| pg_error("Failed to query pgts_migrations", e))?;
        Ok(row.get(0))
    }

    /// Applies `migration` in one transaction.
    ///
    /// Returns `false` without touching the schema when it was already applied,
    /// including when another connection applied it while this one waited
    /// for the lock.
    pub async fn apply(
        client: &mut deadpool_postgres::Client,
        migration: &Migration,
    ) -> StorageResult<bool> {
        if migration.operations.is_empty() {
            return Err(MigrationError::Empty {
                name: migration.name.clone(),
            }
            .into());
        }
        let statements = migration.forwards_sql()?;

        let tx = client
            .transaction()
            .await
            .map_err(|e| pg_error("Failed to start migration transaction", e))?;

        if Self::lock_and_check(&tx, &migration.name).await? {
            info!(migration = %migration.name, "Migration already applied, skipping");
            return Ok(false);
        }

        for (operation, sql) in migration.operations.iter().zip(&statements) {
            debug!(migration = %migration.name, sql = %sql, "{}", operation.describe());
            tx.execute(sql.as_str(), &[])
                .await
                .map_err(|e| pg_error(&operation.describe(), e))?;
        }

        tx.execute(
            "INSERT INTO pgts_migrations (name) VALUES ($1)",
            &[&migration.name],
        )
        .await
        .map_err(|e| pg_error("Failed to record migration", e))?;

        tx.commit()
            .await
            .map_err(|e| pg_error("Failed to commit migration", e))?;

        info!(
            migration = %migration.name,
            operations = migration.operations.len(),
            "Applied migration"
        );
        Ok(true)
    }

    /// Reverts an applied `migration`, undoing operations in reverse order.
    pub async fn unapply(
        client: &mut deadpool_postgres::Client,
        migration: &Migration,
    ) -> StorageResult<()> {
        let statements = migration.backwards_sql()?;

        let tx = client
            .transaction()
            .await
            .map_err(|e| pg_error("Failed to start migration transaction", e))?;

        if !Self::lock_and_check(&tx, &migration.name).await? {
            return Err(MigrationError::NotApplied {
                name: migration.name.clone(),
            }
            .into());
        }

        for sql in &statements {
            debug!(migration = %migration.name, sql = %sql, "Reverting operation");
            tx.execute(sql.as_str(), &[])
                .await
                .map_err(|e| pg_error("Failed to revert operation", e))?;
        }

        tx.execute(
            "DELETE FROM pgts_migrations WHERE name = $1",
            &[&migration.name],
        )
        .await
        .map_err(|e| pg_error("Failed to remove migration record", e))?;

        tx.commit()
            .await
            .map_err(|e| pg_error("Failed to commit migration", e))?;

        info!(migration = %migration.name, "Reverted migration");
        Ok(())
    }
}
