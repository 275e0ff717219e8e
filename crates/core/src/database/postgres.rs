//! Postgres database driver
//!
//! Implements the history ledger and script execution over a sqlx connection
//! pool. The ledger table is bootstrapped lazily before the first read or
//! write. Advisory locking uses `pg_advisory_lock` on a dedicated pooled
//! connection, keyed on a stable digest of the locking table name.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Row;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::database::{DatabaseConfig, DatabaseDriver, DatabaseFactory, HistoryRow, Locker};
use crate::error::{MigrateError, MigrateResult};
use crate::script::Direction;

/// Database driver for Postgres targets.
pub struct PostgresDriver {
    pool: PgPool,
    history_table: String,
    locking_table: Option<String>,
    username: String,
    ensured: bool,
    locked: bool,
    lock_conn: Option<PoolConnection<Postgres>>,
}

impl PostgresDriver {
    /// Connect with the given configuration.
    pub async fn connect(config: DatabaseConfig) -> MigrateResult<PostgresDriver> {
        let username = config.url.username().to_string();
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(config.url.as_str())
            .await?;

        Ok(PostgresDriver {
            pool,
            history_table: config.history_table,
            locking_table: config.locking_table,
            username,
            ensured: false,
            locked: false,
            lock_conn: None,
        })
    }

    /// Wrap an existing pool, for callers that manage their own connections.
    pub fn with_pool(pool: PgPool, config: DatabaseConfig) -> PostgresDriver {
        PostgresDriver {
            pool,
            history_table: config.history_table,
            locking_table: config.locking_table,
            username: config.url.username().to_string(),
            ensured: false,
            locked: false,
            lock_conn: None,
        }
    }

    async fn ensure_history_table(&mut self) -> MigrateResult<()> {
        if self.ensured {
            return Ok(());
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                rank BIGSERIAL PRIMARY KEY,\n    \
                mode VARCHAR(3) NOT NULL,\n    \
                version VARCHAR(255) NOT NULL,\n    \
                script_name VARCHAR(255) NOT NULL,\n    \
                description VARCHAR(255) NOT NULL DEFAULT '',\n    \
                checksum VARCHAR(64) NOT NULL DEFAULT '',\n    \
                applied_by VARCHAR(255) NOT NULL DEFAULT '',\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),\n    \
                execution_time BIGINT NOT NULL DEFAULT 0,\n    \
                success BOOLEAN NOT NULL DEFAULT FALSE\n\
            )",
            self.history_table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        tracing::debug!(table = %self.history_table, "history table ready");

        self.ensured = true;
        Ok(())
    }

    fn lock_key(&self) -> i64 {
        let name = self.locking_table.as_deref().unwrap_or_default();
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        i64::from_be_bytes(bytes)
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    async fn read(&mut self) -> MigrateResult<Vec<HistoryRow>> {
        self.ensure_history_table().await?;

        let query = format!(
            "SELECT DISTINCT ON (version, mode) \
                rank, mode, version, script_name, description, checksum, \
                applied_by, applied_at, execution_time, success \
            FROM {} ORDER BY version, mode, rank DESC",
            self.history_table
        );

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let mode: String = row.try_get("mode")?;
            let mode = Direction::from_mode(&mode)
                .ok_or_else(|| MigrateError::Database(format!("unknown ledger mode '{}'", mode)))?;

            history.push(HistoryRow {
                rank: Some(row.try_get("rank")?),
                mode,
                version: row.try_get("version")?,
                script_name: row.try_get("script_name")?,
                description: row.try_get("description")?,
                checksum: row.try_get("checksum")?,
                applied_by: row.try_get("applied_by")?,
                applied_at: row.try_get("applied_at")?,
                execution_time_ms: row.try_get("execution_time")?,
                success: row.try_get("success")?,
            });
        }

        Ok(history)
    }

    async fn write(&mut self, row: &mut HistoryRow) -> MigrateResult<()> {
        self.ensure_history_table().await?;

        if row.applied_by.is_empty() {
            row.applied_by = self.username.clone();
        }

        match row.rank {
            None => {
                let query = format!(
                    "INSERT INTO {} \
                        (mode, version, script_name, description, checksum, \
                         applied_by, applied_at, execution_time, success) \
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING rank",
                    self.history_table
                );
                let rank: i64 = sqlx::query_scalar(&query)
                    .bind(row.mode.as_str())
                    .bind(&row.version)
                    .bind(&row.script_name)
                    .bind(&row.description)
                    .bind(&row.checksum)
                    .bind(&row.applied_by)
                    .bind(row.applied_at)
                    .bind(row.execution_time_ms)
                    .bind(row.success)
                    .fetch_one(&self.pool)
                    .await?;
                row.rank = Some(rank);
            }
            Some(rank) => {
                let query = format!(
                    "INSERT INTO {} \
                        (rank, mode, version, script_name, description, checksum, \
                         applied_by, applied_at, execution_time, success) \
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                    ON CONFLICT (rank) DO UPDATE SET \
                        mode = EXCLUDED.mode, version = EXCLUDED.version, \
                        script_name = EXCLUDED.script_name, description = EXCLUDED.description, \
                        checksum = EXCLUDED.checksum, applied_by = EXCLUDED.applied_by, \
                        applied_at = EXCLUDED.applied_at, execution_time = EXCLUDED.execution_time, \
                        success = EXCLUDED.success",
                    self.history_table
                );
                sqlx::query(&query)
                    .bind(rank)
                    .bind(row.mode.as_str())
                    .bind(&row.version)
                    .bind(&row.script_name)
                    .bind(&row.description)
                    .bind(&row.checksum)
                    .bind(&row.applied_by)
                    .bind(row.applied_at)
                    .bind(row.execution_time_ms)
                    .bind(row.success)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    async fn run(&mut self, sql: &str) -> MigrateResult<()> {
        for statement in split_statements(sql) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn purge(&mut self) -> Vec<MigrateError> {
        let mut errors = Vec::new();

        let tables: Vec<String> = match sqlx::query_scalar(
            "SELECT tablename FROM pg_tables WHERE schemaname = current_schema()",
        )
        .fetch_all(&self.pool)
        .await
        {
            Ok(tables) => tables,
            Err(e) => return vec![e.into()],
        };

        for table in tables {
            let drop = format!("DROP TABLE IF EXISTS {} CASCADE", table);
            if let Err(e) = sqlx::query(&drop).execute(&self.pool).await {
                errors.push(MigrateError::Database(format!(
                    "failed to drop {}: {}",
                    table, e
                )));
            }
        }

        self.ensured = false;
        errors
    }

    async fn close(&mut self) -> MigrateResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn locker(&mut self) -> Option<&mut dyn Locker> {
        if self.locking_table.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl Locker for PostgresDriver {
    async fn lock(&mut self) -> MigrateResult<()> {
        if !self.lockable() {
            return Err(MigrateError::Database("advisory locking is disabled".to_string()));
        }
        if self.locked {
            return Ok(());
        }

        // advisory locks are session-scoped, so the lock must live on one
        // dedicated connection until unlock
        let key = self.lock_key();
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(&mut *conn)
            .await?;

        self.lock_conn = Some(conn);
        self.locked = true;
        Ok(())
    }

    async fn unlock(&mut self) -> MigrateResult<()> {
        let Some(mut conn) = self.lock_conn.take() else {
            return Ok(());
        };

        let key = self.lock_key();
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .execute(&mut *conn)
            .await?;

        self.locked = false;
        Ok(())
    }

    fn locked(&self) -> bool {
        self.locked
    }

    fn lockable(&self) -> bool {
        self.locking_table.is_some()
    }
}

/// Factory for the `postgres://` scheme.
pub struct PostgresFactory;

#[async_trait]
impl DatabaseFactory for PostgresFactory {
    fn scheme(&self) -> &'static str {
        "postgres"
    }

    async fn open(&self, config: DatabaseConfig) -> MigrateResult<Box<dyn DatabaseDriver>> {
        Ok(Box::new(PostgresDriver::connect(config).await?))
    }
}

/// Split script text into executable statements using proper SQL parsing,
/// falling back to naive semicolon splitting when parsing fails.
fn split_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => statements.into_iter().map(|s| format!("{};", s)).collect(),
        Err(e) => {
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}
