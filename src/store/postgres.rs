//! Postgres implementation of the store gateway.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Row,
};
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

use super::{AccountChanges, AuditStore, CredentialStore, InsertOutcome, UpdateOutcome};
use crate::auth::models::{AuditLogEntry, PasswordMaterial, UserAccount};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

// SQLSTATE unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open the connection pool.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if missing.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        debug!("Schema applied");
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn db_span(operation: &str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

fn account_from_row(row: &PgRow) -> Result<UserAccount> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;

    Ok(UserAccount {
        username: row.try_get("username")?,
        password: PasswordMaterial::from_stored(row.try_get("password")?),
        role: role.parse().map_err(anyhow::Error::msg)?,
        status: status.parse().map_err(anyhow::Error::msg)?,
    })
}

fn entry_from_row(row: &PgRow) -> Result<AuditLogEntry> {
    let os: Option<String> = row.try_get("os")?;
    let browser: Option<String> = row.try_get("browser")?;

    Ok(AuditLogEntry {
        username: row.try_get("username")?,
        ip: row.try_get("ip")?,
        time: row.try_get("time")?,
        os: os.unwrap_or_else(|| "Unknown".to_string()),
        browser: browser.unwrap_or_else(|| "Unknown".to_string()),
    })
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>> {
        let query = "SELECT username, password, role, status FROM users WHERE username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup user")?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        let query = "SELECT username, password, role, status FROM users ORDER BY username";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to list users")?;

        rows.iter().map(account_from_row).collect()
    }

    async fn count_users(&self) -> Result<u64> {
        let query = "SELECT COUNT(*) AS total FROM users";
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to count users")?;
        let total: i64 = row.try_get("total")?;

        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn insert_user(&self, account: &UserAccount) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO users (username, password, role, status)
            VALUES ($1, $2, $3, $4)
        ";
        let result = sqlx::query(query)
            .bind(&account.username)
            .bind(account.password.as_stored())
            .bind(account.role.as_str())
            .bind(account.status.as_str())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn update_password(&self, username: &str, password: &PasswordMaterial) -> Result<bool> {
        let query = "UPDATE users SET password = $2 WHERE username = $1";
        let result = sqlx::query(query)
            .bind(username)
            .bind(password.as_stored())
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update password")?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_user(&self, username: &str, changes: &AccountChanges) -> Result<UpdateOutcome> {
        let query = r"
            UPDATE users SET
                username = COALESCE($2, username),
                password = COALESCE($3, password),
                role = COALESCE($4, role),
                status = COALESCE($5, status)
            WHERE username = $1
        ";
        let result = sqlx::query(query)
            .bind(username)
            .bind(changes.username.as_deref())
            .bind(changes.password.as_ref().map(PasswordMaterial::as_stored))
            .bind(changes.role.map(|role| role.as_str()))
            .bind(changes.status.map(|status| status.as_str()))
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => Ok(UpdateOutcome::Updated),
            Ok(_) => Ok(UpdateOutcome::NotFound),
            Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
            Err(err) => Err(err).context("failed to update user"),
        }
    }

    async fn delete_user(&self, username: &str) -> Result<bool> {
        let query = "DELETE FROM users WHERE username = $1";
        let result = sqlx::query(query)
            .bind(username)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_temp_users(&self) -> Result<u64> {
        let query = "DELETE FROM users WHERE role = 'temp'";
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete temp users")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        let query = r"
            INSERT INTO logs (username, ip, time, os, browser)
            VALUES ($1, $2, $3, $4, $5)
        ";
        sqlx::query(query)
            .bind(&entry.username)
            .bind(&entry.ip)
            .bind(entry.time)
            .bind(&entry.os)
            .bind(&entry.browser)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert log entry")?;

        Ok(())
    }

    async fn list(&self, username: Option<&str>) -> Result<Vec<AuditLogEntry>> {
        let query = r"
            SELECT username, ip, time, os, browser FROM logs
            WHERE $1::text IS NULL OR username = $1
            ORDER BY time DESC, id DESC
        ";
        let rows = sqlx::query(query)
            .bind(username)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to list log entries")?;

        rows.iter().map(entry_from_row).collect()
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
