//! # Database Module
//!
//! Pooled storage handle over SQLx for PostgreSQL and SQLite.
//!
//! The handle is created once by the bootstrapper and cloned into every
//! handler. Queries are written once with `$N` placeholders, which both
//! engines accept, and run on whichever pool is active through
//! [`with_pool!`](crate::with_pool).

use crate::error::{Error, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Run the same SQLx expression against whichever pool is active
///
/// ```ignore
/// let rows = with_pool!(&db, pool => sqlx::query("SELECT 1").execute(pool).await)?;
/// ```
#[macro_export]
macro_rules! with_pool {
    ($db:expr, $pool:ident => $body:expr) => {
        match $db {
            $crate::database::DatabasePool::Sqlite($pool) => $body,
            $crate::database::DatabasePool::Postgres($pool) => $body,
        }
    };
}

/// Database connection pool supporting multiple backends
#[derive(Clone, Debug)]
pub enum DatabasePool {
    /// SQLite connection pool
    Sqlite(SqlitePool),
    /// PostgreSQL connection pool
    Postgres(PgPool),
}

impl DatabasePool {
    /// Connect to a SQLite database from prepared options
    pub async fn connect_sqlite_with(
        options: SqliteConnectOptions,
        max_connections: Option<u32>,
    ) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(10))
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage {
                message: format!("SQLite connection failed: {e}"),
            })?;

        Ok(Self::Sqlite(pool))
    }

    /// Connect to a PostgreSQL database from prepared options
    pub async fn connect_postgres_with(
        options: PgConnectOptions,
        max_connections: Option<u32>,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.unwrap_or(10))
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage {
                message: format!("PostgreSQL connection failed: {e}"),
            })?;

        Ok(Self::Postgres(pool))
    }

    /// Execute a statement without parameters (DDL, maintenance)
    ///
    /// Returns the number of affected rows.
    pub async fn execute(&self, query: &str) -> Result<u64> {
        with_pool!(self, pool => {
            sqlx::query(query)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
        })
        .map_err(|e| storage_error("Query error", &e))
    }

    /// Round-trip a trivial query to prove the pool can reach the engine
    pub async fn ping(&self) -> Result<()> {
        with_pool!(self, pool => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()))
            .map_err(|e| storage_error("Connectivity check failed", &e))
    }

    /// Engine name for logs
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
        }
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
    }
}

/// First row of a `RETURNING` write read with `fetch_all`
///
/// Writes must be driven to completion: SQLite only commits a `RETURNING`
/// statement once every row has been stepped, so `fetch_one`/`fetch_optional`
/// can leave the change invisible to other pool connections.
pub fn returned_row<T>(rows: Vec<T>) -> Option<T> {
    rows.into_iter().next()
}

/// Wrap a driver error into a storage error prefixed with the operation
pub fn storage_error(operation: &str, err: &sqlx::Error) -> Error {
    Error::storage(format!("{operation}: {err}"))
}

/// Whether the driver reported a unique-constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Whether the driver reported a foreign-key violation
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Whether the driver reported a check-constraint violation
pub fn is_check_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_check_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    async fn memory_pool() -> DatabasePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        DatabasePool::connect_sqlite_with(options, Some(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_memory_connection() {
        let pool = memory_pool().await;
        assert_eq!(pool.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_sqlite_ping() {
        let pool = memory_pool().await;
        assert!(pool.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_sqlite_create_table() {
        let pool = memory_pool().await;

        let result = pool
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unique_violation_detected() {
        let pool = memory_pool().await;
        pool.execute("CREATE TABLE tags (code TEXT PRIMARY KEY)")
            .await
            .unwrap();
        pool.execute("INSERT INTO tags VALUES ('a')").await.unwrap();

        let err = with_pool!(&pool, p => {
            sqlx::query("INSERT INTO tags (code) VALUES ($1)")
                .bind("a")
                .execute(p)
                .await
                .map(|r| r.rows_affected())
        })
        .unwrap_err();

        assert!(is_unique_violation(&err));
        assert!(!is_foreign_key_violation(&err));
    }

    #[tokio::test]
    async fn test_execute_reports_query_errors() {
        let pool = memory_pool().await;
        let err = pool.execute("SELECT * FROM missing").await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert!(err.to_string().starts_with("Query error"));
    }
}
