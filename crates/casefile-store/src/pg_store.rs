//! The `PostgreSQL` store shared by every repository implementation.

use casefile_core::error::DomainError;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Schema migrations, applied at startup and by `#[sqlx::test]`.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// PostgreSQL-backed store implementing every repository trait.
#[derive(Debug, Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Opens a connection pool and applies pending migrations.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the database is unreachable or a
/// migration fails.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, DomainError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(db_error)?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("migration failed: {e}")))?;

    tracing::info!(max_connections, "database pool ready");
    Ok(pool)
}

pub(crate) fn db_error(error: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {error}"))
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
