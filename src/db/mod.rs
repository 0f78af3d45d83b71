//! Database connection pool, migrations, and document query execution.
//!
//! Shared Postgres connection pool used by the experiment store and the
//! work-queue claimer.

pub mod claim;
pub mod query;

use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::Result;
use crate::filter::{bind_params, SqlParam};
use crate::model::Experiment;

/// Database handle. Owns the connection pool shared across all modules.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Execute a document query and decode each row's single jsonb column.
    ///
    /// The query text is expected to come from
    /// [`query::experiment_document_query`]; `params` bind positionally in
    /// order, starting at `$1`.
    pub async fn fetch_documents(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<Experiment>> {
        let query = sqlx::query_scalar::<_, Json<Experiment>>(sql);
        let rows = bind_params(query, params).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    /// Get a reference to the connection pool (for submodules).
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
