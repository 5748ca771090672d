use anyhow::{Context, Result, bail};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{IndexManifest, NewReviewRow, ReviewRow};
use crate::database::sqlite::queries::{ManifestQueries, ReviewQueries};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// Metadata store for the review corpus.
///
/// Holds the review table (original fields plus the derived combined_text
/// column) and the index manifest. Written once per corpus build, read-only
/// at query time.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open the metadata database, creating it and running migrations if it
    /// does not exist yet. Used by the index builder.
    pub async fn create<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        if let Some(parent) = database_path.as_ref().parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create metadata directory: {}",
                    parent.display()
                )
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    /// Open an existing metadata database without creating or migrating it.
    ///
    /// Used at query time: a missing artifact must surface as a load error,
    /// not silently become an empty database.
    pub async fn open_existing<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();
        if !path.exists() {
            bail!("Metadata database does not exist: {}", path.display());
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open metadata database: {}", path.display()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Verify that the review table carries the columns retrieval depends on.
    ///
    /// The combined_text check is a correctness gate: searching an index whose
    /// metadata lacks the embedded text would return garbage positions.
    pub async fn verify_review_schema(&self) -> Result<()> {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('reviews')")
                .fetch_all(&self.pool)
                .await
                .context("Failed to inspect review table schema")?;

        if columns.is_empty() {
            bail!("Metadata database has no 'reviews' table");
        }

        if !columns.iter().any(|c| c == "combined_text") {
            bail!("Metadata table 'reviews' is missing the 'combined_text' column");
        }

        Ok(())
    }

    // Review operations
    pub async fn replace_reviews(&self, rows: &[NewReviewRow]) -> Result<()> {
        ReviewQueries::replace_all(&self.pool, rows).await
    }

    pub async fn load_reviews(&self) -> Result<Vec<ReviewRow>> {
        ReviewQueries::list_all(&self.pool).await
    }

    pub async fn count_reviews(&self) -> Result<i64> {
        ReviewQueries::count(&self.pool).await
    }

    // Manifest operations
    pub async fn save_manifest(&self, manifest: &IndexManifest) -> Result<()> {
        ManifestQueries::upsert(&self.pool, manifest).await
    }

    pub async fn get_manifest(&self) -> Result<Option<IndexManifest>> {
        ManifestQueries::get(&self.pool).await
    }

    /// Optimize database performance by running VACUUM and ANALYZE
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing database performance");

        // Run VACUUM to reclaim space and defragment
        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .context("Failed to vacuum database")?;

        // Run ANALYZE to update table statistics for better query planning
        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .context("Failed to analyze database")?;

        debug!("Database optimization completed");
        Ok(())
    }
}
