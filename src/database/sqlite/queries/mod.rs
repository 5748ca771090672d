
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::{IndexManifest, NewReviewRow, ReviewRow};

pub struct ReviewQueries;

impl ReviewQueries {
    /// Replace the entire review table in a single transaction, assigning
    /// row_id 0..n in input order. There is no incremental update path: the
    /// corpus is rebuilt from scratch or not at all.
    #[inline]
    pub async fn replace_all(pool: &SqlitePool, rows: &[NewReviewRow]) -> Result<()> {
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM reviews")
            .execute(&mut *tx)
            .await
            .context("Failed to clear review table")?;

        for (row_id, row) in rows.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO reviews (
                    row_id, drug_name, condition, gender, age_group,
                    time_on_drug, rating_overall, review_text, combined_text
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row_id as i64)
            .bind(&row.drug_name)
            .bind(&row.condition)
            .bind(&row.gender)
            .bind(&row.age_group)
            .bind(&row.time_on_drug)
            .bind(row.rating_overall)
            .bind(&row.review_text)
            .bind(&row.combined_text)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert review row {}", row_id))?;
        }

        tx.commit().await.context("Failed to commit review rows")?;

        debug!("Replaced review table with {} rows", rows.len());
        Ok(())
    }

    /// Load every review in row order.
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ReviewRow>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT row_id, drug_name, condition, gender, age_group,
                   time_on_drug, rating_overall, review_text, combined_text
            FROM reviews
            ORDER BY row_id
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to load review rows")?;

        Ok(rows)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
            .fetch_one(pool)
            .await
            .context("Failed to count review rows")?;

        Ok(count)
    }
}

pub struct ManifestQueries;

impl ManifestQueries {
    #[inline]
    pub async fn upsert(pool: &SqlitePool, manifest: &IndexManifest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_manifest (id, embedding_model, vector_dimension, row_count, built_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                embedding_model = excluded.embedding_model,
                vector_dimension = excluded.vector_dimension,
                row_count = excluded.row_count,
                built_at = excluded.built_at
            "#,
        )
        .bind(&manifest.embedding_model)
        .bind(manifest.vector_dimension)
        .bind(manifest.row_count)
        .bind(&manifest.built_at)
        .execute(pool)
        .await
        .context("Failed to save index manifest")?;

        Ok(())
    }

    #[inline]
    pub async fn get(pool: &SqlitePool) -> Result<Option<IndexManifest>> {
        let manifest = sqlx::query_as::<_, IndexManifest>(
            "SELECT embedding_model, vector_dimension, row_count, built_at FROM index_manifest WHERE id = 1",
        )
        .fetch_optional(pool)
        .await
        .context("Failed to load index manifest")?;

        Ok(manifest)
    }
}

/// Build a manifest stamped with the current time.
#[inline]
pub fn new_manifest(embedding_model: &str, vector_dimension: usize, row_count: usize) -> IndexManifest {
    IndexManifest {
        embedding_model: embedding_model.to_string(),
        vector_dimension: vector_dimension as i64,
        row_count: row_count as i64,
        built_at: Utc::now().to_rfc3339(),
    }
}
