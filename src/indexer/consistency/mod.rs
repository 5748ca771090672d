// Artifact consistency validation
// Ensures the metadata table, vector index, and manifest agree


use anyhow::Result;
use tracing::{debug, info, warn};

use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;

/// Result of checking the artifacts against each other.
///
/// A row-count disagreement means every retrieval result is silently wrong,
/// so an inconsistent report must fail a build rather than be logged away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Number of rows in the metadata table
    pub metadata_rows: usize,
    /// Number of vectors in the index
    pub index_vectors: usize,
    /// Embedding model recorded in the manifest, if any
    pub manifest_model: Option<String>,
    /// Human-readable descriptions of each problem found
    pub issues: Vec<String>,
    /// Overall consistency status
    pub is_consistent: bool,
}

/// Performs consistency validation between the metadata and vector artifacts
pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    vector_store: &'a VectorStore,
}

impl<'a> ConsistencyValidator<'a> {
    /// Create a new consistency validator
    #[inline]
    pub fn new(database: &'a Database, vector_store: &'a VectorStore) -> Self {
        Self {
            database,
            vector_store,
        }
    }

    /// Perform a full consistency check across both artifacts and the manifest
    #[inline]
    pub async fn validate(&self) -> Result<ConsistencyReport> {
        debug!("Starting artifact consistency validation");

        let metadata_rows = self.database.count_reviews().await? as usize;
        let index_vectors = self.vector_store.count_vectors().await? as usize;
        let manifest = self.database.get_manifest().await?;

        let mut issues = Vec::new();

        if metadata_rows != index_vectors {
            issues.push(format!(
                "Metadata has {} rows but the index has {} vectors",
                metadata_rows, index_vectors
            ));
        }

        match &manifest {
            None => {
                if metadata_rows > 0 || index_vectors > 0 {
                    issues.push("Artifacts exist but no index manifest was recorded".to_string());
                }
            }
            Some(manifest) => {
                if manifest.embedding_model.trim().is_empty() {
                    issues.push("Manifest does not record an embedding model".to_string());
                }

                if manifest.row_count as usize != metadata_rows {
                    issues.push(format!(
                        "Manifest records {} rows but metadata has {}",
                        manifest.row_count, metadata_rows
                    ));
                }

                if let Some(dimension) = self.vector_store.dimension() {
                    if manifest.vector_dimension as usize != dimension {
                        issues.push(format!(
                            "Manifest records dimension {} but the index stores {}-dimensional vectors",
                            manifest.vector_dimension, dimension
                        ));
                    }
                }
            }
        }

        let is_consistent = issues.is_empty();
        let report = ConsistencyReport {
            metadata_rows,
            index_vectors,
            manifest_model: manifest.map(|m| m.embedding_model),
            issues,
            is_consistent,
        };

        if report.is_consistent {
            info!(
                "Artifact consistency validation passed ({} rows)",
                report.metadata_rows
            );
        } else {
            warn!("Artifact consistency validation found issues:");
            for issue in &report.issues {
                warn!("  - {}", issue);
            }
        }

        Ok(report)
    }
}
