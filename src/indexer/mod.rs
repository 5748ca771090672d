// Indexer module
// Turns a review corpus into the vector index and metadata artifacts

pub mod consistency;


use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::ReviewRecord;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::NewReviewRow;
use crate::database::sqlite::queries::new_manifest;
use crate::embeddings::ollama::OllamaClient;
use crate::{RagError, Result};

pub use consistency::{ConsistencyReport, ConsistencyValidator};

/// Builds the two durable artifacts — vector index and metadata table — from
/// an in-memory corpus.
///
/// Both artifacts are written from the same record slice in the same order,
/// which is what guarantees that vector *i* is the embedding of metadata row
/// *i*. Rebuilding replaces both artifacts wholesale; there is no
/// incremental path.
pub struct IndexBuilder {
    config: Config,
    database: Database,
    vector_store: VectorStore,
    ollama_client: OllamaClient,
}

/// Statistics about a completed index build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    pub records_indexed: usize,
    pub vector_dimension: usize,
    pub embedding_batches: usize,
}

impl IndexBuilder {
    /// Create a new index builder
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let metadata_path = config
            .metadata_path()
            .map_err(|e| RagError::Config(format!("Failed to resolve metadata path: {:#}", e)))?;
        let database = Database::create(&metadata_path)
            .await
            .map_err(|e| RagError::Database(format!("{:#}", e)))?;

        let index_path = config.vector_index_path().map_err(|e| {
            RagError::Config(format!("Failed to resolve vector index path: {:#}", e))
        })?;
        let vector_store = VectorStore::create(&index_path).await?;

        let ollama_client = OllamaClient::new(&config)
            .map_err(|e| RagError::Embedding(format!("Failed to create Ollama client: {:#}", e)))?;

        Ok(Self {
            config,
            database,
            vector_store,
            ollama_client,
        })
    }

    /// Embed every record and persist both artifacts.
    ///
    /// Idempotent: the same records and the same model produce an identical
    /// metadata table and a search-equivalent index on every run.
    #[inline]
    pub async fn build(&mut self, records: &[ReviewRecord]) -> Result<IndexingStats> {
        if records.is_empty() {
            return Err(RagError::Schema(
                "Corpus contains no records; refusing to build an empty index".to_string(),
            ));
        }

        info!("Building index for {} review records", records.len());

        let combined_texts: Vec<String> =
            records.iter().map(ReviewRecord::combined_text).collect();

        let embeddings = self.embed_corpus(&combined_texts)?;
        let vector_dimension = embeddings[0].len();

        if vector_dimension != self.config.ollama.embedding_dimension as usize {
            warn!(
                "Model produced {}-dimensional vectors but config expects {}; using the model's dimension",
                vector_dimension, self.config.ollama.embedding_dimension
            );
        }

        // Metadata and vectors are written from the same slice in the same
        // order; this is the only place the correspondence invariant is
        // established
        let rows: Vec<NewReviewRow> = records.iter().map(NewReviewRow::from_record).collect();
        self.database
            .replace_reviews(&rows)
            .await
            .map_err(|e| RagError::Database(format!("Failed to write metadata rows: {:#}", e)))?;

        self.vector_store.replace_vectors(&embeddings).await?;

        let manifest = new_manifest(
            self.ollama_client.model(),
            vector_dimension,
            records.len(),
        );
        self.database
            .save_manifest(&manifest)
            .await
            .map_err(|e| RagError::Database(format!("Failed to write index manifest: {:#}", e)))?;

        let validator = ConsistencyValidator::new(&self.database, &self.vector_store);
        let report = validator
            .validate()
            .await
            .map_err(|e| RagError::Database(format!("Consistency validation failed: {:#}", e)))?;
        if !report.is_consistent {
            return Err(RagError::Database(format!(
                "Artifacts are inconsistent after build: {}",
                report.issues.join("; ")
            )));
        }

        // Housekeeping only; a failure here does not invalidate the build
        if let Err(e) = self.vector_store.optimize().await {
            warn!("Failed to optimize vector index: {}", e);
        }
        if let Err(e) = self.database.optimize().await {
            warn!("Failed to optimize metadata database: {:#}", e);
        }

        let stats = IndexingStats {
            records_indexed: records.len(),
            vector_dimension,
            embedding_batches: combined_texts
                .len()
                .div_ceil(self.config.ollama.batch_size as usize),
        };

        info!(
            "Index build complete: {} records, {} dimensions",
            stats.records_indexed, stats.vector_dimension
        );

        Ok(stats)
    }

    /// Batch-embed the combined texts, reporting progress per batch
    fn embed_corpus(&self, combined_texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.ollama.batch_size as usize;
        let progress = ProgressBar::new(combined_texts.len() as u64);
        progress.set_message("Generating embeddings");

        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(combined_texts.len());
        for chunk in combined_texts.chunks(batch_size) {
            let batch = self.ollama_client.embed_texts(chunk).map_err(|e| {
                RagError::Embedding(format!("Failed to generate embeddings: {:#}", e))
            })?;
            embeddings.extend(batch);
            progress.inc(chunk.len() as u64);
        }
        progress.finish_and_clear();

        // Cross-batch dimension check; per-batch checks live in the client
        if let Some(first) = embeddings.first() {
            let dimension = first.len();
            if let Some(bad) = embeddings.iter().position(|v| v.len() != dimension) {
                return Err(RagError::Embedding(format!(
                    "Inconsistent embedding dimensions across batches: vector {} has {}, expected {}",
                    bad,
                    embeddings[bad].len(),
                    dimension
                )));
            }
        }

        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }
}
