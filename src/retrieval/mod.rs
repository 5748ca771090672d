// Retrieval module
// Query-time pipeline: load artifacts, embed, search, assemble context


use tracing::{debug, info};

use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::ReviewRow;
use crate::embeddings::estimate_token_count;
use crate::embeddings::ollama::OllamaClient;
use crate::generation::{CompletionClient, answer_prompt};
use crate::{RagError, Result};

/// Default number of reviews retrieved per query
pub const DEFAULT_TOP_K: usize = 5;

/// One retrieved review: its corpus position, distance to the query, and the
/// combined text that was embedded. Ephemeral — built per query, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredReview {
    pub position: usize,
    pub distance: f32,
    pub combined_text: String,
}

/// Query-time retrieval over the built artifacts.
///
/// Loads the metadata table fully into memory and opens the vector index
/// once; after that the engine is read-only and can be shared freely across
/// concurrent queries. Every load-time gate lives in `open` so a query
/// against mismatched or corrupt artifacts fails before any search runs.
pub struct RetrievalEngine {
    vector_store: VectorStore,
    ollama_client: OllamaClient,
    reviews: Vec<ReviewRow>,
    embedding_model: String,
    max_context_tokens: usize,
    answer_max_tokens: u32,
    answer_temperature: f32,
}

impl RetrievalEngine {
    /// Open both artifacts and validate them against each other.
    ///
    /// Fails with `IndexLoad` when the vector index is missing or was built
    /// with a different embedding model than the one configured, and with
    /// `MetadataLoad` when the metadata database is missing, unreadable, or
    /// lacks the combined_text column.
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        let metadata_path = config
            .metadata_path()
            .map_err(|e| RagError::Config(format!("Failed to resolve metadata path: {:#}", e)))?;

        let database = Database::open_existing(&metadata_path).await.map_err(|e| {
            RagError::MetadataLoad(format!(
                "Failed to open metadata database {}: {:#}",
                metadata_path.display(),
                e
            ))
        })?;

        // Correctness gate, not an incidental validation: positions from the
        // index are only meaningful against rows that carry the embedded text
        database.verify_review_schema().await.map_err(|e| {
            RagError::MetadataLoad(format!(
                "Metadata database {} failed schema check: {:#}",
                metadata_path.display(),
                e
            ))
        })?;

        let reviews = database.load_reviews().await.map_err(|e| {
            RagError::MetadataLoad(format!("Failed to read review rows: {:#}", e))
        })?;

        let manifest = database
            .get_manifest()
            .await
            .map_err(|e| RagError::MetadataLoad(format!("Failed to read index manifest: {:#}", e)))?
            .ok_or_else(|| {
                RagError::IndexLoad(
                    "No index manifest recorded; run a corpus build before querying".to_string(),
                )
            })?;

        if manifest.embedding_model != config.ollama.model {
            return Err(RagError::IndexLoad(format!(
                "Index was built with embedding model '{}' but '{}' is configured; \
                 rebuild the index or restore the original model",
                manifest.embedding_model, config.ollama.model
            )));
        }

        let index_path = config.vector_index_path().map_err(|e| {
            RagError::Config(format!("Failed to resolve vector index path: {:#}", e))
        })?;
        let vector_store = VectorStore::open(&index_path).await?;

        let vector_count = vector_store.count_vectors().await? as usize;
        if vector_count != reviews.len() {
            return Err(RagError::IndexLoad(format!(
                "Index holds {} vectors but metadata has {} rows; the artifacts are out of sync",
                vector_count,
                reviews.len()
            )));
        }

        if manifest.row_count as usize != reviews.len() {
            return Err(RagError::IndexLoad(format!(
                "Manifest records {} rows but metadata has {}; the artifacts are out of sync",
                manifest.row_count,
                reviews.len()
            )));
        }

        if let Some(dimension) = vector_store.dimension() {
            if manifest.vector_dimension as usize != dimension {
                return Err(RagError::IndexLoad(format!(
                    "Manifest records dimension {} but the index stores {}-dimensional vectors",
                    manifest.vector_dimension, dimension
                )));
            }
        }

        let ollama_client = OllamaClient::new(config)
            .map_err(|e| RagError::Embedding(format!("Failed to create Ollama client: {:#}", e)))?;

        info!(
            "Retrieval engine ready: {} reviews, model {}",
            reviews.len(),
            manifest.embedding_model
        );

        Ok(Self {
            vector_store,
            ollama_client,
            reviews,
            embedding_model: manifest.embedding_model,
            max_context_tokens: config.generation.max_context_tokens,
            answer_max_tokens: config.generation.max_tokens,
            answer_temperature: config.generation.temperature,
        })
    }

    /// Number of reviews available for retrieval
    #[inline]
    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }

    /// Embedding model the loaded index was built with
    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Retrieve the `k` reviews closest to the query.
    ///
    /// Results are ordered by ascending L2 distance, ties broken by lower
    /// corpus position. Asking for more results than the index holds returns
    /// everything available; only a zero-vector index is an error.
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredReview>> {
        if self.reviews.is_empty() {
            return Err(RagError::EmptyIndex(
                "The index contains no vectors; build the corpus index first".to_string(),
            ));
        }

        let effective_k = k.min(self.reviews.len());
        if effective_k == 0 {
            return Ok(Vec::new());
        }

        debug!("Retrieving top {} reviews for query", effective_k);

        let query_embedding = self.ollama_client.embed_text(query).map_err(|e| {
            RagError::Embedding(format!("Failed to embed query: {:#}", e))
        })?;

        if let Some(dimension) = self.vector_store.dimension() {
            if query_embedding.len() != dimension {
                return Err(RagError::Embedding(format!(
                    "Query embedding has {} dimensions but the index stores {}; \
                     is a different embedding model running?",
                    query_embedding.len(),
                    dimension
                )));
            }
        }

        let hits = self.vector_store.search(&query_embedding, effective_k).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let row = self.reviews.get(hit.position as usize).ok_or_else(|| {
                RagError::IndexLoad(format!(
                    "Vector {} has no matching metadata row; the artifacts are out of sync",
                    hit.position
                ))
            })?;

            results.push(ScoredReview {
                position: hit.position as usize,
                distance: hit.distance,
                combined_text: row.combined_text.clone(),
            });
        }

        Ok(results)
    }

    /// Join retrieved reviews into the grounding context, nearest first.
    ///
    /// Entries are kept whole and dropped from the far end when the combined
    /// estimate would exceed the context token budget; the nearest review is
    /// always included.
    #[inline]
    pub fn assemble_context(&self, results: &[ScoredReview]) -> String {
        let mut selected: Vec<&str> = Vec::with_capacity(results.len());
        let mut used_tokens = 0;

        for result in results {
            let cost = estimate_token_count(&result.combined_text);
            if !selected.is_empty() && used_tokens + cost > self.max_context_tokens {
                debug!(
                    "Context budget reached; dropping {} of {} retrieved reviews",
                    results.len() - selected.len(),
                    results.len()
                );
                break;
            }
            used_tokens += cost;
            selected.push(result.combined_text.as_str());
        }

        selected.join("\n")
    }

    /// Full pipeline: retrieve context for the query and generate an answer.
    ///
    /// Completion-service failures are propagated unchanged; retry policy, if
    /// any, belongs to the caller.
    #[inline]
    pub async fn answer(
        &self,
        completion: &CompletionClient,
        query: &str,
        k: usize,
    ) -> Result<String> {
        let results = self.retrieve(query, k).await?;
        let context = self.assemble_context(&results);
        let prompt = answer_prompt(query, &context);

        completion.complete(&prompt, self.answer_max_tokens, self.answer_temperature)
    }
}
