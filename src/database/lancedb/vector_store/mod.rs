
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::RagError;

const TABLE_NAME: &str = "embeddings";

/// On-disk vector index backed by LanceDB.
///
/// Holds one vector per corpus row; the `row_id` column is the zero-based
/// position matching the metadata table. No ANN index is ever created over
/// the vector column, so every search is an exact flat scan under L2
/// distance — the corpus is small enough that approximation would buy
/// nothing and cost determinism.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// One search result: a corpus row position with its L2 distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub position: u32,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or initialize) the vector index for writing. Used by the index
    /// builder; the table itself is created when vectors are stored.
    #[inline]
    pub async fn create(index_path: &Path) -> Result<Self, RagError> {
        debug!("Initializing LanceDB at path: {:?}", index_path);

        // Ensure the directory exists
        if let Some(parent) = index_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::Database(format!("Failed to create vector index directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", index_path.display());

        // Attempt to connect with corruption recovery
        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                // Check if this looks like a corruption error
                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Vector index corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(&index_path.to_path_buf())?;

                    // Retry connection after recovery
                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        RagError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(RagError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension: None,
        })
    }

    /// Open an existing vector index for searching.
    ///
    /// Fails with `IndexLoad` when the artifact is missing or unreadable —
    /// query time must never create an empty index by accident.
    #[inline]
    pub async fn open(index_path: &Path) -> Result<Self, RagError> {
        if !index_path.exists() {
            return Err(RagError::IndexLoad(format!(
                "Vector index does not exist: {}",
                index_path.display()
            )));
        }

        let uri = format!("file://{}", index_path.display());
        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            RagError::IndexLoad(format!(
                "Failed to open vector index {}: {}",
                index_path.display(),
                e
            ))
        })?;

        let table_names = connection.table_names().execute().await.map_err(|e| {
            RagError::IndexLoad(format!("Failed to list vector index tables: {}", e))
        })?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            return Err(RagError::IndexLoad(format!(
                "Vector index {} has no embeddings table; run a corpus build first",
                index_path.display()
            )));
        }

        let mut store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension: None,
        };

        let dimension = store.detect_vector_dimension().await?;
        store.vector_dimension = Some(dimension);
        info!("Opened vector index with dimension {}", dimension);

        Ok(store)
    }

    /// Dimension of the stored vectors, once known
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    /// Detect vector dimension from the existing table schema
    async fn detect_vector_dimension(&self) -> Result<usize, RagError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::IndexLoad(format!("Failed to open embeddings table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::IndexLoad(format!("Failed to read table schema: {}", e)))?;

        // Find the vector column and extract its dimension
        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(RagError::IndexLoad(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("row_id", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Replace the stored vectors with a fresh set, positions 0..n in input
    /// order. There is no append path: index construction always starts from
    /// an empty table so positions stay aligned with the metadata rows.
    #[inline]
    pub async fn replace_vectors(&mut self, vectors: &[Vec<f32>]) -> Result<(), RagError> {
        let Some(first) = vectors.first() else {
            return Err(RagError::Database(
                "Cannot build an index with zero vectors".to_string(),
            ));
        };

        let vector_dim = first.len();
        if let Some(bad) = vectors.iter().position(|v| v.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Vector {} has {} dimensions, expected {}",
                bad,
                vectors[bad].len(),
                vector_dim
            )));
        }

        debug!(
            "Replacing vector index with {} vectors of dimension {}",
            vectors.len(),
            vector_dim
        );

        self.drop_table_if_exists().await?;

        let schema = Self::create_schema(vector_dim);
        self.connection
            .create_empty_table(&self.table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create embeddings table: {}", e)))?;
        self.vector_dimension = Some(vector_dim);

        let record_batch = Self::create_record_batch(&schema, vectors, vector_dim)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))?;

        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Successfully stored {} vectors", vectors.len());
        Ok(())
    }

    /// Create a RecordBatch of (row_id, vector) pairs
    fn create_record_batch(
        schema: &Arc<Schema>,
        vectors: &[Vec<f32>],
        vector_dim: usize,
    ) -> Result<RecordBatch, RagError> {
        let len = vectors.len();

        let row_ids: Vec<u32> = (0..len as u32).collect();

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for vector in vectors {
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    RagError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(UInt32Array::from(row_ids)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(Arc::clone(schema), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the `limit` nearest vectors to the query under L2 distance.
    ///
    /// Results are ordered by ascending distance; ties are broken by the
    /// lower row position. If the index holds fewer than `limit` vectors,
    /// all of them are returned.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, RagError> {
        debug!("Searching for nearest vectors with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        let results = query
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = self.parse_search_results_stream(results).await?;

        // Distances come back ordered, but the tie-break on row position is
        // ours to enforce
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(limit);

        Ok(hits)
    }

    /// Parse search results from LanceDB stream into SearchHit structs
    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchHit>, RagError> {
        let mut hits = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search hits from stream", hits.len());
        Ok(hits)
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>, RagError> {
        let num_rows = batch.num_rows();

        let row_ids = batch
            .column_by_name("row_id")
            .ok_or_else(|| RagError::Database("Missing row_id column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| RagError::Database("Invalid row_id column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut hits = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            hits.push(SearchHit {
                position: row_ids.value(row),
                distance,
            });
        }

        Ok(hits)
    }

    /// Get the total number of vectors stored
    #[inline]
    pub async fn count_vectors(&self) -> Result<u64, RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&self.table_name) {
            return Ok(0);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Optimize the vector index by compacting and reorganizing data
    #[inline]
    pub async fn optimize(&mut self) -> Result<(), RagError> {
        debug!("Optimizing vector index");

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))?;

        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| RagError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector index optimization completed");
        Ok(())
    }

    /// Attempt to recover from index corruption
    fn attempt_corruption_recovery(index_path: &PathBuf) -> Result<(), RagError> {
        warn!("Attempting vector index recovery at {:?}", index_path);

        // Create backup of corrupted index if it exists
        if index_path.exists() {
            let backup_path = index_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(index_path, &backup_path) {
                error!("Failed to back up corrupted index: {}", e);
            } else {
                info!("Corrupted index backed up to {:?}", backup_path);
            }
        }

        // Remove any remaining corrupt files
        if index_path.exists() {
            std::fs::remove_dir_all(index_path).map_err(|e| {
                RagError::Database(format!("Failed to remove corrupted index: {}", e))
            })?;
        }

        info!("Vector index recovery completed");
        Ok(())
    }

    /// Drop the embeddings table if it exists
    async fn drop_table_if_exists(&self) -> Result<(), RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables for drop: {}", e)))?;

        if table_names.contains(&self.table_name) {
            info!("Dropping existing embeddings table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}
