
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::corpus::ReviewRecord;

/// One persisted metadata row. `row_id` is the zero-based corpus position and
/// matches the vector at the same position in the index artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReviewRow {
    pub row_id: i64,
    pub drug_name: String,
    pub condition: String,
    pub gender: String,
    pub age_group: String,
    pub time_on_drug: String,
    pub rating_overall: f64,
    pub review_text: String,
    pub combined_text: String,
}

/// A review staged for insertion during an index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReviewRow {
    pub drug_name: String,
    pub condition: String,
    pub gender: String,
    pub age_group: String,
    pub time_on_drug: String,
    pub rating_overall: f64,
    pub review_text: String,
    pub combined_text: String,
}

impl NewReviewRow {
    #[inline]
    pub fn from_record(record: &ReviewRecord) -> Self {
        Self {
            drug_name: record.drug_name.clone(),
            condition: record.condition.clone(),
            gender: record.gender.clone(),
            age_group: record.age_group.clone(),
            time_on_drug: record.time_on_drug.clone(),
            rating_overall: record.rating_overall,
            review_text: record.review_text.clone(),
            combined_text: record.combined_text(),
        }
    }
}

/// Fingerprint of an index build, persisted alongside the artifacts.
///
/// Retrieval validates the manifest at load time so an index built with one
/// embedding model is never searched with vectors from another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub vector_dimension: i64,
    pub row_count: i64,
    pub built_at: String,
}
