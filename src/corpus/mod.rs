// Corpus module
// Review records and the deterministic combined-text derivation

#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{RagError, Result};

/// One row of the review corpus.
///
/// Records are immutable once loaded; their identity is their row position in
/// the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub drug_name: String,
    pub condition: String,
    pub gender: String,
    pub age_group: String,
    pub time_on_drug: String,
    pub rating_overall: f64,
    pub review_text: String,
}

impl ReviewRecord {
    /// Derive the combined text used as the unit of embedding.
    ///
    /// Pure function of the record: pipe-delimited labeled segments in fixed
    /// field order, so recomputing from the same record always yields the
    /// same string.
    #[inline]
    pub fn combined_text(&self) -> String {
        format!(
            "Drug Name: {} | Condition: {} | Gender: {} | Age Group: {} | Time on Drug: {} | Rating Overall: {} | Review: {}",
            self.drug_name,
            self.condition,
            self.gender,
            self.age_group,
            self.time_on_drug,
            self.rating_overall,
            self.review_text
        )
    }
}

/// Load review records from a JSON-lines corpus file.
///
/// One JSON object per line; blank lines are skipped. Upstream preprocessing
/// is expected to have cleaned the data, so a record missing a required field
/// is a schema failure, not a skippable row.
#[inline]
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<ReviewRecord>> {
    let path = path.as_ref();
    info!("Loading review corpus from {}", path.display());

    let file = File::open(path).map_err(|e| {
        RagError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open corpus file {}: {}", path.display(), e),
        ))
    })?;

    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: ReviewRecord = serde_json::from_str(&line).map_err(|e| {
            RagError::Schema(format!(
                "{} line {}: {}",
                path.display(),
                line_number + 1,
                e
            ))
        })?;

        validate_record(&record, path, line_number + 1)?;
        records.push(record);
    }

    debug!("Loaded {} review records", records.len());
    Ok(records)
}

fn validate_record(record: &ReviewRecord, path: &Path, line_number: usize) -> Result<()> {
    let required = [
        ("drug_name", &record.drug_name),
        ("condition", &record.condition),
        ("gender", &record.gender),
        ("age_group", &record.age_group),
        ("time_on_drug", &record.time_on_drug),
        ("review_text", &record.review_text),
    ];

    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(RagError::Schema(format!(
                "{} line {}: field '{}' is empty",
                path.display(),
                line_number,
                field
            )));
        }
    }

    Ok(())
}
