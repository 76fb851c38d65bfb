//! Input types for the external extraction pipeline.
//!
//! The pipeline hands over an ordered JSON array of per-abstract records.
//! Entity and relation type strings are kept as-is here and validated per
//! record by the update controller, so one malformed record never fails the
//! whole batch parse.

use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// One observed entity mention with its provenance.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityMention {
    /// Entity text as it appeared in the abstract.
    pub surface_form: String,
    /// Entity type string, validated against the fixed vocabulary per record.
    pub entity_type: String,
    /// Source document identifier (e.g. PMID).
    pub document_id: String,
    /// Character offsets of the containing sentence.
    pub sentence_span: (usize, usize),
}

/// One observed relationship between two mentions of the same record,
/// referenced by index into `entity_mentions`.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipObservation {
    /// Index of the source mention in the record's `entity_mentions`.
    pub source: usize,
    /// Index of the target mention in the record's `entity_mentions`.
    pub target: usize,
    /// Relation type string, validated against the fixed vocabulary.
    pub relation_type: String,
    /// Extraction confidence reported by the model, expected in [0, 1].
    pub model_confidence: f64,
    /// Character offsets of the supporting sentence.
    pub evidence_span: (usize, usize),
}

/// Per-abstract extraction record produced by the external pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionRecord {
    #[serde(default)]
    pub entity_mentions: Vec<EntityMention>,
    #[serde(default)]
    pub relationships: Vec<RelationshipObservation>,
}

/// Load an ordered batch of extraction records from a JSON file.
pub fn load_batch<P: AsRef<Path>>(path: P) -> Result<Vec<ExtractionRecord>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let batch = serde_json::from_str(&content)?;
    Ok(batch)
}
