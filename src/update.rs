//! Batch orchestration: extraction records through resolution and merging.
//!
//! Records are processed strictly in the order received, one at a time, since
//! later resolutions may depend on nodes created by earlier ones. A record
//! that fails validation is skipped and reported; the run continues. Each
//! record is fully validated before any merge, so a record's edge mutations
//! are all-or-nothing.

use crate::disambiguation::Disambiguator;
use crate::error::{MedkgError, Result};
use crate::extraction::ExtractionRecord;
use crate::graph::{EntityType, Evidence, GraphStore, Mention, NodeId, RelationType};
use crate::merge::{merge_relationship, MergeOutcome};
use crate::resolve::Resolver;

/// A record dropped from the run, with its position in the batch.
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

/// Summary of one update run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub records_processed: usize,
    pub records_skipped: usize,
    pub nodes_created: usize,
    pub edges_created: usize,
    pub edges_updated: usize,
    /// Observations whose evidence was already recorded (re-run of an
    /// already-ingested batch).
    pub duplicate_evidence: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// Owns the graph store for the duration of one run and feeds each record
/// through resolution and merging.
pub struct UpdateController<D> {
    store: GraphStore,
    resolver: Resolver<D>,
}

impl<D: Disambiguator> UpdateController<D> {
    pub fn new(store: GraphStore, resolver: Resolver<D>) -> Self {
        Self { store, resolver }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Hand the mutated store back for serialization at run end.
    pub fn into_store(self) -> GraphStore {
        self.store
    }

    /// Process a batch of extraction records in order.
    ///
    /// Validation failures skip the offending record and are collected in the
    /// report; only corruption or persistence-level errors abort the run.
    pub async fn run(&mut self, batch: &[ExtractionRecord]) -> Result<RunReport> {
        let mut report = RunReport::default();
        for (index, record) in batch.iter().enumerate() {
            match self.apply_record(record, &mut report).await {
                Ok(()) => report.records_processed += 1,
                Err(MedkgError::Validation(reason)) => {
                    log::warn!("Skipping record {index}: {reason}");
                    report.records_skipped += 1;
                    report.skipped.push(SkippedRecord { index, reason });
                }
                Err(fatal) => return Err(fatal),
            }
        }
        log::info!(
            "Run complete: {} records applied, {} skipped, {} nodes created, \
             {} edges created, {} edges updated",
            report.records_processed,
            report.records_skipped,
            report.nodes_created,
            report.edges_created,
            report.edges_updated
        );
        Ok(report)
    }

    async fn apply_record(
        &mut self,
        record: &ExtractionRecord,
        report: &mut RunReport,
    ) -> Result<()> {
        validate_record(record)?;

        // Resolve every mention once, in order; relationships refer to the
        // resolved ids by index
        let nodes_before = self.store.node_count();
        let mut resolved: Vec<NodeId> = Vec::with_capacity(record.entity_mentions.len());
        for m in &record.entity_mentions {
            let entity_type: EntityType = m.entity_type.parse()?;
            let provenance = Mention {
                document_id: m.document_id.clone(),
                sentence_span: m.sentence_span,
                surface_form: m.surface_form.clone(),
            };
            let resolution = self
                .resolver
                .resolve(&mut self.store, &m.surface_form, entity_type, provenance)
                .await?;
            resolved.push(resolution.node_id);
        }
        report.nodes_created += self.store.node_count() - nodes_before;

        // Distinct mentions can resolve to the same node; reject the record
        // before any merge so no partial set of its edges lands
        for rel in &record.relationships {
            if resolved[rel.source] == resolved[rel.target] {
                return Err(MedkgError::Validation(format!(
                    "mentions {} and {} resolve to the same entity {}",
                    rel.source, rel.target, resolved[rel.source]
                )));
            }
        }

        for rel in &record.relationships {
            let relation_type: RelationType = rel.relation_type.parse()?;
            let evidence = Evidence {
                document_id: record.entity_mentions[rel.source].document_id.clone(),
                sentence_span: rel.evidence_span,
                model_confidence: rel.model_confidence,
            };
            match merge_relationship(
                &mut self.store,
                resolved[rel.source],
                resolved[rel.target],
                relation_type,
                evidence,
            )? {
                MergeOutcome::Created => report.edges_created += 1,
                MergeOutcome::Corroborated => report.edges_updated += 1,
                MergeOutcome::Duplicate => report.duplicate_evidence += 1,
            }
        }
        Ok(())
    }
}

/// Structural validation before any graph mutation.
fn validate_record(record: &ExtractionRecord) -> Result<()> {
    for (i, m) in record.entity_mentions.iter().enumerate() {
        if m.surface_form.trim().is_empty() {
            return Err(MedkgError::Validation(format!(
                "mention {i} has an empty surface form"
            )));
        }
        m.entity_type.parse::<EntityType>()?;
    }
    let mention_count = record.entity_mentions.len();
    for (i, rel) in record.relationships.iter().enumerate() {
        rel.relation_type.parse::<RelationType>()?;
        if rel.source >= mention_count || rel.target >= mention_count {
            return Err(MedkgError::Validation(format!(
                "relationship {i} references mention out of range \
                 ({}/{} of {mention_count})",
                rel.source, rel.target
            )));
        }
        if rel.source == rel.target {
            return Err(MedkgError::Validation(format!(
                "relationship {i} relates mention {} to itself",
                rel.source
            )));
        }
        if !(0.0..=1.0).contains(&rel.model_confidence) {
            return Err(MedkgError::Validation(format!(
                "relationship {i} has confidence {} outside [0, 1]",
                rel.model_confidence
            )));
        }
    }
    Ok(())
}
