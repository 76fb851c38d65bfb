//! Relationship merging: duplicate detection, evidence accumulation, and
//! confidence combination.
//!
//! Edges are keyed by the ordered `(source, target, relation_type)` triple.
//! Corroborating observations from distinct documents combine by noisy-OR,
//! so confidence never decreases and approaches 1.0 asymptotically. Repeated
//! observations of the same evidence are skipped entirely, which keeps
//! re-runs over an already-ingested batch from inflating confidence.

use chrono::Utc;

use crate::error::{MedkgError, Result};
use crate::graph::{Edge, EdgeKey, Evidence, GraphStore, NodeId, RelationType};

/// What a merge call did to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No edge existed for the key; a new one was created.
    Created,
    /// The edge existed; new evidence was appended and confidence recombined.
    Corroborated,
    /// The evidence was already recorded for this edge; nothing changed.
    Duplicate,
}

/// Noisy-OR combination of independent observations.
///
/// Monotonically non-decreasing in both arguments; strictly below 1.0 while
/// both inputs are.
fn combine_confidence(old: f64, observed: f64) -> f64 {
    1.0 - (1.0 - old) * (1.0 - observed)
}

/// Merge one relationship observation into the graph.
///
/// Creates the edge with `confidence = evidence.model_confidence` when the
/// key is absent; otherwise appends the evidence and recombines confidence.
/// Self-relations, unknown endpoints, and out-of-range confidence are
/// `Validation` errors and leave the graph unchanged.
pub fn merge_relationship(
    store: &mut GraphStore,
    source: NodeId,
    target: NodeId,
    relation_type: RelationType,
    evidence: Evidence,
) -> Result<MergeOutcome> {
    if source == target {
        return Err(MedkgError::Validation(format!(
            "self-relation rejected: {source} -{relation_type}-> {target}"
        )));
    }
    for endpoint in [source, target] {
        if store.node(endpoint).is_none() {
            return Err(MedkgError::Validation(format!(
                "relationship references unknown node {endpoint}"
            )));
        }
    }
    if !(0.0..=1.0).contains(&evidence.model_confidence) {
        return Err(MedkgError::Validation(format!(
            "model confidence {} outside [0, 1]",
            evidence.model_confidence
        )));
    }

    let key = EdgeKey {
        source,
        target,
        relation_type,
    };

    if let Some(edge) = store.edge_mut(&key) {
        let already_recorded = edge.evidence.iter().any(|e| {
            e.document_id == evidence.document_id && e.sentence_span == evidence.sentence_span
        });
        if already_recorded {
            log::debug!(
                "Duplicate evidence for edge {key} from document {}, skipping",
                evidence.document_id
            );
            return Ok(MergeOutcome::Duplicate);
        }

        edge.confidence = combine_confidence(edge.confidence, evidence.model_confidence);
        edge.evidence.push(evidence);
        edge.updated_at = Utc::now();
        log::debug!(
            "Corroborated edge {key}: {} evidence items, confidence {:.4}",
            edge.evidence.len(),
            edge.confidence
        );
        return Ok(MergeOutcome::Corroborated);
    }

    log::debug!(
        "Creating edge {key} with confidence {}",
        evidence.model_confidence
    );
    store.insert_edge(Edge {
        source,
        target,
        relation_type,
        confidence: evidence.model_confidence,
        evidence: vec![evidence],
        updated_at: Utc::now(),
    });
    Ok(MergeOutcome::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityType, Mention};

    fn store_with_pair() -> (GraphStore, NodeId, NodeId) {
        let mut store = GraphStore::empty("unused.json");
        let drug = store.create_node(
            "metformin".to_string(),
            EntityType::Chemical,
            Mention {
                document_id: "100".to_string(),
                sentence_span: (0, 50),
                surface_form: "Metformin".to_string(),
            },
        );
        let disease = store.create_node(
            "type 2 diabetes".to_string(),
            EntityType::Disease,
            Mention {
                document_id: "100".to_string(),
                sentence_span: (0, 50),
                surface_form: "Type 2 Diabetes".to_string(),
            },
        );
        (store, drug, disease)
    }

    fn evidence(doc: &str, confidence: f64) -> Evidence {
        Evidence {
            document_id: doc.to_string(),
            sentence_span: (0, 50),
            model_confidence: confidence,
        }
    }

    #[test]
    fn test_merge_creates_edge_with_model_confidence() {
        let (mut store, drug, disease) = store_with_pair();
        let outcome = merge_relationship(
            &mut store,
            drug,
            disease,
            RelationType::Treat,
            evidence("100", 0.7),
        )
        .unwrap();
        assert_eq!(outcome, MergeOutcome::Created);

        let key = EdgeKey {
            source: drug,
            target: disease,
            relation_type: RelationType::Treat,
        };
        let edge = store.edge(&key).unwrap();
        assert!((edge.confidence - 0.7).abs() < 1e-9);
        assert_eq!(edge.evidence.len(), 1);
    }

    #[test]
    fn test_merge_confidence_monotonic_and_below_one() {
        let (mut store, drug, disease) = store_with_pair();
        merge_relationship(&mut store, drug, disease, RelationType::Treat, evidence("100", 0.6))
            .unwrap();
        let outcome =
            merge_relationship(&mut store, drug, disease, RelationType::Treat, evidence("200", 0.5))
                .unwrap();
        assert_eq!(outcome, MergeOutcome::Corroborated);

        let key = EdgeKey {
            source: drug,
            target: disease,
            relation_type: RelationType::Treat,
        };
        let edge = store.edge(&key).unwrap();
        // noisy-OR: 1 - 0.4 * 0.5 = 0.8
        assert!(edge.confidence >= 0.6);
        assert!(edge.confidence < 1.0);
        assert!((edge.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_merge_same_key_twice_yields_one_edge_two_evidence() {
        let (mut store, drug, disease) = store_with_pair();
        merge_relationship(&mut store, drug, disease, RelationType::Treat, evidence("100", 0.6))
            .unwrap();
        merge_relationship(&mut store, drug, disease, RelationType::Treat, evidence("200", 0.5))
            .unwrap();

        assert_eq!(store.edge_count(), 1);
        let key = EdgeKey {
            source: drug,
            target: disease,
            relation_type: RelationType::Treat,
        };
        assert_eq!(store.edge(&key).unwrap().evidence.len(), 2);
    }

    #[test]
    fn test_merge_duplicate_evidence_is_noop() {
        let (mut store, drug, disease) = store_with_pair();
        merge_relationship(&mut store, drug, disease, RelationType::Treat, evidence("100", 0.6))
            .unwrap();
        let outcome =
            merge_relationship(&mut store, drug, disease, RelationType::Treat, evidence("100", 0.6))
                .unwrap();
        assert_eq!(outcome, MergeOutcome::Duplicate);

        let key = EdgeKey {
            source: drug,
            target: disease,
            relation_type: RelationType::Treat,
        };
        let edge = store.edge(&key).unwrap();
        assert_eq!(edge.evidence.len(), 1);
        assert!((edge.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_merge_self_relation_rejected_graph_unchanged() {
        let (mut store, drug, _) = store_with_pair();
        let err =
            merge_relationship(&mut store, drug, drug, RelationType::Treat, evidence("100", 0.9))
                .unwrap_err();
        assert!(matches!(err, MedkgError::Validation(_)));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_merge_unknown_endpoint_rejected() {
        let (mut store, drug, _) = store_with_pair();
        let err = merge_relationship(
            &mut store,
            drug,
            NodeId(99),
            RelationType::Treat,
            evidence("100", 0.9),
        )
        .unwrap_err();
        assert!(matches!(err, MedkgError::Validation(_)));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_merge_out_of_range_confidence_rejected() {
        let (mut store, drug, disease) = store_with_pair();
        let err =
            merge_relationship(&mut store, drug, disease, RelationType::Treat, evidence("100", 1.2))
                .unwrap_err();
        assert!(matches!(err, MedkgError::Validation(_)));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_merge_opposite_direction_is_distinct_edge() {
        // Relation types are directional; the reversed triple is its own edge
        let (mut store, drug, disease) = store_with_pair();
        merge_relationship(&mut store, drug, disease, RelationType::Associate, evidence("100", 0.6))
            .unwrap();
        merge_relationship(&mut store, disease, drug, RelationType::Associate, evidence("100", 0.6))
            .unwrap();
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn test_combine_confidence_asymptotic() {
        let mut c = 0.5;
        for _ in 0..50 {
            let next = combine_confidence(c, 0.5);
            assert!(next >= c);
            assert!(next < 1.0);
            c = next;
        }
        assert!(c > 0.999);
    }
}
