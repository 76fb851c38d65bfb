//! Knowledge graph data model and persistent store.
//!
//! Nodes are canonicalized biomedical entities; edges are directed, typed
//! relationships keyed by `(source, target, relation_type)` with accumulated
//! evidence. The persisted document (top-level `nodes` and `edges` arrays) is
//! loaded and saved as a whole; the visualization consumer reads the same
//! field names, so they must stay stable across runs.

mod store;

pub use store::GraphStore;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MedkgError;

/// Stable node identifier. Assigned sequentially on creation, never reused or
/// changed; a lower id means the node was created earlier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Fixed entity vocabulary. A node's type is fixed at creation; a later
/// mention with a conflicting type is a new-entity signal, not a mutation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Gene,
    Protein,
    Disease,
    Chemical,
    Variant,
    Species,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Gene => "GENE",
            EntityType::Protein => "PROTEIN",
            EntityType::Disease => "DISEASE",
            EntityType::Chemical => "CHEMICAL",
            EntityType::Variant => "VARIANT",
            EntityType::Species => "SPECIES",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = MedkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENE" => Ok(EntityType::Gene),
            "PROTEIN" => Ok(EntityType::Protein),
            "DISEASE" => Ok(EntityType::Disease),
            "CHEMICAL" => Ok(EntityType::Chemical),
            "VARIANT" => Ok(EntityType::Variant),
            "SPECIES" => Ok(EntityType::Species),
            other => Err(MedkgError::Validation(format!(
                "unknown entity type: {other}"
            ))),
        }
    }
}

/// Fixed relation vocabulary. All relation types are directional, so the edge
/// key is the ordered `(source, target, relation_type)` triple.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Associate,
    Cause,
    Compare,
    Cotreat,
    DrugInteract,
    Inhibit,
    Interact,
    NegativeCorrelate,
    PositiveCorrelate,
    Prevent,
    Stimulate,
    Treat,
    Subtype,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Associate => "ASSOCIATE",
            RelationType::Cause => "CAUSE",
            RelationType::Compare => "COMPARE",
            RelationType::Cotreat => "COTREAT",
            RelationType::DrugInteract => "DRUG_INTERACT",
            RelationType::Inhibit => "INHIBIT",
            RelationType::Interact => "INTERACT",
            RelationType::NegativeCorrelate => "NEGATIVE_CORRELATE",
            RelationType::PositiveCorrelate => "POSITIVE_CORRELATE",
            RelationType::Prevent => "PREVENT",
            RelationType::Stimulate => "STIMULATE",
            RelationType::Treat => "TREAT",
            RelationType::Subtype => "SUBTYPE",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = MedkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASSOCIATE" => Ok(RelationType::Associate),
            "CAUSE" => Ok(RelationType::Cause),
            "COMPARE" => Ok(RelationType::Compare),
            "COTREAT" => Ok(RelationType::Cotreat),
            "DRUG_INTERACT" => Ok(RelationType::DrugInteract),
            "INHIBIT" => Ok(RelationType::Inhibit),
            "INTERACT" => Ok(RelationType::Interact),
            "NEGATIVE_CORRELATE" => Ok(RelationType::NegativeCorrelate),
            "POSITIVE_CORRELATE" => Ok(RelationType::PositiveCorrelate),
            "PREVENT" => Ok(RelationType::Prevent),
            "STIMULATE" => Ok(RelationType::Stimulate),
            "TREAT" => Ok(RelationType::Treat),
            "SUBTYPE" => Ok(RelationType::Subtype),
            other => Err(MedkgError::Validation(format!(
                "unknown relation type: {other}"
            ))),
        }
    }
}

/// Provenance of one entity mention: where the surface form was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    /// Source document identifier (e.g. PMID).
    pub document_id: String,
    /// Character offsets of the containing sentence, serialized as a 2-array.
    pub sentence_span: (usize, usize),
    /// The surface text as it appeared, before normalization.
    pub surface_form: String,
}

/// Provenance supporting one relationship observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Source document identifier (e.g. PMID).
    pub document_id: String,
    /// Character offsets of the supporting sentence, serialized as a 2-array.
    pub sentence_span: (usize, usize),
    /// Extraction confidence reported by the model for this observation.
    pub model_confidence: f64,
}

/// A canonicalized entity. Created only by the resolver; mutated only by
/// appending aliases and mentions; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Preferred display string (the normalized surface form at creation).
    pub canonical_name: String,
    pub entity_type: EntityType,
    /// Normalized alternate surface forms; never redundantly contains
    /// `canonical_name`.
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    /// Append-only provenance, in observation order.
    #[serde(default)]
    pub mentions: Vec<Mention>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// All normalized names this node answers to.
    pub fn known_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str()).chain(self.aliases.iter().map(|a| a.as_str()))
    }
}

/// Lookup key for an edge: the ordered relationship triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub source: NodeId,
    pub target: NodeId,
    pub relation_type: RelationType,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.source, self.relation_type, self.target)
    }
}

/// A directed, typed relationship. At most one edge exists per key; repeated
/// observations merge evidence into that edge and recompute confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub relation_type: RelationType,
    /// Current belief in the edge, in [0, 1], non-decreasing across merges.
    pub confidence: f64,
    /// Append-only observation provenance.
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source,
            target: self.target,
            relation_type: self.relation_type,
        }
    }
}

/// Wire form of the persisted graph: top-level `nodes` and `edges` arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_wire_names() {
        let json = serde_json::to_string(&EntityType::Variant).unwrap();
        assert_eq!(json, "\"VARIANT\"");
        let back: EntityType = serde_json::from_str("\"DISEASE\"").unwrap();
        assert_eq!(back, EntityType::Disease);
    }

    #[test]
    fn test_relation_type_wire_names() {
        let json = serde_json::to_string(&RelationType::DrugInteract).unwrap();
        assert_eq!(json, "\"DRUG_INTERACT\"");
        let back: RelationType = serde_json::from_str("\"NEGATIVE_CORRELATE\"").unwrap();
        assert_eq!(back, RelationType::NegativeCorrelate);
    }

    #[test]
    fn test_relation_type_from_str_rejects_unknown() {
        let err = "CURES".parse::<RelationType>().unwrap_err();
        assert!(matches!(err, MedkgError::Validation(_)));
        assert!("TREAT".parse::<RelationType>().is_ok());
    }

    #[test]
    fn test_entity_type_from_str_roundtrip() {
        for ty in [
            EntityType::Gene,
            EntityType::Protein,
            EntityType::Disease,
            EntityType::Chemical,
            EntityType::Variant,
            EntityType::Species,
        ] {
            assert_eq!(ty.as_str().parse::<EntityType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_node_id_serializes_as_number() {
        let json = serde_json::to_string(&NodeId(7)).unwrap();
        assert_eq!(json, "7");
        assert_eq!(NodeId(7).to_string(), "node_7");
    }

    #[test]
    fn test_mention_span_serializes_as_array() {
        let mention = Mention {
            document_id: "12345".to_string(),
            sentence_span: (10, 80),
            surface_form: "BRCA1".to_string(),
        };
        let json = serde_json::to_value(&mention).unwrap();
        assert_eq!(json["sentence_span"], serde_json::json!([10, 80]));
    }

    #[test]
    fn test_known_names_includes_canonical_and_aliases() {
        let mut aliases = BTreeSet::new();
        aliases.insert("t2d".to_string());
        let node = Node {
            id: NodeId(0),
            canonical_name: "type 2 diabetes".to_string(),
            entity_type: EntityType::Disease,
            aliases,
            mentions: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let names: Vec<_> = node.known_names().collect();
        assert_eq!(names, vec!["type 2 diabetes", "t2d"]);
    }

    #[test]
    fn test_graph_document_defaults() {
        let doc: GraphDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.nodes.is_empty());
        assert!(doc.edges.is_empty());
    }
}
