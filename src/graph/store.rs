//! In-memory graph with whole-document JSON persistence.
//!
//! Loading validates the data-model invariants and rejects a corrupt document
//! before any mutation. Saving serializes the full graph to a temporary file
//! next to the durable document and renames it into place, so a failed write
//! leaves the previous document authoritative.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{MedkgError, Result};
use crate::graph::{Edge, EdgeKey, EntityType, GraphDocument, Mention, Node, NodeId};

/// Owns the node and edge maps for the duration of a run.
///
/// Nodes and edges are never deleted; ids are never reassigned. Candidate
/// lookup iterates nodes in id order, so the first created node wins ties.
#[derive(Debug)]
pub struct GraphStore {
    path: PathBuf,
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeKey, Edge>,
    next_id: u64,
}

impl GraphStore {
    /// Create an empty store that will persist to `path`.
    pub fn empty<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Load the persisted graph document, or start an empty graph when the
    /// document does not exist yet.
    ///
    /// Any invariant violation in an existing document (unparseable JSON,
    /// duplicate node ids, duplicate edge keys, dangling or self-referential
    /// edges, out-of-range confidence) is fatal `GraphCorruption`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "No existing graph found at {}, initializing new graph",
                path.display()
            );
            return Ok(Self::empty(path));
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            log::info!("Empty graph document at {}, starting fresh", path.display());
            return Ok(Self::empty(path));
        }

        let doc: GraphDocument = serde_json::from_str(&content).map_err(|e| {
            MedkgError::GraphCorruption(format!(
                "unparseable graph document {}: {}",
                path.display(),
                e
            ))
        })?;

        let store = Self::from_document(path, doc)?;
        log::info!(
            "Loaded knowledge graph from {} ({} nodes, {} edges)",
            path.display(),
            store.node_count(),
            store.edge_count()
        );
        Ok(store)
    }

    /// Build a store from a parsed document, validating all invariants.
    pub fn from_document<P: AsRef<Path>>(path: P, doc: GraphDocument) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        let mut next_id = 0u64;

        for mut node in doc.nodes {
            // Self-repair the alias invariant rather than failing the load
            if node.aliases.remove(&node.canonical_name) {
                log::warn!(
                    "{}: alias list redundantly contained canonical name '{}', dropped",
                    node.id,
                    node.canonical_name
                );
            }
            next_id = next_id.max(node.id.0 + 1);
            let id = node.id;
            if nodes.insert(id, node).is_some() {
                return Err(MedkgError::GraphCorruption(format!(
                    "duplicate node id in document: {id}"
                )));
            }
        }

        let mut edges = BTreeMap::new();
        for edge in doc.edges {
            if edge.source == edge.target {
                return Err(MedkgError::GraphCorruption(format!(
                    "self-referential edge in document: {}",
                    edge.key()
                )));
            }
            for endpoint in [edge.source, edge.target] {
                if !nodes.contains_key(&endpoint) {
                    return Err(MedkgError::GraphCorruption(format!(
                        "edge {} references missing node {}",
                        edge.key(),
                        endpoint
                    )));
                }
            }
            if !(0.0..=1.0).contains(&edge.confidence) {
                return Err(MedkgError::GraphCorruption(format!(
                    "edge {} has confidence {} outside [0, 1]",
                    edge.key(),
                    edge.confidence
                )));
            }
            let key = edge.key();
            if edges.insert(key, edge).is_some() {
                return Err(MedkgError::GraphCorruption(format!(
                    "duplicate edge key in document: {key}"
                )));
            }
        }

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            nodes,
            edges,
            next_id,
        })
    }

    /// Path of the durable document this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Candidate nodes for resolution: all nodes of the given type, in
    /// creation (id) order.
    pub fn candidates(&self, entity_type: EntityType) -> impl Iterator<Item = &Node> {
        self.nodes
            .values()
            .filter(move |n| n.entity_type == entity_type)
    }

    /// Create a node with a fresh id and its first mention. The canonical
    /// name is expected to be normalized by the caller.
    pub fn create_node(
        &mut self,
        canonical_name: String,
        entity_type: EntityType,
        first_mention: Mention,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let now = Utc::now();
        self.nodes.insert(
            id,
            Node {
                id,
                canonical_name,
                entity_type,
                aliases: Default::default(),
                mentions: vec![first_mention],
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| MedkgError::Validation(format!("unknown node id: {id}")))
    }

    /// Record an alternate surface form for a node. A no-op when the alias
    /// equals the canonical name or is already known.
    pub fn add_alias(&mut self, id: NodeId, alias: String) -> Result<()> {
        let node = self.node_mut(id)?;
        if alias == node.canonical_name || node.aliases.contains(&alias) {
            return Ok(());
        }
        node.aliases.insert(alias);
        node.updated_at = Utc::now();
        Ok(())
    }

    /// Append a provenance record to a node.
    pub fn add_mention(&mut self, id: NodeId, mention: Mention) -> Result<()> {
        let node = self.node_mut(id)?;
        node.mentions.push(mention);
        node.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) {
        self.edges.insert(edge.key(), edge);
    }

    pub(crate) fn edge_mut(&mut self, key: &EdgeKey) -> Option<&mut Edge> {
        self.edges.get_mut(key)
    }

    /// Snapshot the store as a persistable document.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }

    /// Serialize the whole graph and atomically replace the durable document.
    ///
    /// Writes to a sibling temporary file and renames it over the target, so a
    /// failure at any point leaves the previous document intact.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MedkgError::Persistence(format!(
                        "cannot create graph directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.to_document()).map_err(|e| {
            MedkgError::Persistence(format!("cannot serialize graph document: {e}"))
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| {
            MedkgError::Persistence(format!("cannot write {}: {}", tmp_path.display(), e))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            // Leave no stray temp file behind on a failed rename
            let _ = std::fs::remove_file(&tmp_path);
            MedkgError::Persistence(format!(
                "cannot replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        log::info!(
            "Saved knowledge graph to {} ({} nodes, {} edges)",
            self.path.display(),
            self.node_count(),
            self.edge_count()
        );
        Ok(())
    }
}
