//! Entity canonicalization: resolve a mention to an existing node or create
//! a new one.
//!
//! Resolution runs an ordered sequence of tiers, short-circuiting on the
//! first confident result:
//!
//! 1. exact match on normalized canonical names and aliases (same type only)
//! 2. fuzzy match via the similarity scorer, with an acceptance threshold and
//!    an ambiguity margin over the runner-up
//! 3. external disambiguation over the near-miss candidates
//! 4. creation of a fresh node
//!
//! Tier 3 failures and non-answers fall through to creation: a wrong "new" is
//! recoverable by later evidence, a wrong merge is not.

use serde::Deserialize;

use crate::disambiguation::{Decision, Disambiguator};
use crate::error::{MedkgError, Result};
use crate::graph::{EntityType, GraphStore, Mention, Node, NodeId};
use crate::similarity::{self, name_similarity_with};

/// Tunable resolution constants. The defaults are the documented choices for
/// the open thresholds; all are overridable from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionSettings {
    /// Minimum similarity for a fuzzy match to resolve without escalation.
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: f64,
    /// A fuzzy best match is only accepted when it beats the runner-up by at
    /// least this much; closer contests escalate to the external tier.
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: f64,
    /// Minimum similarity for a node to be offered to the external
    /// disambiguator as a candidate.
    #[serde(default = "default_candidate_floor")]
    pub candidate_floor: f64,
    /// Punctuation treated as whitespace during name normalization.
    #[serde(default = "default_strip_chars")]
    pub strip_chars: String,
}

fn default_accept_threshold() -> f64 {
    0.85
}

fn default_ambiguity_margin() -> f64 {
    0.05
}

fn default_candidate_floor() -> f64 {
    0.5
}

fn default_strip_chars() -> String {
    similarity::DEFAULT_STRIP_CHARS.to_string()
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            accept_threshold: default_accept_threshold(),
            ambiguity_margin: default_ambiguity_margin(),
            candidate_floor: default_candidate_floor(),
            strip_chars: default_strip_chars(),
        }
    }
}

/// Which tier resolved a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Exact,
    Fuzzy,
    External,
    Created,
}

/// Outcome of resolving one mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub node_id: NodeId,
    pub tier: ResolutionTier,
}

/// Resolves mentions against a graph store using the tier sequence above.
pub struct Resolver<D> {
    settings: ResolutionSettings,
    disambiguator: D,
}

impl<D: Disambiguator> Resolver<D> {
    pub fn new(settings: ResolutionSettings, disambiguator: D) -> Self {
        Self {
            settings,
            disambiguator,
        }
    }

    /// Resolve a mention to a node id, creating the node when no tier finds a
    /// confident match.
    ///
    /// Every successful resolution appends the provenance as a mention; fuzzy
    /// and external matches additionally record the normalized surface form
    /// as an alias. Re-resolving a surface form already known to the graph
    /// lands on the same node (exact tier), so repeated runs never duplicate
    /// entities.
    pub async fn resolve(
        &self,
        store: &mut GraphStore,
        surface_form: &str,
        entity_type: EntityType,
        provenance: Mention,
    ) -> Result<Resolution> {
        let normalized = similarity::normalize_name_with(surface_form, &self.settings.strip_chars);
        if normalized.is_empty() {
            return Err(MedkgError::Validation(format!(
                "surface form {surface_form:?} is empty after normalization"
            )));
        }

        // Tier 1: exact match against canonical names and aliases
        let exact: Vec<NodeId> = store
            .candidates(entity_type)
            .filter(|n| n.known_names().any(|name| name == normalized))
            .map(|n| n.id)
            .collect();
        if let Some(&id) = exact.first() {
            if exact.len() > 1 {
                // Should not happen in a consistent graph; keep the run going
                log::warn!(
                    "'{normalized}' matches {} nodes exactly, resolving to first-created {id}",
                    exact.len()
                );
            }
            log::debug!("Exact match for '{surface_form}' -> {id}");
            store.add_mention(id, provenance)?;
            return Ok(Resolution {
                node_id: id,
                tier: ResolutionTier::Exact,
            });
        }

        // Tier 2: fuzzy match, best score over each node's known names
        let mut scored: Vec<(NodeId, f64)> = store
            .candidates(entity_type)
            .map(|n| {
                let best = n
                    .known_names()
                    .map(|name| name_similarity_with(&normalized, name, &self.settings.strip_chars))
                    .fold(0.0_f64, f64::max);
                (n.id, best)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        if let Some(&(best_id, best)) = scored.first() {
            let runner_up = scored.get(1).map(|s| s.1).unwrap_or(0.0);
            if best >= self.settings.accept_threshold
                && best - runner_up >= self.settings.ambiguity_margin
            {
                log::debug!(
                    "Fuzzy match for '{surface_form}' -> {best_id} (score {best:.3})"
                );
                store.add_alias(best_id, normalized)?;
                store.add_mention(best_id, provenance)?;
                return Ok(Resolution {
                    node_id: best_id,
                    tier: ResolutionTier::Fuzzy,
                });
            }
        }

        // Tier 3: external disambiguation over near-miss candidates
        let candidate_ids: Vec<NodeId> = scored
            .iter()
            .filter(|s| s.1 >= self.settings.candidate_floor)
            .map(|s| s.0)
            .collect();
        if !candidate_ids.is_empty() {
            let decision = {
                let candidates: Vec<&Node> = candidate_ids
                    .iter()
                    .filter_map(|id| store.node(*id))
                    .collect();
                self.disambiguator
                    .disambiguate(surface_form, entity_type, &candidates)
                    .await
            };
            match decision {
                Ok(Decision::Match(id)) if candidate_ids.contains(&id) => {
                    log::debug!("Disambiguation matched '{surface_form}' -> {id}");
                    store.add_alias(id, normalized)?;
                    store.add_mention(id, provenance)?;
                    return Ok(Resolution {
                        node_id: id,
                        tier: ResolutionTier::External,
                    });
                }
                Ok(Decision::Match(id)) => {
                    log::warn!(
                        "Disambiguation returned {id}, which was not a candidate for \
                         '{surface_form}'; treating as new entity"
                    );
                }
                Ok(Decision::New) => {}
                Err(e) => {
                    log::warn!(
                        "Disambiguation unavailable for '{surface_form}' ({e}); \
                         treating as new entity"
                    );
                }
            }
        }

        // Tier 4: create
        let id = store.create_node(normalized, entity_type, provenance);
        log::info!("Created new {entity_type} node {id} for '{surface_form}'");
        Ok(Resolution {
            node_id: id,
            tier: ResolutionTier::Created,
        })
    }
}
