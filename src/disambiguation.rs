//! External entity disambiguation: the last resolution tier before creation.
//!
//! The resolver asks the collaborator whether an ambiguous mention matches one
//! of the near-miss candidates or is a new entity. The collaborator's answer
//! is authoritative for its tier, but any failure, timeout, or non-answer is
//! reported as `DisambiguationUnavailable` and the resolver falls back to
//! creating a new entity, so this tier can never abort a run.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{MedkgError, Result};
use crate::graph::{EntityType, Node, NodeId};

/// Answer from a disambiguation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The mention refers to this existing node.
    Match(NodeId),
    /// The mention is a new entity.
    New,
}

/// Seam for the external disambiguation collaborator.
///
/// Implementations are called synchronously, one mention at a time; later
/// resolutions may depend on nodes created by earlier ones.
pub trait Disambiguator {
    fn disambiguate(
        &self,
        surface_form: &str,
        entity_type: EntityType,
        candidates: &[&Node],
    ) -> impl Future<Output = Result<Decision>> + Send;
}

/// Disambiguator for offline runs: always decides "new entity".
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDisambiguator;

impl Disambiguator for NoDisambiguator {
    async fn disambiguate(
        &self,
        _surface_form: &str,
        _entity_type: EntityType,
        _candidates: &[&Node],
    ) -> Result<Decision> {
        Ok(Decision::New)
    }
}

#[derive(Serialize)]
struct MentionPayload<'a> {
    name: &'a str,
    entity_type: EntityType,
}

#[derive(Serialize)]
struct CandidatePayload<'a> {
    entity_id: NodeId,
    name: &'a str,
    entity_type: EntityType,
    aliases: Vec<&'a str>,
}

/// Request structure for the disambiguation service
#[derive(Serialize)]
struct DisambiguationRequest<'a> {
    model: &'a str,
    mention: MentionPayload<'a>,
    candidates: Vec<CandidatePayload<'a>>,
}

/// Response structure from the disambiguation service:
/// `{"match": <entity_id>}` or `{"match": "new"}`.
#[derive(Deserialize)]
struct DisambiguationResponse {
    #[serde(rename = "match")]
    decision: MatchField,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MatchField {
    Id(u64),
    Label(String),
}

impl DisambiguationResponse {
    fn into_decision(self) -> Result<Decision> {
        match self.decision {
            MatchField::Id(id) => Ok(Decision::Match(NodeId(id))),
            MatchField::Label(label) => {
                let label = label.trim();
                if label.eq_ignore_ascii_case("new") || label.eq_ignore_ascii_case("no match") {
                    Ok(Decision::New)
                } else {
                    Err(MedkgError::DisambiguationUnavailable(format!(
                        "service returned undecidable answer: {label:?}"
                    )))
                }
            }
        }
    }
}

/// LLM-backed disambiguation client.
///
/// Posts the mention and candidate summaries to the configured endpoint and
/// expects a `{"match": ...}` answer. The whole call is bounded by a timeout;
/// an expired timeout is a tier failure, not a fatal error.
pub struct HttpDisambiguator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpDisambiguator {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// normal operation).
    pub fn new(endpoint: String, api_key: String, model: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint,
            api_key,
            model,
            timeout,
        }
    }

    async fn call_service(
        &self,
        surface_form: &str,
        entity_type: EntityType,
        candidates: &[&Node],
    ) -> Result<Decision> {
        let request = DisambiguationRequest {
            model: &self.model,
            mention: MentionPayload {
                name: surface_form,
                entity_type,
            },
            candidates: candidates
                .iter()
                .map(|n| CandidatePayload {
                    entity_id: n.id,
                    name: &n.canonical_name,
                    entity_type: n.entity_type,
                    aliases: n.aliases.iter().map(|a| a.as_str()).collect(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                MedkgError::DisambiguationUnavailable(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(MedkgError::DisambiguationUnavailable(format!(
                "service returned status {}",
                response.status()
            )));
        }

        let parsed: DisambiguationResponse = response.json().await.map_err(|e| {
            MedkgError::DisambiguationUnavailable(format!("unparseable response: {e}"))
        })?;
        parsed.into_decision()
    }
}

impl Disambiguator for HttpDisambiguator {
    async fn disambiguate(
        &self,
        surface_form: &str,
        entity_type: EntityType,
        candidates: &[&Node],
    ) -> Result<Decision> {
        // The reqwest client carries its own timeout; this outer bound also
        // covers connection setup and body streaming.
        match tokio::time::timeout(
            self.timeout,
            self.call_service(surface_form, entity_type, candidates),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MedkgError::DisambiguationUnavailable(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

/// Runtime-selected disambiguator, so the binary can switch between the HTTP
/// client and offline mode from configuration without trait objects.
pub enum AnyDisambiguator {
    Http(HttpDisambiguator),
    Off(NoDisambiguator),
}

impl Disambiguator for AnyDisambiguator {
    async fn disambiguate(
        &self,
        surface_form: &str,
        entity_type: EntityType,
        candidates: &[&Node],
    ) -> Result<Decision> {
        match self {
            AnyDisambiguator::Http(d) => {
                d.disambiguate(surface_form, entity_type, candidates).await
            }
            AnyDisambiguator::Off(d) => {
                d.disambiguate(surface_form, entity_type, candidates).await
            }
        }
    }
}
