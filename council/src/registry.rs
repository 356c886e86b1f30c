//! Model registry - participant descriptors and construction-time validation.
//!
//! A council is an ordered set of participants: exactly one Chairman (who
//! synthesizes the final answer) plus any number of Councilors (who answer
//! and cross-rank). Identity is an arena-style index assigned in input order
//! at construction, so a given participant list always produces the same ids.
//! Participants are immutable once the registry is built.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no participant holds the chairman role")]
    MissingChairman,

    #[error("multiple participants hold the chairman role: {first} and {second}")]
    DuplicateChairman { first: String, second: String },

    #[error("invalid connection target for {model}: {reason}")]
    InvalidEndpoint { model: String, reason: String },
}

/// Role a participant plays in the council.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Synthesizes the final answer from responses and rankings.
    Chairman,
    /// Answers the query and ranks peer responses.
    Councilor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chairman => write!(f, "chairman"),
            Self::Councilor => write!(f, "councilor"),
        }
    }
}

/// How the participant's model is provisioned on its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Served under its upstream name, unmodified.
    Standard,
    /// Derived from the base model with a custom system instruction.
    Customized { system_prompt: String },
}

/// Connection target of one model service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the service, e.g. `http://ollama:11434`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Stable identity of a participant within one council instance.
///
/// Assigned by the registry constructor in input order; never reused or
/// reassigned for the lifetime of the council.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub usize);

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declarative description of a participant, before identity assignment.
#[derive(Debug, Clone)]
pub struct ParticipantSeed {
    pub endpoint: Endpoint,
    pub model: String,
    pub role: Role,
    pub spec: ModelSpec,
}

/// A configured model endpoint taking part in the council.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub endpoint: Endpoint,
    /// Upstream model identifier, e.g. `qwen3:0.6b`.
    pub model: String,
    pub role: Role,
    pub spec: ModelSpec,
}

impl Participant {
    /// Display identity used in run output and logs.
    pub fn display_name(&self) -> &str {
        &self.model
    }

    /// Model tag used on the wire. Customized participants chat under a
    /// derived tag created at provisioning time.
    pub fn served_model(&self) -> String {
        match self.spec {
            ModelSpec::Standard => self.model.clone(),
            ModelSpec::Customized { .. } => format!("{}-council", self.model),
        }
    }
}

/// Ordered collection of participants with exactly one chairman.
#[derive(Debug, Clone)]
pub struct CouncilRegistry {
    chairman: Participant,
    councilors: Vec<Participant>,
}

impl CouncilRegistry {
    /// Build a registry from seeds, assigning ids in input order.
    ///
    /// Fails when zero or more than one seed carries the Chairman role, or
    /// when a connection target does not form a syntactically valid URL.
    pub fn new(seeds: Vec<ParticipantSeed>) -> Result<Self, RegistryError> {
        for seed in &seeds {
            validate_endpoint(seed)?;
        }

        let mut chairman: Option<Participant> = None;
        let mut councilors = Vec::new();

        for (index, seed) in seeds.into_iter().enumerate() {
            let participant = Participant {
                id: ParticipantId(index),
                endpoint: seed.endpoint,
                model: seed.model,
                role: seed.role,
                spec: seed.spec,
            };
            match participant.role {
                Role::Chairman => match chairman {
                    None => chairman = Some(participant),
                    Some(ref existing) => {
                        return Err(RegistryError::DuplicateChairman {
                            first: existing.model.clone(),
                            second: participant.model.clone(),
                        })
                    }
                },
                Role::Councilor => councilors.push(participant),
            }
        }

        let chairman = chairman.ok_or(RegistryError::MissingChairman)?;
        Ok(Self {
            chairman,
            councilors,
        })
    }

    /// The single participant that synthesizes the final answer.
    pub fn chairman(&self) -> &Participant {
        &self.chairman
    }

    /// Councilors in registry order (input order minus the chairman).
    pub fn councilors(&self) -> &[Participant] {
        &self.councilors
    }

    /// Look up any participant by id.
    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        if self.chairman.id == id {
            return Some(&self.chairman);
        }
        self.councilors.iter().find(|p| p.id == id)
    }

    /// All participants, chairman first.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        std::iter::once(&self.chairman).chain(self.councilors.iter())
    }

    pub fn len(&self) -> usize {
        self.councilors.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Syntactic validation only: the host/port pair must form a parseable URL.
/// Reachability is a runtime concern handled per call by the dispatcher.
fn validate_endpoint(seed: &ParticipantSeed) -> Result<(), RegistryError> {
    let url = format!("{}/", seed.endpoint.base_url());
    reqwest::Url::parse(&url).map_err(|e| RegistryError::InvalidEndpoint {
        model: seed.model.clone(),
        reason: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(model: &str, role: Role) -> ParticipantSeed {
        ParticipantSeed {
            endpoint: Endpoint::new("localhost", 11434),
            model: model.to_string(),
            role,
            spec: ModelSpec::Standard,
        }
    }

    #[test]
    fn test_single_chairman_accepted() {
        let registry = CouncilRegistry::new(vec![
            seed("llama3.2:1b", Role::Chairman),
            seed("qwen3:0.6b", Role::Councilor),
            seed("gemma3:1b", Role::Councilor),
        ])
        .unwrap();

        assert_eq!(registry.chairman().model, "llama3.2:1b");
        assert_eq!(registry.councilors().len(), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_ids_follow_input_order() {
        let registry = CouncilRegistry::new(vec![
            seed("a", Role::Councilor),
            seed("b", Role::Chairman),
            seed("c", Role::Councilor),
        ])
        .unwrap();

        assert_eq!(registry.chairman().id, ParticipantId(1));
        assert_eq!(registry.councilors()[0].id, ParticipantId(0));
        assert_eq!(registry.councilors()[1].id, ParticipantId(2));
    }

    #[test]
    fn test_missing_chairman_rejected() {
        let err = CouncilRegistry::new(vec![seed("a", Role::Councilor)]).unwrap_err();
        assert!(matches!(err, RegistryError::MissingChairman));
    }

    #[test]
    fn test_duplicate_chairman_rejected() {
        let err = CouncilRegistry::new(vec![
            seed("a", Role::Chairman),
            seed("b", Role::Chairman),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateChairman { .. }));
    }

    #[test]
    fn test_invalid_host_rejected() {
        let mut bad = seed("a", Role::Chairman);
        bad.endpoint.host = "not a host".to_string();
        let err = CouncilRegistry::new(vec![bad]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidEndpoint { .. }));

        let mut empty = seed("b", Role::Chairman);
        empty.endpoint.host = String::new();
        let err = CouncilRegistry::new(vec![empty]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_lookup_by_id() {
        let registry = CouncilRegistry::new(vec![
            seed("chair", Role::Chairman),
            seed("c1", Role::Councilor),
        ])
        .unwrap();

        assert_eq!(registry.get(ParticipantId(0)).unwrap().model, "chair");
        assert_eq!(registry.get(ParticipantId(1)).unwrap().model, "c1");
        assert!(registry.get(ParticipantId(9)).is_none());
    }

    #[test]
    fn test_served_model_for_customized() {
        let standard = Participant {
            id: ParticipantId(0),
            endpoint: Endpoint::new("localhost", 11434),
            model: "qwen3:0.6b".to_string(),
            role: Role::Councilor,
            spec: ModelSpec::Standard,
        };
        assert_eq!(standard.served_model(), "qwen3:0.6b");

        let customized = Participant {
            spec: ModelSpec::Customized {
                system_prompt: "Always answer in haiku.".to_string(),
            },
            ..standard
        };
        assert_eq!(customized.served_model(), "qwen3:0.6b-council");
    }

    #[test]
    fn test_participants_iterates_chairman_first() {
        let registry = CouncilRegistry::new(vec![
            seed("c1", Role::Councilor),
            seed("chair", Role::Chairman),
        ])
        .unwrap();

        let models: Vec<&str> = registry.participants().map(|p| p.display_name()).collect();
        assert_eq!(models, vec!["chair", "c1"]);
    }
}
