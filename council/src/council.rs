//! Council orchestration - the three-stage deliberation state machine.
//!
//! A run advances through fixed phases, each one a fan-out of independent
//! model calls followed by a fan-in barrier:
//!
//! ```text
//! Idle → Stage1 → Stage2 → Stage3 → Done
//!           │
//!           └─ no councilor responded → Failed
//! ```
//!
//! Partial failure never aborts a stage: a councilor absent from stage 1
//! simply gets no label, a judge whose ranking cannot be parsed contributes
//! no aggregate evidence, and a failed chairman is replaced by a fixed
//! fallback synthesis. Only a fully silent stage 1 terminates a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::{aggregate, AggregateEntry};
use crate::client::{ChatBackend, ChatMessage};
use crate::dispatch::Dispatcher;
use crate::labels::{LabelMap, LabelOverflow};
use crate::prompts;
use crate::ranking::parse_ranking;
use crate::registry::{CouncilRegistry, ParticipantId};

/// Phase of a council deliberation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CouncilPhase {
    /// Run created but not started.
    Idle,
    /// Councilors answering the query in parallel.
    Stage1,
    /// Councilors cross-ranking the anonymized answers.
    Stage2,
    /// Chairman synthesizing the final answer.
    Stage3,
    /// Run complete with a full output bundle.
    Done,
    /// No councilor produced a stage-1 response.
    Failed,
}

impl CouncilPhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Valid transitions from this phase. `Failed` is reachable from
    /// `Stage1` only; stages 2 and 3 always complete.
    pub fn valid_transitions(self) -> &'static [CouncilPhase] {
        match self {
            Self::Idle => &[Self::Stage1],
            Self::Stage1 => &[Self::Stage2, Self::Failed],
            Self::Stage2 => &[Self::Stage3],
            Self::Stage3 => &[Self::Done],
            Self::Done | Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for CouncilPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Stage1 => write!(f, "stage1"),
            Self::Stage2 => write!(f, "stage2"),
            Self::Stage3 => write!(f, "stage3"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: CouncilPhase,
    pub to: CouncilPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid phase transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition {from} -> {to}")]
pub struct TransitionError {
    pub from: CouncilPhase,
    pub to: CouncilPhase,
}

/// Bookkeeping for one deliberation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilSession {
    pub id: Uuid,
    pub phase: CouncilPhase,
    pub transitions: Vec<PhaseTransition>,
    pub created_at: DateTime<Utc>,
    /// The user query being deliberated.
    pub query: String,
}

impl CouncilSession {
    pub fn new(query: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: CouncilPhase::Idle,
            transitions: Vec::new(),
            created_at: Utc::now(),
            query: query.to_string(),
        }
    }

    /// Transition to a new phase with a reason.
    pub fn transition(&mut self, to: CouncilPhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
            });
        }
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] {} transitions | query={:.40}",
            self.phase,
            self.transitions.len(),
            self.query
        )
    }
}

/// Individual answer collected during stage 1. The response text is opaque
/// and never re-parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage1Result {
    pub participant: ParticipantId,
    pub model: String,
    pub response: String,
}

/// Peer ranking collected during stage 2. `parsed_ranking` may be shorter
/// than the label set or empty when the judge ignored the format contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage2Result {
    pub participant: ParticipantId,
    pub model: String,
    /// Raw judge reply, kept verbatim for the chairman and for callers.
    pub ranking: String,
    pub parsed_ranking: Vec<String>,
}

/// Chairman synthesis produced during stage 3. On chairman failure the
/// response carries a fixed failure notice and the run still completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalSynthesis {
    pub participant: ParticipantId,
    pub model: String,
    pub response: String,
}

/// Metadata accompanying a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Anonymized label to model display name, in label order.
    pub label_to_model: BTreeMap<String, String>,
    pub aggregate_rankings: Vec<AggregateEntry>,
}

/// Output bundle of a completed deliberation. Shape is stable regardless of
/// partial failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilRunOutput {
    pub session: Uuid,
    pub stage1: Vec<Stage1Result>,
    pub stage2: Vec<Stage2Result>,
    pub synthesis: FinalSynthesis,
    pub metadata: RunMetadata,
}

/// Terminal errors from a deliberation run.
#[derive(Debug, Error)]
pub enum CouncilError {
    /// Every councilor failed during stage 1; there is nothing to rank or
    /// synthesize.
    #[error("no participant produced a response")]
    NoParticipantResponded,

    #[error(transparent)]
    LabelOverflow(#[from] LabelOverflow),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Drives the three-stage deliberation over a registry of participants.
pub struct Council {
    registry: CouncilRegistry,
    dispatcher: Dispatcher,
}

impl Council {
    pub fn new(
        registry: CouncilRegistry,
        backend: Arc<dyn ChatBackend>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            dispatcher: Dispatcher::new(backend, request_timeout),
        }
    }

    pub fn registry(&self) -> &CouncilRegistry {
        &self.registry
    }

    /// Run the full three-stage deliberation for one query.
    pub async fn run(&self, query: &str) -> Result<CouncilRunOutput, CouncilError> {
        let mut session = CouncilSession::new(query);

        session.transition(CouncilPhase::Stage1, "query received")?;
        info!(
            session = %session.id,
            councilors = self.registry.councilors().len(),
            "stage 1: collecting responses"
        );
        let stage1 = self.collect_responses(query).await;

        if stage1.is_empty() {
            session.transition(CouncilPhase::Failed, "no councilor responded")?;
            warn!(session = %session.id, "run failed: no councilor responded");
            return Err(CouncilError::NoParticipantResponded);
        }

        session.transition(CouncilPhase::Stage2, "responses collected")?;
        info!(
            session = %session.id,
            responses = stage1.len(),
            "stage 2: collecting peer rankings"
        );
        let (stage2, labels) = self.collect_rankings(query, &stage1).await?;
        let aggregate_rankings = aggregate(stage2.iter().map(|r| &r.parsed_ranking), &labels);

        session.transition(CouncilPhase::Stage3, "rankings collected")?;
        info!(
            session = %session.id,
            rankings = stage2.len(),
            "stage 3: chairman synthesis"
        );
        let synthesis = self.synthesize(query, &stage1, &stage2).await;

        session.transition(CouncilPhase::Done, "synthesis produced")?;
        info!(session = %session.id, "run complete");

        let label_to_model = labels
            .entries()
            .iter()
            .map(|e| (e.label.clone(), e.model.clone()))
            .collect();

        Ok(CouncilRunOutput {
            session: session.id,
            stage1,
            stage2,
            synthesis,
            metadata: RunMetadata {
                label_to_model,
                aggregate_rankings,
            },
        })
    }

    /// Stage 1: the query goes to every councilor in parallel; only
    /// responders appear in the result sequence, in council order.
    async fn collect_responses(&self, query: &str) -> Vec<Stage1Result> {
        let messages = [ChatMessage::user(query)];
        let councilors = self.registry.councilors();
        let outcomes = self.dispatcher.dispatch(councilors, &messages).await;

        councilors
            .iter()
            .zip(outcomes)
            .filter_map(|(participant, outcome)| {
                outcome.response.map(|response| Stage1Result {
                    participant: participant.id,
                    model: participant.display_name().to_string(),
                    response,
                })
            })
            .collect()
    }

    /// Stage 2: anonymize the stage-1 answers, ask every councilor to rank
    /// them, and parse each reply. A judge that fails or returns
    /// unparseable text reduces aggregate evidence but never aborts.
    async fn collect_rankings(
        &self,
        query: &str,
        stage1: &[Stage1Result],
    ) -> Result<(Vec<Stage2Result>, LabelMap), LabelOverflow> {
        let authors: Vec<(ParticipantId, String)> = stage1
            .iter()
            .map(|r| (r.participant, r.model.clone()))
            .collect();
        let labels = LabelMap::assign(&authors)?;

        let labeled_responses: Vec<(String, String)> = labels
            .entries()
            .iter()
            .zip(stage1)
            .map(|(entry, result)| (entry.label.clone(), result.response.clone()))
            .collect();

        let prompt = prompts::ranking_prompt(query, &labeled_responses);
        let messages = [ChatMessage::user(prompt)];
        let councilors = self.registry.councilors();
        let outcomes = self.dispatcher.dispatch(councilors, &messages).await;

        let stage2 = councilors
            .iter()
            .zip(outcomes)
            .filter_map(|(participant, outcome)| {
                outcome.response.map(|ranking| Stage2Result {
                    participant: participant.id,
                    model: participant.display_name().to_string(),
                    parsed_ranking: parse_ranking(&ranking),
                    ranking,
                })
            })
            .collect();

        Ok((stage2, labels))
    }

    /// Stage 3: one call to the chairman. Failure yields the fixed fallback
    /// synthesis so the run still completes.
    async fn synthesize(
        &self,
        query: &str,
        stage1: &[Stage1Result],
        stage2: &[Stage2Result],
    ) -> FinalSynthesis {
        let responses: Vec<(String, String)> = stage1
            .iter()
            .map(|r| (r.model.clone(), r.response.clone()))
            .collect();
        let rankings: Vec<(String, String)> = stage2
            .iter()
            .map(|r| (r.model.clone(), r.ranking.clone()))
            .collect();

        let prompt = prompts::synthesis_prompt(query, &responses, &rankings);
        let messages = [ChatMessage::user(prompt)];
        let chairman = self.registry.chairman();

        let mut outcomes = self
            .dispatcher
            .dispatch(std::slice::from_ref(chairman), &messages)
            .await;

        match outcomes.pop().and_then(|o| o.response) {
            Some(response) => FinalSynthesis {
                participant: chairman.id,
                model: chairman.display_name().to_string(),
                response,
            },
            None => {
                warn!(model = %chairman.display_name(), "chairman failed, using fallback synthesis");
                FinalSynthesis {
                    participant: chairman.id,
                    model: chairman.display_name().to_string(),
                    response: prompts::FALLBACK_SYNTHESIS.to_string(),
                }
            }
        }
    }

    /// Generate a short conversation title with a single councilor call.
    /// Independent of the stage machine; failure falls back to a fixed
    /// default title.
    pub async fn generate_title(&self, query: &str) -> String {
        let Some(first) = self.registry.councilors().first() else {
            return prompts::DEFAULT_TITLE.to_string();
        };

        let messages = [ChatMessage::user(prompts::title_prompt(query))];
        let mut outcomes = self
            .dispatcher
            .dispatch(std::slice::from_ref(first), &messages)
            .await;

        match outcomes.pop().and_then(|o| o.response) {
            Some(raw) => normalize_title(&raw),
            None => prompts::DEFAULT_TITLE.to_string(),
        }
    }
}

/// Strip quoting and clamp length on a model-generated title.
fn normalize_title(raw: &str) -> String {
    let title = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if title.is_empty() {
        return prompts::DEFAULT_TITLE.to_string();
    }
    if title.chars().count() > 50 {
        let clipped: String = title.chars().take(47).collect();
        format!("{clipped}...")
    } else {
        title.to_string()
    }
}
