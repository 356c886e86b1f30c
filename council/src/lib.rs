//! LLM council deliberation engine.
//!
//! Coordinates several independent model services into a single consensus
//! answer through three sequential stages:
//!
//! 1. **Elicitation**: the user's query goes to every councilor in
//!    parallel; each answers independently.
//! 2. **Peer ranking**: the answers are anonymized as `Response A`,
//!    `Response B`, ... and every councilor ranks them.
//! 3. **Synthesis**: the chairman folds the answers and rankings into one
//!    final response.
//!
//! Failures are isolated per participant per stage. A councilor that times
//! out or errors is simply absent from that stage; a judge whose ranking
//! text cannot be parsed contributes no aggregate evidence; a failed
//! chairman yields a fixed fallback synthesis. Only a fully silent stage 1
//! terminates a run.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod council;
pub mod dispatch;
pub mod labels;
pub mod prompts;
pub mod ranking;
pub mod registry;

pub use aggregate::{aggregate, AggregateEntry};
pub use client::{ChatBackend, ChatMessage, OllamaClient, QueryError};
pub use config::{ConfigError, CouncilConfig, ParticipantConfig};
pub use council::{
    Council, CouncilError, CouncilPhase, CouncilRunOutput, CouncilSession, FinalSynthesis,
    PhaseTransition, RunMetadata, Stage1Result, Stage2Result, TransitionError,
};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use labels::{LabelEntry, LabelMap, LabelOverflow, MAX_LABELS};
pub use ranking::{parse_ranking, RANKING_MARKER};
pub use registry::{
    CouncilRegistry, Endpoint, ModelSpec, Participant, ParticipantId, ParticipantSeed,
    RegistryError, Role,
};
