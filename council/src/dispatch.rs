//! Query dispatcher - concurrent fan-out of one prompt to many participants.
//!
//! Every participant receives the same messages. Calls run concurrently and
//! independently; a timeout, transport error, or malformed payload on one
//! call never aborts or delays a sibling. The fan-in barrier resolves once
//! every call has produced an outcome, so a stage waits for its slowest
//! participant but never loses track of one.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::client::{ChatBackend, ChatMessage};
use crate::registry::{Participant, ParticipantId};

/// Outcome of one dispatched call, keyed by participant identity.
///
/// `response` is `None` when the call timed out, failed at the transport
/// level, or returned an unusable payload.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub participant: ParticipantId,
    pub response: Option<String>,
}

/// Fan-out/fan-in dispatcher over a chat backend.
pub struct Dispatcher {
    backend: Arc<dyn ChatBackend>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn ChatBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `messages` to every participant concurrently.
    ///
    /// The returned vector always has exactly one entry per input
    /// participant, in input order, regardless of completion order. No
    /// retries: a failed participant is absent for this dispatch only.
    pub async fn dispatch(
        &self,
        participants: &[Participant],
        messages: &[ChatMessage],
    ) -> Vec<DispatchOutcome> {
        let calls = participants.iter().map(|p| self.query_one(p, messages));
        join_all(calls).await
    }

    async fn query_one(
        &self,
        participant: &Participant,
        messages: &[ChatMessage],
    ) -> DispatchOutcome {
        let call = self.backend.chat(participant, messages);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => {
                debug!(
                    model = %participant.display_name(),
                    chars = text.len(),
                    "participant responded"
                );
                Some(text)
            }
            Ok(Err(err)) => {
                warn!(
                    model = %participant.display_name(),
                    endpoint = %participant.endpoint,
                    error = %err,
                    "participant query failed"
                );
                None
            }
            Err(_) => {
                warn!(
                    model = %participant.display_name(),
                    endpoint = %participant.endpoint,
                    timeout_secs = self.timeout.as_secs(),
                    "participant query timed out"
                );
                None
            }
        };

        DispatchOutcome {
            participant: participant.id,
            response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QueryError;
    use crate::registry::{Endpoint, ModelSpec, Role};
    use async_trait::async_trait;

    /// Per-model scripted behavior for a fake backend.
    #[derive(Clone)]
    enum Script {
        Respond(String),
        Fail,
        Hang,
    }

    struct ScriptedBackend {
        scripts: Vec<(String, Script)>,
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(
            &self,
            participant: &Participant,
            _messages: &[ChatMessage],
        ) -> Result<String, QueryError> {
            let script = self
                .scripts
                .iter()
                .find(|(model, _)| model == &participant.model)
                .map(|(_, s)| s.clone())
                .unwrap_or(Script::Fail);

            match script {
                Script::Respond(text) => Ok(text),
                Script::Fail => Err(QueryError::MalformedResponse {
                    model: participant.model.clone(),
                    reason: "scripted failure".to_string(),
                }),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("never".to_string())
                }
            }
        }
    }

    fn participant(id: usize, model: &str) -> Participant {
        Participant {
            id: ParticipantId(id),
            endpoint: Endpoint::new("localhost", 11434),
            model: model.to_string(),
            role: Role::Councilor,
            spec: ModelSpec::Standard,
        }
    }

    fn dispatcher(scripts: Vec<(&str, Script)>, timeout: Duration) -> Dispatcher {
        let backend = ScriptedBackend {
            scripts: scripts
                .into_iter()
                .map(|(m, s)| (m.to_string(), s))
                .collect(),
        };
        Dispatcher::new(Arc::new(backend), timeout)
    }

    #[tokio::test]
    async fn test_one_outcome_per_participant() {
        let dispatcher = dispatcher(
            vec![
                ("a", Script::Respond("answer a".to_string())),
                ("b", Script::Fail),
                ("c", Script::Respond("answer c".to_string())),
            ],
            Duration::from_secs(5),
        );
        let participants = vec![
            participant(0, "a"),
            participant(1, "b"),
            participant(2, "c"),
        ];

        let outcomes = dispatcher
            .dispatch(&participants, &[ChatMessage::user("q")])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].participant, ParticipantId(0));
        assert_eq!(outcomes[0].response.as_deref(), Some("answer a"));
        assert_eq!(outcomes[1].participant, ParticipantId(1));
        assert!(outcomes[1].response.is_none());
        assert_eq!(outcomes[2].response.as_deref(), Some("answer c"));
    }

    #[tokio::test]
    async fn test_timeout_isolated_to_slow_participant() {
        let dispatcher = dispatcher(
            vec![
                ("slow", Script::Hang),
                ("fast", Script::Respond("done".to_string())),
            ],
            Duration::from_millis(50),
        );
        let participants = vec![participant(0, "slow"), participant(1, "fast")];

        let outcomes = dispatcher
            .dispatch(&participants, &[ChatMessage::user("q")])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].response.is_none());
        assert_eq!(outcomes[1].response.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_output_order_tracks_input_order() {
        // The first participant finishes last; output order must not change.
        let dispatcher = dispatcher(
            vec![
                ("slow", Script::Hang),
                ("fast", Script::Respond("first to finish".to_string())),
            ],
            Duration::from_millis(50),
        );
        let participants = vec![participant(7, "slow"), participant(3, "fast")];

        let outcomes = dispatcher
            .dispatch(&participants, &[ChatMessage::user("q")])
            .await;

        let ids: Vec<ParticipantId> = outcomes.iter().map(|o| o.participant).collect();
        assert_eq!(ids, vec![ParticipantId(7), ParticipantId(3)]);
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_output() {
        let dispatcher = dispatcher(vec![], Duration::from_secs(1));
        let outcomes = dispatcher.dispatch(&[], &[ChatMessage::user("q")]).await;
        assert!(outcomes.is_empty());
    }
}
