//! Anonymized response labels - deterministic A..Z assignment.
//!
//! Labels shield response authorship during peer ranking. Assignment follows
//! the stage-1 result sequence (council order), never network arrival order,
//! so a fixed result sequence always yields the same labels.

use thiserror::Error;

use crate::registry::ParticipantId;

/// Upper bound imposed by the single-letter label alphabet.
pub const MAX_LABELS: usize = 26;

/// More responses than the label alphabet can name. Rejected explicitly
/// rather than wrapping around into ambiguous labels.
#[derive(Debug, Error)]
#[error("cannot label {count} responses: the label alphabet supports at most {MAX_LABELS}")]
pub struct LabelOverflow {
    pub count: usize,
}

/// One label assignment: label text, authoring participant, display name.
#[derive(Debug, Clone)]
pub struct LabelEntry {
    pub label: String,
    pub participant: ParticipantId,
    pub model: String,
}

/// Bijection from anonymized label to the authoring participant.
///
/// Built once per ranking stage from the stage-1 result sequence; immutable
/// afterward.
#[derive(Debug, Clone)]
pub struct LabelMap {
    entries: Vec<LabelEntry>,
}

impl LabelMap {
    /// Assign `Response A`, `Response B`, ... to `authors` in sequence order.
    pub fn assign(authors: &[(ParticipantId, String)]) -> Result<Self, LabelOverflow> {
        if authors.len() > MAX_LABELS {
            return Err(LabelOverflow {
                count: authors.len(),
            });
        }

        let entries = authors
            .iter()
            .enumerate()
            .map(|(index, (participant, model))| LabelEntry {
                label: label_text(index),
                participant: *participant,
                model: model.clone(),
            })
            .collect();
        Ok(Self { entries })
    }

    /// Look up a label's assignment, e.g. `"Response A"`.
    pub fn get(&self, label: &str) -> Option<&LabelEntry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Assignments in label order (A first).
    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Label text for the response at `index`: 0 is `Response A`.
fn label_text(index: usize) -> String {
    debug_assert!(index < MAX_LABELS);
    let letter = (b'A' + index as u8) as char;
    format!("Response {letter}")
}
