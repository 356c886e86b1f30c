//! Rank aggregation - consensus ordering from peer rankings.
//!
//! Folds every judge's parsed label list into an average 1-based position
//! per participant. A participant no judge mentioned is omitted rather than
//! given a default rank; labels the parser surfaced but the label map does
//! not know are discarded as artifacts.

use serde::{Deserialize, Serialize};

use crate::labels::LabelMap;
use crate::registry::ParticipantId;

/// Consensus standing of one participant across all peer rankings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEntry {
    pub participant: ParticipantId,
    pub model: String,
    /// Arithmetic mean of 1-based positions, rounded to two decimals.
    pub average_rank: f64,
    /// Number of judges whose parsed ranking mentioned this participant.
    pub rankings_count: usize,
}

/// Aggregate parsed rankings into a consensus ordering, best average first.
///
/// Ties on average rank keep first-appearance order: accumulation is
/// insertion-ordered and the sort is stable, so equal averages never
/// reorder between runs.
pub fn aggregate<'a, I>(rankings: I, labels: &LabelMap) -> Vec<AggregateEntry>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let mut positions: Vec<(ParticipantId, String, Vec<usize>)> = Vec::new();

    for parsed in rankings {
        for (index, label) in parsed.iter().enumerate() {
            let Some(entry) = labels.get(label) else {
                continue;
            };
            let position = index + 1;
            match positions
                .iter_mut()
                .find(|(id, _, _)| *id == entry.participant)
            {
                Some((_, _, collected)) => collected.push(position),
                None => positions.push((entry.participant, entry.model.clone(), vec![position])),
            }
        }
    }

    let mut entries: Vec<AggregateEntry> = positions
        .into_iter()
        .map(|(participant, model, collected)| {
            let sum: usize = collected.iter().sum();
            AggregateEntry {
                participant,
                model,
                average_rank: round2(sum as f64 / collected.len() as f64),
                rankings_count: collected.len(),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        a.average_rank
            .partial_cmp(&b.average_rank)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    entries
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_map(models: &[&str]) -> LabelMap {
        let authors: Vec<(ParticipantId, String)> = models
            .iter()
            .enumerate()
            .map(|(i, m)| (ParticipantId(i), m.to_string()))
            .collect();
        LabelMap::assign(&authors).unwrap()
    }

    fn ranking(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_two_judges_average() {
        let labels = label_map(&["alpha", "beta", "gamma"]);
        let rankings = vec![
            ranking(&["Response A", "Response B", "Response C"]),
            ranking(&["Response B", "Response A", "Response C"]),
        ];

        let entries = aggregate(&rankings, &labels);

        assert_eq!(entries.len(), 3);
        // A and B both average 1.5; A appeared first and stays ahead.
        assert_eq!(entries[0].model, "alpha");
        assert_eq!(entries[0].average_rank, 1.5);
        assert_eq!(entries[1].model, "beta");
        assert_eq!(entries[1].average_rank, 1.5);
        assert_eq!(entries[2].model, "gamma");
        assert_eq!(entries[2].average_rank, 3.0);
        assert!(entries.iter().all(|e| e.rankings_count == 2));
    }

    #[test]
    fn test_unknown_labels_discarded() {
        let labels = label_map(&["alpha"]);
        let rankings = vec![ranking(&["Response Z", "Response A"])];

        let entries = aggregate(&rankings, &labels);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].model, "alpha");
        // Position is the label's place in the judge's list, artifacts included.
        assert_eq!(entries[0].average_rank, 2.0);
    }

    #[test]
    fn test_unmentioned_participant_omitted() {
        let labels = label_map(&["alpha", "beta"]);
        let rankings = vec![ranking(&["Response A"])];

        let entries = aggregate(&rankings, &labels);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].participant, ParticipantId(0));
    }

    #[test]
    fn test_partial_rankings_change_counts() {
        let labels = label_map(&["alpha", "beta"]);
        let rankings = vec![
            ranking(&["Response A", "Response B"]),
            ranking(&["Response B"]),
            ranking(&[]),
        ];

        let entries = aggregate(&rankings, &labels);

        let beta = entries.iter().find(|e| e.model == "beta").unwrap();
        assert_eq!(beta.rankings_count, 2);
        assert_eq!(beta.average_rank, 1.5);
        let alpha = entries.iter().find(|e| e.model == "alpha").unwrap();
        assert_eq!(alpha.rankings_count, 1);
    }

    #[test]
    fn test_average_rounded_to_two_decimals() {
        let labels = label_map(&["alpha"]);
        let rankings = vec![
            ranking(&["Response A"]),
            ranking(&["dummy", "Response A"]),
            ranking(&["dummy", "Response A"]),
        ];
        // Positions 1, 2, 2 -> 5/3 = 1.666... -> 1.67.
        let entries = aggregate(&rankings, &labels);
        assert_eq!(entries[0].average_rank, 1.67);
    }

    #[test]
    fn test_no_rankings_yields_empty() {
        let labels = label_map(&["alpha", "beta"]);
        let entries = aggregate(&Vec::new(), &labels);
        assert!(entries.is_empty());
    }
}
