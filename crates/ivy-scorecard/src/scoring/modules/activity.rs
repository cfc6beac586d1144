use std::collections::BTreeMap;

use super::{mean, ScoreBasis};
use crate::scoring::domain::{EvaluationItem, ItemId, ItemKind};
use crate::scoring::weights::ActivitySelection;

pub(super) fn score(
    items: &[EvaluationItem],
    selection: Option<&ActivitySelection>,
) -> (f64, ScoreBasis) {
    let graded: BTreeMap<&ItemId, f64> = items
        .iter()
        .filter(|item| matches!(item.kind, ItemKind::Activity))
        .filter_map(|item| item.current_score().map(|score| (&item.id, score)))
        .collect();

    let Some(selection) = selection.filter(|selection| !selection.activities.is_empty()) else {
        // Nothing selected yet: every graded activity counts, unweighted.
        return fallback(graded.values().copied());
    };

    let Some(weights) = selection.complete_weights() else {
        return fallback(
            selection
                .activities
                .iter()
                .filter_map(|id| graded.get(id).copied()),
        );
    };

    let mut evaluated = 0;
    let mut value = 0.0;
    for id in &selection.activities {
        if let Some(score) = graded.get(id) {
            evaluated += 1;
            value += weights.get(id).copied().unwrap_or(0.0) / 100.0 * score;
        }
    }

    let selected = selection.activities.len();
    if evaluated == selected {
        (
            value,
            ScoreBasis::Weighted {
                activities: selected,
            },
        )
    } else {
        (
            value,
            ScoreBasis::PartiallyEvaluated {
                evaluated,
                selected,
            },
        )
    }
}

fn fallback<I>(scores: I) -> (f64, ScoreBasis)
where
    I: IntoIterator<Item = f64>,
{
    let scores: Vec<f64> = scores.into_iter().collect();
    match mean(scores.iter().copied()) {
        Some(average) => (
            average,
            ScoreBasis::FallbackMean {
                evaluated: scores.len(),
            },
        ),
        None => (0.0, ScoreBasis::Empty),
    }
}
