//! Sub-scoring modules: one closed variant per pointer category, each condensing the
//! pointer's evaluation items into a single 0-10 score.

mod activity;
mod certificate;
mod document;
mod narrative;

use serde::{Deserialize, Serialize};

use super::domain::{AssessmentSection, EvaluationItem, MAX_SCORE};
use super::pointer::{PointerCategory, PointerId};
use super::weights::ActivitySelection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubScoringModule {
    DocumentAverage,
    WeightedActivity,
    NarrativeTask,
    CertificateAverage,
}

impl SubScoringModule {
    pub const fn for_pointer(pointer: PointerId) -> Self {
        match pointer.category() {
            PointerCategory::DocumentAverage => SubScoringModule::DocumentAverage,
            PointerCategory::WeightedActivity => SubScoringModule::WeightedActivity,
            PointerCategory::NarrativeTask => SubScoringModule::NarrativeTask,
            PointerCategory::CertificateAverage => SubScoringModule::CertificateAverage,
        }
    }

    /// Pure over `inputs`: calling twice on the same inputs yields the same score.
    pub fn recompute(&self, inputs: &PointerInputs) -> PointerScore {
        let (value, basis) = match self {
            SubScoringModule::DocumentAverage => document::score(&inputs.items, &inputs.sections),
            SubScoringModule::WeightedActivity => {
                activity::score(&inputs.items, inputs.selection.as_ref())
            }
            SubScoringModule::NarrativeTask => narrative::score(&inputs.items),
            SubScoringModule::CertificateAverage => certificate::score(&inputs.items),
        };

        PointerScore {
            pointer: inputs.pointer,
            value: clamp_score(value),
            basis,
        }
    }
}

/// Everything a module reads for one enrollment and pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerInputs {
    pub pointer: PointerId,
    pub items: Vec<EvaluationItem>,
    pub sections: Vec<AssessmentSection>,
    pub selection: Option<ActivitySelection>,
}

impl PointerInputs {
    pub fn new(pointer: PointerId) -> Self {
        Self {
            pointer,
            items: Vec::new(),
            sections: Vec::new(),
            selection: None,
        }
    }
}

/// Normalized pointer score plus the evidence it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerScore {
    pub pointer: PointerId,
    pub value: f64,
    pub basis: ScoreBasis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum ScoreBasis {
    /// Nothing graded yet; the pointer scores 0.
    Empty,
    Average {
        graded: usize,
        pending: usize,
    },
    Blended {
        document_average: Option<f64>,
        section_score: Option<f64>,
        graded_documents: usize,
    },
    Weighted {
        activities: usize,
    },
    /// Weights are complete but some selected activities are still ungraded and count as 0.
    PartiallyEvaluated {
        evaluated: usize,
        selected: usize,
    },
    /// No usable weight set; unweighted mean of the evaluated activities.
    FallbackMean {
        evaluated: usize,
    },
}

impl ScoreBasis {
    /// True for transitional results that are not a fully weighted, fully graded score.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            ScoreBasis::PartiallyEvaluated { .. } | ScoreBasis::FallbackMean { .. }
        )
    }
}

pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, MAX_SCORE)
    } else {
        0.0
    }
}

fn mean<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (total, count) = scores
        .into_iter()
        .fold((0.0, 0usize), |(total, count), score| (total + score, count + 1));
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// Mean of the current grades on items accepted by `filter`; ungraded items are excluded.
fn graded_average<F>(items: &[EvaluationItem], filter: F) -> (f64, ScoreBasis)
where
    F: Fn(&EvaluationItem) -> bool,
{
    let candidates: Vec<&EvaluationItem> = items.iter().filter(|&item| filter(item)).collect();
    let scores: Vec<f64> = candidates
        .iter()
        .filter_map(|item| item.current_score())
        .collect();

    match mean(scores.iter().copied()) {
        Some(average) => (
            average,
            ScoreBasis::Average {
                graded: scores.len(),
                pending: candidates.len() - scores.len(),
            },
        ),
        None => (0.0, ScoreBasis::Empty),
    }
}
