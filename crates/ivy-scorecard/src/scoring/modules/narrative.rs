use super::{graded_average, ScoreBasis};
use crate::scoring::domain::{EvaluationItem, ItemKind};

pub(super) fn score(items: &[EvaluationItem]) -> (f64, ScoreBasis) {
    graded_average(items, |item| matches!(item.kind, ItemKind::Narrative))
}
