use super::{graded_average, ScoreBasis};
use crate::scoring::domain::{EvaluationItem, ItemKind};

/// Only grades recorded against a certificate's current revision count; a replaced file
/// waits for re-grading before it contributes again.
pub(super) fn score(items: &[EvaluationItem]) -> (f64, ScoreBasis) {
    graded_average(items, |item| {
        matches!(item.kind, ItemKind::Certificate { .. })
    })
}
