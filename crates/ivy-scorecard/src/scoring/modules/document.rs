use super::{clamp_score, mean, ScoreBasis};
use crate::scoring::domain::{AssessmentSection, EvaluationItem, ItemKind};

/// Half graded-document mean, half weighted assessment sections. A missing half counts as 0.
pub(super) fn score(items: &[EvaluationItem], sections: &[AssessmentSection]) -> (f64, ScoreBasis) {
    let scores: Vec<f64> = items
        .iter()
        .filter(|item| matches!(item.kind, ItemKind::Document))
        .filter_map(EvaluationItem::current_score)
        .collect();
    let document_average = mean(scores.iter().copied());
    let section_score = section_score(sections);

    if document_average.is_none() && section_score.is_none() {
        return (0.0, ScoreBasis::Empty);
    }

    let value = document_average.unwrap_or(0.0) / 2.0 + section_score.unwrap_or(0.0) / 2.0;
    (
        value,
        ScoreBasis::Blended {
            document_average,
            section_score,
            graded_documents: scores.len(),
        },
    )
}

fn section_score(sections: &[AssessmentSection]) -> Option<f64> {
    if sections.is_empty() {
        return None;
    }

    let weighted: f64 = sections
        .iter()
        .map(|section| section.weightage / 100.0 * section.score)
        .sum();
    Some(clamp_score(weighted))
}
