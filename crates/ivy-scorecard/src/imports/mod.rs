//! Bulk grade intake from evaluator spreadsheets exported as CSV.

mod parser;

use crate::scoring::{
    EnrollmentRepository, EvaluationRepository, EvaluatorId, GradeSubmission, ItemId, ScoreStore,
    ScoringError, ScoringService,
};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use parser::GradeRow;

#[derive(Debug)]
pub enum GradeImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Scoring(ScoringError),
}

impl std::fmt::Display for GradeImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GradeImportError::Io(err) => write!(f, "failed to read grade sheet: {}", err),
            GradeImportError::Csv(err) => write!(f, "invalid grade CSV data: {}", err),
            GradeImportError::Scoring(err) => {
                write!(f, "grade import aborted by storage failure: {}", err)
            }
        }
    }
}

impl std::error::Error for GradeImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GradeImportError::Io(err) => Some(err),
            GradeImportError::Csv(err) => Some(err),
            GradeImportError::Scoring(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for GradeImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for GradeImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Outcome of one import run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub applied: usize,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub item_id: Option<String>,
    pub reason: String,
}

pub struct GradeImporter;

impl GradeImporter {
    pub fn from_path<E, V, S, P>(
        service: &ScoringService<E, V, S>,
        path: P,
    ) -> Result<ImportSummary, GradeImportError>
    where
        E: EnrollmentRepository + 'static,
        V: EvaluationRepository + 'static,
        S: ScoreStore + 'static,
        P: AsRef<Path>,
    {
        let file = std::fs::File::open(path)?;
        Self::from_reader(service, file)
    }

    /// Applies each row through the grading pipeline. Rejected rows are collected; a storage
    /// failure stops the import with the rows before it already applied.
    pub fn from_reader<E, V, S, R>(
        service: &ScoringService<E, V, S>,
        reader: R,
    ) -> Result<ImportSummary, GradeImportError>
    where
        E: EnrollmentRepository + 'static,
        V: EvaluationRepository + 'static,
        S: ScoreStore + 'static,
        R: Read,
    {
        let mut summary = ImportSummary::default();

        for row in parser::parse_rows(reader)? {
            match apply_row(service, &row) {
                Ok(()) => summary.applied += 1,
                Err(RowFailure::Storage(err)) => return Err(GradeImportError::Scoring(err)),
                Err(RowFailure::Rejected(reason)) => {
                    warn!(line = row.line, reason = %reason, "grade row rejected");
                    summary.rejected.push(RejectedRow {
                        line: row.line,
                        item_id: row.item_id.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            applied = summary.applied,
            rejected = summary.rejected.len(),
            "grade import finished"
        );
        Ok(summary)
    }
}

enum RowFailure {
    Rejected(String),
    Storage(ScoringError),
}

fn apply_row<E, V, S>(service: &ScoringService<E, V, S>, row: &GradeRow) -> Result<(), RowFailure>
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    let item_id = row
        .item_id
        .clone()
        .ok_or_else(|| RowFailure::Rejected("missing item id".to_string()))?;
    let evaluator = row
        .evaluator
        .clone()
        .ok_or_else(|| RowFailure::Rejected("missing evaluator".to_string()))?;
    let raw_score = row
        .score
        .as_deref()
        .ok_or_else(|| RowFailure::Rejected("missing score".to_string()))?;
    let score = raw_score
        .parse::<f64>()
        .map_err(|_| RowFailure::Rejected(format!("score '{raw_score}' is not a number")))?;

    let submission = GradeSubmission {
        item_id: ItemId(item_id),
        evaluator: EvaluatorId(evaluator),
        score,
        feedback: row.feedback.clone(),
    };

    match service.grade_item(submission) {
        Ok(_) => Ok(()),
        Err(err) if err.is_storage() => Err(RowFailure::Storage(err)),
        Err(err) => Err(RowFailure::Rejected(err.to_string())),
    }
}
