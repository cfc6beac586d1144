use crate::infra::{in_memory_service, MemoryScoringService};
use clap::Args;
use ivy_scorecard::error::AppError;
use ivy_scorecard::imports::{GradeImporter, ImportSummary};
use ivy_scorecard::scoring::{
    AssessmentSection, EnrollmentId, EnrollmentRegistration, EvaluatorAssignment, EvaluatorId,
    GradeSubmission, ItemId, NewItem, NewItemKind, PointerCategory, PointerId, Scorecard,
    StudentId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub(crate) const DEMO_EVALUATOR: &str = "demo-evaluator";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// CSV of `Item ID,Evaluator,Score,Feedback` rows to apply instead of the built-in grades.
    #[arg(long)]
    pub(crate) grades: Option<PathBuf>,
    /// Print the final scorecard as JSON only.
    #[arg(long)]
    pub(crate) json: bool,
}

/// Items attached to the demo enrollment, with the grade the built-in run applies.
const CATALOGUE: [(PointerId, &str, f64); 10] = [
    (PointerId::AcademicExcellence, "Transcript", 8.0),
    (PointerId::AcademicExcellence, "Predicted grades", 10.0),
    (PointerId::SpikeInOneArea, "Math olympiad", 9.0),
    (PointerId::SpikeInOneArea, "Research paper", 7.0),
    (PointerId::LeadershipInitiative, "Debate captain", 8.0),
    (PointerId::GlobalSocialImpact, "Tutoring program", 6.0),
    (PointerId::AuthenticStorytelling, "Personal statement", 9.0),
    (PointerId::IntellectualCuriosity, "MIT OCW certificate", 7.0),
    (PointerId::IntellectualCuriosity, "Coursera ML", 8.0),
    (PointerId::AuthenticStorytelling, "Why us essay", 9.0),
];

#[derive(Debug, Clone)]
pub(crate) struct DemoItem {
    pub(crate) id: ItemId,
    pub(crate) pointer: PointerId,
    pub(crate) title: &'static str,
    pub(crate) builtin_score: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct DemoSeed {
    pub(crate) enrollment_id: EnrollmentId,
    pub(crate) items: Vec<DemoItem>,
}

impl DemoSeed {
    fn items_for(&self, pointer: PointerId) -> Vec<&DemoItem> {
        self.items
            .iter()
            .filter(|item| item.pointer == pointer)
            .collect()
    }
}

/// Registers a demo student with items, sections, selections and weights, all ungraded.
pub(crate) fn seed_demo(service: &MemoryScoringService) -> Result<DemoSeed, AppError> {
    let enrollment = service.register_enrollment(EnrollmentRegistration {
        student_id: StudentId("demo-student".to_string()),
        evaluators: vec![EvaluatorAssignment {
            evaluator: EvaluatorId(DEMO_EVALUATOR.to_string()),
            pointers: BTreeSet::new(),
        }],
    })?;

    let mut items = Vec::with_capacity(CATALOGUE.len());
    for (pointer, title, builtin_score) in CATALOGUE {
        let item = service.add_item(
            &enrollment.id,
            NewItem {
                pointer,
                title: title.to_string(),
                kind: kind_for(pointer, title),
            },
        )?;
        items.push(DemoItem {
            id: item.id,
            pointer,
            title,
            builtin_score,
        });
    }

    let seed = DemoSeed {
        enrollment_id: enrollment.id,
        items,
    };

    service.record_sections(
        &seed.enrollment_id,
        PointerId::AcademicExcellence,
        vec![
            AssessmentSection {
                name: "Reasoning".to_string(),
                weightage: 60.0,
                score: 8.0,
            },
            AssessmentSection {
                name: "Writing".to_string(),
                weightage: 40.0,
                score: 9.0,
            },
        ],
    )?;

    for pointer in [
        PointerId::SpikeInOneArea,
        PointerId::LeadershipInitiative,
        PointerId::GlobalSocialImpact,
    ] {
        for item in seed.items_for(pointer) {
            service.select_activity(&seed.enrollment_id, pointer, &item.id)?;
        }
    }

    let spike: BTreeMap<ItemId, f64> = seed
        .items_for(PointerId::SpikeInOneArea)
        .into_iter()
        .zip([60.0, 40.0])
        .map(|(item, weight)| (item.id.clone(), weight))
        .collect();
    service.assign_weights(&seed.enrollment_id, PointerId::SpikeInOneArea, spike)?;

    Ok(seed)
}

pub(crate) fn apply_builtin_grades(
    service: &MemoryScoringService,
    seed: &DemoSeed,
) -> Result<Scorecard, AppError> {
    for item in &seed.items {
        service.grade_item(GradeSubmission {
            item_id: item.id.clone(),
            evaluator: EvaluatorId(DEMO_EVALUATOR.to_string()),
            score: item.builtin_score,
            feedback: None,
        })?;
    }
    Ok(service.scorecard(&seed.enrollment_id)?)
}

fn kind_for(pointer: PointerId, title: &str) -> NewItemKind {
    match pointer.category() {
        PointerCategory::DocumentAverage => NewItemKind::Document,
        PointerCategory::WeightedActivity => NewItemKind::Activity,
        PointerCategory::NarrativeTask => NewItemKind::Narrative,
        PointerCategory::CertificateAverage => NewItemKind::Certificate {
            file_key: format!(
                "demo/{}.pdf",
                title.to_ascii_lowercase().replace(' ', "-")
            ),
        },
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service = in_memory_service();
    let seed = seed_demo(&service)?;

    if !args.json {
        println!("Ivy scorecard demo");
        println!("Enrollment: {}", seed.enrollment_id.0);
        println!("\nEvaluation items");
        for item in &seed.items {
            println!(
                "  {} | pointer {} | {}",
                item.id.0,
                item.pointer.number(),
                item.title
            );
        }
    }

    match args.grades {
        Some(path) => {
            let summary = GradeImporter::from_path(&*service, &path)?;
            if !args.json {
                render_import_summary(&summary);
            }
        }
        None => {
            apply_builtin_grades(&service, &seed)?;
        }
    }

    let scorecard = service.scorecard(&seed.enrollment_id)?;
    if args.json {
        match serde_json::to_string_pretty(&scorecard) {
            Ok(json) => println!("{}", json),
            Err(err) => println!("Scorecard payload unavailable: {}", err),
        }
        return Ok(());
    }

    render_scorecard(&scorecard);
    let report = service.audit(&seed.enrollment_id)?;
    if report.is_consistent() {
        println!("\nConsistency check: scorecard matches score records");
    } else {
        println!("\nConsistency check: {} drift entries", report.drift.len());
    }
    Ok(())
}

fn render_import_summary(summary: &ImportSummary) {
    println!("\nGrade import");
    println!("  Applied rows: {}", summary.applied);
    if summary.rejected.is_empty() {
        println!("  Rejected rows: none");
        return;
    }
    println!("  Rejected rows:");
    for row in &summary.rejected {
        println!(
            "    line {} ({}): {}",
            row.line,
            row.item_id.as_deref().unwrap_or("no item id"),
            row.reason
        );
    }
}

fn render_scorecard(scorecard: &Scorecard) {
    println!("\nScorecard");
    for entry in &scorecard.pointer_scores {
        println!(
            "  {}. {:<28} weight {:>2}%  score {:>5.2} / {:.0}{}",
            entry.pointer_id.number(),
            entry.pointer_id.label(),
            entry.weight,
            entry.score,
            entry.max_score,
            if entry.degraded { "  (provisional)" } else { "" }
        );
    }
    println!("  Overall score: {:.2}", scorecard.overall_score);
    println!("  Generated at: {}", scorecard.generated_at.to_rfc3339());
}
