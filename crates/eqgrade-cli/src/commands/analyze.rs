//! The `eqgrade analyze` command.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;

use eqgrade_core::engine::{GradingEngine, ProgressReporter};
use eqgrade_core::model::AnalysisResult;
use eqgrade_core::report::{AnalysisOutcome, GradingReport};
use eqgrade_core::store::FileAnswerStore;
use eqgrade_providers::config::load_config_from;
use eqgrade_providers::create_model_clients;

use crate::OutputFormat;

pub struct AnalyzeArgs {
    pub question_id: String,
    pub user_id: String,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub parallelism: Option<usize>,
    pub storage_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_student_start(&self, student_id: &str, index: usize, total: usize) {
        eprintln!("  Grading: {student_id} ({}/{total})", index + 1);
    }

    fn on_student_complete(&self, result: &AnalysisResult) {
        let verdict = result
            .feedback
            .as_ref()
            .map(|f| f.verdict.as_str())
            .unwrap_or("no feedback");
        eprintln!(
            "  Done: {} scored {:.1}/10 [{verdict}]",
            result.student_id, result.final_score
        );
    }

    fn on_student_error(&self, student_id: &str, error: &str) {
        eprintln!("  ERROR: {student_id}: {error}");
    }

    fn on_analysis_complete(&self, question_id: &str, graded: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {graded} answer(s) for {question_id} ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(args: AnalyzeArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;

    let mut engine_config = config.engine_config();
    if let Some(parallelism) = args.parallelism {
        anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");
        engine_config.parallelism = parallelism;
    }

    let clients = create_model_clients(&config)?;
    let engine = GradingEngine::new(clients, engine_config);
    let store = FileAnswerStore::new(args.storage_dir.unwrap_or(config.storage_dir));

    let start = Instant::now();
    let result = engine
        .analyze(&store, &args.question_id, &args.user_id, &ConsoleReporter)
        .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let analysis = match result {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::error!(question_id = %args.question_id, user_id = %args.user_id, "{e}");
            let outcome = AnalysisOutcome::failed(&e);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            std::process::exit(1);
        }
    };

    let report = GradingReport::new(
        analysis,
        &args.user_id,
        &engine.config().generation_model,
        duration_ms,
    );

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.analysis)?);
        }
        OutputFormat::Table => print_summary(&report),
    }

    if let Some(path) = &args.output {
        report.save_json(path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &GradingReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["#", "Student", "Score", "Verdict", "Comment"]);

    for (i, result) in report.analysis.results.iter().enumerate() {
        let (verdict, comment) = match &result.feedback {
            Some(f) => (f.verdict.as_str(), f.comment.as_str()),
            None => ("-", "-"),
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&result.student_id),
            Cell::new(format!("{:.1}", result.final_score)),
            Cell::new(verdict),
            Cell::new(comment),
        ]);
    }

    println!("Question: {}", report.analysis.question_id);
    println!("{table}");

    if let Some(summary) = report.summary() {
        println!(
            "Mean {:.2}, min {:.1}, max {:.1} over {} answer(s)",
            summary.mean, summary.min, summary.max, summary.count
        );
        if summary.missing_feedback > 0 {
            println!("{} answer(s) without feedback", summary.missing_feedback);
        }
    }
}
