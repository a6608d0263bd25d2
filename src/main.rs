//! Dropwatch: Student Dropout Feature Pipeline CLI
//!
//! Reads the four canonical administrative tables, builds the dropout panel and
//! either scores it (`score`) or exports the labeled training matrix (`prepare`).

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::ProgressBar;

use dropwatch::cli::{confirm_overwrite, Cli, Commands, InputArgs, RunArgs};
use dropwatch::pipeline::{
    load_table, prepare_training_set, run_pipeline, save_table, ArtifactSource,
    PipelineArtifacts, PipelineInputs, Stage, StageObserver,
};
use dropwatch::report::{export_processing_report, package_outputs, ProcessingReport, RunSummary};
use dropwatch::utils::{
    create_spinner, finish_with_error, finish_with_success, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
    print_warning,
};

/// Prints a step header and spinner for every pipeline stage.
struct ConsoleObserver {
    step: u8,
    spinner: Option<ProgressBar>,
    started_at: Instant,
}

impl ConsoleObserver {
    fn new(first_step: u8) -> Self {
        Self {
            step: first_step,
            spinner: None,
            started_at: Instant::now(),
        }
    }

    fn abort(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            finish_with_error(&spinner, "Stage failed");
        }
    }
}

fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::Load => "Validate Input Tables",
        Stage::Clean => "Clean Inputs",
        Stage::Grades => "Grade Metrics",
        Stage::Reconcile => "Reconcile Tables",
        Stage::Encode => "Encode Categories",
        Stage::Label => "Construct Dropout Labels",
        Stage::Align => "Align To Schema",
        Stage::Score => "Score Rows",
    }
}

impl StageObserver for ConsoleObserver {
    fn started(&mut self, stage: Stage) {
        print_step_header(self.step, stage_title(stage));
        self.step += 1;
        self.started_at = Instant::now();
        self.spinner = Some(create_spinner(&format!("Running {}...", stage)));
    }

    fn finished(&mut self, stage: Stage, rows: usize) {
        if let Some(spinner) = self.spinner.take() {
            finish_with_success(&spinner, &format!("{} complete ({} rows)", stage, rows));
        }
        print_step_time(self.started_at.elapsed());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let run = cli.command.run_args();
    let (suffix, scoring) = match &cli.command {
        Commands::Score(_) => ("scored", true),
        Commands::Prepare(_) => ("prepared", false),
    };

    let output_path = run.output_path(suffix);
    let report_path = run.report_path(&output_path);
    let bundle_path = run.bundle_path(&output_path);

    if !run.no_confirm {
        let targets: Vec<&Path> = if run.bundle {
            vec![bundle_path.as_path()]
        } else {
            vec![output_path.as_path(), report_path.as_path()]
        };
        if !confirm_overwrite(&targets)? {
            println!("Cancelled by user.");
            return Ok(());
        }
    }

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(
        cli.command.name(),
        &run.inputs.personal,
        &run.artifacts,
        &output_path,
        run.inputs.roster.as_deref(),
    );

    let mut summary = RunSummary::new();

    // Step 1: Load tables and artifacts
    print_step_header(1, "Load Tables & Artifacts");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading input tables...");
    let inputs = load_inputs(&run.inputs, run.infer_schema_length)?;
    finish_with_success(&spinner, "Input tables loaded");
    for (name, rows) in [
        ("grade", inputs.courses.height()),
        ("summary", inputs.summaries.height()),
        ("personal", inputs.personal.height()),
        ("admission", inputs.admissions.height()),
    ] {
        print_count(&format!("{} row(s)", name), rows, None);
    }

    let artifacts = load_artifacts(run, scoring)?;
    print_success(&format!("Artifacts loaded from {}", run.artifacts.display()));
    if let Some(reason) = &artifacts.vocabulary_degraded {
        print_warning(&format!("Subject lookup unavailable, every class maps to Otro: {}", reason));
    }
    if let Some(schema) = &artifacts.schema {
        print_info(&format!("Schema has {} feature column(s)", schema.len()));
    }
    let load_elapsed = step_start.elapsed();
    summary.set_load_time(load_elapsed);
    print_step_time(load_elapsed);

    // Steps 2..: pipeline stages
    let pipeline_start = Instant::now();
    let mut observer = ConsoleObserver::new(2);
    let outcome = if scoring {
        run_pipeline(&inputs, &artifacts, &mut observer)
            .and_then(|(scored, report)| Ok((scored.to_frame()?, report)))
    } else {
        prepare_training_set(&inputs, &artifacts, &mut observer)
            .and_then(|(prepared, report)| Ok((prepared.to_frame()?, report)))
    };
    let (mut table, report) = match outcome {
        Ok(result) => result,
        Err(err) => {
            observer.abort();
            let stage = err
                .stage()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "pipeline".to_string());
            return Err(err).with_context(|| format!("Batch aborted during {} stage", stage));
        }
    };
    summary.set_pipeline_time(pipeline_start.elapsed());
    report_issues(&report);

    // Final step: save outputs
    print_step_header(observer.step, "Save Results");
    let step_start = Instant::now();
    let spinner = create_spinner("Writing output files...");
    save_table(&mut table, &output_path)?;
    export_processing_report(&report, &report_path)?;
    if run.bundle {
        package_outputs(&output_path, &report_path, &bundle_path)?;
        finish_with_success(&spinner, &format!("Bundled to {}", bundle_path.display()));
    } else {
        finish_with_success(&spinner, &format!("Saved to {}", output_path.display()));
        print_info(&format!("Report: {}", report_path.display()));
    }
    let save_elapsed = step_start.elapsed();
    summary.set_save_time(save_elapsed);
    print_step_time(save_elapsed);

    summary.display(&report);
    print_completion();

    Ok(())
}

fn load_inputs(paths: &InputArgs, infer_schema_length: usize) -> Result<PipelineInputs> {
    let roster = match &paths.roster {
        Some(path) => Some(load_table(path, infer_schema_length)?),
        None => None,
    };
    Ok(PipelineInputs {
        courses: load_table(&paths.grades, infer_schema_length)?,
        summaries: load_table(&paths.summaries, infer_schema_length)?,
        personal: load_table(&paths.personal, infer_schema_length)?,
        admissions: load_table(&paths.admissions, infer_schema_length)?,
        roster,
    })
}

fn load_artifacts(run: &RunArgs, scoring: bool) -> Result<PipelineArtifacts> {
    let source = ArtifactSource {
        dir: run.artifacts.clone(),
        subject_categories: run.subject_categories.clone(),
        allow_missing_vocabulary: run.allow_missing_vocabulary,
    };
    let artifacts = if scoring {
        PipelineArtifacts::load_for_scoring(&source)
    } else {
        PipelineArtifacts::load_for_preparation(&source)
    };
    artifacts.with_context(|| format!("Failed to load artifacts from {}", run.artifacts.display()))
}

fn report_issues(report: &ProcessingReport) {
    let removed: usize = report.filters.iter().map(|f| f.removed()).sum();
    if removed > 0 {
        print_count("row(s) removed by input filters", removed, None);
    }
    if report.label.indeterminate > 0 {
        print_warning(&format!(
            "{} row(s) had an indeterminate label and were dropped",
            report.label.indeterminate
        ));
    }
    if !report.issues.is_empty() {
        println!(
            "\n    {} {} issue(s) recorded in the processing report",
            style("✧").cyan(),
            style(report.issues.len()).yellow().bold()
        );
    }
}
