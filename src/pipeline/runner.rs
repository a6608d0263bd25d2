//! End-to-end batch runs
//!
//! A run is atomic: it returns the finished table with its processing report, or
//! the first fatal error. Stage outputs are distinct types, so the order below is
//! the only order that type-checks.

use std::collections::BTreeMap;

use polars::prelude::*;

use super::align::{align_to_schema, dedupe_schema, fill_missing_with_zero, Scaler};
use super::artifacts::PipelineArtifacts;
use super::cleaning::{clean_inputs, FilterStep, InputTables};
use super::columns as col;
use super::encoding::encode_panel;
use super::error::{PipelineError, PipelineResult, Stage};
use super::grades::compute_grade_metrics;
use super::issues::{Issue, IssueLog};
use super::label::{construct_labels, LabeledPanel};
use super::reconcile::{reconcile, PanelRow};
use super::records::{
    AdmissionRecord, CycleSummaryRecord, PersonalRecord, RawCourseRecord, RosterRecord,
};
use super::scoring::{FeatureMatrix, ModelArtifact, RiskLevel, Scorer};
use super::vocabulary::SUBJECT_LOOKUP;
use crate::report::ProcessingReport;

/// The raw relations of one batch, already in canonical column names.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub courses: DataFrame,
    pub summaries: DataFrame,
    pub personal: DataFrame,
    pub admissions: DataFrame,
    pub roster: Option<DataFrame>,
}

/// Receives stage boundaries, e.g. to drive progress output.
pub trait StageObserver {
    fn started(&mut self, _stage: Stage) {}
    fn finished(&mut self, _stage: Stage, _rows: usize) {}
}

impl StageObserver for () {}

/// Scored rows with their aligned features.
#[derive(Debug, Clone)]
pub struct ScoredPanel {
    pub rows: Vec<PanelRow>,
    pub aligned: DataFrame,
    pub labels: Vec<u8>,
    pub probabilities: Vec<f64>,
    pub risk_levels: Vec<RiskLevel>,
}

impl ScoredPanel {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Identifiers, aligned features, label, probability and risk level.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut frame = with_identifiers(&self.rows, &self.aligned)?;
        let labels: Vec<i32> = self.labels.iter().map(|l| i32::from(*l)).collect();
        let risk: Vec<&str> = self.risk_levels.iter().map(RiskLevel::as_str).collect();
        frame.with_column(Column::new(col::LABEL.into(), labels))?;
        frame.with_column(Column::new(col::PROBABILITY.into(), self.probabilities.clone()))?;
        frame.with_column(Column::new(col::RISK_LEVEL.into(), risk))?;
        Ok(frame)
    }

    /// Row count per risk level.
    pub fn risk_counts(&self) -> BTreeMap<RiskLevel, usize> {
        let mut counts = BTreeMap::new();
        for level in &self.risk_levels {
            *counts.entry(*level).or_insert(0) += 1;
        }
        counts
    }
}

/// Labeled rows ready for model training.
#[derive(Debug, Clone)]
pub struct PreparedPanel {
    pub rows: Vec<PanelRow>,
    pub features: DataFrame,
    pub labels: Vec<u8>,
}

impl PreparedPanel {
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut frame = with_identifiers(&self.rows, &self.features)?;
        let labels: Vec<i32> = self.labels.iter().map(|l| i32::from(*l)).collect();
        frame.with_column(Column::new(col::LABEL.into(), labels))?;
        Ok(frame)
    }
}

/// Prepend identifier columns not already present among the features.
fn with_identifiers(rows: &[PanelRow], features: &DataFrame) -> PolarsResult<DataFrame> {
    let present: Vec<String> = features
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let has = |name: &str| present.iter().any(|p| p == name);

    let mut columns = vec![
        Column::new(
            col::STUDENT_ID.into(),
            rows.iter().map(|r| r.student_id.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            col::PROGRAM.into(),
            rows.iter().map(|r| r.program.as_str()).collect::<Vec<_>>(),
        ),
    ];
    if !has(col::PROGRAM_MULTIPLICITY) {
        columns.push(Column::new(
            col::PROGRAM_MULTIPLICITY.into(),
            rows.iter()
                .map(|r| u32::from(r.program_multiplicity))
                .collect::<Vec<_>>(),
        ));
    }
    if !has(col::CYCLE) {
        columns.push(Column::new(
            col::CYCLE.into(),
            rows.iter().map(|r| r.cycle.code()).collect::<Vec<_>>(),
        ));
    }
    columns.extend(features.get_columns().iter().cloned());
    DataFrame::new(columns)
}

struct LabeledRun {
    labeled: LabeledPanel,
    issues: IssueLog,
    report: ProcessingReport,
}

/// Stages shared by scoring and preparation: load → clean → grades → reconcile →
/// encode → label.
fn run_to_labels(
    inputs: &PipelineInputs,
    artifacts: &PipelineArtifacts,
    observer: &mut dyn StageObserver,
) -> PipelineResult<LabeledRun> {
    let mut report = ProcessingReport::new();
    let mut issues = IssueLog::new();

    observer.started(Stage::Load);
    let courses = RawCourseRecord::from_frame(&inputs.courses)?;
    let summaries = CycleSummaryRecord::from_frame(&inputs.summaries)?;
    let personal = PersonalRecord::from_frame(&inputs.personal)?;
    let admissions = AdmissionRecord::from_frame(&inputs.admissions)?;
    let roster = match &inputs.roster {
        Some(df) => Some(RosterRecord::from_frame(df)?.records),
        None => None,
    };

    report.record_input(RawCourseRecord::TABLE, inputs.courses.height(), courses.rejected);
    report.record_input(CycleSummaryRecord::TABLE, inputs.summaries.height(), summaries.rejected);
    report.record_input(PersonalRecord::TABLE, inputs.personal.height(), personal.rejected);
    report.record_input(AdmissionRecord::TABLE, inputs.admissions.height(), admissions.rejected);
    let tables = InputTables {
        courses: courses.records,
        summaries: summaries.records,
        personal: personal.records,
        admissions: admissions.records,
    };
    observer.finished(Stage::Load, tables.personal.len());

    observer.started(Stage::Clean);
    let (tables, steps) = clean_inputs(tables);
    report.filters.extend(steps.into_iter().filter(|s: &FilterStep| s.removed() > 0));
    observer.finished(Stage::Clean, tables.personal.len());

    observer.started(Stage::Grades);
    let grades = compute_grade_metrics(&tables.courses);
    report.grade_groups = grades.len();
    observer.finished(Stage::Grades, grades.len());

    observer.started(Stage::Reconcile);
    let panel = reconcile(&tables, &grades);
    report.panel_rows = panel.len();
    observer.finished(Stage::Reconcile, panel.len());

    observer.started(Stage::Encode);
    if let Some(reason) = &artifacts.vocabulary_degraded {
        issues.push(Issue::VocabularyDegraded {
            name: SUBJECT_LOOKUP.to_string(),
            reason: reason.clone(),
        });
    }
    let encoded = encode_panel(panel, &artifacts.catalog, &mut issues)?;
    report.encoded_features = encoded.features.width();
    observer.finished(Stage::Encode, encoded.len());

    observer.started(Stage::Label);
    let (labeled, label_stats) = construct_labels(encoded, roster.as_deref(), &mut issues)?;
    report.labeled_rows = labeled.len();
    report.label = label_stats;
    observer.finished(Stage::Label, labeled.len());

    Ok(LabeledRun {
        labeled,
        issues,
        report,
    })
}

/// The standardized copy of `aligned` handed to the model, zero-imputed first
/// when the model expects it.
pub fn scoring_frame(
    aligned: &DataFrame,
    scaler: &Scaler,
    model: &ModelArtifact,
) -> PipelineResult<DataFrame> {
    if model.imputes_missing() {
        scaler.transform(&fill_missing_with_zero(aligned)?)
    } else {
        scaler.transform(aligned)
    }
}

/// Run every stage and score the surviving rows.
pub fn run_pipeline(
    inputs: &PipelineInputs,
    artifacts: &PipelineArtifacts,
    observer: &mut dyn StageObserver,
) -> PipelineResult<(ScoredPanel, ProcessingReport)> {
    let schema = artifacts
        .schema
        .as_ref()
        .ok_or_else(|| PipelineError::artifact(Stage::Align, "schema", "no schema loaded"))?;
    let scaler = artifacts
        .scaler
        .as_ref()
        .ok_or_else(|| PipelineError::artifact(Stage::Align, "scaler", "no scaler loaded"))?;
    let model = artifacts
        .model
        .as_ref()
        .ok_or_else(|| PipelineError::artifact(Stage::Score, "model", "no model loaded"))?;

    let LabeledRun {
        labeled,
        mut issues,
        mut report,
    } = run_to_labels(inputs, artifacts, observer)?;

    observer.started(Stage::Align);
    let schema = dedupe_schema(schema, &mut issues);
    let aligned = align_to_schema(&labeled.features, &schema, &mut issues)?;
    let standardized = scoring_frame(&aligned, scaler, model)?;
    report.schema_columns = Some(schema.len());
    observer.finished(Stage::Align, aligned.height());

    observer.started(Stage::Score);
    let matrix = FeatureMatrix::from_frame(&standardized)?;
    let probabilities: Vec<f64> = model
        .predict_proba(&matrix)
        .into_iter()
        .map(|p| p.clamp(0.0, 1.0))
        .collect();
    let risk_levels: Vec<RiskLevel> = probabilities
        .iter()
        .map(|p| RiskLevel::from_probability(*p))
        .collect();
    report.model_kind = Some(model.kind().to_string());

    let scored = ScoredPanel {
        rows: labeled.rows,
        aligned,
        labels: labeled.labels,
        probabilities,
        risk_levels,
    };
    report.risk_counts = scored
        .risk_counts()
        .into_iter()
        .map(|(level, count)| (level.as_str().to_string(), count))
        .collect();
    observer.finished(Stage::Score, scored.len());

    report.issues = issues.into_issues();
    Ok((scored, report))
}

/// Run every stage up to labeling and align to the schema when one is loaded.
pub fn prepare_training_set(
    inputs: &PipelineInputs,
    artifacts: &PipelineArtifacts,
    observer: &mut dyn StageObserver,
) -> PipelineResult<(PreparedPanel, ProcessingReport)> {
    let LabeledRun {
        labeled,
        mut issues,
        mut report,
    } = run_to_labels(inputs, artifacts, observer)?;

    let features = match &artifacts.schema {
        Some(schema) => {
            observer.started(Stage::Align);
            let schema = dedupe_schema(schema, &mut issues);
            let aligned = align_to_schema(&labeled.features, &schema, &mut issues)?;
            report.schema_columns = Some(schema.len());
            observer.finished(Stage::Align, aligned.height());
            aligned
        }
        None => labeled.features,
    };

    report.issues = issues.into_issues();
    Ok((
        PreparedPanel {
            rows: labeled.rows,
            features,
            labels: labeled.labels,
        },
        report,
    ))
}
