//! Pre-join input cleaning
//!
//! Filters applied to the four relations before reconciliation. Every filter
//! records how many rows it saw and kept so the report can show the funnel.

use std::collections::HashSet;

use serde::Serialize;

use super::records::{AdmissionRecord, CycleSummaryRecord, PersonalRecord, RawCourseRecord};
use super::cycle::Cycle;

/// Action reasons that mark a deceased student.
pub const DECEASED_REASONS: [&str; 2] = ["Fallecido", "Fallecido Grado Póstumo"];

/// The four input relations as typed records.
#[derive(Debug, Clone, Default)]
pub struct InputTables {
    pub courses: Vec<RawCourseRecord>,
    pub summaries: Vec<CycleSummaryRecord>,
    pub personal: Vec<PersonalRecord>,
    pub admissions: Vec<AdmissionRecord>,
}

/// Row counts before and after one filter on one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterStep {
    pub filter: String,
    pub table: String,
    pub before: usize,
    pub after: usize,
}

impl FilterStep {
    pub fn new(filter: &str, table: &str, before: usize, after: usize) -> Self {
        Self {
            filter: filter.to_string(),
            table: table.to_string(),
            before,
            after,
        }
    }

    pub fn removed(&self) -> usize {
        self.before.saturating_sub(self.after)
    }
}

fn retain_counted<T>(
    rows: &mut Vec<T>,
    filter: &str,
    table: &str,
    steps: &mut Vec<FilterStep>,
    keep: impl FnMut(&T) -> bool,
) {
    let before = rows.len();
    rows.retain(keep);
    steps.push(FilterStep::new(filter, table, before, rows.len()));
}

/// Apply every pre-join filter in order.
pub fn clean_inputs(mut tables: InputTables) -> (InputTables, Vec<FilterStep>) {
    let mut steps = Vec::new();

    let deceased: HashSet<String> = tables
        .personal
        .iter()
        .filter(|r| {
            r.action_reason
                .as_deref()
                .is_some_and(|reason| DECEASED_REASONS.contains(&reason.trim()))
        })
        .map(|r| r.student_id.clone())
        .collect();

    let filter = "deceased students";
    retain_counted(&mut tables.personal, filter, PersonalRecord::TABLE, &mut steps, |r| {
        !deceased.contains(&r.student_id)
    });
    retain_counted(&mut tables.summaries, filter, CycleSummaryRecord::TABLE, &mut steps, |r| {
        !deceased.contains(&r.student_id)
    });
    retain_counted(&mut tables.courses, filter, RawCourseRecord::TABLE, &mut steps, |r| {
        !deceased.contains(&r.student_id)
    });
    retain_counted(&mut tables.admissions, filter, AdmissionRecord::TABLE, &mut steps, |r| {
        !deceased.contains(&r.student_id)
    });

    retain_counted(
        &mut tables.admissions,
        "invalid admission cycle",
        AdmissionRecord::TABLE,
        &mut steps,
        |r| r.admission_cycle.map_or(true, |code| Cycle::new(code).is_some()),
    );

    let filter = "zero credits attempted";
    retain_counted(&mut tables.personal, filter, PersonalRecord::TABLE, &mut steps, |r| {
        r.credits_attempted != Some(0.0)
    });
    retain_counted(&mut tables.summaries, filter, CycleSummaryRecord::TABLE, &mut steps, |r| {
        r.credits_attempted != Some(0.0)
    });

    (tables, steps)
}
