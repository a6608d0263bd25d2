//! Table reconciliation
//!
//! Joins the cleaned relations into one panel keyed by
//! `(student_id, program_multiplicity, cycle)`:
//!
//! - personal × summaries: inner join on `(student_id, program_multiplicity, program, cycle)`
//! - course metrics: left join on `(student_id, program_multiplicity, cycle)`
//! - admissions: left join on `(student_id, program)`, one admission per key
//!
//! Fields present in several relations are resolved through a fixed precedence
//! table rather than join suffixes.

use std::collections::{BTreeMap, HashMap};

use super::cleaning::InputTables;
use super::cycle::Cycle;
use super::grades::{GradeKey, GradeMetrics};
use super::records::{AdmissionRecord, CycleSummaryRecord, PersonalRecord};
use super::vocabulary::OTHER;

/// Birth country code of domestic students.
pub const DOMESTIC_COUNTRY: &str = "COL";

/// One reconciled student-program-cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub student_id: String,
    pub program_multiplicity: u8,
    pub program: String,
    pub cycle: Cycle,
    pub program_acronym: Option<String>,
    pub sex: Option<String>,
    pub scholarship: Option<String>,
    pub residence_city: Option<String>,
    pub birth_department: String,
    pub birth_country: String,
    pub international: u8,
    pub admission_cycle: Option<u32>,
    pub admission_type: Option<String>,
    pub status: Option<String>,
    pub age: Option<f64>,
    pub credits_attempted: Option<f64>,
    pub credits_approved: Option<f64>,
    pub gpa: Option<f64>,
    pub cumulative_gpa: Option<f64>,
    pub academic_status: Option<String>,
    pub grades: Option<GradeMetrics>,
}

impl PanelRow {
    /// Sort key; rows are unique on it unless the summary relation repeats a key.
    pub fn sort_key(&self) -> (&str, u8, Cycle, &str) {
        (
            self.student_id.as_str(),
            self.program_multiplicity,
            self.cycle,
            self.program.as_str(),
        )
    }
}

/// Reconciled panel, sorted by key.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    pub rows: Vec<PanelRow>,
}

impl Panel {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Canonical acronym per `(program_multiplicity, program)`: the most frequent value,
/// ties broken by the lexicographically smallest.
pub fn canonical_acronyms(personal: &[PersonalRecord]) -> HashMap<(u8, String), String> {
    let mut counts: HashMap<(u8, String), BTreeMap<&str, usize>> = HashMap::new();
    for record in personal {
        if let Some(acronym) = record.program_acronym.as_deref() {
            *counts
                .entry((record.program_multiplicity, record.program.clone()))
                .or_default()
                .entry(acronym)
                .or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter_map(|(key, votes)| {
            // BTreeMap iterates in ascending order, so the first maximum is the smallest name
            let mut best: Option<(&str, usize)> = None;
            for (acronym, count) in votes {
                if best.map_or(true, |(_, c)| count > c) {
                    best = Some((acronym, count));
                }
            }
            best.map(|(acronym, _)| (key, acronym.to_string()))
        })
        .collect()
}

/// Pick one admission per `(student_id, program)`: latest admission cycle, then the
/// smallest admission type.
pub fn dedupe_admissions(admissions: &[AdmissionRecord]) -> HashMap<(String, String), &AdmissionRecord> {
    let mut chosen: HashMap<(String, String), &AdmissionRecord> = HashMap::new();
    for record in admissions {
        let key = (record.student_id.clone(), record.program.clone());
        let replace = chosen
            .get(&key)
            .map_or(true, |current| admission_precedes(record, current));
        if replace {
            chosen.insert(key, record);
        }
    }
    chosen
}

fn admission_precedes(candidate: &AdmissionRecord, current: &AdmissionRecord) -> bool {
    match candidate.admission_cycle.cmp(&current.admission_cycle) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => {
            match (&candidate.admission_type, &current.admission_type) {
                (Some(a), Some(b)) => a < b,
                (Some(_), None) => true,
                _ => false,
            }
        }
    }
}

type SummaryKey = (String, u8, String, Cycle);

/// Join the cleaned relations and the course metrics into a sorted panel.
pub fn reconcile(tables: &InputTables, grades: &BTreeMap<GradeKey, GradeMetrics>) -> Panel {
    let mut summaries: HashMap<SummaryKey, Vec<&CycleSummaryRecord>> = HashMap::new();
    for summary in &tables.summaries {
        summaries
            .entry((
                summary.student_id.clone(),
                summary.program_multiplicity,
                summary.program.clone(),
                summary.cycle,
            ))
            .or_default()
            .push(summary);
    }

    let acronyms = canonical_acronyms(&tables.personal);
    let admissions = dedupe_admissions(&tables.admissions);

    let mut rows = Vec::new();
    for personal in &tables.personal {
        let key = (
            personal.student_id.clone(),
            personal.program_multiplicity,
            personal.program.clone(),
            personal.cycle,
        );
        let Some(matches) = summaries.get(&key) else {
            continue;
        };
        let admission = admissions
            .get(&(personal.student_id.clone(), personal.program.clone()))
            .copied();
        let grade_key = (
            personal.student_id.clone(),
            personal.program_multiplicity,
            personal.cycle,
        );
        let metrics = grades.get(&grade_key);
        let acronym = acronyms
            .get(&(personal.program_multiplicity, personal.program.clone()))
            .cloned();

        for summary in matches {
            rows.push(merge_row(personal, summary, admission, metrics, acronym.clone()));
        }
    }

    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Panel { rows }
}

fn merge_row(
    personal: &PersonalRecord,
    summary: &CycleSummaryRecord,
    admission: Option<&AdmissionRecord>,
    metrics: Option<&GradeMetrics>,
    program_acronym: Option<String>,
) -> PanelRow {
    let birth_country = personal
        .birth_country
        .clone()
        .or_else(|| admission.and_then(|a| a.birth_country.clone()))
        .unwrap_or_else(|| OTHER.to_string());
    let international = u8::from(birth_country != DOMESTIC_COUNTRY);

    PanelRow {
        student_id: personal.student_id.clone(),
        program_multiplicity: personal.program_multiplicity,
        program: personal.program.clone(),
        cycle: personal.cycle,
        program_acronym,
        sex: personal.sex.clone().or_else(|| admission.and_then(|a| a.sex.clone())),
        scholarship: personal.scholarship.clone(),
        residence_city: personal
            .residence_city
            .clone()
            .or_else(|| admission.and_then(|a| a.residence_city.clone())),
        birth_department: personal
            .birth_department
            .clone()
            .or_else(|| admission.and_then(|a| a.birth_department.clone()))
            .unwrap_or_else(|| OTHER.to_string()),
        birth_country,
        international,
        admission_cycle: admission
            .and_then(|a| a.admission_cycle)
            .or(summary.admission_cycle)
            .or(personal.admission_cycle),
        admission_type: admission.and_then(|a| a.admission_type.clone()),
        status: personal
            .status
            .clone()
            .or_else(|| summary.status.clone())
            .or_else(|| admission.and_then(|a| a.program_status.clone())),
        age: personal.age,
        credits_attempted: summary.credits_attempted.or(personal.credits_attempted),
        credits_approved: summary.credits_approved.or(personal.credits_approved),
        gpa: summary.gpa,
        cumulative_gpa: summary.cumulative_gpa,
        academic_status: summary.academic_status.clone(),
        grades: metrics.cloned(),
    }
}
