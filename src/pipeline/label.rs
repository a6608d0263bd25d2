//! Dropout label construction
//!
//! Builds `will_dropout_next_cycle` from each student's program history. Labels
//! look two cycles ahead, so the most recent rows of every history cannot be
//! labeled and are dropped.
//!
//! Per `(student_id, program_multiplicity, program)` group, ordered by cycle:
//!
//! 1. forward-zeroing: a terminal inactive row clears every earlier inactive flag
//! 2. long pauses: a gap of three or more canonical cycles marks the earlier row inactive
//! 3. targets: last two rows unknown, terminal dropout labels the row two positions
//!    back, any other inactive row is labeled 1
//!
//! Then, across the whole batch, rows at the penultimate cycle are set to 0, or
//! resolved against the enrollment roster when one is supplied.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

use super::columns as col;
use super::cycle::{canonical_gap, Cycle};
use super::encoding::EncodedPanel;
use super::error::{PipelineError, PipelineResult, Stage};
use super::issues::{Issue, IssueLog};
use super::reconcile::PanelRow;
use super::records::RosterRecord;

/// Status of a student still enrolled.
pub const ACTIVE_STATUS: &str = "Activo en Programa";

/// Statuses that mean the student left the program.
pub const INACTIVE_STATUSES: [&str; 5] =
    ["Suspendido", "Permiso", "Interrumpido", "Expulsado", "Cancelado"];

/// Graduated students; removed before labeling.
pub const FINISHED_STATUS: &str = "Programa Finalizado";

/// Minimum canonical-cycle gap treated as a dropout.
pub const LONG_PAUSE_CYCLES: i64 = 3;

/// Raw inactivity flag derived from a status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFlag {
    Active,
    Inactive,
    Finished,
    Unmapped,
}

pub fn status_flag(status: &str) -> StatusFlag {
    let status = status.trim();
    if status == ACTIVE_STATUS {
        StatusFlag::Active
    } else if INACTIVE_STATUSES.contains(&status) {
        StatusFlag::Inactive
    } else if status == FINISHED_STATUS {
        StatusFlag::Finished
    } else {
        StatusFlag::Unmapped
    }
}

/// Labels for one group, given its cycles in ascending order and the raw
/// inactivity flags. `None` marks an unknown label.
pub fn label_group(cycles: &[Cycle], raw_inactive: &[bool]) -> Vec<Option<u8>> {
    let n = cycles.len();
    if n == 0 {
        return Vec::new();
    }
    let mut inactive = raw_inactive.to_vec();
    let last = n - 1;

    if inactive[last] {
        inactive[..last].iter_mut().for_each(|flag| *flag = false);
    }

    for i in 0..last {
        if canonical_gap(cycles[i], cycles[i + 1]).is_some_and(|gap| gap >= LONG_PAUSE_CYCLES) {
            inactive[i] = true;
        }
    }

    let mut labels = vec![Some(0u8); n];
    for label in labels.iter_mut().skip(n.saturating_sub(2)) {
        *label = None;
    }

    if inactive[last] {
        if last >= 2 {
            labels[last - 2] = Some(1);
        } else if last == 1 {
            labels[0] = Some(1);
        }
    }

    let terminal_cycle = cycles[last];
    for i in 0..n {
        if cycles[i] < terminal_cycle && inactive[i] {
            labels[i] = Some(1);
        }
    }

    labels
}

/// Panel rows that received a definite label.
#[derive(Debug, Clone)]
pub struct LabeledPanel {
    pub rows: Vec<PanelRow>,
    pub features: DataFrame,
    pub labels: Vec<u8>,
}

impl LabeledPanel {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature frame with the label appended as the last column.
    pub fn frame_with_label(&self) -> PolarsResult<DataFrame> {
        let mut frame = self.features.clone();
        let labels: Vec<i32> = self.labels.iter().map(|l| i32::from(*l)).collect();
        frame.with_column(Column::new(col::LABEL.into(), labels))?;
        Ok(frame)
    }
}

/// Counters describing what label construction did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelStats {
    pub finished_removed: usize,
    pub unmapped_status_rows: usize,
    pub penultimate_cycle: Option<Cycle>,
    pub roster_applied: bool,
    pub indeterminate: usize,
    pub positives: usize,
    pub negatives: usize,
}

fn keep_rows(encoded: EncodedPanel, keep: &[bool]) -> PipelineResult<EncodedPanel> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    let features = encoded.features.filter(&mask)?;
    let rows = encoded
        .rows
        .into_iter()
        .zip(keep)
        .filter_map(|(row, k)| k.then_some(row))
        .collect();
    Ok(EncodedPanel { rows, features })
}

/// Build labels for every row and drop those left unknown.
pub fn construct_labels(
    encoded: EncodedPanel,
    roster: Option<&[RosterRecord]>,
    issues: &mut IssueLog,
) -> PipelineResult<(LabeledPanel, LabelStats)> {
    let mut stats = LabelStats::default();

    if !encoded.rows.is_empty() && encoded.rows.iter().all(|r| r.status.is_none()) {
        return Err(PipelineError::schema(Stage::Label, "panel", col::STATUS));
    }

    let not_finished: Vec<bool> = encoded
        .rows
        .iter()
        .map(|r| {
            r.status
                .as_deref()
                .map_or(true, |s| status_flag(s) != StatusFlag::Finished)
        })
        .collect();
    stats.finished_removed = not_finished.iter().filter(|k| !**k).count();
    let encoded = keep_rows(encoded, &not_finished)?;

    let raw_inactive: Vec<bool> = encoded
        .rows
        .iter()
        .map(|r| match r.status.as_deref() {
            Some(status) => match status_flag(status) {
                StatusFlag::Inactive => true,
                StatusFlag::Active | StatusFlag::Finished => false,
                StatusFlag::Unmapped => {
                    issues.unseen_category(col::STATUS, status);
                    stats.unmapped_status_rows += 1;
                    false
                }
            },
            None => {
                issues.unseen_category(col::STATUS, "null");
                stats.unmapped_status_rows += 1;
                false
            }
        })
        .collect();

    // Rows arrive sorted by (student, multiplicity, cycle), so group members are in cycle order
    let mut groups: BTreeMap<(&str, u8, &str), Vec<usize>> = BTreeMap::new();
    for (i, row) in encoded.rows.iter().enumerate() {
        groups
            .entry((row.student_id.as_str(), row.program_multiplicity, row.program.as_str()))
            .or_default()
            .push(i);
    }
    let groups: Vec<Vec<usize>> = groups.into_values().collect();

    let assignments: Vec<Vec<(usize, Option<u8>)>> = groups
        .par_iter()
        .map(|members| {
            let cycles: Vec<Cycle> = members.iter().map(|&i| encoded.rows[i].cycle).collect();
            let flags: Vec<bool> = members.iter().map(|&i| raw_inactive[i]).collect();
            members
                .iter()
                .copied()
                .zip(label_group(&cycles, &flags))
                .collect()
        })
        .collect();

    let mut labels: Vec<Option<u8>> = vec![None; encoded.rows.len()];
    for (i, label) in assignments.into_iter().flatten() {
        labels[i] = label;
    }

    let cycles: BTreeSet<Cycle> = encoded.rows.iter().map(|r| r.cycle).collect();
    stats.penultimate_cycle = cycles.iter().rev().nth(1).copied();

    if let Some(penultimate) = stats.penultimate_cycle {
        let enrolled_latest = roster.map(latest_roster_pairs);
        stats.roster_applied = enrolled_latest.is_some();
        for (row, label) in encoded.rows.iter().zip(labels.iter_mut()) {
            if row.cycle != penultimate {
                continue;
            }
            *label = match &enrolled_latest {
                None => Some(0),
                Some(enrolled) => {
                    if enrolled.contains(&(row.student_id.as_str(), row.program.as_str())) {
                        None
                    } else {
                        Some(1)
                    }
                }
            };
        }
    }

    let known: Vec<bool> = labels.iter().map(Option::is_some).collect();
    stats.indeterminate = known.iter().filter(|k| !**k).count();
    if stats.indeterminate > 0 {
        issues.push(Issue::LabelIndeterminate {
            rows: stats.indeterminate,
        });
    }

    let labels: Vec<u8> = labels.into_iter().flatten().collect();
    stats.positives = labels.iter().filter(|l| **l == 1).count();
    stats.negatives = labels.len() - stats.positives;

    let kept = keep_rows(encoded, &known)?;
    Ok((
        LabeledPanel {
            rows: kept.rows,
            features: kept.features,
            labels,
        },
        stats,
    ))
}

/// `(student_id, program)` pairs enrolled at the roster's most recent cycle.
fn latest_roster_pairs(roster: &[RosterRecord]) -> HashSet<(&str, &str)> {
    let Some(latest) = roster.iter().map(|r| r.cycle).max() else {
        return HashSet::new();
    };
    roster
        .iter()
        .filter(|r| r.cycle == latest)
        .map(|r| (r.student_id.as_str(), r.program.as_str()))
        .collect()
}
