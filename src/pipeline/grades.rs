//! Per-cycle grade metrics
//!
//! Course rows are grouped by `(student_id, program_multiplicity, cycle)` and reduced
//! to credit-weighted statistics. Groups are independent and reduced in parallel.

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::cycle::Cycle;
use super::records::RawCourseRecord;
use super::vocabulary::NO_DATA;

/// Lowest passing grade on the 0–5 scale.
pub const PASSING_GRADE: f64 = 3.0;

/// Grouping key for course rows.
pub type GradeKey = (String, u8, Cycle);

/// Extreme grade of a cycle and the course that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeCourse {
    pub grade: f64,
    pub credits: f64,
    pub course_id: String,
    pub class_name: String,
}

/// Aggregates for one student-cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeMetrics {
    pub mean_grade: Option<f64>,
    pub grade_std: Option<f64>,
    pub min: Option<ExtremeCourse>,
    pub max: Option<ExtremeCourse>,
    pub failed_courses: u32,
    pub enrolled_credits: f64,
    pub passed_credits: f64,
    pub course_count: u32,
}

impl GradeMetrics {
    /// `max_grade × max_credits − min_grade × min_credits`.
    pub fn weighted_grade_range(&self) -> Option<f64> {
        match (&self.max, &self.min) {
            (Some(max), Some(min)) => Some(max.grade * max.credits - min.grade * min.credits),
            _ => None,
        }
    }

    /// Class name of the lowest grade, or the no-data sentinel.
    pub fn min_class(&self) -> &str {
        self.min.as_ref().map_or(NO_DATA, |c| c.class_name.as_str())
    }

    /// Class name of the highest grade, or the no-data sentinel.
    pub fn max_class(&self) -> &str {
        self.max.as_ref().map_or(NO_DATA, |c| c.class_name.as_str())
    }
}

/// Reduce one group of course rows. Rows missing a grade or credits count toward
/// `course_count` only.
pub fn metrics_for_group(rows: &[&RawCourseRecord]) -> GradeMetrics {
    let graded: Vec<(f64, f64, &RawCourseRecord)> = rows
        .iter()
        .filter_map(|r| match (r.grade, r.credits) {
            (Some(g), Some(c)) => Some((g, c, *r)),
            _ => None,
        })
        .collect();

    let total_credits: f64 = graded.iter().map(|(_, c, _)| c).sum();
    let (mean_grade, grade_std) = if graded.is_empty() || total_credits <= 0.0 {
        (None, None)
    } else {
        let mean = graded.iter().map(|(g, c, _)| g * c).sum::<f64>() / total_credits;
        let variance = graded
            .iter()
            .map(|(g, c, _)| c * (g - mean).powi(2))
            .sum::<f64>()
            / total_credits;
        (Some(mean), Some(variance.sqrt()))
    };

    let mut min: Option<&(f64, f64, &RawCourseRecord)> = None;
    let mut max: Option<&(f64, f64, &RawCourseRecord)> = None;
    for entry in &graded {
        // Strict comparisons keep the first occurrence on ties
        if min.map_or(true, |m| entry.0 < m.0) {
            min = Some(entry);
        }
        if max.map_or(true, |m| entry.0 > m.0) {
            max = Some(entry);
        }
    }
    let extreme = |e: &(f64, f64, &RawCourseRecord)| ExtremeCourse {
        grade: e.0,
        credits: e.1,
        course_id: e.2.course_id.clone(),
        class_name: e.2.class_name().to_string(),
    };

    GradeMetrics {
        mean_grade,
        grade_std,
        min: min.map(extreme),
        max: max.map(extreme),
        failed_courses: graded.iter().filter(|(g, _, _)| *g < PASSING_GRADE).count() as u32,
        enrolled_credits: total_credits,
        passed_credits: graded
            .iter()
            .filter(|(g, _, _)| *g >= PASSING_GRADE)
            .map(|(_, c, _)| c)
            .sum(),
        course_count: rows.len() as u32,
    }
}

/// Compute metrics for every `(student_id, program_multiplicity, cycle)` group.
pub fn compute_grade_metrics(courses: &[RawCourseRecord]) -> BTreeMap<GradeKey, GradeMetrics> {
    let mut groups: BTreeMap<GradeKey, Vec<&RawCourseRecord>> = BTreeMap::new();
    for record in courses {
        groups
            .entry((record.student_id.clone(), record.program_multiplicity, record.cycle))
            .or_default()
            .push(record);
    }

    let groups: Vec<(GradeKey, Vec<&RawCourseRecord>)> = groups.into_iter().collect();
    groups
        .into_par_iter()
        .map(|(key, rows)| (key, metrics_for_group(&rows)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str, grade: Option<f64>, credits: Option<f64>) -> RawCourseRecord {
        RawCourseRecord {
            student_id: "S1".to_string(),
            program_multiplicity: 1,
            cycle: Cycle::new(2410).unwrap(),
            course_id: id.to_string(),
            course_name: Some(format!("Clase {}", id)),
            grade,
            credits,
        }
    }

    #[test]
    fn test_weighted_statistics() {
        let rows = [
            course("A", Some(2.0), Some(2.0)),
            course("B", Some(4.0), Some(2.0)),
        ];
        let refs: Vec<&RawCourseRecord> = rows.iter().collect();
        let m = metrics_for_group(&refs);
        assert!((m.mean_grade.unwrap() - 3.0).abs() < 1e-12);
        assert!((m.grade_std.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(m.failed_courses, 1);
        assert_eq!(m.enrolled_credits, 4.0);
        assert_eq!(m.passed_credits, 2.0);
        assert!((m.weighted_grade_range().unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_row_has_zero_std() {
        let rows = [course("A", Some(3.7), Some(3.0))];
        let refs: Vec<&RawCourseRecord> = rows.iter().collect();
        let m = metrics_for_group(&refs);
        assert_eq!(m.grade_std, Some(0.0));
        assert_eq!(m.min, m.max);
    }

    #[test]
    fn test_ties_keep_first_occurrence() {
        let rows = [
            course("A", Some(2.5), Some(3.0)),
            course("B", Some(4.5), Some(1.0)),
            course("C", Some(2.5), Some(4.0)),
            course("D", Some(4.5), Some(2.0)),
        ];
        let refs: Vec<&RawCourseRecord> = rows.iter().collect();
        let m = metrics_for_group(&refs);
        let min = m.min.as_ref().unwrap();
        let max = m.max.as_ref().unwrap();
        assert_eq!(min.course_id, "A");
        assert_eq!(min.credits, 3.0);
        assert_eq!(max.course_id, "B");
        assert_eq!(m.max_class(), "Clase B");
    }

    #[test]
    fn test_zero_credits_gives_null_mean() {
        let rows = [course("A", Some(4.0), Some(0.0)), course("B", None, Some(3.0))];
        let refs: Vec<&RawCourseRecord> = rows.iter().collect();
        let m = metrics_for_group(&refs);
        assert_eq!(m.mean_grade, None);
        assert_eq!(m.grade_std, None);
        assert_eq!(m.course_count, 2);
        assert_eq!(m.min_class(), "Clase A");
    }

    #[test]
    fn test_groups_by_student_and_cycle() {
        let mut rows = vec![
            course("A", Some(4.0), Some(3.0)),
            course("B", Some(2.0), Some(3.0)),
        ];
        let mut other = course("C", Some(5.0), Some(2.0));
        other.cycle = Cycle::new(2430).unwrap();
        rows.push(other);

        let metrics = compute_grade_metrics(&rows);
        assert_eq!(metrics.len(), 2);
        let first = &metrics[&("S1".to_string(), 1, Cycle::new(2410).unwrap())];
        assert_eq!(first.course_count, 2);
        assert_eq!(first.failed_courses, 1);
    }
}
