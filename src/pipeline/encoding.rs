//! Categorical encoding
//!
//! Turns the reconciled panel into a numeric feature frame, row-aligned with the
//! panel rows. Every feature column is `Float64`; free-text fields never reach
//! the frame.

use std::collections::{BTreeSet, HashSet};

use polars::prelude::*;

use super::columns as col;
use super::error::{PipelineError, PipelineResult};
use super::grades::GradeMetrics;
use super::issues::{Issue, IssueLog};
use super::reconcile::{Panel, PanelRow};
use super::vocabulary::{
    academic_status_code, age_band, classify_department, normalize_city, scholarship_code,
    sex_code, title_case, BinaryValue, SubjectCatalog, ACADEMIC_STATUS_ORDER, CAPITAL, FOREIGN,
    NO_DATA, OTHER,
};

/// Panel rows plus their encoded feature frame.
#[derive(Debug, Clone)]
pub struct EncodedPanel {
    pub rows: Vec<PanelRow>,
    pub features: DataFrame,
}

impl EncodedPanel {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Collects feature columns, keeping the first column of any repeated name.
#[derive(Debug, Default)]
pub struct FeatureFrameBuilder {
    columns: Vec<Column>,
    seen: HashSet<String>,
}

impl FeatureFrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, values: Vec<Option<f64>>, issues: &mut IssueLog) {
        if !self.seen.insert(name.to_string()) {
            issues.push(Issue::DuplicateColumn {
                column: name.to_string(),
            });
            return;
        }
        self.columns.push(Column::new(name.into(), values));
    }

    pub fn finish(self) -> PolarsResult<DataFrame> {
        DataFrame::new(self.columns)
    }
}

/// One-hot columns for a categorical field, categories in ascending order.
/// Null values produce all-zero rows.
pub fn one_hot(
    prefix: &str,
    values: &[Option<String>],
    keep: impl Fn(&str) -> bool,
) -> Vec<(String, Vec<Option<f64>>)> {
    let categories: BTreeSet<&str> = values
        .iter()
        .filter_map(|v| v.as_deref())
        .filter(|v| keep(v))
        .collect();

    categories
        .into_iter()
        .map(|category| {
            let column = values
                .iter()
                .map(|v| Some(if v.as_deref() == Some(category) { 1.0 } else { 0.0 }))
                .collect();
            (col::dummy_name(prefix, category), column)
        })
        .collect()
}

fn binary_column(
    rows: &[PanelRow],
    field: &str,
    get: impl Fn(&PanelRow) -> Option<&str>,
    code: fn(Option<&str>) -> BinaryValue,
    issues: &mut IssueLog,
) -> Vec<Option<f64>> {
    rows.iter()
        .map(|row| match code(get(row)) {
            BinaryValue::Known(v) => Some(f64::from(v)),
            BinaryValue::Missing => None,
            BinaryValue::Invalid => {
                issues.invalid_binary(field, get(row).unwrap_or_default());
                None
            }
        })
        .collect()
}

fn academic_status_codes(rows: &[PanelRow]) -> PipelineResult<Vec<Option<f64>>> {
    rows.iter()
        .map(|row| {
            let value = row.academic_status.as_deref();
            value
                .and_then(academic_status_code)
                .map(|code| Some(f64::from(code)))
                .ok_or_else(|| PipelineError::UnseenOrdinal {
                    field: col::ACADEMIC_STATUS,
                    value: value.unwrap_or("null").to_string(),
                    expected: ACADEMIC_STATUS_ORDER.join(", "),
                })
        })
        .collect()
}

/// Encode every panel row into the feature frame.
pub fn encode_panel(
    panel: Panel,
    catalog: &SubjectCatalog,
    issues: &mut IssueLog,
) -> PipelineResult<EncodedPanel> {
    let rows = panel.rows;
    let mut builder = FeatureFrameBuilder::new();

    let numeric = |f: &dyn Fn(&PanelRow) -> Option<f64>| -> Vec<Option<f64>> {
        rows.iter().map(f).collect()
    };

    builder.push(col::CYCLE, numeric(&|r| Some(f64::from(r.cycle.code()))), issues);
    builder.push(
        col::ADMISSION_CYCLE,
        numeric(&|r| r.admission_cycle.map(f64::from)),
        issues,
    );
    builder.push(
        col::PROGRAM_MULTIPLICITY,
        numeric(&|r| Some(f64::from(r.program_multiplicity))),
        issues,
    );
    builder.push(col::ACADEMIC_STATUS_CODE, academic_status_codes(&rows)?, issues);
    builder.push(col::CREDITS_ATTEMPTED, numeric(&|r| r.credits_attempted), issues);
    builder.push(col::CREDITS_APPROVED, numeric(&|r| r.credits_approved), issues);
    builder.push(col::GPA, numeric(&|r| r.gpa), issues);
    builder.push(col::CUMULATIVE_GPA, numeric(&|r| r.cumulative_gpa), issues);
    builder.push(
        col::INTERNATIONAL,
        numeric(&|r| Some(f64::from(r.international))),
        issues,
    );
    builder.push(
        col::AGE_BAND,
        numeric(&|r| r.age.map(|a| f64::from(age_band(a)))),
        issues,
    );

    let sex = binary_column(&rows, col::SEX, |r| r.sex.as_deref(), sex_code, issues);
    builder.push(col::SEX, sex, issues);
    let scholarship = binary_column(
        &rows,
        col::SCHOLARSHIP,
        |r| r.scholarship.as_deref(),
        scholarship_code,
        issues,
    );
    builder.push(col::SCHOLARSHIP, scholarship, issues);

    // Grade metrics, null where the row has no course data
    let grade = |f: &dyn Fn(&GradeMetrics) -> Option<f64>| -> Vec<Option<f64>> {
        rows.iter().map(|r| r.grades.as_ref().and_then(f)).collect()
    };
    builder.push(col::MEAN_GRADE, grade(&|g| g.mean_grade), issues);
    builder.push(col::GRADE_STD, grade(&|g| g.grade_std), issues);
    builder.push(col::MIN_GRADE, grade(&|g| g.min.as_ref().map(|c| c.grade)), issues);
    builder.push(
        col::MIN_GRADE_CREDITS,
        grade(&|g| g.min.as_ref().map(|c| c.credits)),
        issues,
    );
    builder.push(col::MAX_GRADE, grade(&|g| g.max.as_ref().map(|c| c.grade)), issues);
    builder.push(
        col::MAX_GRADE_CREDITS,
        grade(&|g| g.max.as_ref().map(|c| c.credits)),
        issues,
    );
    builder.push(
        col::FAILED_COURSES,
        grade(&|g| Some(f64::from(g.failed_courses))),
        issues,
    );
    builder.push(col::ENROLLED_CREDITS, grade(&|g| Some(g.enrolled_credits)), issues);
    builder.push(col::PASSED_CREDITS, grade(&|g| Some(g.passed_credits)), issues);
    builder.push(col::WEIGHTED_GRADE_RANGE, grade(&|g| g.weighted_grade_range()), issues);
    builder.push(
        col::COURSE_COUNT,
        grade(&|g| Some(f64::from(g.course_count))),
        issues,
    );

    // Unrestricted one-hot fields
    let programs: Vec<Option<String>> = rows.iter().map(|r| Some(r.program.clone())).collect();
    let acronyms: Vec<Option<String>> = rows.iter().map(|r| r.program_acronym.clone()).collect();
    let admission_types: Vec<Option<String>> =
        rows.iter().map(|r| r.admission_type.clone()).collect();
    for (prefix, values) in [
        (col::PROGRAM_PREFIX, &programs),
        (col::ACRONYM_PREFIX, &acronyms),
        (col::ADMISSION_TYPE_PREFIX, &admission_types),
    ] {
        for (name, column) in one_hot(prefix, values, |_| true) {
            builder.push(&name, column, issues);
        }
    }

    // Residence city: only the capital survives as a feature
    let cities: Vec<Option<String>> = rows
        .iter()
        .map(|r| normalize_city(r.residence_city.as_deref()))
        .collect();
    for (name, column) in one_hot(col::CITY_PREFIX, &cities, |c| c == CAPITAL) {
        builder.push(&name, column, issues);
    }

    // Birth department: domestic codes only
    let departments: Vec<Option<String>> = rows
        .iter()
        .map(|r| Some(classify_department(&r.birth_department)))
        .collect();
    for (name, column) in one_hot(col::DEPARTMENT_PREFIX, &departments, |d| {
        d != FOREIGN && d != OTHER
    }) {
        builder.push(&name, column, issues);
    }

    // Subject categories of the best and worst graded class
    let max_categories: Vec<Option<String>> = rows
        .iter()
        .map(|r| subject_category(r, catalog, true))
        .collect();
    let min_categories: Vec<Option<String>> = rows
        .iter()
        .map(|r| subject_category(r, catalog, false))
        .collect();
    for (name, column) in one_hot(col::MAX_CLASS_PREFIX, &max_categories, |_| true) {
        builder.push(&name, column, issues);
    }
    for (name, column) in one_hot(col::MIN_CLASS_PREFIX, &min_categories, |_| true) {
        builder.push(&name, column, issues);
    }

    let features = builder.finish()?;
    Ok(EncodedPanel { rows, features })
}

fn subject_category(row: &PanelRow, catalog: &SubjectCatalog, max: bool) -> Option<String> {
    let class = match (&row.grades, max) {
        (Some(g), true) => g.max_class(),
        (Some(g), false) => g.min_class(),
        (None, _) => NO_DATA,
    };
    catalog.category_for(&title_case(class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cycle::Cycle;
    use crate::pipeline::grades::ExtremeCourse;

    fn row(program: &str, city: Option<&str>, dept: &str, status: &str) -> PanelRow {
        PanelRow {
            student_id: "S1".to_string(),
            program_multiplicity: 1,
            program: program.to_string(),
            cycle: Cycle::new(2410).unwrap(),
            program_acronym: Some("DER".to_string()),
            sex: Some("M".to_string()),
            scholarship: Some("N".to_string()),
            residence_city: city.map(str::to_string),
            birth_department: dept.to_string(),
            birth_country: "COL".to_string(),
            international: 0,
            admission_cycle: Some(2310),
            admission_type: Some("Regular".to_string()),
            status: Some("Activo en Programa".to_string()),
            age: Some(22.0),
            credits_attempted: Some(12.0),
            credits_approved: Some(12.0),
            gpa: Some(4.0),
            cumulative_gpa: Some(4.1),
            academic_status: Some(status.to_string()),
            grades: None,
        }
    }

    fn column_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_one_hot_sorted_and_null_safe() {
        let values = vec![Some("b".to_string()), None, Some("a".to_string())];
        let encoded = one_hot("x", &values, |_| true);
        assert_eq!(encoded[0].0, "x_a");
        assert_eq!(encoded[1].0, "x_b");
        assert_eq!(encoded[0].1, vec![Some(0.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_builder_keeps_first_duplicate() {
        let mut issues = IssueLog::new();
        let mut builder = FeatureFrameBuilder::new();
        builder.push("p_X", vec![Some(1.0)], &mut issues);
        builder.push("p_X", vec![Some(0.0)], &mut issues);
        let df = builder.finish().unwrap();
        assert_eq!(df.width(), 1);
        assert_eq!(column_values(&df, "p_X"), vec![Some(1.0)]);
        assert_eq!(
            issues.into_issues(),
            vec![Issue::DuplicateColumn {
                column: "p_X".into()
            }]
        );
    }

    #[test]
    fn test_city_and_department_vocabularies() {
        let panel = Panel {
            rows: vec![
                row("Derecho", Some("bogota"), "BOG", "Normal"),
                row("Derecho", Some("Chia"), "USA", "Primera Prueba"),
                row("Historia", None, "Otro", "Excluido"),
            ],
        };
        let mut issues = IssueLog::new();
        let encoded = encode_panel(panel, &SubjectCatalog::default(), &mut issues).unwrap();
        let names: Vec<String> = encoded
            .features
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        assert!(names.contains(&"cd_Bogotá D.C.".to_string()));
        assert!(!names.iter().any(|n| n == "cd_Chía"));
        assert!(names.contains(&"dn_BOG".to_string()));
        assert!(!names.iter().any(|n| n == "dn_Ext" || n == "dn_Otro"));
        assert!(names.contains(&"p_Derecho".to_string()));
        assert!(names.contains(&"p_Historia".to_string()));
        assert!(!names.iter().any(|n| n == "residence_city" || n == "program"));

        assert_eq!(
            column_values(&encoded.features, "academic_status_code"),
            vec![Some(0.0), Some(1.0), Some(3.0)]
        );
        assert_eq!(
            column_values(&encoded.features, "cd_Bogotá D.C."),
            vec![Some(1.0), Some(0.0), Some(0.0)]
        );
        assert_eq!(column_values(&encoded.features, "age_band")[0], Some(1.0));
        assert_eq!(column_values(&encoded.features, "sex")[0], Some(1.0));
        assert_eq!(encoded.features.height(), 3);
    }

    #[test]
    fn test_unseen_academic_status_is_fatal() {
        let panel = Panel {
            rows: vec![row("Derecho", None, "BOG", "Tercera Prueba")],
        };
        let err = encode_panel(panel, &SubjectCatalog::default(), &mut IssueLog::new()).unwrap_err();
        assert!(matches!(err, PipelineError::UnseenOrdinal { .. }));
    }

    #[test]
    fn test_subject_classes_mapped_through_catalog() {
        let mut with_grades = row("Derecho", None, "BOG", "Normal");
        with_grades.grades = Some(GradeMetrics {
            mean_grade: Some(3.5),
            grade_std: Some(0.5),
            min: Some(ExtremeCourse {
                grade: 3.0,
                credits: 2.0,
                course_id: "MAT1".into(),
                class_name: "CALCULO".into(),
            }),
            max: Some(ExtremeCourse {
                grade: 4.0,
                credits: 2.0,
                course_id: "DER1".into(),
                class_name: "derecho romano".into(),
            }),
            failed_courses: 0,
            enrolled_credits: 4.0,
            passed_credits: 4.0,
            course_count: 2,
        });
        let panel = Panel {
            rows: vec![with_grades, row("Derecho", None, "BOG", "Normal")],
        };
        let catalog = SubjectCatalog::from_pairs([("Derecho Romano", "Disciplinar")]);
        let mut issues = IssueLog::new();
        let encoded = encode_panel(panel, &catalog, &mut issues).unwrap();

        assert_eq!(
            column_values(&encoded.features, "ccmax_Disciplinar"),
            vec![Some(1.0), Some(0.0)]
        );
        assert_eq!(
            column_values(&encoded.features, "ccmin_Otro"),
            vec![Some(1.0), Some(0.0)]
        );
        assert!(encoded.features.column("ccmax_Sin Datos").is_err());
        assert!(encoded.features.column("ccmin_Sin Datos").is_err());
        assert_eq!(
            column_values(&encoded.features, "mean_grade"),
            vec![Some(3.5), None]
        );
    }

    #[test]
    fn test_invalid_binary_reported() {
        let mut odd = row("Derecho", None, "BOG", "Normal");
        odd.sex = Some("X".to_string());
        let panel = Panel { rows: vec![odd] };
        let mut issues = IssueLog::new();
        let encoded = encode_panel(panel, &SubjectCatalog::default(), &mut issues).unwrap();
        assert_eq!(column_values(&encoded.features, "sex"), vec![None]);
        assert!(issues
            .into_issues()
            .iter()
            .any(|i| matches!(i, Issue::InvalidBinaryValue { field, .. } if field == "sex")));
    }
}
