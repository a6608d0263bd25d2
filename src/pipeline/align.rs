//! Schema alignment and standardization
//!
//! Reshapes a feature frame to the frozen training schema: same columns, same
//! order, nothing extra. Standardization uses the scaler fitted at training time.

use std::collections::{BTreeMap, HashSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::columns::is_dummy_like;
use super::error::{PipelineError, PipelineResult, Stage};
use super::issues::{Issue, IssueLog};

/// Collapse repeated schema names to their first occurrence.
pub fn dedupe_schema(schema: &[String], issues: &mut IssueLog) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(schema.len());
    for name in schema {
        if seen.insert(name.as_str()) {
            out.push(name.clone());
        } else {
            issues.push(Issue::DuplicateColumn {
                column: name.clone(),
            });
        }
    }
    out
}

/// Align `features` to `schema` (already deduplicated).
///
/// Present columns are cast to `Float64`; absent dummy columns are zero-filled.
/// Absent non-dummy columns are zero-filled as well but reported as missing features.
pub fn align_to_schema(
    features: &DataFrame,
    schema: &[String],
    issues: &mut IssueLog,
) -> PipelineResult<DataFrame> {
    let height = features.height();
    let present: HashSet<&str> = features
        .get_column_names()
        .iter()
        .map(|n| n.as_str())
        .collect();

    let mut columns = Vec::with_capacity(schema.len());
    for name in schema {
        if present.contains(name.as_str()) {
            let column = features.column(name)?.cast(&DataType::Float64)?;
            columns.push(column);
        } else {
            if !is_dummy_like(name) {
                issues.push(Issue::MissingFeature {
                    column: name.clone(),
                });
            }
            columns.push(Column::new(name.as_str().into(), vec![0.0f64; height]));
        }
    }

    Ok(DataFrame::new(columns)?)
}

/// Replace null and non-finite values with 0 in every column.
pub fn fill_missing_with_zero(frame: &DataFrame) -> PipelineResult<DataFrame> {
    let mut out = frame.clone();
    for column in frame.get_columns() {
        let cast = column.cast(&DataType::Float64)?;
        let filled: Vec<f64> = cast
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()).unwrap_or(0.0))
            .collect();
        out.with_column(Column::new(column.name().clone(), filled))?;
    }
    Ok(out)
}

/// Per-column standardization parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: BTreeMap<String, f64>,
    pub scale: BTreeMap<String, f64>,
}

impl Scaler {
    /// Reject zero or non-finite scales.
    pub fn validate(&self) -> PipelineResult<()> {
        for (name, scale) in &self.scale {
            if *scale == 0.0 || !scale.is_finite() {
                return Err(PipelineError::artifact(
                    Stage::Align,
                    "scaler",
                    format!("column '{}' has scale {}", name, scale),
                ));
            }
        }
        for (name, mean) in &self.mean {
            if !mean.is_finite() {
                return Err(PipelineError::artifact(
                    Stage::Align,
                    "scaler",
                    format!("column '{}' has mean {}", name, mean),
                ));
            }
        }
        Ok(())
    }

    /// `(v - mean) / scale` for every column present in both maps and in the frame.
    pub fn transform(&self, frame: &DataFrame) -> PipelineResult<DataFrame> {
        let mut out = frame.clone();
        for (name, mean) in &self.mean {
            let Some(scale) = self.scale.get(name) else {
                continue;
            };
            if *scale == 0.0 {
                return Err(PipelineError::artifact(
                    Stage::Align,
                    "scaler",
                    format!("column '{}' has scale 0", name),
                ));
            }
            let Ok(column) = frame.column(name) else {
                continue;
            };
            let cast = column.cast(&DataType::Float64)?;
            let scaled: Vec<Option<f64>> = cast
                .f64()?
                .into_iter()
                .map(|v| v.map(|x| (x - mean) / scale))
                .collect();
            out.with_column(Column::new(name.as_str().into(), scaled))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_align_exact_order_and_zero_fill() {
        let features = df! {
            "gpa" => [4.0f64, 3.0],
            "p_Derecho" => [1.0f64, 0.0],
            "extra" => [9.0f64, 9.0],
        }
        .unwrap();
        let mut issues = IssueLog::new();
        let target = schema(&["p_Historia", "p_Derecho", "gpa", "credits"]);
        let aligned = align_to_schema(&features, &target, &mut issues).unwrap();

        let names: Vec<String> = aligned
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, target);
        let zeros: Vec<Option<f64>> = aligned
            .column("p_Historia")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(zeros, vec![Some(0.0), Some(0.0)]);
        assert_eq!(
            issues.into_issues(),
            vec![Issue::MissingFeature {
                column: "credits".into()
            }]
        );
    }

    #[test]
    fn test_dedupe_schema() {
        let mut issues = IssueLog::new();
        let out = dedupe_schema(&schema(&["a", "b_x", "a"]), &mut issues);
        assert_eq!(out, schema(&["a", "b_x"]));
        assert_eq!(
            issues.into_issues(),
            vec![Issue::DuplicateColumn { column: "a".into() }]
        );
    }

    #[test]
    fn test_standardization_is_exact() {
        let frame = df! {
            "gpa" => [Some(4.0f64), None, Some(2.5)],
            "untouched" => [1.0f64, 2.0, 3.0],
        }
        .unwrap();
        let scaler = Scaler {
            mean: BTreeMap::from([("gpa".to_string(), 3.2), ("ghost".to_string(), 1.0)]),
            scale: BTreeMap::from([("gpa".to_string(), 0.7)]),
        };
        let out = scaler.transform(&frame).unwrap();
        let gpa: Vec<Option<f64>> = out.column("gpa").unwrap().f64().unwrap().into_iter().collect();
        assert!((gpa[0].unwrap() - (4.0 - 3.2) / 0.7).abs() < 1e-9);
        assert_eq!(gpa[1], None);
        assert!((gpa[2].unwrap() - (2.5 - 3.2) / 0.7).abs() < 1e-9);
        let untouched: Vec<Option<f64>> = out
            .column("untouched")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(untouched, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_zero_scale_is_artifact_error() {
        let scaler = Scaler {
            mean: BTreeMap::from([("gpa".to_string(), 3.0)]),
            scale: BTreeMap::from([("gpa".to_string(), 0.0)]),
        };
        assert!(matches!(
            scaler.validate(),
            Err(PipelineError::Artifact { .. })
        ));
        let frame = df! { "gpa" => [1.0f64] }.unwrap();
        assert!(scaler.transform(&frame).is_err());
    }

    #[test]
    fn test_fill_missing_with_zero() {
        let frame = df! {
            "mean_grade" => [Some(3.2f64), None, Some(f64::NAN)],
            "failed_courses" => [Some(1i32), Some(0), None],
        }
        .unwrap();
        let filled = fill_missing_with_zero(&frame).unwrap();

        let grades: Vec<Option<f64>> = filled
            .column("mean_grade")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(grades, vec![Some(3.2), Some(0.0), Some(0.0)]);
        let failed: Vec<Option<f64>> = filled
            .column("failed_courses")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(failed, vec![Some(1.0), Some(0.0), Some(0.0)]);
    }
}
