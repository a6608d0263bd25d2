//! Typed input records
//!
//! This is the single validation boundary between loosely typed input frames and
//! the pipeline. Each relation is checked for its required canonical columns here;
//! everything downstream works on plain structs and never looks columns up by name.

use polars::prelude::*;
use serde::Serialize;

use super::columns as col;
use super::cycle::Cycle;
use super::error::{PipelineError, PipelineResult, Stage};

/// Degree names accepted for `program_multiplicity`, with their numeric codes.
const MULTIPLICITY_CODES: [(&str, u8); 6] = [
    ("Pregrado", 1),
    ("Especialización", 2),
    ("Maestría", 3),
    ("Doctorado", 4),
    ("Especialidad Médica", 5),
    ("Especialidad Odontológica", 6),
];

/// One course grade row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCourseRecord {
    pub student_id: String,
    pub program_multiplicity: u8,
    pub cycle: Cycle,
    pub course_id: String,
    pub course_name: Option<String>,
    pub grade: Option<f64>,
    pub credits: Option<f64>,
}

/// One per-cycle academic summary row.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummaryRecord {
    pub student_id: String,
    pub program_multiplicity: u8,
    pub program: String,
    pub cycle: Cycle,
    pub credits_attempted: Option<f64>,
    pub credits_approved: Option<f64>,
    pub gpa: Option<f64>,
    pub academic_status: Option<String>,
    pub cumulative_gpa: Option<f64>,
    pub status: Option<String>,
    pub admission_cycle: Option<u32>,
}

/// One per-cycle personal / enrollment row.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonalRecord {
    pub student_id: String,
    pub program_multiplicity: u8,
    pub program: String,
    pub cycle: Cycle,
    pub sex: Option<String>,
    pub scholarship: Option<String>,
    pub residence_city: Option<String>,
    pub birth_department: Option<String>,
    pub birth_country: Option<String>,
    pub admission_cycle: Option<u32>,
    pub program_acronym: Option<String>,
    pub status: Option<String>,
    pub age: Option<f64>,
    pub credits_attempted: Option<f64>,
    pub credits_approved: Option<f64>,
    pub action_reason: Option<String>,
}

/// One admission row.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRecord {
    pub student_id: String,
    pub program: String,
    pub admission_type: Option<String>,
    pub program_status: Option<String>,
    pub sex: Option<String>,
    pub residence_city: Option<String>,
    pub birth_department: Option<String>,
    pub birth_country: Option<String>,
    pub admission_cycle: Option<u32>,
}

/// One row of the authoritative enrollment roster.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRecord {
    pub student_id: String,
    pub program: String,
    pub cycle: Cycle,
}

/// Rows rejected while extracting a relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rejections {
    /// Cycle code missing or not ending in 10/30.
    pub invalid_cycle: usize,
    /// Program multiplicity neither numeric nor a known degree name.
    pub unknown_multiplicity: usize,
}

impl Rejections {
    pub fn total(&self) -> usize {
        self.invalid_cycle + self.unknown_multiplicity
    }
}

/// Records extracted from a frame together with what was rejected on the way.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    pub records: Vec<T>,
    pub rejected: Rejections,
}

/// Map a program multiplicity cell to its numeric code.
pub fn parse_multiplicity(raw: &str) -> Option<u8> {
    let trimmed = raw.trim();
    if let Ok(code) = trimmed.parse::<u8>() {
        return Some(code);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.fract() == 0.0 && (0.0..=255.0).contains(&value) {
            return Some(value as u8);
        }
    }
    MULTIPLICITY_CODES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed) || *name == trimmed)
        .map(|(_, code)| *code)
}

/// Column accessor over one input relation.
///
/// Required columns raise [`PipelineError::Schema`]; optional columns read as all-null.
pub struct FrameReader<'a> {
    df: &'a DataFrame,
    table: &'static str,
    stage: Stage,
}

impl<'a> FrameReader<'a> {
    pub fn new(df: &'a DataFrame, table: &'static str, stage: Stage) -> Self {
        Self { df, table, stage }
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    fn has(&self, name: &str) -> bool {
        self.df.get_column_names().iter().any(|c| c.as_str() == name)
    }

    /// Fail fast when any of the named columns is absent.
    pub fn require(&self, names: &[&str]) -> PipelineResult<()> {
        for name in names {
            if !self.has(name) {
                return Err(PipelineError::schema(self.stage, self.table, *name));
            }
        }
        Ok(())
    }

    pub fn strings(&self, name: &str) -> PipelineResult<Vec<Option<String>>> {
        let column = self
            .df
            .column(name)
            .map_err(|_| PipelineError::schema(self.stage, self.table, name))?;
        Ok(column_to_strings(column)?
            .into_iter()
            .map(|v| v.and_then(clean_text))
            .collect())
    }

    pub fn optional_strings(&self, name: &str) -> PipelineResult<Vec<Option<String>>> {
        if self.has(name) {
            self.strings(name)
        } else {
            Ok(vec![None; self.height()])
        }
    }

    pub fn floats(&self, name: &str) -> PipelineResult<Vec<Option<f64>>> {
        let column = self
            .df
            .column(name)
            .map_err(|_| PipelineError::schema(self.stage, self.table, name))?;
        let values = if column.dtype() == &DataType::String {
            column
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_decimal))
                .collect()
        } else {
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect()
        };
        Ok(values)
    }

    pub fn optional_floats(&self, name: &str) -> PipelineResult<Vec<Option<f64>>> {
        if self.has(name) {
            self.floats(name)
        } else {
            Ok(vec![None; self.height()])
        }
    }

    /// Key column: every row must have a value.
    pub fn keys(&self, name: &str) -> PipelineResult<Vec<String>> {
        self.strings(name)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| PipelineError::InvalidValue {
                    stage: self.stage,
                    table: self.table,
                    column: name.to_string(),
                    row,
                    message: "key column contains a null value".to_string(),
                })
            })
            .collect()
    }
}

/// Trim a text cell; blank cells become null.
fn clean_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a decimal that may use a comma as the decimal separator.
fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
        .ok()
        .filter(|v| !v.is_nan())
}

/// Convert a column to strings, rendering integral floats without a fractional part
/// so that `2410.0` and `2410` produce the same key.
pub fn column_to_strings(col: &Column) -> PolarsResult<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = col.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            cast.u64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| {
                    v.filter(|n| !n.is_nan()).map(|n| {
                        if n.fract() == 0.0 && n.abs() < 1e15 {
                            format!("{}", n as i64)
                        } else {
                            format!("{}", n)
                        }
                    })
                })
                .collect()
        }
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };
    Ok(values)
}

fn parse_admission_cycle(value: Option<f64>) -> Option<u32> {
    value.filter(|v| *v >= 0.0 && v.fract() == 0.0).map(|v| v as u32)
}

/// Parse key cycles and multiplicities, tallying rows that cannot be used.
fn parse_keys(
    cycles: &[Option<String>],
    multiplicities: Option<&[Option<String>]>,
    rejected: &mut Rejections,
) -> Vec<Option<(Cycle, u8)>> {
    (0..cycles.len())
        .map(|i| {
            let cycle = cycles[i].as_deref().and_then(Cycle::parse);
            let multiplicity = match multiplicities {
                Some(values) => values[i].as_deref().and_then(parse_multiplicity),
                None => Some(0),
            };
            match (cycle, multiplicity) {
                (None, _) => {
                    rejected.invalid_cycle += 1;
                    None
                }
                (Some(_), None) => {
                    rejected.unknown_multiplicity += 1;
                    None
                }
                (Some(c), Some(m)) => Some((c, m)),
            }
        })
        .collect()
}

impl RawCourseRecord {
    pub const TABLE: &'static str = "grades";

    pub fn from_frame(df: &DataFrame) -> PipelineResult<Extracted<Self>> {
        let reader = FrameReader::new(df, Self::TABLE, Stage::Load);
        reader.require(&[
            col::STUDENT_ID,
            col::PROGRAM_MULTIPLICITY,
            col::CYCLE,
            col::COURSE_ID,
            col::GRADE,
            col::CREDITS,
        ])?;

        let students = reader.keys(col::STUDENT_ID)?;
        let multiplicities = reader.strings(col::PROGRAM_MULTIPLICITY)?;
        let cycles = reader.strings(col::CYCLE)?;
        let course_ids = reader.strings(col::COURSE_ID)?;
        let course_names = reader.optional_strings(col::COURSE_NAME)?;
        let grades = reader.floats(col::GRADE)?;
        let credits = reader.floats(col::CREDITS)?;

        let mut rejected = Rejections::default();
        let keys = parse_keys(&cycles, Some(&multiplicities), &mut rejected);

        let records = keys
            .into_iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let (cycle, program_multiplicity) = key?;
                Some(RawCourseRecord {
                    student_id: students[i].clone(),
                    program_multiplicity,
                    cycle,
                    course_id: course_ids[i].clone().unwrap_or_default(),
                    course_name: course_names[i].clone(),
                    grade: grades[i],
                    credits: credits[i],
                })
            })
            .collect();

        Ok(Extracted { records, rejected })
    }

    /// Class label used for the max/min subject class fields.
    pub fn class_name(&self) -> &str {
        self.course_name.as_deref().unwrap_or(&self.course_id)
    }
}

impl CycleSummaryRecord {
    pub const TABLE: &'static str = "summaries";

    pub fn from_frame(df: &DataFrame) -> PipelineResult<Extracted<Self>> {
        let reader = FrameReader::new(df, Self::TABLE, Stage::Load);
        reader.require(&[
            col::STUDENT_ID,
            col::PROGRAM_MULTIPLICITY,
            col::PROGRAM,
            col::CYCLE,
            col::CREDITS_ATTEMPTED,
            col::CREDITS_APPROVED,
            col::GPA,
            col::ACADEMIC_STATUS,
        ])?;

        let students = reader.keys(col::STUDENT_ID)?;
        let multiplicities = reader.strings(col::PROGRAM_MULTIPLICITY)?;
        let programs = reader.keys(col::PROGRAM)?;
        let cycles = reader.strings(col::CYCLE)?;
        let attempted = reader.floats(col::CREDITS_ATTEMPTED)?;
        let approved = reader.floats(col::CREDITS_APPROVED)?;
        let gpa = reader.floats(col::GPA)?;
        let academic_status = reader.strings(col::ACADEMIC_STATUS)?;
        let cumulative_gpa = reader.optional_floats(col::CUMULATIVE_GPA)?;
        let status = reader.optional_strings(col::STATUS)?;
        let admission_cycle = reader.optional_floats(col::ADMISSION_CYCLE)?;

        let mut rejected = Rejections::default();
        let keys = parse_keys(&cycles, Some(&multiplicities), &mut rejected);

        let records = keys
            .into_iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let (cycle, program_multiplicity) = key?;
                Some(CycleSummaryRecord {
                    student_id: students[i].clone(),
                    program_multiplicity,
                    program: programs[i].clone(),
                    cycle,
                    credits_attempted: attempted[i],
                    credits_approved: approved[i],
                    gpa: gpa[i],
                    academic_status: academic_status[i].clone(),
                    cumulative_gpa: cumulative_gpa[i],
                    status: status[i].clone(),
                    admission_cycle: parse_admission_cycle(admission_cycle[i]),
                })
            })
            .collect();

        Ok(Extracted { records, rejected })
    }
}

impl PersonalRecord {
    pub const TABLE: &'static str = "personal";

    pub fn from_frame(df: &DataFrame) -> PipelineResult<Extracted<Self>> {
        let reader = FrameReader::new(df, Self::TABLE, Stage::Load);
        reader.require(&[
            col::STUDENT_ID,
            col::PROGRAM_MULTIPLICITY,
            col::PROGRAM,
            col::CYCLE,
            col::SEX,
            col::SCHOLARSHIP,
            col::RESIDENCE_CITY,
            col::BIRTH_DEPARTMENT,
            col::BIRTH_COUNTRY,
            col::ADMISSION_CYCLE,
        ])?;

        let students = reader.keys(col::STUDENT_ID)?;
        let multiplicities = reader.strings(col::PROGRAM_MULTIPLICITY)?;
        let programs = reader.keys(col::PROGRAM)?;
        let cycles = reader.strings(col::CYCLE)?;
        let sex = reader.strings(col::SEX)?;
        let scholarship = reader.strings(col::SCHOLARSHIP)?;
        let city = reader.strings(col::RESIDENCE_CITY)?;
        let department = reader.strings(col::BIRTH_DEPARTMENT)?;
        let country = reader.strings(col::BIRTH_COUNTRY)?;
        let admission_cycle = reader.floats(col::ADMISSION_CYCLE)?;
        let acronym = reader.optional_strings(col::PROGRAM_ACRONYM)?;
        let status = reader.optional_strings(col::STATUS)?;
        let age = reader.optional_floats(col::AGE)?;
        let attempted = reader.optional_floats(col::CREDITS_ATTEMPTED)?;
        let approved = reader.optional_floats(col::CREDITS_APPROVED)?;
        let reason = reader.optional_strings(col::ACTION_REASON)?;

        let mut rejected = Rejections::default();
        let keys = parse_keys(&cycles, Some(&multiplicities), &mut rejected);

        let records = keys
            .into_iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let (cycle, program_multiplicity) = key?;
                Some(PersonalRecord {
                    student_id: students[i].clone(),
                    program_multiplicity,
                    program: programs[i].clone(),
                    cycle,
                    sex: sex[i].clone(),
                    scholarship: scholarship[i].clone(),
                    residence_city: city[i].clone(),
                    birth_department: department[i].clone(),
                    birth_country: country[i].clone(),
                    admission_cycle: parse_admission_cycle(admission_cycle[i]),
                    program_acronym: acronym[i].clone(),
                    status: status[i].clone(),
                    age: age[i],
                    credits_attempted: attempted[i],
                    credits_approved: approved[i],
                    action_reason: reason[i].clone(),
                })
            })
            .collect();

        Ok(Extracted { records, rejected })
    }
}

impl AdmissionRecord {
    pub const TABLE: &'static str = "admissions";

    pub fn from_frame(df: &DataFrame) -> PipelineResult<Extracted<Self>> {
        let reader = FrameReader::new(df, Self::TABLE, Stage::Load);
        reader.require(&[
            col::STUDENT_ID,
            col::PROGRAM,
            col::ADMISSION_TYPE,
            col::PROGRAM_STATUS,
        ])?;

        let students = reader.keys(col::STUDENT_ID)?;
        let programs = reader.keys(col::PROGRAM)?;
        let admission_type = reader.strings(col::ADMISSION_TYPE)?;
        let program_status = reader.strings(col::PROGRAM_STATUS)?;
        let sex = reader.optional_strings(col::SEX)?;
        let city = reader.optional_strings(col::RESIDENCE_CITY)?;
        let department = reader.optional_strings(col::BIRTH_DEPARTMENT)?;
        let country = reader.optional_strings(col::BIRTH_COUNTRY)?;
        let admission_cycle = reader.optional_floats(col::ADMISSION_CYCLE)?;

        let records = (0..reader.height())
            .map(|i| AdmissionRecord {
                student_id: students[i].clone(),
                program: programs[i].clone(),
                admission_type: admission_type[i].clone(),
                program_status: program_status[i].clone(),
                sex: sex[i].clone(),
                residence_city: city[i].clone(),
                birth_department: department[i].clone(),
                birth_country: country[i].clone(),
                admission_cycle: parse_admission_cycle(admission_cycle[i]),
            })
            .collect();

        Ok(Extracted {
            records,
            rejected: Rejections::default(),
        })
    }
}

impl RosterRecord {
    pub const TABLE: &'static str = "roster";

    pub fn from_frame(df: &DataFrame) -> PipelineResult<Extracted<Self>> {
        let reader = FrameReader::new(df, Self::TABLE, Stage::Label);
        reader.require(&[col::STUDENT_ID, col::PROGRAM, col::CYCLE])?;

        let students = reader.keys(col::STUDENT_ID)?;
        let programs = reader.keys(col::PROGRAM)?;
        let cycles = reader.strings(col::CYCLE)?;

        let mut rejected = Rejections::default();
        let keys = parse_keys(&cycles, None, &mut rejected);

        let records = keys
            .into_iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let (cycle, _) = key?;
                Some(RosterRecord {
                    student_id: students[i].clone(),
                    program: programs[i].clone(),
                    cycle,
                })
            })
            .collect();

        Ok(Extracted { records, rejected })
    }
}
