//! Shared test utilities and fixture generators

#![allow(dead_code)]

use dropwatch::pipeline::{PipelineArtifacts, PipelineInputs, SubjectCatalog};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const ACTIVE: &str = "Activo en Programa";
pub const SUSPENDED: &str = "Suspendido";
pub const FINISHED: &str = "Programa Finalizado";

/// Per-cycle personal records for five students.
///
/// - `A` (Derecho): active in 2210, 2230, 2310, 2330
/// - `B` (Derecho): active in 2210 and 2230, suspended in 2310
/// - `C` (Medicina): 2210 then 2330, a three-cycle pause
/// - `D` (Medicina): graduates in 2230
/// - `E` (Derecho): deceased, removed everywhere
pub fn create_personal_dataframe() -> DataFrame {
    df! {
        "student_id" => ["A", "A", "A", "A", "B", "B", "B", "C", "C", "D", "D", "E"],
        "program_multiplicity" => ["1", "1", "1", "1", "Pregrado", "Pregrado", "Pregrado", "1", "1", "1", "1", "1"],
        "program" => ["Derecho", "Derecho", "Derecho", "Derecho", "Derecho", "Derecho", "Derecho", "Medicina", "Medicina", "Medicina", "Medicina", "Derecho"],
        "cycle" => [2210i64, 2230, 2310, 2330, 2210, 2230, 2310, 2210, 2330, 2210, 2230, 2210],
        "sex" => ["F", "F", "F", "F", "M", "M", "M", "F", "F", "M", "M", "M"],
        "scholarship" => ["N", "N", "N", "N", "Y", "Y", "Y", "N", "N", "N", "N", "N"],
        "residence_city" => ["Bogota", "Bogota", "Bogotá", "BOGOTA", "Chia", "Chia", "Chia", "Medellin", "Medellin", "Bogota", "Bogota", "Bogota"],
        "birth_department" => ["BOG", "BOG", "BOG", "BOG", "CUN", "CUN", "CUN", "ANT", "ANT", "VEN", "VEN", "BOG"],
        "birth_country" => ["COL", "COL", "COL", "COL", "COL", "COL", "COL", "COL", "COL", "VEN", "VEN", "COL"],
        "admission_cycle" => [2210i64, 2210, 2210, 2210, 2210, 2210, 2210, 2110, 2110, 2210, 2210, 2210],
        "program_acronym" => ["DER", "DER", "DER", "DER", "DER", "DER", "DER", "MED", "MED", "MED", "MED", "DER"],
        "status" => [ACTIVE, ACTIVE, ACTIVE, ACTIVE, ACTIVE, ACTIVE, SUSPENDED, ACTIVE, ACTIVE, ACTIVE, FINISHED, ACTIVE],
        "age" => [19.0f64, 19.0, 20.0, 20.0, 22.0, 22.0, 23.0, 25.0, 26.0, 30.0, 30.0, 21.0],
        "credits_attempted" => [18.0f64, 18.0, 18.0, 18.0, 16.0, 16.0, 16.0, 20.0, 20.0, 12.0, 12.0, 18.0],
        "action_reason" => [None::<&str>, None, None, None, None, None, None, None, None, None, None, Some("Fallecido")],
    }
    .unwrap()
}

/// Cycle summaries matching every personal record.
pub fn create_summaries_dataframe() -> DataFrame {
    df! {
        "student_id" => ["A", "A", "A", "A", "B", "B", "B", "C", "C", "D", "D", "E"],
        "program_multiplicity" => [1i64, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
        "program" => ["Derecho", "Derecho", "Derecho", "Derecho", "Derecho", "Derecho", "Derecho", "Medicina", "Medicina", "Medicina", "Medicina", "Derecho"],
        "cycle" => [2210i64, 2230, 2310, 2330, 2210, 2230, 2310, 2210, 2330, 2210, 2230, 2210],
        "credits_attempted" => [18.0f64, 18.0, 18.0, 18.0, 16.0, 16.0, 16.0, 20.0, 20.0, 12.0, 12.0, 18.0],
        "credits_approved" => [18.0f64, 18.0, 15.0, 18.0, 16.0, 12.0, 6.0, 20.0, 20.0, 12.0, 12.0, 18.0],
        "gpa" => [4.1f64, 4.0, 3.6, 4.2, 3.5, 3.2, 2.4, 3.9, 4.0, 3.8, 4.1, 3.7],
        "cumulative_gpa" => [4.1f64, 4.05, 3.9, 3.98, 3.5, 3.35, 3.03, 3.9, 3.95, 3.8, 3.95, 3.7],
        "academic_status" => ["Normal", "Normal", "Normal", "Normal", "Normal", "Normal", "Primera Prueba", "Normal", "Normal", "Normal", "Normal", "Normal"],
    }
    .unwrap()
}

/// Course grades for a subset of the panel.
pub fn create_courses_dataframe() -> DataFrame {
    df! {
        "student_id" => ["A", "A", "A", "B", "B", "B", "C", "E"],
        "program_multiplicity" => [1i64, 1, 1, 1, 1, 1, 1, 1],
        "cycle" => [2210i64, 2210, 2230, 2210, 2230, 2310, 2210, 2210],
        "course_id" => ["MAT101", "HIS100", "MAT102", "HIS100", "MAT101", "CIV200", "BIO100", "MAT101"],
        "course_name" => ["Calculo Diferencial", "Historia Del Derecho", "Calculo Integral", "Historia Del Derecho", "Calculo Diferencial", "Derecho Civil", "Biologia Celular", "Calculo Diferencial"],
        "grade" => [4.5f64, 3.8, 2.5, 3.0, 2.0, 1.5, 4.8, 3.0],
        "credits" => [4.0f64, 3.0, 4.0, 3.0, 4.0, 3.0, 4.0, 4.0],
    }
    .unwrap()
}

/// Admission records; `B` has an older duplicate and `X` an invalid admission cycle.
pub fn create_admissions_dataframe() -> DataFrame {
    df! {
        "student_id" => ["A", "B", "B", "C", "D", "E", "X"],
        "program" => ["Derecho", "Derecho", "Derecho", "Medicina", "Medicina", "Derecho", "Derecho"],
        "admission_type" => ["Regular", "Traslado", "Regular", "Transferencia", "Regular", "Regular", "Regular"],
        "program_status" => [ACTIVE, ACTIVE, ACTIVE, ACTIVE, FINISHED, ACTIVE, ACTIVE],
        "admission_cycle" => [2210i64, 2110, 2210, 2110, 2210, 2210, 2220],
    }
    .unwrap()
}

/// Latest-cycle roster where only `A` is still enrolled.
pub fn create_roster_dataframe() -> DataFrame {
    df! {
        "student_id" => ["A", "B", "A"],
        "program" => ["Derecho", "Derecho", "Derecho"],
        "cycle" => [2330i64, 2230, 2310],
    }
    .unwrap()
}

pub fn create_pipeline_inputs() -> PipelineInputs {
    PipelineInputs {
        courses: create_courses_dataframe(),
        summaries: create_summaries_dataframe(),
        personal: create_personal_dataframe(),
        admissions: create_admissions_dataframe(),
        roster: None,
    }
}

/// Build the four relations from `(student_id, program, cycle, status)` tuples.
/// Every row gets one course and default demographics.
pub fn create_history_inputs(rows: &[(&str, &str, u32, &str)]) -> PipelineInputs {
    let students: Vec<&str> = rows.iter().map(|r| r.0).collect();
    let programs: Vec<&str> = rows.iter().map(|r| r.1).collect();
    let cycles: Vec<i64> = rows.iter().map(|r| i64::from(r.2)).collect();
    let statuses: Vec<&str> = rows.iter().map(|r| r.3).collect();
    let n = rows.len();

    let personal = DataFrame::new(vec![
        Column::new("student_id".into(), students.clone()),
        Column::new("program_multiplicity".into(), vec![1i64; n]),
        Column::new("program".into(), programs.clone()),
        Column::new("cycle".into(), cycles.clone()),
        Column::new("sex".into(), vec!["F"; n]),
        Column::new("scholarship".into(), vec!["N"; n]),
        Column::new("residence_city".into(), vec!["Bogota"; n]),
        Column::new("birth_department".into(), vec!["BOG"; n]),
        Column::new("birth_country".into(), vec!["COL"; n]),
        Column::new("admission_cycle".into(), cycles.clone()),
        Column::new("status".into(), statuses),
        Column::new("age".into(), vec![20.0f64; n]),
    ])
    .unwrap();

    let summaries = DataFrame::new(vec![
        Column::new("student_id".into(), students.clone()),
        Column::new("program_multiplicity".into(), vec![1i64; n]),
        Column::new("program".into(), programs.clone()),
        Column::new("cycle".into(), cycles.clone()),
        Column::new("credits_attempted".into(), vec![18.0f64; n]),
        Column::new("credits_approved".into(), vec![15.0f64; n]),
        Column::new(
            "gpa".into(),
            (0..n).map(|i| 3.0 + (i % 5) as f64 * 0.3).collect::<Vec<f64>>(),
        ),
        Column::new("academic_status".into(), vec!["Normal"; n]),
    ])
    .unwrap();

    let courses = DataFrame::new(vec![
        Column::new("student_id".into(), students.clone()),
        Column::new("program_multiplicity".into(), vec![1i64; n]),
        Column::new("cycle".into(), cycles),
        Column::new("course_id".into(), vec!["MAT101"; n]),
        Column::new("course_name".into(), vec!["Calculo Diferencial"; n]),
        Column::new(
            "grade".into(),
            (0..n).map(|i| 2.0 + (i % 4) as f64 * 0.8).collect::<Vec<f64>>(),
        ),
        Column::new("credits".into(), vec![4.0f64; n]),
    ])
    .unwrap();

    let admissions = DataFrame::new(vec![
        Column::new("student_id".into(), students),
        Column::new("program".into(), programs),
        Column::new("admission_type".into(), vec!["Regular"; n]),
        Column::new("program_status".into(), vec![ACTIVE; n]),
    ])
    .unwrap();

    PipelineInputs {
        courses,
        summaries,
        personal,
        admissions,
        roster: None,
    }
}

/// Return the frame with its rows in a random order.
pub fn shuffled(df: &DataFrame, seed: u64) -> DataFrame {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    let mut order: Vec<IdxSize> = (0..df.height() as IdxSize).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let idx = IdxCa::from_vec("idx".into(), order);
    df.take(&idx).unwrap()
}

pub fn subject_pairs() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Calculo Diferencial", "Matematicas"),
        ("Calculo Integral", "Matematicas"),
        ("Historia Del Derecho", "Humanidades"),
        ("Biologia Celular", "Ciencias"),
    ]
}

/// Artifacts for training-set preparation, without schema or model.
pub fn preparation_artifacts() -> PipelineArtifacts {
    PipelineArtifacts {
        schema: None,
        scaler: None,
        model: None,
        catalog: SubjectCatalog::from_pairs(subject_pairs()),
        vocabulary_degraded: None,
    }
}

pub const SCHEMA_HEADER: &str = "cycle,credits_attempted,credits_approved,gpa,academic_status_code,sex,scholarship,international,age_band,mean_grade,failed_courses,stratum,p_Derecho,p_Medicina,p_Arquitectura,cd_Bogotá D.C.,ccmax_Matematicas,ta_Regular";

pub const SCALER_JSON: &str = r#"{
  "mean": { "cycle": 2270.0, "gpa": 3.8, "credits_attempted": 17.0 },
  "scale": { "cycle": 50.0, "gpa": 0.5, "credits_attempted": 2.0 }
}"#;

pub const LINEAR_MODEL_JSON: &str = r#"{
  "kind": "linear",
  "intercept": -1.0,
  "coefficients": {
    "gpa": -0.8,
    "failed_courses": 0.9,
    "academic_status_code": 1.2,
    "p_Medicina": 0.3
  }
}"#;

/// Write a complete artifact directory and return its path.
pub fn write_artifacts(dir: &Path) -> PathBuf {
    let artifacts = dir.join("artifacts");
    std::fs::create_dir_all(&artifacts).unwrap();
    std::fs::write(artifacts.join("columns.csv"), format!("{}\n", SCHEMA_HEADER)).unwrap();
    std::fs::write(artifacts.join("scaler.json"), SCALER_JSON).unwrap();
    std::fs::write(artifacts.join("model.json"), LINEAR_MODEL_JSON).unwrap();

    let mut lookup = String::from("class,category\n");
    for (class, category) in subject_pairs() {
        lookup.push_str(&format!("{},{}\n", class, category));
    }
    std::fs::write(artifacts.join("subject_categories.csv"), lookup).unwrap();
    artifacts
}

/// Paths of the fixture relations written as CSV.
pub struct InputFiles {
    pub grades: PathBuf,
    pub summaries: PathBuf,
    pub personal: PathBuf,
    pub admissions: PathBuf,
    pub roster: PathBuf,
}

/// Write the fixture relations to CSV files in `dir`.
pub fn write_input_files(dir: &Path) -> InputFiles {
    let files = InputFiles {
        grades: dir.join("grades.csv"),
        summaries: dir.join("summaries.csv"),
        personal: dir.join("personal.csv"),
        admissions: dir.join("admissions.csv"),
        roster: dir.join("roster.csv"),
    };
    for (mut df, path) in [
        (create_courses_dataframe(), &files.grades),
        (create_summaries_dataframe(), &files.summaries),
        (create_personal_dataframe(), &files.personal),
        (create_admissions_dataframe(), &files.admissions),
        (create_roster_dataframe(), &files.roster),
    ] {
        let mut file = std::fs::File::create(path).unwrap();
        CsvWriter::new(&mut file).finish(&mut df).unwrap();
    }
    files
}

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}
