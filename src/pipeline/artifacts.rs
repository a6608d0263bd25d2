//! Frozen model artifacts
//!
//! Loaded once per process and never mutated, so a single `Arc<PipelineArtifacts>`
//! can back any number of concurrent runs.
//!
//! Artifact directory layout:
//!
//! ```text
//! columns.csv              header row = ordered feature schema
//! scaler.json              { "mean": {..}, "scale": {..} }
//! model.json               tagged classifier (linear | tree_ensemble | weighted_blend)
//! subject_categories.csv   class,category lookup
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use super::align::Scaler;
use super::error::{PipelineError, PipelineResult, Stage};
use super::scoring::ModelArtifact;
use super::vocabulary::SubjectCatalog;

pub const SCHEMA_FILE: &str = "columns.csv";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";
pub const SUBJECT_CATEGORIES_FILE: &str = "subject_categories.csv";

/// Where to find artifacts and how strictly to treat them.
#[derive(Debug, Clone)]
pub struct ArtifactSource {
    pub dir: PathBuf,
    /// Overrides `<dir>/subject_categories.csv`.
    pub subject_categories: Option<PathBuf>,
    /// Substitute an empty subject lookup instead of failing when it cannot be read.
    pub allow_missing_vocabulary: bool,
}

impl ArtifactSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            subject_categories: None,
            allow_missing_vocabulary: false,
        }
    }

    pub fn subject_categories_path(&self) -> PathBuf {
        self.subject_categories
            .clone()
            .unwrap_or_else(|| self.dir.join(SUBJECT_CATEGORIES_FILE))
    }
}

/// Immutable artifacts shared by every run.
#[derive(Debug, Clone)]
pub struct PipelineArtifacts {
    pub schema: Option<Vec<String>>,
    pub scaler: Option<Scaler>,
    pub model: Option<ModelArtifact>,
    pub catalog: SubjectCatalog,
    /// Why the subject lookup was degraded, when it was.
    pub vocabulary_degraded: Option<String>,
}

impl PipelineArtifacts {
    /// Everything needed to score: schema, scaler, model and subject lookup.
    pub fn load_for_scoring(source: &ArtifactSource) -> PipelineResult<Self> {
        let schema = read_schema(&source.dir.join(SCHEMA_FILE))?;
        let scaler = read_scaler(&source.dir.join(SCALER_FILE))?;
        let model = read_model(&source.dir.join(MODEL_FILE))?;
        let (catalog, vocabulary_degraded) = read_catalog(source)?;
        Ok(Self {
            schema: Some(schema),
            scaler: Some(scaler),
            model: Some(model),
            catalog,
            vocabulary_degraded,
        })
    }

    /// Training-set export: subject lookup required, schema used when present.
    pub fn load_for_preparation(source: &ArtifactSource) -> PipelineResult<Self> {
        let schema_path = source.dir.join(SCHEMA_FILE);
        let schema = if schema_path.exists() {
            Some(read_schema(&schema_path)?)
        } else {
            None
        };
        let (catalog, vocabulary_degraded) = read_catalog(source)?;
        Ok(Self {
            schema,
            scaler: None,
            model: None,
            catalog,
            vocabulary_degraded,
        })
    }
}

fn artifact_error(name: &str, reason: impl Into<String>) -> PipelineError {
    let stage = if name == MODEL_FILE {
        Stage::Score
    } else {
        Stage::Align
    };
    PipelineError::artifact(stage, name, reason)
}

/// Ordered feature names from the header row of a CSV file.
pub fn read_schema(path: &Path) -> PipelineResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| artifact_error(SCHEMA_FILE, format!("{}: {}", path.display(), e)))?;
    let headers = reader
        .headers()
        .map_err(|e| artifact_error(SCHEMA_FILE, e.to_string()))?;
    let schema: Vec<String> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    if schema.is_empty() {
        return Err(artifact_error(SCHEMA_FILE, "header row is empty"));
    }
    Ok(schema)
}

pub fn read_scaler(path: &Path) -> PipelineResult<Scaler> {
    let text = fs::read_to_string(path)
        .map_err(|e| artifact_error(SCALER_FILE, format!("{}: {}", path.display(), e)))?;
    let scaler: Scaler =
        serde_json::from_str(&text).map_err(|e| artifact_error(SCALER_FILE, e.to_string()))?;
    scaler.validate()?;
    Ok(scaler)
}

pub fn read_model(path: &Path) -> PipelineResult<ModelArtifact> {
    let text = fs::read_to_string(path)
        .map_err(|e| artifact_error(MODEL_FILE, format!("{}: {}", path.display(), e)))?;
    ModelArtifact::from_json(&text)
}

fn read_catalog(source: &ArtifactSource) -> PipelineResult<(SubjectCatalog, Option<String>)> {
    match SubjectCatalog::from_csv(&source.subject_categories_path()) {
        Ok(catalog) => Ok((catalog, None)),
        Err(err) if source.allow_missing_vocabulary => {
            Ok((SubjectCatalog::degraded(), Some(err.to_string())))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_read_schema_header_only() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SCHEMA_FILE, "\u{feff}gpa,p_Derecho, cd_Bogotá D.C.\n");
        let schema = read_schema(&dir.path().join(SCHEMA_FILE)).unwrap();
        assert_eq!(schema, vec!["gpa", "p_Derecho", "cd_Bogotá D.C."]);
    }

    #[test]
    fn test_load_for_scoring() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SCHEMA_FILE, "gpa,failed_courses\n");
        write(
            dir.path(),
            SCALER_FILE,
            r#"{ "mean": { "gpa": 3.5 }, "scale": { "gpa": 0.5 } }"#,
        );
        write(
            dir.path(),
            MODEL_FILE,
            r#"{ "kind": "linear", "intercept": -1.0, "coefficients": { "gpa": -0.8 } }"#,
        );
        write(dir.path(), SUBJECT_CATEGORIES_FILE, "class,category\nFisica,Ciencias\n");

        let artifacts = PipelineArtifacts::load_for_scoring(&ArtifactSource::new(dir.path())).unwrap();
        assert_eq!(artifacts.schema.as_ref().map(Vec::len), Some(2));
        assert_eq!(artifacts.model.as_ref().map(|m| m.kind()), Some("linear"));
        assert_eq!(artifacts.catalog.len(), 1);
        assert!(artifacts.vocabulary_degraded.is_none());
    }

    #[test]
    fn test_missing_lookup_fatal_unless_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ArtifactSource::new(dir.path());
        let err = PipelineArtifacts::load_for_preparation(&source).unwrap_err();
        assert!(matches!(err, PipelineError::Vocabulary { .. }));

        source.allow_missing_vocabulary = true;
        let artifacts = PipelineArtifacts::load_for_preparation(&source).unwrap();
        assert!(artifacts.catalog.is_degraded());
        assert!(artifacts.vocabulary_degraded.is_some());
        assert!(artifacts.schema.is_none());
    }

    #[test]
    fn test_zero_scale_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SCALER_FILE, r#"{ "mean": { "gpa": 3.5 }, "scale": { "gpa": 0.0 } }"#);
        let err = read_scaler(&dir.path().join(SCALER_FILE)).unwrap_err();
        assert!(err.to_string().contains("scale"));
    }
}
