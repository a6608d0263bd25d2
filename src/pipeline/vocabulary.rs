//! Frozen vocabularies used by the categorical encoder.
//!
//! City spelling fixes, department code sets, the academic-status order and the
//! external subject class → category lookup.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use super::error::{PipelineError, PipelineResult, Stage};

/// Category used for anything outside a vocabulary.
pub const OTHER: &str = "Otro";

/// Department bucket for foreign birth places.
pub const FOREIGN: &str = "Ext";

/// Sentinel class name for panel rows without course data.
pub const NO_DATA: &str = "Sin Datos";

/// Canonical name of the capital, the only city kept as a feature.
pub const CAPITAL: &str = "Bogotá D.C.";

/// Name of the subject class → category lookup in reports.
pub const SUBJECT_LOOKUP: &str = "subject_categories";

/// Academic status ordinal order.
pub const ACADEMIC_STATUS_ORDER: [&str; 4] = ["Normal", "Primera Prueba", "Segunda Prueba", "Excluido"];

const CITY_REPLACEMENTS: &[(&str, &str)] = &[
    ("Bogota", CAPITAL),
    ("Bogotá", CAPITAL),
    ("Bog", CAPITAL),
    ("Bogotád.C.", CAPITAL),
    ("BOGOTÁD.C.", CAPITAL),
    ("BOGOTA", CAPITAL),
    ("BOGOTÁ", CAPITAL),
    ("Bogota D.C.", CAPITAL),
    ("Cajica", "Cajicá"),
    ("Chia", "Chía"),
    ("Zipaquira", "Zipaquirá"),
    ("Santiago Cali", "Cali"),
    ("Medellin", "Medellín"),
    ("BUCARAMANGA", "Bucaramanga"),
];

const CITY_ABBREVIATIONS: &[&str] = &[
    "Rm", "Ma", "Ar", "La", "Lp", "Zu", "Bo", "An", "Po", "Pr", "Ct", "Co", "Sp", "Ta", "Lo",
    "Sc", "Nsw", "Gt Lon", "Ccs", "Qroo", "92500 Rueil-Malmaison", "Roma Rm",
];

const DOMESTIC_DEPARTMENTS: &[&str] = &[
    "BOG", "CUN", "ANT", "ATL", "BOL", "BOY", "CAL", "CAQ", "CAS", "CAU", "CES", "CHO", "COR",
    "HUI", "LAG", "MAG", "MET", "NAR", "NSA", "PUT", "QUI", "RIS", "SAN", "STD", "SUC", "TOL",
    "VAL", "VAU", "ARA", "AMA", "GAV", "GAI", "VIC",
];

const FOREIGN_CODES: &[&str] = &[
    "USA", "MEX", "CAN", "NY", "CA", "TX", "FL", "LA", "MI", "MO", "MA", "IL", "WA", "MT", "PA",
    "NC", "NE", "BE", "MN", "GTM", "SLV", "HND", "NIC", "CRI", "PAN", "DOM", "CUB", "HTI", "PRI",
    "ABW", "BB", "ECU", "PER", "BRA", "CHL", "ARG", "URY", "PRY", "BOL", "VEN", "RJ", "MG", "SP",
    "RS", "BA", "PE", "DF", "SU", "BL", "ESP", "FRA", "GBR", "ITA", "DEU", "NLD", "PRT", "CHE",
    "SWE", "AUT", "GRC", "CZE", "RUS", "MDA", "NL", "RM", "BCN", "GT LON", "HE", "GE", "BG", "BY",
    "NW", "NAP", "SH", "CF", "KOR", "CHN", "JPN", "IDN", "THA", "VNM", "PRK", "SAU", "IRN", "SGP",
    "UZB", "TZA", "TGO", "KEN", "GAB", "COG", "COD", "DZA", "MOR", "AUS", "ZH", "VIC", "MERSYD",
    "BRIST", "EMEX", "JAL", "MICH", "VER", "DGO", "BCS", "FA", "Z1", "TA", "CE", "ON", "QC", "AM",
    "AN", "AR", "BO", "CO", "HH", "LP", "ME", "PI", "PR", "SC", "SN", "VA", "ZU", "CCS", "PHL",
];

fn domestic_departments() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| DOMESTIC_DEPARTMENTS.iter().copied().collect())
}

fn foreign_codes() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| FOREIGN_CODES.iter().copied().collect())
}

/// Title-case the way Python's `str.title` does: a letter is uppercased when it
/// follows a non-letter, lowercased otherwise.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_letter = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

fn is_invalid_city(value: &str) -> bool {
    if value == OTHER || CITY_ABBREVIATIONS.contains(&value) {
        return true;
    }
    let compact: String = value.chars().filter(|c| *c != ' ').collect();
    if compact.chars().count() <= 2 {
        return true;
    }
    let letters = compact.chars().count();
    if (2..=3).contains(&letters) && compact.chars().all(|c| c.is_ascii_uppercase()) {
        return true;
    }
    value.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Normalize a residence city. Null stays null.
pub fn normalize_city(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let titled = title_case(raw);
    let replaced = CITY_REPLACEMENTS
        .iter()
        .find(|(from, _)| *from == titled)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(titled);
    if is_invalid_city(&replaced) {
        Some(OTHER.to_string())
    } else {
        Some(replaced)
    }
}

/// Classify a birth department code into a domestic code, `Ext` or `Otro`.
pub fn classify_department(raw: &str) -> String {
    let code = raw.trim().to_uppercase();
    if domestic_departments().contains(code.as_str()) {
        code
    } else if foreign_codes().contains(code.as_str()) {
        FOREIGN.to_string()
    } else {
        OTHER.to_string()
    }
}

/// Ordinal code for an academic status, or `None` when outside the fixed order.
pub fn academic_status_code(value: &str) -> Option<u8> {
    ACADEMIC_STATUS_ORDER
        .iter()
        .position(|s| *s == value.trim())
        .map(|p| p as u8)
}

/// Age band: ≤19 → 0, ≤24 → 1, ≤34 → 2, otherwise 3.
pub fn age_band(age: f64) -> u8 {
    if age <= 19.0 {
        0
    } else if age <= 24.0 {
        1
    } else if age <= 34.0 {
        2
    } else {
        3
    }
}

/// Result of mapping a binary text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryValue {
    Known(u8),
    Missing,
    Invalid,
}

fn binary(raw: Option<&str>, one: &str, zero: &str) -> BinaryValue {
    match raw.map(|v| v.trim().to_uppercase()) {
        None => BinaryValue::Missing,
        Some(v) if v == one => BinaryValue::Known(1),
        Some(v) if v == zero => BinaryValue::Known(0),
        Some(_) => BinaryValue::Invalid,
    }
}

/// Sex: M → 1, F → 0.
pub fn sex_code(raw: Option<&str>) -> BinaryValue {
    binary(raw, "M", "F")
}

/// Scholarship: Y → 1, N → 0.
pub fn scholarship_code(raw: Option<&str>) -> BinaryValue {
    binary(raw, "Y", "N")
}

/// External lookup from subject class name to subject category.
#[derive(Debug, Clone, Default)]
pub struct SubjectCatalog {
    categories: HashMap<String, String>,
    degraded: bool,
}

const CLASS_HEADERS: [&str; 2] = ["class", "Clase"];
const CATEGORY_HEADERS: [&str; 2] = ["category", "Categoría"];

impl SubjectCatalog {
    /// Build a catalog from explicit pairs. Class names are title-cased on insert.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let categories = pairs
            .into_iter()
            .map(|(k, v)| (title_case(k.as_ref().trim()), v.into()))
            .collect();
        Self {
            categories,
            degraded: false,
        }
    }

    /// Empty catalog used when the caller opted out of the lookup.
    pub fn degraded() -> Self {
        Self {
            categories: HashMap::new(),
            degraded: true,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Load the lookup from a CSV file with `class`/`category` columns
    /// (`Clase`/`Categoría` accepted).
    pub fn from_csv(path: &Path) -> PipelineResult<Self> {
        let name = path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| PipelineError::vocabulary(Stage::Encode, &name, e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::vocabulary(Stage::Encode, &name, e.to_string()))?
            .clone();
        let find = |candidates: &[&str]| {
            headers
                .iter()
                .position(|h| candidates.iter().any(|c| h.trim() == *c))
        };
        let class_idx = find(&CLASS_HEADERS).ok_or_else(|| {
            PipelineError::vocabulary(Stage::Encode, &name, "missing 'class' column")
        })?;
        let category_idx = find(&CATEGORY_HEADERS).ok_or_else(|| {
            PipelineError::vocabulary(Stage::Encode, &name, "missing 'category' column")
        })?;

        let mut pairs = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| PipelineError::vocabulary(Stage::Encode, &name, e.to_string()))?;
            let class = record.get(class_idx).unwrap_or_default();
            let category = record.get(category_idx).unwrap_or_default();
            if class.is_empty() || category.is_empty() {
                continue;
            }
            pairs.push((class.to_string(), category.to_string()));
        }

        if pairs.is_empty() {
            return Err(PipelineError::vocabulary(
                Stage::Encode,
                name,
                "lookup contains no class/category pairs",
            ));
        }
        Ok(Self::from_pairs(pairs))
    }

    /// Category for a class name; the class is title-cased before lookup.
    /// The no-data sentinel has no category.
    pub fn category_for(&self, class: &str) -> Option<String> {
        if class == NO_DATA {
            return None;
        }
        let category = self
            .categories
            .get(&title_case(class.trim()))
            .cloned()
            .unwrap_or_else(|| OTHER.to_string());
        Some(category)
    }
}
