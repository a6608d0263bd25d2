//! Canonical column names.
//!
//! Input relations arrive already renamed to these names. Every stage refers to
//! columns through these constants so a renamed column fails at the record
//! boundary instead of deep inside a stage.

// Shared keys
pub const STUDENT_ID: &str = "student_id";
pub const PROGRAM_MULTIPLICITY: &str = "program_multiplicity";
pub const PROGRAM: &str = "program";
pub const CYCLE: &str = "cycle";

// Course grades
pub const COURSE_ID: &str = "course_id";
pub const COURSE_NAME: &str = "course_name";
pub const GRADE: &str = "grade";
pub const CREDITS: &str = "credits";

// Cycle summaries
pub const CREDITS_ATTEMPTED: &str = "credits_attempted";
pub const CREDITS_APPROVED: &str = "credits_approved";
pub const GPA: &str = "gpa";
pub const CUMULATIVE_GPA: &str = "cumulative_gpa";
pub const ACADEMIC_STATUS: &str = "academic_status";
pub const STATUS: &str = "status";

// Personal records
pub const SEX: &str = "sex";
pub const SCHOLARSHIP: &str = "scholarship";
pub const RESIDENCE_CITY: &str = "residence_city";
pub const BIRTH_DEPARTMENT: &str = "birth_department";
pub const BIRTH_COUNTRY: &str = "birth_country";
pub const ADMISSION_CYCLE: &str = "admission_cycle";
pub const PROGRAM_ACRONYM: &str = "program_acronym";
pub const AGE: &str = "age";
pub const ACTION_REASON: &str = "action_reason";

// Admissions
pub const ADMISSION_TYPE: &str = "admission_type";
pub const PROGRAM_STATUS: &str = "program_status";

// Generated numeric features
pub const ACADEMIC_STATUS_CODE: &str = "academic_status_code";
pub const INTERNATIONAL: &str = "international";
pub const AGE_BAND: &str = "age_band";
pub const MEAN_GRADE: &str = "mean_grade";
pub const GRADE_STD: &str = "grade_std";
pub const MIN_GRADE: &str = "min_grade";
pub const MIN_GRADE_CREDITS: &str = "min_grade_credits";
pub const MAX_GRADE: &str = "max_grade";
pub const MAX_GRADE_CREDITS: &str = "max_grade_credits";
pub const FAILED_COURSES: &str = "failed_courses";
pub const ENROLLED_CREDITS: &str = "enrolled_credits";
pub const PASSED_CREDITS: &str = "passed_credits";
pub const WEIGHTED_GRADE_RANGE: &str = "weighted_grade_range";
pub const COURSE_COUNT: &str = "course_count";

// Output
pub const LABEL: &str = "will_dropout_next_cycle";
pub const PROBABILITY: &str = "probability";
pub const RISK_LEVEL: &str = "risk_level";

// Dummy prefixes
pub const PROGRAM_PREFIX: &str = "p";
pub const ACRONYM_PREFIX: &str = "s";
pub const CITY_PREFIX: &str = "cd";
pub const DEPARTMENT_PREFIX: &str = "dn";
pub const MAX_CLASS_PREFIX: &str = "ccmax";
pub const MIN_CLASS_PREFIX: &str = "ccmin";
pub const ADMISSION_TYPE_PREFIX: &str = "ta";

/// Separator between a dummy prefix and its category value.
pub const DUMMY_SEPARATOR: char = '_';

/// Build a dummy column name, e.g. `dummy_name("p", "Derecho") == "p_Derecho"`.
pub fn dummy_name(prefix: &str, value: &str) -> String {
    format!("{}{}{}", prefix, DUMMY_SEPARATOR, value)
}

/// Whether a column name looks like a generated dummy.
pub fn is_dummy_like(name: &str) -> bool {
    name.contains(DUMMY_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_name() {
        assert_eq!(dummy_name(CITY_PREFIX, "Bogotá D.C."), "cd_Bogotá D.C.");
        assert_eq!(dummy_name(PROGRAM_PREFIX, "Derecho"), "p_Derecho");
    }

    #[test]
    fn test_is_dummy_like() {
        assert!(is_dummy_like("ta_Traslado"));
        assert!(!is_dummy_like("cycle"));
    }
}
