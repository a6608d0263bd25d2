//! Recoverable data-quality issues collected while a batch runs.

use std::collections::BTreeMap;

use serde::Serialize;

/// A non-fatal issue worth surfacing to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// A categorical value outside its vocabulary (e.g. an unmapped status).
    UnseenCategory {
        field: String,
        value: String,
        rows: usize,
    },
    /// Rows dropped because their label could not be determined.
    LabelIndeterminate { rows: usize },
    /// A generated or schema column name seen more than once; first occurrence kept.
    DuplicateColumn { column: String },
    /// A lookup replaced by an empty vocabulary at the caller's request.
    VocabularyDegraded { name: String, reason: String },
    /// A frozen-schema column the encoder never produced.
    MissingFeature { column: String },
    /// A binary field holding something other than its two accepted values.
    InvalidBinaryValue {
        field: String,
        value: String,
        rows: usize,
    },
}

/// Accumulates issues, folding repeated value-level issues into counts.
#[derive(Debug, Default, Clone)]
pub struct IssueLog {
    issues: Vec<Issue>,
    unseen: BTreeMap<(String, String), usize>,
    invalid_binary: BTreeMap<(String, String), usize>,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn unseen_category(&mut self, field: &str, value: &str) {
        *self
            .unseen
            .entry((field.to_string(), value.to_string()))
            .or_insert(0) += 1;
    }

    pub fn invalid_binary(&mut self, field: &str, value: &str) {
        *self
            .invalid_binary
            .entry((field.to_string(), value.to_string()))
            .or_insert(0) += 1;
    }

    /// All issues, value-level ones folded and sorted by field then value.
    pub fn into_issues(self) -> Vec<Issue> {
        let mut out = self.issues;
        out.extend(
            self.unseen
                .into_iter()
                .map(|((field, value), rows)| Issue::UnseenCategory { field, value, rows }),
        );
        out.extend(
            self.invalid_binary
                .into_iter()
                .map(|((field, value), rows)| Issue::InvalidBinaryValue { field, value, rows }),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_values_are_folded() {
        let mut log = IssueLog::new();
        log.unseen_category("status", "Graduado");
        log.unseen_category("status", "Graduado");
        log.unseen_category("status", "Aplazado");
        log.push(Issue::LabelIndeterminate { rows: 4 });

        let issues = log.into_issues();
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0], Issue::LabelIndeterminate { rows: 4 });
        assert_eq!(
            issues[1],
            Issue::UnseenCategory {
                field: "status".into(),
                value: "Aplazado".into(),
                rows: 1
            }
        );
        assert!(matches!(&issues[2], Issue::UnseenCategory { rows: 2, .. }));
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(Issue::DuplicateColumn {
            column: "p_Derecho".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "duplicate_column");
        assert_eq!(json["column"], "p_Derecho");
    }
}
