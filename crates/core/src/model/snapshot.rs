use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::stage::{Stage, StageValidationError, validate_stages};

/// Selected option per answered question.
pub type AnswerMap = BTreeMap<QuestionId, usize>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] StageValidationError),
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Full copy of a course's learner-visible state, kept apart from the live
/// records. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(alias = "courseData")]
    pub stages: Vec<Stage>,
    #[serde(default, alias = "currentStage")]
    pub current_index: usize,
    #[serde(default, alias = "testAnswers")]
    pub answers: AnswerMap,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// # Errors
    ///
    /// Returns `StageValidationError` if the captured stages are inconsistent.
    pub fn validate(&self) -> Result<(), StageValidationError> {
        validate_stages(&self.stages)
    }
}

//
// ─── EXPORT ────────────────────────────────────────────────────────────────────
//

/// Download-ready copy of a course's stages. Position and answers are never
/// part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub course_id: String,
    pub stages: Vec<Stage>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportShape {
    Bare(Vec<Stage>),
    Wrapped { stages: Vec<Stage> },
}

impl ExportDocument {
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}-export.json", self.course_id)
    }

    /// Pretty-printed JSON array of stages.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Parse` if serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(&self.stages)?)
    }
}

/// Parses an exported document, either a bare stage array or an object with
/// a `stages` field.
///
/// # Errors
///
/// Returns `DocumentError` if the JSON is malformed or the stages fail
/// validation.
pub fn import_document(raw: &str) -> Result<Vec<Stage>, DocumentError> {
    let stages = match serde_json::from_str::<ImportShape>(raw)? {
        ImportShape::Bare(stages) | ImportShape::Wrapped { stages } => stages,
    };
    validate_stages(&stages)?;
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::seed::seed_course;
    use crate::time::fixed_now;

    #[test]
    fn export_then_import_yields_equal_stages() {
        let doc = ExportDocument {
            course_id: "physics".into(),
            stages: seed_course(),
        };
        let json = doc.to_json().unwrap();
        assert_eq!(import_document(&json).unwrap(), doc.stages);
        assert_eq!(doc.file_name(), "physics-export.json");
    }

    #[test]
    fn import_accepts_wrapped_documents() {
        let raw = r#"{"stages":[{"id":"t","type":"test","title":"Quiz","questions":[]}]}"#;
        let stages = import_document(raw).unwrap();
        assert_eq!(stages.len(), 1);
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(matches!(
            import_document("{not json"),
            Err(DocumentError::Parse(_))
        ));
    }

    #[test]
    fn snapshot_reads_legacy_backup_shape() {
        let raw = r#"{"courseData":[],"currentStage":0,"testAnswers":{"q1":2},"timestamp":1700000000000}"#;
        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.timestamp, fixed_now());
        assert_eq!(snapshot.answers.get(&QuestionId::new("q1")), Some(&2));
    }
}
