//! Export record for an article's annotations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AnnotationError;
use super::model::{AnalysisMode, Annotation, Note};

/// Current export format revision
pub const EXPORT_VERSION: u32 = 1;

/// Snapshot of an article's annotations and notes
///
/// Built from the engine's records only, so it can be persisted or
/// downloaded without any rendered document around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationExport {
    pub version: u32,
    /// Article title
    pub article: String,
    pub article_id: String,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub analysis_mode: AnalysisMode,
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl AnnotationExport {
    /// Pretty-printed JSON document
    pub fn to_json(&self) -> Result<String, AnnotationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse an export, rejecting format revisions this build cannot read
    pub fn from_json(json: &str) -> Result<Self, AnnotationError> {
        let export: AnnotationExport = serde_json::from_str(json)?;
        if export.version == 0 || export.version > EXPORT_VERSION {
            return Err(AnnotationError::UnsupportedVersion {
                found: export.version,
                supported: EXPORT_VERSION,
            });
        }
        Ok(export)
    }

    /// Suggested download file name
    pub fn file_name(&self) -> String {
        let title = self.article.trim();
        let stem = if title.is_empty() { "article" } else { title };
        let stem: String = stem
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
            .collect();
        format!("{}_annotations.json", stem)
    }
}
