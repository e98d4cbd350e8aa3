use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source document uploaded to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub project_id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// A spreadsheet produced by the generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub id: String,
    pub project_id: String,
    pub filename: String,
    pub file_type: String,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// Fallback name when no generated file record is available.
pub const DEFAULT_DOWNLOAD_NAME: &str = "CMA_Report.xlsx";

/// Filename to save a download under: the most recent generated file,
/// or the default report name.
pub fn download_filename(generated: &[GeneratedFile]) -> &str {
    generated
        .iter()
        .max_by_key(|f| f.created_at)
        .map(|f| f.filename.as_str())
        .unwrap_or(DEFAULT_DOWNLOAD_NAME)
}
