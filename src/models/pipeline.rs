use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{PipelineStatus, StepStatus};

/// A single step record as reported by the backend orchestrator.
/// Names are free-form ("file_upload", "extraction", "classification", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    pub status: StepStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PipelineStep {
    pub fn new(name: &str, status: StepStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

/// Response of `GET /projects/{id}/progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub project_id: String,
    pub status: PipelineStatus,
    #[serde(default)]
    pub pipeline_progress: u8,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
    /// Failure text; the progress endpoint sends it as `error`.
    #[serde(default, alias = "error")]
    pub error_message: Option<String>,
}

/// Acknowledgement of process/retry/resume. The status here is a transient
/// marker (`processing`, `retrying`, `resuming`), not a pipeline stage, so it
/// stays a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineAck {
    pub project_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of the standalone extraction trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub project_id: String,
    #[serde(default)]
    pub extracted_items: Vec<ExtractedItem>,
    pub total_items: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub name: String,
    #[serde(default)]
    pub values: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// Result of the standalone classification trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub project_id: String,
    pub classified_items: u64,
    pub review_items: u64,
    pub auto_approved_items: u64,
}

/// Result of the standalone generation trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub project_id: String,
    pub file_id: String,
    pub filename: String,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_deserializes_without_steps() {
        let json = r#"{"project_id": "proj-001", "status": "extracting", "pipeline_progress": 20}"#;
        let progress: PipelineProgress = serde_json::from_str(json).unwrap();
        assert_eq!(progress.status, PipelineStatus::Extracting);
        assert!(progress.steps.is_empty());
        assert!(progress.current_step.is_none());
    }

    #[test]
    fn progress_reads_failure_text_from_error_field() {
        let json = r#"{"project_id": "proj-001", "status": "error", "error": "OCR timed out"}"#;
        let progress: PipelineProgress = serde_json::from_str(json).unwrap();
        assert_eq!(progress.error_message.as_deref(), Some("OCR timed out"));

        let json = r#"{"project_id": "proj-001", "status": "error", "error_message": "Bad PDF"}"#;
        let progress: PipelineProgress = serde_json::from_str(json).unwrap();
        assert_eq!(progress.error_message.as_deref(), Some("Bad PDF"));
    }

    #[test]
    fn progress_tolerates_mid_run_status() {
        let json = r#"{"project_id": "proj-001", "status": "validated", "pipeline_progress": 70}"#;
        let progress: PipelineProgress = serde_json::from_str(json).unwrap();
        assert_eq!(progress.status, PipelineStatus::Unknown);
        assert_eq!(progress.pipeline_progress, 70);
    }

    #[test]
    fn ack_keeps_transient_status() {
        let json = r#"{
            "project_id": "proj-001",
            "status": "retrying",
            "from_step": "classification",
            "message": "Pipeline resuming from 'classification'"
        }"#;
        let ack: PipelineAck = serde_json::from_str(json).unwrap();
        assert_eq!(ack.status, "retrying");
        assert!(ack.message.unwrap().contains("classification"));
    }

    #[test]
    fn step_with_timestamps() {
        let json = r#"{
            "name": "extraction",
            "status": "completed",
            "started_at": "2026-02-20T10:00:00Z",
            "completed_at": "2026-02-20T10:00:42Z"
        }"#;
        let step: PipelineStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        let elapsed = step.completed_at.unwrap() - step.started_at.unwrap();
        assert_eq!(elapsed.num_seconds(), 42);
    }
}
