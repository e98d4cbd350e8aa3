//! Pipeline control endpoints.
//!
//! `process`, `retry` and `resume` return a short acknowledgement once the
//! backend accepted the command; progress is read separately. The stage triggers run a single stage
//! synchronously and return its result.

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::models::{
    ClassificationResult, ExtractionResult, GenerationResult, PipelineAck, PipelineProgress,
};

/// `POST /projects/:id/process`: start the full pipeline.
pub async fn process(api: &ApiClient, project_id: &str) -> Result<PipelineAck, ApiError> {
    api.post_empty(&format!("/projects/{project_id}/process")).await
}

/// `POST /projects/:id/retry`: restart after an error.
pub async fn retry(api: &ApiClient, project_id: &str) -> Result<PipelineAck, ApiError> {
    api.post_empty(&format!("/projects/{project_id}/retry")).await
}

/// `POST /projects/:id/resume`: continue after review.
pub async fn resume(api: &ApiClient, project_id: &str) -> Result<PipelineAck, ApiError> {
    api.post_empty(&format!("/projects/{project_id}/resume")).await
}

/// `GET /projects/:id/progress`
pub async fn progress(api: &ApiClient, project_id: &str) -> Result<PipelineProgress, ApiError> {
    api.get(&format!("/projects/{project_id}/progress")).await
}

pub async fn extract(api: &ApiClient, project_id: &str) -> Result<ExtractionResult, ApiError> {
    api.post_empty(&format!("/projects/{project_id}/extract")).await
}

pub async fn classify(api: &ApiClient, project_id: &str) -> Result<ClassificationResult, ApiError> {
    api.post_empty(&format!("/projects/{project_id}/classify")).await
}

pub async fn generate(api: &ApiClient, project_id: &str) -> Result<GenerationResult, ApiError> {
    api.post_empty(&format!("/projects/{project_id}/generate")).await
}
