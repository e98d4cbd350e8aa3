//! Source document and generated workbook endpoints.

use std::path::Path;

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::models::{GeneratedFile, UploadedFile};

pub async fn upload<P: AsRef<Path>>(
    api: &ApiClient,
    project_id: &str,
    files: &[P],
) -> Result<Vec<UploadedFile>, ApiError> {
    api.upload(&format!("/projects/{project_id}/files"), files).await
}

pub async fn list(api: &ApiClient, project_id: &str) -> Result<Vec<UploadedFile>, ApiError> {
    api.get(&format!("/projects/{project_id}/files")).await
}

pub async fn generated(api: &ApiClient, project_id: &str) -> Result<Vec<GeneratedFile>, ApiError> {
    api.get(&format!("/projects/{project_id}/generated-files")).await
}

/// `DELETE /files/:id`. File ids are global, not project-scoped.
pub async fn delete(api: &ApiClient, file_id: &str) -> Result<(), ApiError> {
    api.delete(&format!("/files/{file_id}")).await
}

/// `GET /projects/:id/download`: the latest generated CMA workbook.
pub async fn download(api: &ApiClient, project_id: &str) -> Result<Vec<u8>, ApiError> {
    api.download(&format!("/projects/{project_id}/download")).await
}

/// Stream the latest workbook to `dest`.
pub async fn download_to(api: &ApiClient, project_id: &str, dest: &Path) -> Result<u64, ApiError> {
    api.download_to(&format!("/projects/{project_id}/download"), dest)
        .await
}
