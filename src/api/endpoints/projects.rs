//! CMA project endpoints.

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::models::{Project, ProjectCreate, ProjectListParams, ProjectListResponse, ProjectUpdate};

pub async fn list(
    api: &ApiClient,
    params: &ProjectListParams,
) -> Result<ProjectListResponse, ApiError> {
    api.get_with("/projects", params).await
}

pub async fn get(api: &ApiClient, id: &str) -> Result<Project, ApiError> {
    api.get(&format!("/projects/{id}")).await
}

pub async fn create(api: &ApiClient, data: &ProjectCreate) -> Result<Project, ApiError> {
    api.post("/projects", data).await
}

pub async fn update(api: &ApiClient, id: &str, data: &ProjectUpdate) -> Result<Project, ApiError> {
    api.put(&format!("/projects/{id}"), data).await
}

pub async fn delete(api: &ApiClient, id: &str) -> Result<(), ApiError> {
    api.delete(&format!("/projects/{id}")).await
}
