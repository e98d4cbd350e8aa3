//! Review queue endpoints.

use serde::Serialize;

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::models::{
    ApproveAllResult, BulkResolvePayload, BulkResolveResult, CmaRows, EntityType, ReviewItem,
    ReviewListParams, ReviewListResponse, ReviewResolvePayload,
};

pub async fn list(api: &ApiClient, params: &ReviewListParams) -> Result<ReviewListResponse, ApiError> {
    api.get_with("/review-queue", params).await
}

pub async fn resolve(
    api: &ApiClient,
    review_id: &str,
    payload: &ReviewResolvePayload,
) -> Result<ReviewItem, ApiError> {
    api.post(&format!("/review-queue/{review_id}/resolve"), payload)
        .await
}

pub async fn bulk_resolve(
    api: &ApiClient,
    payload: &BulkResolvePayload,
) -> Result<BulkResolveResult, ApiError> {
    api.post("/review-queue/bulk-resolve", payload).await
}

/// `POST /review-queue/approve-all`: accept every pending suggestion.
pub async fn approve_all(api: &ApiClient) -> Result<ApproveAllResult, ApiError> {
    api.post_empty("/review-queue/approve-all").await
}

#[derive(Serialize)]
struct CmaRowsQuery {
    entity_type: Option<EntityType>,
}

/// `GET /review-queue/config/cma-rows`: target rows grouped by CMA section.
pub async fn cma_rows(api: &ApiClient, entity_type: Option<EntityType>) -> Result<CmaRows, ApiError> {
    api.get_with("/review-queue/config/cma-rows", &CmaRowsQuery { entity_type })
        .await
}
