//! Dashboard endpoint.

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::models::DashboardStats;

/// `GET /dashboard/stats`: firm-wide counters and recent projects.
pub async fn stats(api: &ApiClient) -> Result<DashboardStats, ApiError> {
    api.get("/dashboard/stats").await
}
