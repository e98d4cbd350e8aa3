use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ClassificationSource, ReviewStatus};

/// A classified line item whose confidence fell below the auto-approve
/// threshold and now waits for a CA to confirm or correct it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    pub project_id: String,
    pub firm_id: String,
    pub source_item_name: String,
    pub suggested_category: String,
    #[serde(default)]
    pub suggested_subcategory: Option<String>,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub classification_source: ClassificationSource,
    pub status: ReviewStatus,
    #[serde(default)]
    pub resolved_category: Option<String>,
    #[serde(default)]
    pub resolved_subcategory: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResolvePayload {
    pub resolved_category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_subcategory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResolvePayload {
    pub review_ids: Vec<String>,
    pub resolved_category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_subcategory: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewListParams {
    pub project_id: Option<String>,
    pub status: Option<ReviewStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ReviewListParams {
    /// Pending items of one project, as the project page shows them.
    pub fn pending_for(project_id: &str) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            status: Some(ReviewStatus::Pending),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewListResponse {
    pub items: Vec<ReviewItem>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResolveResult {
    pub resolved_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveAllResult {
    pub approved_count: u64,
}

/// A target row in one CMA sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmaRow {
    pub row: u32,
    pub label: String,
}

/// Sheet name → rows sorted by row number, from `/review-queue/config/cma-rows`.
pub type CmaRows = BTreeMap<String, Vec<CmaRow>>;
