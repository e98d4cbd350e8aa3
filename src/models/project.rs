use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::PipelineStatus;

/// One CMA engagement: a client, a financial year and a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub firm_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_name: Option<String>,
    pub financial_year: String,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    pub status: PipelineStatus,
    #[serde(default)]
    pub pipeline_progress: u8,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
}

/// Trimmed project shape embedded in dashboard stats. The backend only
/// fills the columns the "recent projects" table shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub financial_year: Option<String>,
    pub status: PipelineStatus,
    #[serde(default)]
    pub pipeline_progress: u8,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCreate {
    pub client_id: String,
    pub financial_year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PipelineStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectListParams {
    pub search: Option<String>,
    pub status: Option<PipelineStatus>,
    pub client_id: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}
