use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::{PipelineStatus, UserRole};
use super::project::ProjectSummary;

/// Payload of `GET /dashboard/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_clients: u64,
    pub active_projects: u64,
    pub pending_reviews: u64,
    pub completed_this_month: u64,
    #[serde(default)]
    pub total_cost_this_month: Option<f64>,
    /// Keyed by the raw wire status so values outside `PipelineStatus`
    /// keep their own counts.
    #[serde(default)]
    pub projects_by_status: BTreeMap<String, u64>,
    #[serde(default)]
    pub recent_projects: Vec<ProjectSummary>,
}

/// Signed-in staff member, from `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub firm_id: String,
    pub firm_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
