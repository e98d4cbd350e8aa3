//! View derivations.
//!
//! Pure functions and small state machines that turn API payloads into what
//! the dashboard shows. No I/O here; the CLI and tests drive them directly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{DashboardStats, PipelineProgress, PipelineStatus, Project};

// ═══════════════════════════════════════════════════════════
// Dashboard
// ═══════════════════════════════════════════════════════════

/// One dashboard stat card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatTile {
    pub title: &'static str,
    pub value: String,
    pub href: Option<&'static str>,
}

pub fn stat_tiles(stats: &DashboardStats) -> [StatTile; 4] {
    [
        StatTile {
            title: "Active Clients",
            value: stats.total_clients.to_string(),
            href: Some("/clients"),
        },
        StatTile {
            title: "Pending Reviews",
            value: stats.pending_reviews.to_string(),
            href: Some("/review"),
        },
        StatTile {
            title: "Completed CMAs",
            value: stats.completed_this_month.to_string(),
            href: None,
        },
        StatTile {
            title: "This Month",
            value: format_lakhs(stats.total_cost_this_month),
            href: None,
        },
    ]
}

const LAKH: f64 = 100_000.0;

/// Rupee amount as shown on the dashboard: `₹1.50L` from one lakh up,
/// otherwise Indian digit grouping (`₹45,000`). Absent or zero is `₹0`.
pub fn format_lakhs(amount: Option<f64>) -> String {
    match amount {
        None => "₹0".to_string(),
        Some(a) if a == 0.0 || !a.is_finite() => "₹0".to_string(),
        Some(a) if a >= LAKH => format!("₹{:.2}L", a / LAKH),
        Some(a) => format!("₹{}", group_indian(a)),
    }
}

/// en-IN grouping: last three digits, then pairs (`12,34,567`). Up to three
/// fraction digits, trailing zeros dropped.
fn group_indian(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let fixed = format!("{:.3}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac = frac_part.trim_end_matches('0');

    let digits = int_part.as_bytes();
    let mut out = String::with_capacity(digits.len() + digits.len() / 2);
    let head_len = digits.len().saturating_sub(3);
    for (i, d) in digits[..head_len].iter().enumerate() {
        if i > 0 && (head_len - i) % 2 == 0 {
            out.push(',');
        }
        out.push(*d as char);
    }
    if head_len > 0 {
        out.push(',');
    }
    out.push_str(&int_part[head_len..]);

    if frac.is_empty() {
        format!("{sign}{out}")
    } else {
        format!("{sign}{out}.{frac}")
    }
}

/// One segment of the "Projects by Status" bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSlice {
    pub status: PipelineStatus,
    /// Wire status as reported, kept for values outside `PipelineStatus`.
    pub key: String,
    pub label: String,
    pub color: &'static str,
    pub count: u64,
    pub percentage: f64,
}

pub fn status_color(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::Draft => "#6B7280",
        PipelineStatus::Reviewing => "#F59E0B",
        PipelineStatus::Completed => "#22C55E",
        PipelineStatus::Error => "#EF4444",
        _ => "#3B82F6",
    }
}

/// Per-status share of all projects. Zero counts are skipped; an empty
/// result means "No projects yet". Slices follow pipeline order, with
/// unrecognized statuses last under their raw name.
pub fn status_breakdown(by_status: &BTreeMap<String, u64>) -> Vec<StatusSlice> {
    let total: u64 = by_status.values().sum();
    if total == 0 {
        return Vec::new();
    }
    let mut slices: Vec<StatusSlice> = by_status
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(key, count)| {
            let status = PipelineStatus::from_wire(key);
            let label = match status {
                PipelineStatus::Unknown => key.clone(),
                known => known.label().to_string(),
            };
            StatusSlice {
                status,
                key: key.clone(),
                label,
                color: status_color(status),
                count: *count,
                percentage: *count as f64 / total as f64 * 100.0,
            }
        })
        .collect();
    slices.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.key.cmp(&b.key)));
    slices
}

// ═══════════════════════════════════════════════════════════
// Project page
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectTab {
    Files,
    Progress,
    Review,
    Download,
}

impl ProjectTab {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Progress => "progress",
            Self::Review => "review",
            Self::Download => "download",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Transient toast-style message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Status the project page works from: live progress first, then the
/// project record, then draft.
pub fn current_status(progress: Option<&PipelineProgress>, project: Option<&Project>) -> PipelineStatus {
    progress
        .map(|p| p.status)
        .or_else(|| project.map(|p| p.status))
        .unwrap_or(PipelineStatus::Draft)
}

/// Tab auto-navigation for the project page.
///
/// The first non-draft status picks a tab outright. After that only changes
/// observed while the user sits on the progress tab move them, and each such
/// change produces one notice.
#[derive(Debug, Clone)]
pub struct TabNavigator {
    active: ProjectTab,
    has_navigated: bool,
    last_status: Option<PipelineStatus>,
}

impl TabNavigator {
    pub fn new() -> Self {
        Self {
            active: ProjectTab::Files,
            has_navigated: false,
            last_status: None,
        }
    }

    pub fn active(&self) -> ProjectTab {
        self.active
    }

    /// User clicked a tab.
    pub fn select(&mut self, tab: ProjectTab) {
        self.active = tab;
    }

    /// Feed one status observation. Returns the notice to show, if any.
    pub fn observe(
        &mut self,
        status: PipelineStatus,
        pending_reviews: u64,
        error_message: Option<&str>,
    ) -> Option<Notice> {
        let changed = self.last_status != Some(status);
        self.last_status = Some(status);

        if !self.has_navigated {
            if status == PipelineStatus::Draft {
                return None;
            }
            if status.is_processing() {
                self.active = ProjectTab::Progress;
            } else if status == PipelineStatus::Reviewing {
                self.active = ProjectTab::Review;
            } else if matches!(status, PipelineStatus::Completed | PipelineStatus::Error) {
                self.active = ProjectTab::Download;
            }
            self.has_navigated = true;
            return None;
        }

        if !changed || self.active != ProjectTab::Progress {
            return None;
        }

        match status {
            PipelineStatus::Reviewing => {
                self.active = ProjectTab::Review;
                Some(Notice::warning(format!(
                    "Pipeline paused: {pending_reviews} items need review"
                )))
            }
            PipelineStatus::Completed => {
                self.active = ProjectTab::Download;
                Some(Notice::success("CMA generation complete!"))
            }
            PipelineStatus::Error => Some(Notice::error(
                error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or("Pipeline failed"),
            )),
            _ => None,
        }
    }

    /// Backend accepted a start request.
    pub fn pipeline_started(&mut self) -> Notice {
        self.active = ProjectTab::Progress;
        Notice::success("Pipeline started")
    }

    /// Backend accepted a retry request.
    pub fn pipeline_retrying(&mut self) -> Notice {
        self.active = ProjectTab::Progress;
        Notice::success("Pipeline retrying")
    }
}

impl Default for TabNavigator {
    fn default() -> Self {
        Self::new()
    }
}

/// Header action button for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    /// "Process CMA"; disabled until at least one file is uploaded.
    Process { enabled: bool },
    /// Disabled "Processing..." indicator.
    Processing,
    OpenReview,
    ViewDownloads,
    Retry,
}

pub fn primary_action(status: PipelineStatus, file_count: usize) -> PrimaryAction {
    match status {
        PipelineStatus::Draft => PrimaryAction::Process {
            enabled: file_count > 0,
        },
        PipelineStatus::Reviewing => PrimaryAction::OpenReview,
        PipelineStatus::Completed => PrimaryAction::ViewDownloads,
        PipelineStatus::Error => PrimaryAction::Retry,
        _ => PrimaryAction::Processing,
    }
}

/// Files can be added or removed only before processing or after a failure.
pub fn uploads_allowed(status: PipelineStatus) -> bool {
    matches!(status, PipelineStatus::Draft | PipelineStatus::Error)
}

// ═══════════════════════════════════════════════════════════
// Review
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// Backend confidence (0.0..=1.0) as a whole percentage.
pub fn confidence_percent(confidence: f64) -> u32 {
    (confidence * 100.0).round().clamp(0.0, 100.0) as u32
}

pub fn confidence_level(confidence: f64) -> ConfidenceLevel {
    match confidence_percent(confidence) {
        90.. => ConfidenceLevel::High,
        70..=89 => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    }
}
