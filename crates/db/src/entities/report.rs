//! Report entity.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use civic_common::{AppError, Coordinates};
use serde::{Deserialize, Serialize};

/// Processing state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    #[default]
    New,
    InProgress,
    Resolved,
}

impl ReportStatus {
    /// Every status in display order.
    pub const ALL: [Self; 3] = [Self::New, Self::InProgress, Self::Resolved];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown report status: {s}")))
    }
}

/// Urgency of a report, independent of its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Every priority, most urgent first.
    pub const ALL: [Self; 3] = [Self::Urgent, Self::Normal, Self::Low];

    /// Sort rank, lower is more urgent.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Urgent => "Urgent",
            Self::Normal => "Normal",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown priority: {s}")))
    }
}

/// A file embedded in a report as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Original file name.
    pub name: String,
    /// MIME type.
    pub content_type: String,
    /// `data:<type>;base64,<payload>`.
    pub data_url: String,
    /// Decoded size in bytes.
    pub size: u64,
}

impl Attachment {
    /// Embed raw bytes.
    #[must_use]
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        let content_type = content_type.into();
        let data_url = format!("data:{content_type};base64,{}", STANDARD.encode(bytes));
        Self {
            name: name.into(),
            content_type,
            data_url,
            size: bytes.len() as u64,
        }
    }
}

/// A citizen-submitted complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub title: String,
    /// Reporter name.
    pub name: String,
    /// Free-text location.
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub files: Vec<Attachment>,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub gps_coordinates: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub escalated_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Whole days elapsed since creation.
    #[must_use]
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Whether the report has been escalated.
    #[must_use]
    pub const fn is_escalated(&self) -> bool {
        self.escalated_at.is_some()
    }

    /// Whether the report is resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.status == ReportStatus::Resolved
    }

    /// Field accessor for search.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Field accessor for search.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Field accessor for search.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Data for a new report. The store assigns id, status and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub title: String,
    pub name: String,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub files: Vec<Attachment>,
    /// `None` stores as normal.
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub gps_coordinates: Option<Coordinates>,
}

/// Partial update of a report. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPatch {
    pub title: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub files: Option<Vec<Attachment>>,
    pub status: Option<ReportStatus>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the coordinates.
    pub gps_coordinates: Option<Option<Coordinates>>,
    /// `Some(None)` clears the escalation stamp.
    pub escalated_at: Option<Option<DateTime<Utc>>>,
}

impl ReportPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub fn status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Merge into `report`. Timestamps other than `escalated_at` are left to the caller.
    pub fn apply(self, report: &mut Report) {
        if let Some(title) = self.title {
            report.title = title;
        }
        if let Some(name) = self.name {
            report.name = name;
        }
        if let Some(location) = self.location {
            report.location = location;
        }
        if let Some(description) = self.description {
            report.description = description;
        }
        if let Some(files) = self.files {
            report.files = files;
        }
        if let Some(status) = self.status {
            report.status = status;
        }
        if let Some(priority) = self.priority {
            report.priority = priority;
        }
        if let Some(gps) = self.gps_coordinates {
            report.gps_coordinates = gps;
        }
        if let Some(escalated_at) = self.escalated_at {
            report.escalated_at = escalated_at;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReportStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(serde_json::to_string(&Priority::Low).unwrap(), "\"low\"");
        assert_eq!("resolved".parse::<ReportStatus>().unwrap(), ReportStatus::Resolved);
        assert!("selesai".parse::<ReportStatus>().is_err());
        assert_eq!("urgent".parse::<Priority>().unwrap(), Priority::Urgent);
    }

    #[test]
    fn test_priority_rank_orders_urgent_first() {
        let mut priorities = vec![Priority::Low, Priority::Urgent, Priority::Normal];
        priorities.sort_by_key(|p| p.rank());
        assert_eq!(priorities, Priority::ALL);
    }

    #[test]
    fn test_attachment_from_bytes() {
        let file = Attachment::from_bytes("note.txt", "text/plain", b"hi");
        assert_eq!(file.data_url, "data:text/plain;base64,aGk=");
        assert_eq!(file.size, 2);
    }

    #[test]
    fn test_legacy_document_fills_defaults() {
        let json = r#"{
            "id": "abc1234",
            "title": "Broken lamp",
            "name": "Sari",
            "location": "Village square",
            "description": "The lamp is out every night",
            "createdAt": "2024-03-01T08:00:00Z",
            "lastUpdatedAt": "2024-03-01T08:00:00Z"
        }"#;
        let report: Report = serde_json::from_str(json).unwrap();
        assert_eq!(report.status, ReportStatus::New);
        assert_eq!(report.priority, Priority::Normal);
        assert!(report.files.is_empty());
        assert!(!report.is_escalated());
    }
}
