//! Escalation entity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use civic_common::AppError;
use serde::{Deserialize, Serialize};

/// How an escalation was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationType {
    Auto,
    Manual,
}

impl EscalationType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

/// Who an escalation is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTarget {
    #[default]
    Supervisor,
    Manager,
    HeadOffice,
}

impl EscalationTarget {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::Manager => "manager",
            Self::HeadOffice => "head_office",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Supervisor => "Supervisor",
            Self::Manager => "Manager",
            Self::HeadOffice => "Head Office",
        }
    }
}

impl fmt::Display for EscalationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscalationTarget {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supervisor" => Ok(Self::Supervisor),
            "manager" => Ok(Self::Manager),
            "head_office" => Ok(Self::HeadOffice),
            other => Err(AppError::BadRequest(format!(
                "Unknown escalation target: {other}"
            ))),
        }
    }
}

/// A recorded escalation of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub id: String,
    /// Weak reference to a report.
    pub report_id: String,
    #[serde(rename = "type")]
    pub escalation_type: EscalationType,
    pub reason: String,
    pub escalated_to: EscalationTarget,
    pub escalated_by: String,
    pub created_at: DateTime<Utc>,
}

/// Data for a new escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEscalation {
    pub report_id: String,
    pub escalation_type: EscalationType,
    pub reason: String,
    pub escalated_to: EscalationTarget,
    pub escalated_by: String,
}
