//! Keyword-based priority detection.

use civic_common::{AppError, AppResult};
use civic_db::entities::Priority;
use regex::Regex;
use tracing::debug;

use super::report::{ReportDraft, ReportEnricher};

/// Keywords that mark a report urgent.
pub const URGENT_KEYWORDS: &[&str] = &[
    "emergency",
    "danger",
    "threat",
    "accident",
    "fire",
    "flood",
    "landslide",
    "collapse",
    "burst",
    "gas leak",
    "power outage",
    "no water",
    "road cut off",
    "bridge damaged",
];

/// Keywords that mark a report low priority.
pub const LOW_KEYWORDS: &[&str] = &[
    "peeling paint",
    "weeds",
    "signboard",
    "broken fence",
    "garden lamp",
    "park bench",
    "flower pot",
];

/// Suggests a priority from the title and description of a report.
///
/// Urgent keywords are checked before low ones, so a text containing both is
/// urgent. Keywords match case-insensitively anywhere in the text, so
/// "bonfire" counts as "fire".
#[derive(Debug, Clone)]
pub struct PriorityDetector {
    urgent: Regex,
    low: Regex,
}

impl PriorityDetector {
    /// Build a detector from keyword lists.
    pub fn new(urgent: &[&str], low: &[&str]) -> AppResult<Self> {
        Ok(Self {
            urgent: keyword_pattern(urgent)?,
            low: keyword_pattern(low)?,
        })
    }

    /// Detector over the built-in keyword lists.
    pub fn with_default_keywords() -> AppResult<Self> {
        Self::new(URGENT_KEYWORDS, LOW_KEYWORDS)
    }

    /// Priority suggested for `text`.
    #[must_use]
    pub fn detect(&self, text: &str) -> Priority {
        if self.urgent.is_match(text) {
            Priority::Urgent
        } else if self.low.is_match(text) {
            Priority::Low
        } else {
            Priority::Normal
        }
    }
}

fn keyword_pattern(keywords: &[&str]) -> AppResult<Regex> {
    if keywords.is_empty() {
        // Matches nothing.
        return Regex::new(r"[^\s\S]").map_err(|e| AppError::Internal(e.to_string()));
    }
    let alternatives: Vec<String> = keywords.iter().map(|k| regex::escape(k)).collect();
    Regex::new(&format!(r"(?i)(?:{})", alternatives.join("|")))
        .map_err(|e| AppError::Internal(format!("Invalid priority keyword: {e}")))
}

#[async_trait::async_trait]
impl ReportEnricher for PriorityDetector {
    fn name(&self) -> &'static str {
        "priority"
    }

    async fn enrich(&self, draft: &mut ReportDraft) -> AppResult<()> {
        if draft.data.priority.is_some() {
            return Ok(());
        }

        let text = format!("{} {}", draft.data.title, draft.data.description);
        let priority = self.detect(&text);
        draft.data.priority = Some(priority);

        if priority != Priority::Normal {
            debug!(%priority, "Priority detected from report content");
            draft.notes.push(format!(
                "Priority automatically set to {} based on report content.",
                priority.label()
            ));
        }
        Ok(())
    }
}
