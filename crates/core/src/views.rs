//! Display models built from domain state.
//!
//! Every user-supplied string in a view model is HTML-escaped, so templates
//! can interpolate the fields as they are.

use chrono::{DateTime, Utc};
use civic_common::config::ReportsConfig;
use civic_common::{escape_html, truncate_text};
use civic_db::entities::{Priority, Report, ReportStatus};
use serde::Serialize;

/// Description length on the compact "latest reports" card.
pub const LATEST_PREVIEW_CHARS: usize = 60;

/// How much of a report a card shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardVariant {
    /// List card with actions.
    #[default]
    Full,
    /// Compact card for the home screen.
    Latest,
}

/// A report as rendered in lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCardView {
    pub id: String,
    pub title: String,
    pub location: String,
    pub description: String,
    pub status: ReportStatus,
    pub status_label: &'static str,
    pub priority: Priority,
    /// Upper-case badge text.
    pub priority_badge: String,
    pub has_gps: bool,
    pub escalated: bool,
    /// `data:` URL of the first attachment.
    pub thumbnail: Option<String>,
    pub unread_messages: usize,
    pub created_at: DateTime<Utc>,
    pub show_actions: bool,
}

/// Build the card for `report`.
#[must_use]
pub fn report_card(
    report: &Report,
    variant: CardVariant,
    config: &ReportsConfig,
    unread_messages: usize,
) -> ReportCardView {
    let preview_chars = match variant {
        CardVariant::Full => config.max_description_preview,
        CardVariant::Latest => LATEST_PREVIEW_CHARS,
    };

    ReportCardView {
        id: report.id.clone(),
        title: escape_html(&report.title),
        location: escape_html(&report.location),
        description: escape_html(&truncate_text(&report.description, preview_chars)),
        status: report.status,
        status_label: report.status.label(),
        priority: report.priority,
        priority_badge: report.priority.label().to_uppercase(),
        has_gps: report.gps_coordinates.is_some(),
        escalated: report.escalated_at.is_some(),
        thumbnail: report.files.first().map(|f| f.data_url.clone()),
        unread_messages,
        created_at: report.created_at,
        show_actions: variant == CardVariant::Full,
    }
}

/// Handling promise shown next to the priority picker.
#[must_use]
pub const fn priority_guidance(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "Urgent priority: handled within 24 hours",
        Priority::Normal => "Normal priority: handled within 7 days",
        Priority::Low => "Low priority: handled within 14 days",
    }
}

/// Coarse relative time, such as "3 hours ago".
#[must_use]
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - then;
    let unit = |n: i64, singular: &str| {
        if n == 1 {
            format!("1 {singular} ago")
        } else {
            format!("{n} {singular}s ago")
        }
    };

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        unit(elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        unit(elapsed.num_hours(), "hour")
    } else {
        unit(elapsed.num_days(), "day")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use civic_common::Coordinates;
    use civic_db::entities::Attachment;
    use civic_db::repositories::ReportRepository;
    use civic_db::test_utils::{TestStore, new_report, test_epoch};

    fn sample() -> Report {
        let mut t = TestStore::new();
        let mut draft = new_report("Lamp <broken> & dark");
        draft.description = "x".repeat(200);
        draft.files = vec![Attachment::from_bytes("lamp.png", "image/png", b"png")];
        draft.gps_coordinates = Some(Coordinates::new(-6.2, 106.8));
        t.store.add_report(draft)
    }

    #[test]
    fn test_full_card() {
        let report = sample();
        let card = report_card(&report, CardVariant::Full, &ReportsConfig::default(), 2);

        assert_eq!(card.title, "Lamp &lt;broken&gt; &amp; dark");
        assert_eq!(card.description.chars().count(), 140 + 3);
        assert_eq!(card.priority_badge, "NORMAL");
        assert_eq!(card.status_label, ReportStatus::New.label());
        assert!(card.has_gps);
        assert!(!card.escalated);
        assert!(card.thumbnail.unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(card.unread_messages, 2);
        assert!(card.show_actions);
    }

    #[test]
    fn test_latest_card() {
        let card = report_card(&sample(), CardVariant::Latest, &ReportsConfig::default(), 0);
        assert!(card.description.ends_with("..."));
        assert_eq!(card.description.chars().count(), LATEST_PREVIEW_CHARS + 3);
        assert!(!card.show_actions);
    }

    #[test]
    fn test_time_ago() {
        let now = test_epoch();
        assert_eq!(time_ago(now - Duration::seconds(30), now), "just now");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(45), now), "45 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(time_ago(now - Duration::days(2), now), "2 days ago");
        assert_eq!(time_ago(now + Duration::hours(1), now), "just now");
    }

    #[test]
    fn test_priority_guidance() {
        assert!(priority_guidance(Priority::Urgent).contains("24 hours"));
        assert!(priority_guidance(Priority::Low).contains("14 days"));
    }
}
