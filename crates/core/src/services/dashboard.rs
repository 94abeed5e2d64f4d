//! Dashboard statistics, activity feed and alerts.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, Utc};
use civic_common::config::DashboardConfig;
use civic_common::{AppResult, Debouncer, SortOrder, sort_by_key};
use civic_db::SharedStore;
use civic_db::entities::{ChatMessage, RatingStats, Report, ReportStatus, SenderRole};
use civic_db::repositories::{ChatRepository, RatingRepository, ReportRepository, ReportStats};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::escalation::age_in_days;
use super::export::{ExportDocument, start_of_day};
use crate::scheduler::PeriodicTask;

/// Quiet period before a requested refresh runs.
pub const REFRESH_DEBOUNCE: StdDuration = StdDuration::from_millis(300);

const RECENT_REPORTS: usize = 5;
const RECENT_CHATS: usize = 3;
const RECENT_UPDATES: usize = 3;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(part as f64 / total as f64 * 100.0)
    }
}

/// Reports created since the start of each period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeRangeCounts {
    /// Since midnight UTC.
    pub today: usize,
    /// Since midnight UTC seven days ago.
    pub week: usize,
    /// Since the first day of the month.
    pub month: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub avg_resolution_hours: i64,
    /// Percentage of reports resolved, one decimal.
    pub resolution_rate: f64,
    /// New reports older than the normal escalation threshold.
    pub overdue_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTotals {
    pub total_messages: usize,
    pub unread_messages: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RatingTotals {
    pub average: Option<f64>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsCoverage {
    pub with_gps: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Reports in the current window against the window before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub current: usize,
    pub previous: usize,
    /// Percent change, one decimal. 100 when growing from zero.
    pub change_pct: f64,
}

impl Trend {
    fn between(reports: &[Report], now: DateTime<Utc>, window: Duration) -> Self {
        let current_start = now - window;
        let previous_start = now - window * 2;

        let current = reports
            .iter()
            .filter(|r| r.created_at >= current_start)
            .count();
        let previous = reports
            .iter()
            .filter(|r| r.created_at >= previous_start && r.created_at < current_start)
            .count();

        let change_pct = if previous > 0 {
            round1((current as f64 - previous as f64) / previous as f64 * 100.0)
        } else if current > 0 {
            100.0
        } else {
            0.0
        };

        Self {
            current,
            previous,
            change_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Trends {
    /// Last 7 days against the 7 before.
    pub weekly: Trend,
    /// Last 30 days against the 30 before.
    pub monthly: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Report,
    Chat,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub generated_at: DateTime<Utc>,
    pub basic: ReportStats,
    pub time_range: TimeRangeCounts,
    pub performance: Performance,
    pub chat: ChatTotals,
    pub ratings: RatingTotals,
    pub gps: GpsCoverage,
    pub trends: Trends,
    pub recent_activity: Vec<Activity>,
    pub alerts: Vec<Alert>,
}

/// Inputs to [`compute_dashboard`].
#[derive(Debug, Clone, Copy)]
pub struct DashboardInputs<'a> {
    pub reports: &'a [Report],
    pub chat_messages: &'a [ChatMessage],
    pub ratings: &'a RatingStats,
    pub basic: &'a ReportStats,
    pub now: DateTime<Utc>,
    /// Age in days after which a new report counts as overdue.
    pub overdue_days: u32,
    pub max_recent_activities: usize,
}

/// Build the dashboard from a snapshot of the store.
#[must_use]
pub fn compute_dashboard(inputs: &DashboardInputs<'_>) -> DashboardData {
    let DashboardInputs {
        reports,
        chat_messages,
        ratings,
        basic,
        now,
        overdue_days,
        max_recent_activities,
    } = *inputs;

    let today = start_of_day(now.date_naive());
    let week_start = today - Duration::days(7);
    let month_start = now
        .date_naive()
        .with_day(1)
        .map_or(today, start_of_day);
    let created_since = |start: DateTime<Utc>| reports.iter().filter(|r| r.created_at >= start).count();

    let resolved = reports.iter().filter(|r| r.is_resolved()).count();
    let overdue_count = reports
        .iter()
        .filter(|r| {
            r.status == ReportStatus::New
                && age_in_days(r.created_at, now) > f64::from(overdue_days)
        })
        .count();
    let unread_messages = chat_messages.iter().filter(|m| !m.is_read).count();
    let with_gps = reports.iter().filter(|r| r.gps_coordinates.is_some()).count();

    let performance = Performance {
        avg_resolution_hours: basic.avg_resolution_hours,
        resolution_rate: percentage(resolved, reports.len()),
        overdue_count,
    };
    let chat = ChatTotals {
        total_messages: chat_messages.len(),
        unread_messages,
    };
    let rating_totals = RatingTotals {
        average: ratings.average,
        total: ratings.total,
    };

    DashboardData {
        generated_at: now,
        basic: basic.clone(),
        time_range: TimeRangeCounts {
            today: created_since(today),
            week: created_since(week_start),
            month: created_since(month_start),
        },
        performance,
        chat,
        ratings: rating_totals,
        gps: GpsCoverage {
            with_gps,
            total: reports.len(),
            percentage: percentage(with_gps, reports.len()),
        },
        trends: Trends {
            weekly: Trend::between(reports, now, Duration::days(7)),
            monthly: Trend::between(reports, now, Duration::days(30)),
        },
        recent_activity: recent_activity(reports, chat_messages, now, max_recent_activities),
        alerts: alerts(&performance, &chat, &rating_totals, overdue_days),
    }
}

fn recent_activity(
    reports: &[Report],
    chat_messages: &[ChatMessage],
    now: DateTime<Utc>,
    max: usize,
) -> Vec<Activity> {
    let day_ago = now - Duration::days(1);
    let mut activities = Vec::new();

    let new_reports: Vec<Report> = reports
        .iter()
        .filter(|r| r.created_at >= day_ago)
        .cloned()
        .collect();
    activities.extend(
        sort_by_key(&new_reports, |r| r.created_at, SortOrder::Desc)
            .into_iter()
            .take(RECENT_REPORTS)
            .map(|r| Activity {
                kind: ActivityKind::Report,
                message: format!("New report: \"{}\"", r.title),
                timestamp: r.created_at,
            }),
    );

    let chats: Vec<ChatMessage> = chat_messages
        .iter()
        .filter(|m| m.timestamp >= day_ago)
        .cloned()
        .collect();
    activities.extend(
        sort_by_key(&chats, |m| m.timestamp, SortOrder::Desc)
            .into_iter()
            .take(RECENT_CHATS)
            .map(|m| Activity {
                kind: ActivityKind::Chat,
                message: format!(
                    "New chat message from {}",
                    match m.sender_role {
                        SenderRole::Officer => "an officer",
                        SenderRole::Citizen => "a citizen",
                        SenderRole::System => "the system",
                    }
                ),
                timestamp: m.timestamp,
            }),
    );

    let updates: Vec<Report> = reports
        .iter()
        .filter(|r| r.last_updated_at >= day_ago && r.last_updated_at != r.created_at)
        .cloned()
        .collect();
    activities.extend(
        sort_by_key(&updates, |r| r.last_updated_at, SortOrder::Desc)
            .into_iter()
            .take(RECENT_UPDATES)
            .map(|r| Activity {
                kind: ActivityKind::Update,
                message: format!("Status of \"{}\" changed to {}", r.title, r.status.label()),
                timestamp: r.last_updated_at,
            }),
    );

    let mut sorted = sort_by_key(&activities, |a| a.timestamp, SortOrder::Desc);
    sorted.truncate(max);
    sorted
}

fn alerts(
    performance: &Performance,
    chat: &ChatTotals,
    ratings: &RatingTotals,
    overdue_days: u32,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if performance.overdue_count > 0 {
        alerts.push(Alert {
            level: AlertLevel::Warning,
            title: "Overdue Reports".to_string(),
            message: format!(
                "{} reports need escalation (older than {overdue_days} days)",
                performance.overdue_count
            ),
        });
    }

    match ratings.average {
        Some(average) if average > 0.0 && average < 3.0 => alerts.push(Alert {
            level: AlertLevel::Warning,
            title: "Low Rating".to_string(),
            message: format!("Average rating is {average:.1}, service needs improvement"),
        }),
        _ => {}
    }

    if chat.unread_messages > 0 {
        alerts.push(Alert {
            level: AlertLevel::Info,
            title: "Unread Messages".to_string(),
            message: format!("{} unread chat messages", chat.unread_messages),
        });
    }

    alerts
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardExport<'a> {
    export_date: DateTime<Utc>,
    dashboard_stats: &'a DashboardData,
    reports: &'a [Report],
    ratings: &'a RatingStats,
}

/// Dashboard service.
#[derive(Clone)]
pub struct DashboardService {
    store: SharedStore,
    config: DashboardConfig,
    overdue_days: u32,
}

impl DashboardService {
    #[must_use]
    pub const fn new(store: SharedStore, config: DashboardConfig, overdue_days: u32) -> Self {
        Self {
            store,
            config,
            overdue_days,
        }
    }

    /// Current dashboard.
    pub async fn data(&self) -> DashboardData {
        let store = self.store.lock().await;
        let now = store.now();
        let reports = store.all_reports();
        let chat_messages = store.all_chat_messages();
        let ratings = store.ratings();
        let basic = store.reports_stats(now);
        drop(store);

        compute_dashboard(&DashboardInputs {
            reports: &reports,
            chat_messages: &chat_messages,
            ratings: &ratings,
            basic: &basic,
            now,
            overdue_days: self.overdue_days,
            max_recent_activities: self.config.max_recent_activities,
        })
    }

    /// JSON document with the dashboard, every report and the ratings.
    pub async fn export(&self) -> AppResult<ExportDocument> {
        let data = self.data().await;
        let store = self.store.lock().await;
        let reports = store.all_reports();
        let ratings = store.ratings();
        drop(store);

        ExportDocument::json(
            "dashboard-export",
            data.generated_at,
            &DashboardExport {
                export_date: data.generated_at,
                dashboard_stats: &data,
                reports: &reports,
                ratings: &ratings,
            },
        )
    }
}

/// Keeps a recent dashboard snapshot, coalescing bursts of refresh requests.
pub struct DashboardRefresher {
    service: DashboardService,
    latest: Arc<RwLock<Option<Arc<DashboardData>>>>,
    debouncer: Debouncer,
}

impl DashboardRefresher {
    #[must_use]
    pub fn new(service: DashboardService) -> Self {
        Self {
            service,
            latest: Arc::new(RwLock::new(None)),
            debouncer: Debouncer::new(REFRESH_DEBOUNCE),
        }
    }

    /// Ask for a refresh once requests stop arriving.
    pub fn request(&self) {
        let service = self.service.clone();
        let latest = Arc::clone(&self.latest);
        self.debouncer.call(move || async move {
            let data = service.data().await;
            *latest.write().await = Some(Arc::new(data));
            debug!("Dashboard refreshed");
        });
    }

    /// Refresh immediately, dropping any pending request.
    pub async fn refresh_now(&self) -> Arc<DashboardData> {
        self.debouncer.cancel();
        let data = Arc::new(self.service.data().await);
        *self.latest.write().await = Some(Arc::clone(&data));
        data
    }

    /// Last computed snapshot.
    pub async fn latest(&self) -> Option<Arc<DashboardData>> {
        self.latest.read().await.clone()
    }
}

#[async_trait::async_trait]
impl PeriodicTask for DashboardRefresher {
    fn name(&self) -> &'static str {
        "dashboard-refresh"
    }

    /// Returns the number of alerts raised.
    async fn tick(&self) -> AppResult<usize> {
        Ok(self.refresh_now().await.alerts.len())
    }
}
