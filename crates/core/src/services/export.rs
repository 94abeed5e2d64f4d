//! Document exports: report listings, print view, locations and chat history.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use civic_common::{AppError, AppResult, Coordinates, escape_html, format_count};
use civic_db::SharedStore;
use civic_db::entities::{Priority, Report, ReportStatus};
use civic_db::repositories::{ChatRepository, ReportQuery, ReportRepository};
use serde::Serialize;
use tracing::info;

/// An export ready to be written or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub filename: String,
    pub mime_type: &'static str,
    pub content: String,
}

impl ExportDocument {
    /// Pretty-printed JSON document named `<stem>-<YYYY-MM-DD>.json`.
    pub fn json<T: Serialize>(stem: &str, now: DateTime<Utc>, value: &T) -> AppResult<Self> {
        Ok(Self {
            filename: dated_filename(stem, now, "json"),
            mime_type: ExportFormat::Json.mime_type(),
            content: serde_json::to_string_pretty(value)?,
        })
    }
}

fn dated_filename(stem: &str, now: DateTime<Utc>, extension: &str) -> String {
    format!("{stem}-{}.{extension}", now.format("%Y-%m-%d"))
}

/// Format of a report export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(AppError::BadRequest(format!("Unknown export format: {other}"))),
        }
    }
}

/// Creation-time window of exported reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportRange {
    #[default]
    All,
    /// Since midnight UTC.
    Today,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
    /// From the start of `start` to the end of `end`, inclusive.
    Custom { start: NaiveDate, end: NaiveDate },
}

impl ExportRange {
    /// Inclusive bounds, or `None` for no restriction.
    pub fn bounds(self, now: DateTime<Utc>) -> AppResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let bounds = match self {
            Self::All => return Ok(None),
            Self::Today => (start_of_day(now.date_naive()), now),
            Self::Week => (now - Duration::days(7), now),
            Self::Month => (now - Duration::days(30), now),
            Self::Custom { start, end } => {
                if start > end {
                    return Err(AppError::BadRequest(
                        "Export start date is after the end date".to_string(),
                    ));
                }
                let end = start_of_day(end) + Duration::days(1) - Duration::milliseconds(1);
                (start_of_day(start), end)
            }
        };
        Ok(Some(bounds))
    }
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedReport<'a> {
    id: &'a str,
    title: &'a str,
    location: &'a str,
    description: &'a str,
    status: ReportStatus,
    priority: Priority,
    gps_coordinates: Option<Coordinates>,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    escalated: bool,
}

impl<'a> From<&'a Report> for ExportedReport<'a> {
    fn from(report: &'a Report) -> Self {
        Self {
            id: &report.id,
            title: &report.title,
            location: &report.location,
            description: &report.description,
            status: report.status,
            priority: report.priority,
            gps_coordinates: report.gps_coordinates,
            created_at: report.created_at,
            last_updated_at: report.last_updated_at,
            escalated: report.is_escalated(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportsExport<'a> {
    export_date: DateTime<Utc>,
    total_reports: usize,
    reports: Vec<ExportedReport<'a>>,
}

const CSV_COLUMNS: [&str; 11] = [
    "id",
    "title",
    "location",
    "description",
    "status",
    "priority",
    "lat",
    "lng",
    "createdAt",
    "lastUpdatedAt",
    "escalated",
];

fn should_neutralize_csv(value: &str) -> bool {
    let trimmed = value.trim_start();
    if trimmed.starts_with('\'') {
        return false;
    }
    matches!(trimmed.chars().next(), Some('=' | '+' | '-' | '@'))
}

/// Quote a CSV field when it holds a separator, quote or line break.
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Escape user-entered text, prefixing spreadsheet formulas with `'`.
fn csv_text(value: &str) -> String {
    if should_neutralize_csv(value) {
        csv_escape(&format!("'{value}"))
    } else {
        csv_escape(value)
    }
}

fn rows_to_csv(columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        columns
            .iter()
            .map(|c| csv_escape(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    lines.extend(rows.iter().map(|row| row.join(",")));
    lines.join("\n")
}

fn report_row(report: &Report) -> Vec<String> {
    let (lat, lng) = report
        .gps_coordinates
        .map_or((String::new(), String::new()), |c| {
            (c.lat.to_string(), c.lng.to_string())
        });
    vec![
        csv_escape(&report.id),
        csv_text(&report.title),
        csv_text(&report.location),
        csv_text(&report.description),
        report.status.as_str().to_string(),
        report.priority.as_str().to_string(),
        lat,
        lng,
        report.created_at.to_rfc3339(),
        report.last_updated_at.to_rfc3339(),
        report.is_escalated().to_string(),
    ]
}

fn render_reports(
    stem: &str,
    format: ExportFormat,
    reports: &[Report],
    now: DateTime<Utc>,
) -> AppResult<ExportDocument> {
    match format {
        ExportFormat::Json => ExportDocument::json(
            stem,
            now,
            &ReportsExport {
                export_date: now,
                total_reports: reports.len(),
                reports: reports.iter().map(ExportedReport::from).collect(),
            },
        ),
        ExportFormat::Csv => {
            let rows: Vec<Vec<String>> = reports.iter().map(report_row).collect();
            Ok(ExportDocument {
                filename: dated_filename(stem, now, format.extension()),
                mime_type: format.mime_type(),
                content: rows_to_csv(&CSV_COLUMNS, &rows),
            })
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationEntry<'a> {
    id: &'a str,
    title: &'a str,
    location: &'a str,
    coordinates: Coordinates,
    status: ReportStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationExport<'a> {
    export_date: DateTime<Utc>,
    total_reports: usize,
    reports_with_gps: usize,
    locations: Vec<LocationEntry<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatEntry<'a> {
    sender: &'a str,
    role: &'a str,
    message: &'a str,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatExport<'a> {
    report_title: &'a str,
    report_id: &'a str,
    export_date: DateTime<Utc>,
    messages: Vec<ChatEntry<'a>>,
}

/// Builds export documents from the store.
#[derive(Clone)]
pub struct ExportService {
    store: SharedStore,
}

impl ExportService {
    #[must_use]
    pub const fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Reports created within `range`, in storage order.
    pub async fn reports(&self, format: ExportFormat, range: ExportRange) -> AppResult<ExportDocument> {
        let store = self.store.lock().await;
        let now = store.now();
        let bounds = range.bounds(now)?;

        let reports: Vec<Report> = store
            .all_reports()
            .into_iter()
            .filter(|r| {
                bounds.is_none_or(|(start, end)| r.created_at >= start && r.created_at <= end)
            })
            .collect();

        info!(count = reports.len(), format = format.extension(), "Exporting reports");
        render_reports("reports-export", format, &reports, now)
    }

    /// The given reports, in the order requested. Unknown ids are skipped.
    pub async fn selected_reports(
        &self,
        ids: &[String],
        format: ExportFormat,
    ) -> AppResult<ExportDocument> {
        let store = self.store.lock().await;
        let reports: Vec<Report> = ids.iter().filter_map(|id| store.get_report(id)).collect();
        if reports.is_empty() {
            return Err(AppError::BadRequest("No reports selected".to_string()));
        }
        render_reports("reports-selected", format, &reports, store.now())
    }

    /// A print-formatted HTML document of the reports matching `query`.
    pub async fn print_html(&self, query: &ReportQuery) -> ExportDocument {
        let store = self.store.lock().await;
        let now = store.now();
        let reports = store.get_reports(query);
        let stats = store.reports_stats(now);
        drop(store);

        let count = |p: Priority| reports.iter().filter(|r| r.priority == p).count();
        let resolved = stats.status_count(ReportStatus::Resolved);
        let resolved_pct = if stats.total > 0 {
            resolved as f64 / stats.total as f64 * 100.0
        } else {
            0.0
        };

        let mut html = String::new();
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Citizen Complaint Reports</title>\n<style>\n{PRINT_CSS}</style>\n</head>\n<body>\n\
             <div class=\"header\">\n<h1>CITIZEN COMPLAINT REPORTS</h1>\n\
             <p>Generated on {}</p>\n</div>\n",
            now.format("%Y-%m-%d %H:%M UTC")
        );
        let _ = write!(
            html,
            "<div class=\"stats\">\n<h2>Summary</h2>\n\
             <p>Total: {} | New: {} | In Progress: {} | Resolved: {}</p>\n\
             <p>Urgent: {} | Normal: {} | Low: {}</p>\n</div>\n",
            stats.total,
            stats.status_count(ReportStatus::New),
            stats.status_count(ReportStatus::InProgress),
            resolved,
            count(Priority::Urgent),
            count(Priority::Normal),
            count(Priority::Low),
        );

        html.push_str("<div class=\"reports\">\n");
        for (index, report) in reports.iter().enumerate() {
            let _ = write!(
                html,
                "<div class=\"report-item\">\n\
                 <div class=\"report-title\">{}. {}</div>\n\
                 <span class=\"priority {}\">{}</span> <span class=\"status {}\">{}</span>\n\
                 <div class=\"report-meta\"><strong>Reporter:</strong> {} | <strong>Location:</strong> {}<br>\
                 <strong>Date:</strong> {}</div>\n\
                 <div class=\"description\">{}</div>\n",
                index + 1,
                escape_html(&report.title),
                report.priority.as_str(),
                report.priority.label().to_uppercase(),
                report.status.as_str(),
                report.status.label().to_uppercase(),
                escape_html(&report.name),
                escape_html(&report.location),
                report.created_at.format("%Y-%m-%d %H:%M"),
                escape_html(&report.description),
            );
            if let Some(coordinates) = &report.gps_coordinates {
                let _ = writeln!(html, "<div class=\"meta\"><strong>GPS:</strong> {}</div>", coordinates.display());
            }
            if !report.files.is_empty() {
                let _ = writeln!(
                    html,
                    "<div class=\"meta\"><strong>Evidence:</strong> {} attached</div>",
                    format_count(report.files.len(), "file", "files")
                );
            }
            html.push_str("</div>\n");
        }
        html.push_str("</div>\n");

        let _ = write!(
            html,
            "<div class=\"footer\">\n<p>Total: {} | Resolved: {resolved} ({resolved_pct:.1}%)</p>\n</div>\n</body>\n</html>\n",
            reports.len(),
        );

        ExportDocument {
            filename: dated_filename("reports-print", now, "html"),
            mime_type: "text/html",
            content: html,
        }
    }

    /// Coordinates of every report that has them.
    pub async fn locations(&self) -> AppResult<ExportDocument> {
        let store = self.store.lock().await;
        let now = store.now();
        let reports = store.all_reports();

        let locations: Vec<LocationEntry<'_>> = reports
            .iter()
            .filter_map(|r| {
                Some(LocationEntry {
                    id: &r.id,
                    title: &r.title,
                    location: &r.location,
                    coordinates: r.gps_coordinates?,
                    status: r.status,
                    created_at: r.created_at,
                })
            })
            .collect();

        ExportDocument::json(
            "location-export",
            now,
            &LocationExport {
                export_date: now,
                total_reports: reports.len(),
                reports_with_gps: locations.len(),
                locations,
            },
        )
    }

    /// Conversation of one report.
    pub async fn chat_history(&self, report_id: &str) -> AppResult<ExportDocument> {
        let store = self.store.lock().await;
        let report = store
            .get_report(report_id)
            .ok_or_else(|| AppError::ReportNotFound(report_id.to_string()))?;
        let messages = store.chat_messages(report_id);
        let now = store.now();

        ExportDocument::json(
            &format!("chat-history-{report_id}"),
            now,
            &ChatExport {
                report_title: &report.title,
                report_id,
                export_date: now,
                messages: messages
                    .iter()
                    .map(|m| ChatEntry {
                        sender: &m.sender,
                        role: m.sender_role.as_str(),
                        message: &m.message,
                        timestamp: m.timestamp,
                    })
                    .collect(),
            },
        )
    }
}

const PRINT_CSS: &str = "\
body { font-family: Arial, sans-serif; margin: 20px; color: #333; line-height: 1.4; }
.header { text-align: center; margin-bottom: 30px; border-bottom: 3px solid #b71c1c; }
.stats { background: #f8f9fa; padding: 20px; border-left: 4px solid #b71c1c; }
.report-item { border: 1px solid #e0e0e0; margin: 15px 0; padding: 20px; page-break-inside: avoid; }
.report-title { font-weight: bold; color: #b71c1c; }
.priority.urgent { background: #f44336; }
.priority.normal { background: #ff9800; }
.priority.low { background: #4caf50; }
.description { background: #f9f9f9; padding: 12px; border-left: 3px solid #b71c1c; }
.footer { margin-top: 40px; text-align: center; border-top: 1px solid #ddd; }
@media print { body { margin: 15px; } }
";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civic_db::entities::SenderRole;
    use civic_db::test_utils::{TestStore, new_report, test_epoch};

    #[test]
    fn test_csv_escape_and_neutralize() {
        assert_eq!(csv_text("plain"), "plain");
        assert_eq!(csv_text("a, b"), "\"a, b\"");
        assert_eq!(csv_text("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_text("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(csv_text("  @cmd"), "'  @cmd");
        assert_eq!(csv_text("'quoted"), "'quoted");
    }

    #[test]
    fn test_custom_range_includes_whole_end_day() {
        let range = ExportRange::Custom {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        };
        let (start, end) = range.bounds(test_epoch()).unwrap().unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(end.format("%Y-%m-%d %H:%M:%S%.3f").to_string(), "2024-03-02 23:59:59.999");

        let reversed = ExportRange::Custom {
            start: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert!(reversed.bounds(test_epoch()).is_err());
    }

    #[tokio::test]
    async fn test_csv_export() {
        let mut t = TestStore::new();
        let mut data = new_report("Lamp, broken");
        data.gps_coordinates = Some(Coordinates::new(-6.2, 106.8));
        t.store.add_report(data);
        let (store, _, _) = t.into_shared();

        let doc = ExportService::new(store)
            .reports(ExportFormat::Csv, ExportRange::All)
            .await
            .unwrap();
        assert_eq!(doc.filename, "reports-export-2024-03-01.csv");
        assert_eq!(doc.mime_type, "text/csv");

        let lines: Vec<&str> = doc.content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_COLUMNS.join(","));
        assert!(lines[1].contains("\"Lamp, broken\""));
        assert!(lines[1].contains(",-6.2,106.8,"));
        assert!(lines[1].ends_with(",false"));
    }

    #[tokio::test]
    async fn test_empty_csv_has_header_only() {
        let (store, _, _) = TestStore::new().into_shared();
        let doc = ExportService::new(store)
            .reports(ExportFormat::Csv, ExportRange::Today)
            .await
            .unwrap();
        assert_eq!(doc.content, CSV_COLUMNS.join(","));
    }

    #[tokio::test]
    async fn test_json_export_respects_range() {
        let mut t = TestStore::new();
        t.store.add_report(new_report("Old pothole report"));
        t.clock.advance(Duration::days(10));
        t.store.add_report(new_report("Fresh pothole report"));
        let (store, _, _) = t.into_shared();
        let service = ExportService::new(store);

        let doc = service
            .reports(ExportFormat::Json, ExportRange::Week)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(value["totalReports"], 1);
        assert_eq!(value["reports"][0]["title"], "Fresh pothole report");
        assert_eq!(value["reports"][0]["escalated"], false);

        let doc = service
            .reports(ExportFormat::Json, ExportRange::All)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(value["totalReports"], 2);
    }

    #[tokio::test]
    async fn test_print_html_escapes_text() {
        let mut t = TestStore::new();
        t.store.add_report(new_report("<script>alert(1)</script>"));
        let (store, _, _) = t.into_shared();

        let doc = ExportService::new(store)
            .print_html(&ReportQuery::default())
            .await;
        assert_eq!(doc.mime_type, "text/html");
        assert!(!doc.content.contains("<script>"));
        assert!(doc.content.contains("&lt;script&gt;"));
        assert!(doc.content.contains("Total: 1 | Resolved: 0 (0.0%)"));
    }

    #[tokio::test]
    async fn test_locations_and_chat_history() {
        let mut t = TestStore::new();
        let mut data = new_report("Broken street lamp");
        data.gps_coordinates = Some(Coordinates::new(-6.2, 106.8));
        let with_gps = t.store.add_report(data);
        t.store.add_report(new_report("Overflowing rubbish bin"));
        t.add_citizen_message(&with_gps.id, "Any update?");
        t.add_officer_message(&with_gps.id, "Technician scheduled");
        let (store, _, _) = t.into_shared();
        let service = ExportService::new(store);

        let doc = service.locations().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(value["totalReports"], 2);
        assert_eq!(value["reportsWithGps"], 1);
        assert_eq!(value["locations"][0]["coordinates"]["lat"], -6.2);

        let doc = service.chat_history(&with_gps.id).await.unwrap();
        assert_eq!(
            doc.filename,
            format!("chat-history-{}-2024-03-01.json", with_gps.id)
        );
        let value: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(value["messages"][1]["role"], SenderRole::Officer.as_str());
        assert!(service.chat_history("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_selected_reports() {
        let mut t = TestStore::new();
        let a = t.store.add_report(new_report("Broken street lamp"));
        let b = t.store.add_report(new_report("Overflowing rubbish bin"));
        let (store, _, _) = t.into_shared();
        let service = ExportService::new(store);

        let doc = service
            .selected_reports(&[b.id.clone(), a.id.clone()], ExportFormat::Json)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(value["reports"][0]["id"], b.id.as_str());
        assert!(
            service
                .selected_reports(&["missing".to_string()], ExportFormat::Csv)
                .await
                .is_err()
        );
    }
}
