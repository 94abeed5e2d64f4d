//! Escalation of reports that went unanswered for too long.

use chrono::{DateTime, Utc};
use civic_common::config::EscalationConfig;
use civic_common::{AppError, AppResult, FieldErrors};
use civic_db::entities::{
    Escalation, EscalationTarget, EscalationType, NewChatMessage, NewEscalation, Priority,
    Report, ReportStatus, SenderRole,
};
use civic_db::{DataStore, Saved, SharedStore};
use civic_db::repositories::{ChatRepository, EscalationRepository, ReportRepository};
use serde::Serialize;
use tracing::{debug, info};

use super::export::ExportDocument;
use super::report::SYSTEM_SENDER;
use crate::scheduler::PeriodicTask;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Actor recorded on automatic escalations.
pub const SYSTEM_ACTOR: &str = "system";

/// Fractional days between `created_at` and `now`.
#[must_use]
pub fn age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_milliseconds() as f64 / MS_PER_DAY
}

/// Age thresholds deciding when a report is overdue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub urgent_days: u32,
    pub normal_days: u32,
    pub low_days: u32,
    pub warning_days: u32,
}

impl EscalationPolicy {
    #[must_use]
    pub const fn from_config(config: &EscalationConfig) -> Self {
        Self {
            urgent_days: config.urgent_priority_days,
            normal_days: config.auto_escalate_days,
            low_days: config
                .auto_escalate_days
                .saturating_mul(config.low_priority_multiplier),
            warning_days: config.warning_days,
        }
    }

    /// Days after which a report of `priority` is overdue.
    #[must_use]
    pub const fn threshold_days(&self, priority: Priority) -> u32 {
        match priority {
            Priority::Urgent => self.urgent_days,
            Priority::Normal => self.normal_days,
            Priority::Low => self.low_days,
        }
    }

    /// Whether the report is older than its threshold. Escalated and resolved
    /// reports never need escalation.
    #[must_use]
    pub fn needs_escalation(&self, report: &Report, now: DateTime<Utc>) -> bool {
        if report.is_escalated() || report.is_resolved() {
            return false;
        }
        age_in_days(report.created_at, now) > f64::from(self.threshold_days(report.priority))
    }

    /// Whether the report is in the warning window but not yet overdue.
    #[must_use]
    pub fn is_near_escalation(&self, report: &Report, now: DateTime<Utc>) -> bool {
        if report.is_escalated() || report.is_resolved() {
            return false;
        }
        age_in_days(report.created_at, now) >= f64::from(self.warning_days)
            && !self.needs_escalation(report, now)
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::from_config(&EscalationConfig::default())
    }
}

/// Reports that need someone's attention.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttentionSummary {
    pub overdue: Vec<Report>,
    pub warning: Vec<Report>,
    /// Urgent reports not yet resolved.
    pub urgent: Vec<Report>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EscalationReportSummary {
    total_escalations: usize,
    overdue_reports: usize,
    warning_reports: usize,
    urgent_reports: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EscalationHistoryEntry {
    report_title: String,
    escalation_type: EscalationType,
    reason: String,
    escalated_to: EscalationTarget,
    escalated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OverdueEntry {
    id: String,
    title: String,
    priority: Priority,
    days_since_created: i64,
    status: ReportStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EscalationReportDocument {
    generated_at: DateTime<Utc>,
    summary: EscalationReportSummary,
    escalation_history: Vec<EscalationHistoryEntry>,
    overdue_reports: Vec<OverdueEntry>,
}

/// Escalation service.
#[derive(Clone)]
pub struct EscalationService {
    store: SharedStore,
    policy: EscalationPolicy,
}

impl EscalationService {
    #[must_use]
    pub const fn new(store: SharedStore, policy: EscalationPolicy) -> Self {
        Self { store, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Escalate every overdue report. Returns how many were escalated.
    ///
    /// Escalating stamps the report, so a second sweep at the same instant
    /// escalates nothing.
    pub async fn sweep(&self) -> Saved<usize> {
        let mut store = self.store.lock().await;
        let now = store.now();

        let overdue: Vec<Report> = store
            .all_reports()
            .into_iter()
            .filter(|r| self.policy.needs_escalation(r, now))
            .collect();

        for report in &overdue {
            let reason = format!(
                "{} report received no response for {} days",
                report.priority.label(),
                report.age_days(now)
            );
            escalate(
                &mut store,
                NewEscalation {
                    report_id: report.id.clone(),
                    escalation_type: EscalationType::Auto,
                    reason,
                    escalated_to: EscalationTarget::Supervisor,
                    escalated_by: SYSTEM_ACTOR.to_string(),
                },
            );
        }

        if !overdue.is_empty() {
            info!(count = overdue.len(), "Overdue reports escalated");
        }
        store.saved(overdue.len())
    }

    /// Escalate a report by hand. A reason is required.
    pub async fn escalate_manual(
        &self,
        report_id: &str,
        reason: &str,
        target: EscalationTarget,
        escalated_by: &str,
    ) -> AppResult<Saved<Escalation>> {
        let reason = reason.trim();
        if reason.is_empty() {
            let mut errors = FieldErrors::default();
            errors.insert_first("reason", "Escalation reason is required".to_string());
            return Err(AppError::Validation(errors));
        }

        let mut store = self.store.lock().await;
        if store.get_report(report_id).is_none() {
            return Err(AppError::ReportNotFound(report_id.to_string()));
        }

        let escalation = escalate(
            &mut store,
            NewEscalation {
                report_id: report_id.to_string(),
                escalation_type: EscalationType::Manual,
                reason: reason.to_string(),
                escalated_to: target,
                escalated_by: escalated_by.to_string(),
            },
        );
        Ok(store.saved(escalation))
    }

    /// Overdue, warning and urgent unresolved reports right now.
    pub async fn attention(&self) -> AttentionSummary {
        let store = self.store.lock().await;
        self.attention_at(&store.all_reports(), store.now())
    }

    fn attention_at(&self, reports: &[Report], now: DateTime<Utc>) -> AttentionSummary {
        let pick = |f: &dyn Fn(&Report) -> bool| -> Vec<Report> {
            reports.iter().filter(|r| f(r)).cloned().collect()
        };
        AttentionSummary {
            overdue: pick(&|r| self.policy.needs_escalation(r, now)),
            warning: pick(&|r| self.policy.is_near_escalation(r, now)),
            urgent: pick(&|r| r.priority == Priority::Urgent && !r.is_resolved()),
        }
    }

    /// Escalations of one report, or all of them.
    pub async fn history(&self, report_id: Option<&str>) -> Vec<Escalation> {
        self.store.lock().await.escalations(report_id)
    }

    /// JSON document summarising escalations and overdue reports.
    pub async fn export_report(&self) -> AppResult<ExportDocument> {
        let store = self.store.lock().await;
        let now = store.now();
        let reports = store.all_reports();
        let escalations = store.escalations(None);
        drop(store);

        let attention = self.attention_at(&reports, now);
        let title_of = |id: &str| {
            reports
                .iter()
                .find(|r| r.id == id)
                .map_or_else(|| "Unknown".to_string(), |r| r.title.clone())
        };

        let document = EscalationReportDocument {
            generated_at: now,
            summary: EscalationReportSummary {
                total_escalations: escalations.len(),
                overdue_reports: attention.overdue.len(),
                warning_reports: attention.warning.len(),
                urgent_reports: attention.urgent.len(),
            },
            escalation_history: escalations
                .into_iter()
                .map(|e| EscalationHistoryEntry {
                    report_title: title_of(&e.report_id),
                    escalation_type: e.escalation_type,
                    reason: e.reason,
                    escalated_to: e.escalated_to,
                    escalated_at: e.created_at,
                })
                .collect(),
            overdue_reports: attention
                .overdue
                .iter()
                .map(|r| OverdueEntry {
                    id: r.id.clone(),
                    title: r.title.clone(),
                    priority: r.priority,
                    days_since_created: r.age_days(now),
                    status: r.status,
                })
                .collect(),
        };

        ExportDocument::json("escalation-report", now, &document)
    }
}

/// Record the escalation and announce it in the report's conversation.
fn escalate(store: &mut DataStore, data: NewEscalation) -> Escalation {
    let escalation = store.add_escalation(data);
    let prefix = match escalation.escalation_type {
        EscalationType::Auto => "Report escalated",
        EscalationType::Manual => "Report escalated manually",
    };
    store.add_chat_message(NewChatMessage {
        report_id: escalation.report_id.clone(),
        sender: SYSTEM_SENDER.to_string(),
        sender_role: SenderRole::System,
        message: format!(
            "{prefix} to {}: {}",
            escalation.escalated_to.label(),
            escalation.reason
        ),
    });
    debug!(report_id = %escalation.report_id, "Escalation announced");
    escalation
}

#[async_trait::async_trait]
impl PeriodicTask for EscalationService {
    fn name(&self) -> &'static str {
        "escalation-sweep"
    }

    async fn tick(&self) -> AppResult<usize> {
        let swept = self.sweep().await;
        match swept.persist_warning {
            Some(e) => Err(e),
            None => Ok(swept.value),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use civic_db::test_utils::{TestStore, new_report, test_epoch};

    fn report_aged(priority: Priority, age: Duration) -> Report {
        let created_at = test_epoch() - age;
        Report {
            id: "r1".to_string(),
            title: "Blocked drain".to_string(),
            name: "Sari".to_string(),
            location: "Jl. Mawar RT 02".to_string(),
            description: "The drain has been blocked for days".to_string(),
            files: Vec::new(),
            status: ReportStatus::New,
            priority,
            gps_coordinates: None,
            created_at,
            last_updated_at: created_at,
            escalated_at: None,
        }
    }

    #[test]
    fn test_thresholds() {
        let policy = EscalationPolicy::default();
        assert_eq!(policy.threshold_days(Priority::Urgent), 3);
        assert_eq!(policy.threshold_days(Priority::Normal), 7);
        assert_eq!(policy.threshold_days(Priority::Low), 14);

        let now = test_epoch();
        assert!(policy.needs_escalation(&report_aged(Priority::Normal, Duration::days(8)), now));
        assert!(!policy.needs_escalation(&report_aged(Priority::Normal, Duration::days(6)), now));
        assert!(policy.needs_escalation(&report_aged(Priority::Urgent, Duration::days(4)), now));
        assert!(!policy.needs_escalation(&report_aged(Priority::Low, Duration::days(10)), now));
        // Strictly greater than the threshold.
        assert!(!policy.needs_escalation(&report_aged(Priority::Normal, Duration::days(7)), now));
    }

    #[test]
    fn test_huge_multiplier_saturates() {
        let policy = EscalationPolicy::from_config(&EscalationConfig {
            auto_escalate_days: u32::MAX / 2,
            low_priority_multiplier: 3,
            ..EscalationConfig::default()
        });
        assert_eq!(policy.threshold_days(Priority::Low), u32::MAX);
        assert!(!policy.needs_escalation(
            &report_aged(Priority::Low, Duration::days(365 * 50)),
            test_epoch()
        ));
    }

    #[test]
    fn test_escalated_or_resolved_never_flagged() {
        let policy = EscalationPolicy::default();
        let now = test_epoch();

        let mut report = report_aged(Priority::Normal, Duration::days(30));
        report.status = ReportStatus::Resolved;
        assert!(!policy.needs_escalation(&report, now));
        assert!(!policy.is_near_escalation(&report, now));

        let mut report = report_aged(Priority::Normal, Duration::days(30));
        report.escalated_at = Some(now);
        assert!(!policy.needs_escalation(&report, now));
    }

    #[test]
    fn test_warning_window() {
        let policy = EscalationPolicy::default();
        let now = test_epoch();
        assert!(policy.is_near_escalation(&report_aged(Priority::Normal, Duration::days(5)), now));
        assert!(!policy.is_near_escalation(&report_aged(Priority::Normal, Duration::days(4)), now));
        assert!(!policy.is_near_escalation(&report_aged(Priority::Normal, Duration::days(8)), now));
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let mut t = TestStore::new();
        let old = t.store.add_report(new_report("Blocked drain channel"));
        t.clock.advance(Duration::days(8));
        t.store.add_report(new_report("Fresh pothole report"));
        let (store, _, _) = t.into_shared();
        let service = EscalationService::new(store.clone(), EscalationPolicy::default());

        assert_eq!(service.sweep().await.value, 1);
        assert_eq!(service.sweep().await.value, 0);

        let history = service.history(Some(old.id.as_str())).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].escalation_type, EscalationType::Auto);
        assert_eq!(history[0].escalated_by, "system");
        assert_eq!(
            history[0].reason,
            "Normal report received no response for 8 days"
        );

        let store = store.lock().await;
        assert!(store.get_report(&old.id).unwrap().is_escalated());
        let messages = store.chat_messages(&old.id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_role, SenderRole::System);
    }

    #[tokio::test]
    async fn test_manual_escalation() {
        let mut t = TestStore::new();
        let report = t.store.add_report(new_report("Blocked drain channel"));
        let (store, _, _) = t.into_shared();
        let service = EscalationService::new(store, EscalationPolicy::default());

        let err = service
            .escalate_manual(&report.id, "  ", EscalationTarget::Manager, "officer")
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().get("reason").is_some());

        assert!(
            service
                .escalate_manual("missing", "Stuck", EscalationTarget::Manager, "officer")
                .await
                .is_err()
        );

        let escalation = service
            .escalate_manual(
                &report.id,
                "Contractor unresponsive",
                EscalationTarget::HeadOffice,
                "officer",
            )
            .await
            .unwrap()
            .into_inner();
        assert_eq!(escalation.escalation_type, EscalationType::Manual);
        assert_eq!(escalation.escalated_to, EscalationTarget::HeadOffice);
    }

    #[tokio::test]
    async fn test_attention_and_export() {
        let mut t = TestStore::new();
        let mut urgent = new_report("Gas leak near the school");
        urgent.priority = Some(Priority::Urgent);
        t.store.add_report(urgent);
        t.store.add_report(new_report("Broken street lamp"));
        t.clock.advance(Duration::days(5) + Duration::hours(1));
        let (store, _, _) = t.into_shared();
        let service = EscalationService::new(store, EscalationPolicy::default());

        let attention = service.attention().await;
        assert_eq!(attention.overdue.len(), 1);
        assert_eq!(attention.warning.len(), 1);
        assert_eq!(attention.urgent.len(), 1);

        assert_eq!(service.sweep().await.into_inner(), 1);
        let doc = service.export_report().await.unwrap();
        assert_eq!(doc.filename, "escalation-report-2024-03-06.json");
        let value: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(value["summary"]["totalEscalations"], 1);
        assert_eq!(value["summary"]["overdueReports"], 0);
        assert_eq!(
            value["escalationHistory"][0]["reportTitle"],
            "Gas leak near the school"
        );
    }

    #[tokio::test]
    async fn test_sweep_tick_reports_failed_write() {
        let mut t = TestStore::new();
        t.store.add_report(new_report("Blocked drain channel"));
        t.clock.advance(Duration::days(8));
        t.backend.set_fail_writes(true);
        let (store, backend, _) = t.into_shared();
        let service = EscalationService::new(store.clone(), EscalationPolicy::default());

        assert_eq!(service.tick().await.unwrap_err().error_code(), "STORAGE_ERROR");
        assert_eq!(service.history(None).await.len(), 1);

        backend.set_fail_writes(false);
        let report_id = store.lock().await.all_reports()[0].id.clone();
        let manual = service
            .escalate_manual(
                &report_id,
                "Still blocked",
                EscalationTarget::Manager,
                "officer",
            )
            .await
            .unwrap();
        assert!(manual.is_persisted());
    }
}
