//! Report repository.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use civic_common::collection::ALL;
use civic_common::{
    AppResult, Coordinates, SortOrder, haversine_km, matches_filter, search_by, sort_by_key,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::entities::{NewReport, Priority, Report, ReportPatch, ReportStatus};
use crate::store::{Collection, DataStore};

/// Order of report listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Most recently created first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
    /// Urgent, then normal, then low. Ties keep storage order.
    Priority,
}

impl SortBy {
    /// Parse a listing order, treating anything unknown as newest.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "oldest" => Self::Oldest,
            "priority" => Self::Priority,
            _ => Self::Newest,
        }
    }
}

/// Filters for listing reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub priority: Option<Priority>,
    /// Case-insensitive substring over title, location and description.
    pub search: Option<String>,
    pub sort_by: SortBy,
    pub limit: Option<usize>,
}

impl ReportQuery {
    /// Build a query from raw filter values, where `"all"` or an empty value disables a filter.
    pub fn from_params(
        status: &str,
        priority: &str,
        search: &str,
        sort_by: &str,
    ) -> AppResult<Self> {
        let status = match status {
            "" | ALL => None,
            value => Some(value.parse()?),
        };
        let priority = match priority {
            "" | ALL => None,
            value => Some(value.parse()?),
        };
        let search = Some(search.trim().to_string()).filter(|s| !s.is_empty());

        Ok(Self {
            status,
            priority,
            search,
            sort_by: SortBy::parse(sort_by),
            limit: None,
        })
    }

    /// Only reports with this status.
    #[must_use]
    pub const fn with_status(mut self, status: ReportStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Listing order.
    #[must_use]
    pub const fn sorted(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// At most `limit` reports.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Aggregate report counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub by_priority: BTreeMap<&'static str, usize>,
    /// New, unescalated reports older than the configured threshold.
    pub needs_escalation: usize,
    /// Mean hours from creation to last update over resolved reports, rounded.
    pub avg_resolution_hours: i64,
}

impl ReportStats {
    /// Count for a status.
    #[must_use]
    pub fn status_count(&self, status: ReportStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }

    /// Count for a priority.
    #[must_use]
    pub fn priority_count(&self, priority: Priority) -> usize {
        self.by_priority.get(priority.as_str()).copied().unwrap_or(0)
    }
}

/// A report within a search radius.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyReport {
    pub report: Report,
    pub distance_km: f64,
}

/// Report persistence.
pub trait ReportRepository {
    /// Store a new report with status new.
    fn add_report(&mut self, data: NewReport) -> Report;

    /// Merge a patch and restamp `last_updated_at`. `None` if the id is unknown.
    fn update_report(&mut self, id: &str, patch: ReportPatch) -> Option<Report>;

    /// Remove a report and its chat messages. Returns whether a report was removed.
    fn delete_report(&mut self, id: &str) -> bool;

    /// Look up a report.
    fn get_report(&self, id: &str) -> Option<Report>;

    /// Filtered, sorted copy of the reports.
    fn get_reports(&self, query: &ReportQuery) -> Vec<Report>;

    /// Every report in storage order.
    fn all_reports(&self) -> Vec<Report>;

    /// Aggregate counts as of `now`.
    fn reports_stats(&self, now: DateTime<Utc>) -> ReportStats;

    /// Reports with coordinates within `radius_km` of `center`, nearest first.
    fn reports_near(&self, center: &Coordinates, radius_km: f64) -> Vec<NearbyReport>;

    /// Set a report's coordinates.
    fn attach_gps(&mut self, id: &str, coordinates: Coordinates) -> Option<Report>;
}

impl ReportRepository for DataStore {
    fn add_report(&mut self, data: NewReport) -> Report {
        let now = self.now();
        let id = self.next_id(self.reports.iter().map(|r| r.id.as_str()));
        let report = Report {
            id,
            title: data.title,
            name: data.name,
            location: data.location,
            description: data.description,
            files: data.files,
            status: ReportStatus::New,
            priority: data.priority.unwrap_or_default(),
            gps_coordinates: data.gps_coordinates,
            created_at: now,
            last_updated_at: now,
            escalated_at: None,
        };

        self.reports.push(report.clone());
        self.persist(&[Collection::Reports]);
        info!(report_id = %report.id, priority = %report.priority, "Report added");
        report
    }

    fn update_report(&mut self, id: &str, patch: ReportPatch) -> Option<Report> {
        let now = self.now();
        let report = self.reports.iter_mut().find(|r| r.id == id)?;
        patch.apply(report);
        report.last_updated_at = now;
        let updated = report.clone();

        self.persist(&[Collection::Reports]);
        debug!(report_id = %id, status = %updated.status, "Report updated");
        Some(updated)
    }

    fn delete_report(&mut self, id: &str) -> bool {
        let before = self.reports.len();
        self.reports.retain(|r| r.id != id);
        if self.reports.len() == before {
            return false;
        }

        let mut touched = vec![Collection::Reports];

        let messages_before = self.chat_messages.len();
        self.chat_messages.retain(|m| m.report_id != id);
        if self.chat_messages.len() != messages_before {
            touched.push(Collection::ChatMessages);
        }

        if self.options().cascade_escalations {
            let escalations_before = self.escalations.len();
            self.escalations.retain(|e| e.report_id != id);
            if self.escalations.len() != escalations_before {
                touched.push(Collection::Escalations);
            }
        }

        self.persist(&touched);
        info!(report_id = %id, "Report deleted");
        true
    }

    fn get_report(&self, id: &str) -> Option<Report> {
        self.reports.iter().find(|r| r.id == id).cloned()
    }

    fn get_reports(&self, query: &ReportQuery) -> Vec<Report> {
        let status = query.status.map(ReportStatus::as_str);
        let priority = query.priority.map(Priority::as_str);

        let filtered: Vec<Report> = self
            .reports
            .iter()
            .filter(|r| matches_filter(r.status.as_str(), status))
            .filter(|r| matches_filter(r.priority.as_str(), priority))
            .cloned()
            .collect();

        let searched = match query.search.as_deref() {
            Some(text) => search_by(
                &filtered,
                text,
                &[Report::title, Report::location, Report::description],
            ),
            None => filtered,
        };

        let mut sorted = match query.sort_by {
            SortBy::Newest => sort_by_key(&searched, |r| r.created_at, SortOrder::Desc),
            SortBy::Oldest => sort_by_key(&searched, |r| r.created_at, SortOrder::Asc),
            SortBy::Priority => sort_by_key(&searched, |r| r.priority.rank(), SortOrder::Asc),
        };

        if let Some(limit) = query.limit {
            sorted.truncate(limit);
        }
        sorted
    }

    fn all_reports(&self) -> Vec<Report> {
        self.reports.clone()
    }

    fn reports_stats(&self, now: DateTime<Utc>) -> ReportStats {
        let mut stats = ReportStats {
            total: self.reports.len(),
            ..ReportStats::default()
        };
        for status in ReportStatus::ALL {
            stats.by_status.insert(status.as_str(), 0);
        }
        for priority in Priority::ALL {
            stats.by_priority.insert(priority.as_str(), 0);
        }

        // None when the threshold predates chrono's range, so nothing qualifies.
        let threshold = Duration::try_days(i64::from(self.options().stats_threshold_days))
            .and_then(|age| now.checked_sub_signed(age));
        let mut resolved = 0_i64;
        let mut resolution_ms = 0_i64;

        for report in &self.reports {
            *stats.by_status.entry(report.status.as_str()).or_default() += 1;
            *stats.by_priority.entry(report.priority.as_str()).or_default() += 1;

            if report.status == ReportStatus::New
                && threshold.is_some_and(|t| report.created_at < t)
                && !report.is_escalated()
            {
                stats.needs_escalation += 1;
            }

            if report.is_resolved() {
                resolved += 1;
                resolution_ms += (report.last_updated_at - report.created_at).num_milliseconds();
            }
        }

        if resolved > 0 {
            let mean_hours = resolution_ms as f64 / resolved as f64 / 3_600_000.0;
            stats.avg_resolution_hours = mean_hours.round() as i64;
        }
        stats
    }

    fn reports_near(&self, center: &Coordinates, radius_km: f64) -> Vec<NearbyReport> {
        let mut nearby: Vec<NearbyReport> = self
            .reports
            .iter()
            .filter_map(|report| {
                let coordinates = report.gps_coordinates.as_ref()?;
                let distance_km = haversine_km(center, coordinates);
                (distance_km <= radius_km).then(|| NearbyReport {
                    report: report.clone(),
                    distance_km,
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        nearby
    }

    fn attach_gps(&mut self, id: &str, coordinates: Coordinates) -> Option<Report> {
        self.update_report(
            id,
            ReportPatch {
                gps_coordinates: Some(Some(coordinates)),
                ..ReportPatch::default()
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civic_common::Clock;
    use crate::StoreOptions;
    use crate::repositories::ChatRepository;
    use crate::test_utils::{TestStore, new_report};

    #[test]
    fn test_add_report_defaults() {
        let mut t = TestStore::new();
        let report = t.store.add_report(new_report("Broken street lamp"));

        assert_eq!(report.status, ReportStatus::New);
        assert_eq!(report.priority, Priority::Normal);
        assert_eq!(report.created_at, report.last_updated_at);
        assert_eq!(report.created_at, t.clock.now());
        assert!(report.escalated_at.is_none());
        assert_eq!(t.store.get_report(&report.id), Some(report));
    }

    #[test]
    fn test_update_unknown_report_is_none() {
        let mut t = TestStore::new();
        assert!(t
            .store
            .update_report("missing", ReportPatch::status(ReportStatus::Resolved))
            .is_none());
    }

    #[test]
    fn test_update_restamps_last_updated() {
        let mut t = TestStore::new();
        let report = t.store.add_report(new_report("Broken street lamp"));
        t.clock.advance(Duration::hours(3));

        let updated = t
            .store
            .update_report(&report.id, ReportPatch::status(ReportStatus::InProgress))
            .unwrap();
        assert_eq!(updated.status, ReportStatus::InProgress);
        assert_eq!(updated.created_at, report.created_at);
        assert_eq!(updated.last_updated_at, report.created_at + Duration::hours(3));
    }

    #[test]
    fn test_filter_search_and_limit() {
        let mut t = TestStore::new();
        let a = t.store.add_report(new_report("Flooded drain"));
        t.store.add_report(new_report("Broken street lamp"));
        t.store.add_report(new_report("Drain cover missing"));
        t.store
            .update_report(&a.id, ReportPatch::status(ReportStatus::Resolved))
            .unwrap();

        let resolved = t
            .store
            .get_reports(&ReportQuery::default().with_status(ReportStatus::Resolved));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, a.id);

        let query = ReportQuery::from_params("all", "", "DRAIN", "oldest").unwrap();
        let drains = t.store.get_reports(&query);
        assert_eq!(drains.len(), 2);
        assert_eq!(drains[0].title, "Flooded drain");

        let limited = t.store.get_reports(&ReportQuery::default().limit(1));
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_from_params_rejects_unknown_status() {
        assert!(ReportQuery::from_params("baru", "all", "", "newest").is_err());
    }

    #[test]
    fn test_newest_first() {
        let mut t = TestStore::new();
        t.store.add_report(new_report("First report"));
        t.clock.advance(Duration::minutes(1));
        t.store.add_report(new_report("Second report"));

        let reports = t.store.get_reports(&ReportQuery::default());
        assert_eq!(reports[0].title, "Second report");
    }

    #[test]
    fn test_delete_cascades_chat_only() {
        let mut t = TestStore::new();
        let report = t.store.add_report(new_report("Broken street lamp"));
        let other = t.store.add_report(new_report("Flooded drain"));
        t.add_citizen_message(&report.id, "Any update?");
        t.add_citizen_message(&other.id, "Still flooded");

        assert!(t.store.delete_report(&report.id));
        assert!(!t.store.delete_report(&report.id));
        assert!(t.store.get_report(&report.id).is_none());
        assert!(t.store.get_report(&other.id).is_some());
        assert!(t.store.chat_messages(&report.id).is_empty());
        assert_eq!(t.store.chat_messages(&other.id).len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut t = TestStore::new();
        let old = t.store.add_report(new_report("Old pothole"));
        let fixed = t.store.add_report(new_report("Fixed lamp"));
        t.clock.advance(Duration::days(8));
        t.store
            .update_report(&fixed.id, ReportPatch::status(ReportStatus::Resolved))
            .unwrap();
        t.store.add_report(NewReport {
            priority: Some(Priority::Urgent),
            ..new_report("Fresh urgent issue")
        });

        let stats = t.store.reports_stats(t.clock.now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.status_count(ReportStatus::New), 2);
        assert_eq!(stats.status_count(ReportStatus::Resolved), 1);
        assert_eq!(stats.priority_count(Priority::Urgent), 1);
        assert_eq!(stats.priority_count(Priority::Low), 0);
        assert_eq!(stats.needs_escalation, 1);
        assert_eq!(stats.avg_resolution_hours, 8 * 24);
        assert!(t.store.get_report(&old.id).is_some());
    }

    #[test]
    fn test_stats_with_out_of_range_threshold() {
        let mut t = TestStore::with_options(StoreOptions {
            stats_threshold_days: u32::MAX,
            ..StoreOptions::default()
        });
        t.store.add_report(new_report("Old pothole"));
        t.clock.advance(Duration::days(8));

        let stats = t.store.reports_stats(t.clock.now());
        assert_eq!(stats.total, 1);
        assert_eq!(stats.needs_escalation, 0);
    }

    #[test]
    fn test_reports_near() {
        let mut t = TestStore::new();
        let center = Coordinates::new(-6.2088, 106.8456);
        let near = t.store.add_report(NewReport {
            gps_coordinates: Some(Coordinates::new(-6.2087, 106.8457)),
            ..new_report("Next door")
        });
        t.store.add_report(NewReport {
            gps_coordinates: Some(Coordinates::new(-6.9175, 107.6191)),
            ..new_report("Other city")
        });
        t.store.add_report(new_report("No coordinates"));

        let found = t.store.reports_near(&center, 1.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].report.id, near.id);
        assert!(found[0].distance_km < 0.1);
    }

    #[test]
    fn test_attach_gps() {
        let mut t = TestStore::new();
        let report = t.store.add_report(new_report("Broken street lamp"));
        let coords = Coordinates::new(-6.2, 106.8);

        let updated = t.store.attach_gps(&report.id, coords).unwrap();
        assert_eq!(updated.gps_coordinates, Some(coords));
        assert!(t.store.attach_gps("missing", coords).is_none());
    }
}
