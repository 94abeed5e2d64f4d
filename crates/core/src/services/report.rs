//! Report service for submitting, editing and browsing reports.

use std::sync::Arc;

use civic_common::config::ReportsConfig;
use civic_common::{AppError, AppResult, Coordinates, FieldRule, FormValidator};
use civic_db::{Saved, SharedStore};
use civic_db::entities::{NewChatMessage, NewReport, Report, ReportPatch, ReportStatus, SenderRole};
use civic_db::repositories::{
    ChatRepository, NearbyReport, ProfileRepository, ReportQuery, ReportRepository, ReportStats,
};
use serde::Serialize;
use tracing::{info, warn};

/// Sender name of messages posted by the application itself.
pub const SYSTEM_SENDER: &str = "System";

/// Maximum number of search suggestions.
const MAX_SUGGESTIONS: usize = 5;

/// Minimum query length before suggestions are offered.
const MIN_SUGGESTION_QUERY: usize = 2;

/// A submission on its way to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDraft {
    /// The report data.
    pub data: NewReport,
    /// Posted as system chat messages once the report is stored.
    pub notes: Vec<String>,
}

impl ReportDraft {
    #[must_use]
    pub const fn new(data: NewReport) -> Self {
        Self {
            data,
            notes: Vec::new(),
        }
    }
}

/// Adjusts a draft before it is validated and stored.
#[async_trait::async_trait]
pub trait ReportEnricher: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Adjust the draft in place.
    async fn enrich(&self, draft: &mut ReportDraft) -> AppResult<()>;
}

/// A search suggestion drawn from existing reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum SearchSuggestion {
    Location(String),
    Title(String),
}

impl SearchSuggestion {
    /// The suggested search text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Location(text) | Self::Title(text) => text,
        }
    }
}

/// Report service.
#[derive(Clone)]
pub struct ReportService {
    store: SharedStore,
    config: ReportsConfig,
    enrichers: Vec<Arc<dyn ReportEnricher>>,
    validator: FormValidator,
}

impl ReportService {
    /// Create a report service without enrichers.
    #[must_use]
    pub fn new(store: SharedStore, config: ReportsConfig) -> Self {
        let validator = report_validator(&config);
        Self {
            store,
            config,
            enrichers: Vec::new(),
            validator,
        }
    }

    /// Add an enricher. Enrichers run in the order they were added.
    #[must_use]
    pub fn with_enricher(mut self, enricher: Arc<dyn ReportEnricher>) -> Self {
        self.enrichers.push(enricher);
        self
    }

    /// Submit a new report.
    ///
    /// Text fields are trimmed and an empty reporter name is taken from the
    /// profile. Enrichers run before validation; an enricher failure is
    /// logged and skipped. A failed write keeps the report and comes back as
    /// the result's persist warning.
    pub async fn submit(&self, data: NewReport) -> AppResult<Saved<Report>> {
        let mut data = NewReport {
            title: data.title.trim().to_string(),
            name: data.name.trim().to_string(),
            location: data.location.trim().to_string(),
            description: data.description.trim().to_string(),
            ..data
        };
        if data.name.is_empty() {
            data.name = self.store.lock().await.profile().name;
        }

        let mut draft = ReportDraft::new(data);
        for enricher in &self.enrichers {
            if let Err(e) = enricher.enrich(&mut draft).await {
                warn!(enricher = enricher.name(), error = %e, "Report enrichment failed");
            }
        }

        let ReportDraft { data, notes } = draft;
        self.validate_draft(&data)?;

        let mut store = self.store.lock().await;
        let report = store.add_report(data);
        for note in notes {
            store.add_chat_message(NewChatMessage {
                report_id: report.id.clone(),
                sender: SYSTEM_SENDER.to_string(),
                sender_role: SenderRole::System,
                message: note,
            });
        }

        info!(report_id = %report.id, priority = %report.priority, "Report submitted");
        Ok(store.saved(report))
    }

    /// Get a report by id.
    pub async fn get(&self, id: &str) -> AppResult<Report> {
        self.store
            .lock()
            .await
            .get_report(id)
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))
    }

    /// List reports matching a query.
    pub async fn list(&self, query: &ReportQuery) -> Vec<Report> {
        self.store.lock().await.get_reports(query)
    }

    /// Change a report's status.
    pub async fn set_status(&self, id: &str, status: ReportStatus) -> AppResult<Saved<Report>> {
        let mut store = self.store.lock().await;
        let report = store
            .update_report(id, ReportPatch::status(status))
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))?;
        info!(report_id = %id, %status, "Report status changed");
        Ok(store.saved(report))
    }

    /// Change the status of several reports at once. Unknown ids are skipped.
    pub async fn bulk_set_status(&self, ids: &[String], status: ReportStatus) -> Saved<usize> {
        let mut store = self.store.lock().await;
        let count = ids
            .iter()
            .filter(|id| store.update_report(id, ReportPatch::status(status)).is_some())
            .count();
        info!(count, %status, "Bulk status update");
        store.saved(count)
    }

    /// Edit a report. The merged result must pass submission validation.
    pub async fn edit(&self, id: &str, patch: ReportPatch) -> AppResult<Saved<Report>> {
        let mut store = self.store.lock().await;
        let mut merged = store
            .get_report(id)
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))?;
        patch.clone().apply(&mut merged);

        self.validate_draft(&NewReport {
            title: merged.title,
            name: merged.name,
            location: merged.location,
            description: merged.description,
            files: merged.files,
            priority: Some(merged.priority),
            gps_coordinates: merged.gps_coordinates,
        })?;

        let report = store
            .update_report(id, patch)
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))?;
        Ok(store.saved(report))
    }

    /// Delete a report and its conversation.
    pub async fn delete(&self, id: &str) -> AppResult<Saved<()>> {
        let mut store = self.store.lock().await;
        if store.delete_report(id) {
            Ok(store.saved(()))
        } else {
            Err(AppError::ReportNotFound(id.to_string()))
        }
    }

    /// Aggregate counts at the store's current time.
    pub async fn stats(&self) -> ReportStats {
        let store = self.store.lock().await;
        store.reports_stats(store.now())
    }

    /// Reports with coordinates within `radius_km` of `center`, nearest first.
    pub async fn nearby(&self, center: Coordinates, radius_km: f64) -> AppResult<Vec<NearbyReport>> {
        if !center.is_valid() {
            return Err(AppError::BadRequest("Invalid coordinates".to_string()));
        }
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(AppError::BadRequest("Invalid search radius".to_string()));
        }
        Ok(self.store.lock().await.reports_near(&center, radius_km))
    }

    /// Attach coordinates to an existing report.
    pub async fn attach_gps(&self, id: &str, coordinates: Coordinates) -> AppResult<Saved<Report>> {
        if !coordinates.is_valid() {
            return Err(AppError::BadRequest("Invalid coordinates".to_string()));
        }
        let mut store = self.store.lock().await;
        let report = store
            .attach_gps(id, coordinates)
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))?;
        Ok(store.saved(report))
    }

    /// Distinct locations and titles containing `query`, at most five.
    pub async fn search_suggestions(&self, query: &str) -> Vec<SearchSuggestion> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < MIN_SUGGESTION_QUERY {
            return Vec::new();
        }

        let reports = self.store.lock().await.all_reports();
        let mut suggestions: Vec<SearchSuggestion> = Vec::new();
        for report in &reports {
            let candidates = [
                SearchSuggestion::Location(report.location.clone()),
                SearchSuggestion::Title(report.title.clone()),
            ];
            for suggestion in candidates {
                if suggestion.text().to_lowercase().contains(&query)
                    && !suggestions.contains(&suggestion)
                {
                    suggestions.push(suggestion);
                }
            }
            if suggestions.len() >= MAX_SUGGESTIONS {
                break;
            }
        }
        suggestions.truncate(MAX_SUGGESTIONS);
        suggestions
    }

    /// Submission limits in use.
    #[must_use]
    pub const fn config(&self) -> &ReportsConfig {
        &self.config
    }

    fn validate_draft(&self, data: &NewReport) -> AppResult<()> {
        let mut result = self.validator.validate(|field| match field {
            "title" => Some(data.title.as_str()),
            "location" => Some(data.location.as_str()),
            "description" => Some(data.description.as_str()),
            "name" => Some(data.name.as_str()),
            _ => None,
        });

        let limit_mb = self.config.max_file_size / (1024 * 1024);
        if let Some(file) = data
            .files
            .iter()
            .find(|f| f.size > self.config.max_file_size)
        {
            result.errors.insert_first(
                "files",
                format!("File {} exceeds the {limit_mb} MB limit", file.name),
            );
        }

        result.into_result()
    }
}

fn report_validator(config: &ReportsConfig) -> FormValidator {
    FormValidator::new()
        .field(
            "title",
            FieldRule::new()
                .required()
                .min_length(config.title_min)
                .max_length(config.title_max)
                .label("Title"),
        )
        .field(
            "location",
            FieldRule::new()
                .required()
                .min_length(config.location_min)
                .max_length(config.location_max)
                .label("Location"),
        )
        .field(
            "description",
            FieldRule::new()
                .required()
                .min_length(config.description_min)
                .max_length(config.description_max)
                .label("Description"),
        )
        .field(
            "name",
            FieldRule::new()
                .required()
                .min_length(config.name_min)
                .max_length(config.name_max)
                .label("Name"),
        )
}
