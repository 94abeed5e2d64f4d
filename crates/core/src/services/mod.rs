//! Business logic services.

#![allow(missing_docs)]

pub mod chat;
pub mod dashboard;
pub mod escalation;
pub mod export;
pub mod gps;
pub mod maintenance;
pub mod priority;
pub mod profile;
pub mod rating;
pub mod report;

pub use chat::{
    AUTO_REPLIES, ChatService, MAX_MESSAGE_LENGTH, RandomReplyPicker, ReplyPicker,
    SendMessageInput, SequentialReplyPicker,
};
pub use dashboard::{
    Activity, ActivityKind, Alert, AlertLevel, DashboardData, DashboardRefresher,
    DashboardService, Trend, compute_dashboard,
};
pub use escalation::{AttentionSummary, EscalationPolicy, EscalationService, age_in_days};
pub use export::{ExportDocument, ExportFormat, ExportRange, ExportService};
pub use gps::{
    FixedLocationProvider, Geocoder, GeolocationError, GpsEnricher, GpsService, LocatedPosition,
    LocationProvider, NominatimGeocoder, NoopGeocoder, Position, describe_location,
};
pub use maintenance::StoreFlushTask;
pub use priority::PriorityDetector;
pub use profile::{ProfileService, UpdateProfileInput};
pub use rating::{RatingService, RatingSummary};
pub use report::{ReportDraft, ReportEnricher, ReportService, SYSTEM_SENDER, SearchSuggestion};
