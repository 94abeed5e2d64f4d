//! One repository trait per stored concern, all implemented by [`DataStore`](crate::DataStore).

pub mod chat;
pub mod escalation;
pub mod profile;
pub mod rating;
pub mod report;

pub use chat::ChatRepository;
pub use escalation::EscalationRepository;
pub use profile::ProfileRepository;
pub use rating::RatingRepository;
pub use report::{NearbyReport, ReportQuery, ReportRepository, ReportStats, SortBy};
