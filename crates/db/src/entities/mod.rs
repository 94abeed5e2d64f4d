//! Stored entities.

pub mod chat_message;
pub mod escalation;
pub mod profile;
pub mod rating;
pub mod report;

pub use chat_message::{ChatMessage, NewChatMessage, SenderRole};
pub use escalation::{Escalation, EscalationTarget, EscalationType, NewEscalation};
pub use profile::{Profile, ProfilePatch, Role};
pub use rating::{NewRating, Rating, RatingStats};
pub use report::{Attachment, NewReport, Priority, Report, ReportPatch, ReportStatus};
