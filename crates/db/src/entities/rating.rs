//! Service rating entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A service-quality rating. Ratings are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    /// Stars, 1 to 5.
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data for a new rating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRating {
    pub score: u8,
    pub comment: Option<String>,
}

/// Ratings with their aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    /// Newest first.
    pub ratings: Vec<Rating>,
    pub total: usize,
    /// Mean score rounded to one decimal, `None` without ratings.
    pub average: Option<f64>,
}
