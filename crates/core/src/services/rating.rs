//! Service rating.

use std::collections::BTreeMap;

use civic_common::config::RatingConfig;
use civic_common::{AppError, AppResult, FieldErrors, format_count};
use civic_db::{Saved, SharedStore};
use civic_db::entities::{NewRating, Rating, RatingStats};
use civic_db::repositories::RatingRepository;
use serde::Serialize;
use tracing::info;

/// Shown in place of an average when nothing has been rated.
pub const NO_AVERAGE: &str = "—";

/// Ratings with display helpers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    #[serde(flatten)]
    pub stats: RatingStats,
    /// Number of ratings per star value, every value present.
    pub distribution: BTreeMap<u8, usize>,
}

impl RatingSummary {
    /// Average with one decimal, or [`NO_AVERAGE`].
    #[must_use]
    pub fn average_display(&self) -> String {
        self.stats
            .average
            .map_or_else(|| NO_AVERAGE.to_string(), |avg| format!("{avg:.1}"))
    }

    /// `"1 review"`, `"3 reviews"`.
    #[must_use]
    pub fn total_label(&self) -> String {
        format_count(self.stats.total, "review", "reviews")
    }
}

/// Rating service.
#[derive(Clone)]
pub struct RatingService {
    store: SharedStore,
    config: RatingConfig,
}

impl RatingService {
    #[must_use]
    pub const fn new(store: SharedStore, config: RatingConfig) -> Self {
        Self { store, config }
    }

    /// Record a rating. A blank comment is stored as none.
    pub async fn rate(&self, score: u8, comment: Option<&str>) -> AppResult<Saved<Rating>> {
        let mut errors = FieldErrors::default();
        if !(self.config.min_stars..=self.config.max_stars).contains(&score) {
            errors.insert_first(
                "score",
                format!(
                    "Rating must be between {} and {} stars",
                    self.config.min_stars, self.config.max_stars
                ),
            );
        }

        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        if comment.is_some_and(|c| c.chars().count() > self.config.max_comment_length) {
            errors.insert_first(
                "comment",
                format!(
                    "Comment must be no more than {} characters",
                    self.config.max_comment_length
                ),
            );
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let mut store = self.store.lock().await;
        let rating = store.add_rating(NewRating {
            score,
            comment: comment.map(str::to_string),
        });
        info!(rating_id = %rating.id, score, "Rating recorded");
        Ok(store.saved(rating))
    }

    /// All ratings with average and distribution.
    pub async fn summary(&self) -> RatingSummary {
        let stats = self.store.lock().await.ratings();

        let mut distribution: BTreeMap<u8, usize> = (self.config.min_stars
            ..=self.config.max_stars)
            .map(|star| (star, 0))
            .collect();
        for rating in &stats.ratings {
            *distribution.entry(rating.score).or_default() += 1;
        }

        RatingSummary {
            stats,
            distribution,
        }
    }
}
