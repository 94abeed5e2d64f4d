//! Rating repository.

use civic_common::{SortOrder, sort_by_key};
use tracing::info;

use crate::entities::{NewRating, Rating, RatingStats};
use crate::store::{Collection, DataStore};

/// Rating persistence.
pub trait RatingRepository {
    /// Append a rating stamped now.
    fn add_rating(&mut self, data: NewRating) -> Rating;

    /// Ratings newest first with their count and rounded mean.
    fn ratings(&self) -> RatingStats;
}

impl RatingRepository for DataStore {
    fn add_rating(&mut self, data: NewRating) -> Rating {
        let id = self.next_id(self.ratings.iter().map(|r| r.id.as_str()));
        let rating = Rating {
            id,
            score: data.score,
            comment: data.comment,
            created_at: self.now(),
        };

        self.ratings.push(rating.clone());
        self.persist(&[Collection::Ratings]);
        info!(score = rating.score, "Rating added");
        rating
    }

    fn ratings(&self) -> RatingStats {
        let total = self.ratings.len();
        let average = (total > 0).then(|| {
            let sum: u32 = self.ratings.iter().map(|r| u32::from(r.score)).sum();
            (f64::from(sum) / total as f64 * 10.0).round() / 10.0
        });

        RatingStats {
            ratings: sort_by_key(&self.ratings, |r| r.created_at, SortOrder::Desc),
            total,
            average,
        }
    }
}
