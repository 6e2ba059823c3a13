pub mod rating;
pub mod recommendation;

pub use rating::{MovieId, Rating, RatingScale, RatingsDataset, RatingsFormat, UserId};
pub use recommendation::{
    table_from_snapshot, table_to_snapshot, Evaluation, Recommendation, RecommendationSet,
    RecommendationTable, SNAPSHOT_BINDING,
};
