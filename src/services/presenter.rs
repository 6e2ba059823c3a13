use crate::models::{Recommendation, RecommendationTable, UserId};

/// Shown when the selected user has an empty recommendation list
pub const EMPTY_STATE_MESSAGE: &str =
    "This user has rated every movie in the catalogue; there is nothing left to recommend.";

/// Shown when the selected user is not in the table
pub const UNAVAILABLE_MESSAGE: &str = "No recommendations available for this user.";

/// What the dashboard shows for one selected user
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedRecommendations {
    /// One formatted line per recommendation, best first
    Lines(Vec<String>),
    Empty,
    Unavailable,
}

impl RenderedRecommendations {
    /// Lines to display, empty for the message states
    pub fn lines(&self) -> &[String] {
        match self {
            RenderedRecommendations::Lines(lines) => lines,
            _ => &[],
        }
    }

    /// Message replacing the list, if any
    pub fn message(&self) -> Option<&'static str> {
        match self {
            RenderedRecommendations::Lines(_) => None,
            RenderedRecommendations::Empty => Some(EMPTY_STATE_MESSAGE),
            RenderedRecommendations::Unavailable => Some(UNAVAILABLE_MESSAGE),
        }
    }
}

/// All users in the table, ascending
pub fn enumerate_users(table: &RecommendationTable) -> Vec<UserId> {
    // BTreeMap keys are already unique and sorted
    table.keys().copied().collect()
}

/// The requested user, or the first enumerated one when nothing was requested
pub fn select_user(users: &[UserId], requested: Option<UserId>) -> Option<UserId> {
    requested.or_else(|| users.first().copied())
}

pub fn format_recommendation(rec: &Recommendation) -> String {
    format!(
        "Movie ID: {} | Predicted Rating: {:.2}",
        rec.movie_id, rec.predicted_rating
    )
}

/// Formats the stored recommendations for `user_id` in stored order
pub fn render(table: &RecommendationTable, user_id: UserId) -> RenderedRecommendations {
    match table.get(&user_id) {
        None => RenderedRecommendations::Unavailable,
        Some(recs) if recs.is_empty() => RenderedRecommendations::Empty,
        Some(recs) => RenderedRecommendations::Lines(recs.iter().map(format_recommendation).collect()),
    }
}
