use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Identifier of a user in the ratings dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

/// Identifier of a movie in the ratings dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(pub u32);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for MovieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single explicit rating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub value: f64,
}

/// Inclusive bounds of the rating scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingScale {
    pub min: f64,
    pub max: f64,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 0.5, max: 5.0 }
    }
}

impl RatingScale {
    pub fn new(min: f64, max: f64) -> AppResult<Self> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(AppError::InvalidInput(format!(
                "rating scale must satisfy min < max, got [{}, {}]",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// On-disk layout of a ratings file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingsFormat {
    /// MovieLens `ratings.csv`: comma separated, header row
    #[default]
    Csv,
    /// MovieLens 100k `u.data`: tab separated, no header
    Tsv,
}

/// Validated ratings with the lookups needed for fitting and ranking
#[derive(Debug)]
pub struct RatingsDataset {
    ratings: Vec<Rating>,
    scale: RatingScale,
    users: Vec<UserId>,
    movies: Vec<MovieId>,
    rated_by_user: HashMap<UserId, HashSet<MovieId>>,
}

impl RatingsDataset {
    /// Builds the dataset, rejecting empty input
    pub fn new(ratings: Vec<Rating>, scale: RatingScale) -> AppResult<Self> {
        if ratings.is_empty() {
            return Err(AppError::InvalidInput("dataset contains no ratings".to_string()));
        }

        let mut rated_by_user: HashMap<UserId, HashSet<MovieId>> = HashMap::new();
        let mut movie_set = HashSet::new();
        for rating in &ratings {
            rated_by_user
                .entry(rating.user_id)
                .or_default()
                .insert(rating.movie_id);
            movie_set.insert(rating.movie_id);
        }

        let mut users: Vec<UserId> = rated_by_user.keys().copied().collect();
        users.sort_unstable();
        let mut movies: Vec<MovieId> = movie_set.into_iter().collect();
        movies.sort_unstable();

        Ok(Self {
            ratings,
            scale,
            users,
            movies,
            rated_by_user,
        })
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    pub fn scale(&self) -> RatingScale {
        self.scale
    }

    /// Users in ascending order
    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Movies in ascending order
    pub fn movies(&self) -> &[MovieId] {
        &self.movies
    }

    pub fn has_rated(&self, user_id: UserId, movie_id: MovieId) -> bool {
        self.rated_by_user
            .get(&user_id)
            .is_some_and(|movies| movies.contains(&movie_id))
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(user: u32, movie: u32, value: f64) -> Rating {
        Rating {
            user_id: UserId(user),
            movie_id: MovieId(movie),
            value,
        }
    }

    #[test]
    fn test_dataset_indexes() {
        let dataset = RatingsDataset::new(
            vec![rating(3, 10, 4.0), rating(1, 20, 3.5), rating(3, 20, 2.0)],
            RatingScale::default(),
        )
        .unwrap();

        assert_eq!(dataset.users(), &[UserId(1), UserId(3)]);
        assert_eq!(dataset.movies(), &[MovieId(10), MovieId(20)]);
        assert!(dataset.has_rated(UserId(3), MovieId(10)));
        assert!(!dataset.has_rated(UserId(1), MovieId(10)));
        assert!(!dataset.has_rated(UserId(9), MovieId(10)));
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let result = RatingsDataset::new(vec![], RatingScale::default());
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_rating_scale() {
        let scale = RatingScale::new(1.0, 5.0).unwrap();
        assert!(scale.contains(1.0));
        assert!(scale.contains(5.0));
        assert!(!scale.contains(5.5));
        assert_eq!(scale.clip(7.2), 5.0);
        assert_eq!(scale.clip(-1.0), 1.0);
        assert!(RatingScale::new(5.0, 5.0).is_err());
        assert!(RatingScale::new(f64::NAN, 5.0).is_err());
    }

    #[test]
    fn test_ids_display_bare_number() {
        assert_eq!(UserId(42).to_string(), "42");
        assert_eq!(MovieId(7).to_string(), "7");
    }
}
