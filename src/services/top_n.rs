use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{Recommendation, RecommendationTable, RatingsDataset, UserId},
    services::svd::{SvdModel, SvdParams},
};

/// Builds the per-user top-`n` table from a ratings dataset
///
/// Fits an SVD model on every rating, then scores each movie a user has not
/// rated yet and keeps the `n` best. Users who have rated every known movie
/// map to an empty list.
pub fn compute_recommendations(
    dataset: &RatingsDataset,
    params: SvdParams,
    n: usize,
) -> AppResult<RecommendationTable> {
    if n == 0 {
        return Err(AppError::InvalidInput("top-n size must be at least 1".to_string()));
    }

    let start = Instant::now();
    let model = SvdModel::fit(dataset.ratings(), dataset.scale(), params)?;

    let table: RecommendationTable = dataset
        .users()
        .par_iter()
        .map(|&user_id| (user_id, top_n_for_user(&model, dataset, user_id, n)))
        .collect();

    tracing::info!(
        users = table.len(),
        empty_users = table.values().filter(|recs| recs.is_empty()).count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Recommendations computed"
    );

    Ok(table)
}

/// Ranks the movies `user_id` has not rated, best first
pub fn top_n_for_user(
    model: &SvdModel,
    dataset: &RatingsDataset,
    user_id: UserId,
    n: usize,
) -> Vec<Recommendation> {
    let mut candidates: Vec<Recommendation> = dataset
        .movies()
        .iter()
        .filter(|&&movie_id| !dataset.has_rated(user_id, movie_id))
        .map(|&movie_id| Recommendation::new(movie_id, model.predict(user_id, movie_id)))
        .collect();

    candidates.sort_by(rank_order);
    candidates.truncate(n);
    candidates
}

/// Descending predicted rating, ties broken by ascending movie id
fn rank_order(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.predicted_rating
        .total_cmp(&a.predicted_rating)
        .then_with(|| a.movie_id.cmp(&b.movie_id))
}
