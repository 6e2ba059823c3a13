use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::{
    error::{AppError, AppResult},
    models::{Evaluation, Rating, RatingsDataset},
    services::svd::{SvdModel, SvdParams},
};

/// Randomly splits ratings into `(train, test)` with `test_fraction` held out
pub fn holdout_split(
    ratings: &[Rating],
    test_fraction: f64,
    seed: u64,
) -> AppResult<(Vec<Rating>, Vec<Rating>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AppError::InvalidInput(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut shuffled = ratings.to_vec();
    shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

    let test_size = ((ratings.len() as f64) * test_fraction).ceil() as usize;
    if test_size == 0 || test_size >= shuffled.len() {
        return Err(AppError::InvalidInput(format!(
            "cannot hold out {} of {} ratings",
            test_size,
            ratings.len()
        )));
    }

    let train = shuffled.split_off(test_size);
    Ok((train, shuffled))
}

/// Scores `model` against held-out ratings
pub fn evaluate(model: &SvdModel, test: &[Rating]) -> AppResult<Evaluation> {
    if test.is_empty() {
        return Err(AppError::InvalidInput("test set is empty".to_string()));
    }

    let (squared, absolute) = test.iter().fold((0.0, 0.0), |(sq, abs), r| {
        let err = r.value - model.predict(r.user_id, r.movie_id);
        (sq + err * err, abs + err.abs())
    });

    let n = test.len() as f64;
    Ok(Evaluation {
        rmse: (squared / n).sqrt(),
        mae: absolute / n,
        test_size: test.len(),
    })
}

/// Fits on a holdout split of `dataset` and reports accuracy on the rest
pub fn evaluate_holdout(
    dataset: &RatingsDataset,
    params: SvdParams,
    test_fraction: f64,
) -> AppResult<Evaluation> {
    let (train, test) = holdout_split(dataset.ratings(), test_fraction, params.seed)?;
    let model = SvdModel::fit(&train, dataset.scale(), params)?;
    let evaluation = evaluate(&model, &test)?;

    tracing::info!(
        rmse = evaluation.rmse,
        mae = evaluation.mae,
        train_size = train.len(),
        test_size = evaluation.test_size,
        "Holdout evaluation complete"
    );

    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovieId, RatingScale, UserId};

    fn ratings(count: u32) -> Vec<Rating> {
        (0..count)
            .map(|i| Rating {
                user_id: UserId(i % 7),
                movie_id: MovieId(i % 11),
                value: 1.0 + (i % 5) as f64,
            })
            .collect()
    }

    #[test]
    fn test_split_sizes_and_coverage() {
        let all = ratings(40);
        let (train, test) = holdout_split(&all, 0.25, 1).unwrap();

        assert_eq!(test.len(), 10);
        assert_eq!(train.len(), 30);
        let mut seen: Vec<(UserId, MovieId)> = train
            .iter()
            .chain(&test)
            .map(|r| (r.user_id, r.movie_id))
            .collect();
        let mut expected: Vec<(UserId, MovieId)> =
            all.iter().map(|r| (r.user_id, r.movie_id)).collect();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_split_is_seeded() {
        let all = ratings(40);
        let (_, a) = holdout_split(&all, 0.2, 9).unwrap();
        let (_, b) = holdout_split(&all, 0.2, 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let all = ratings(10);
        assert!(holdout_split(&all, 0.0, 1).is_err());
        assert!(holdout_split(&all, 1.0, 1).is_err());
        assert!(holdout_split(&ratings(1), 0.5, 1).is_err());
    }

    #[test]
    fn test_evaluate_perfect_constant_model() {
        // Every rating is 3.0, so any fitted model predicts 3.0 exactly
        let constant: Vec<Rating> = (0..12)
            .map(|i| Rating {
                user_id: UserId(i % 3),
                movie_id: MovieId(i % 4),
                value: 3.0,
            })
            .collect();
        let params = SvdParams {
            init_std: 0.0,
            ..SvdParams::default()
        };
        let model = SvdModel::fit(&constant, RatingScale::default(), params).unwrap();

        let evaluation = evaluate(&model, &constant).unwrap();
        assert!(evaluation.rmse < 1e-9);
        assert!(evaluation.mae < 1e-9);
        assert_eq!(evaluation.test_size, 12);
    }

    #[test]
    fn test_evaluate_holdout_reports_metrics() {
        let dataset = RatingsDataset::new(ratings(200), RatingScale::default()).unwrap();
        let params = SvdParams {
            n_factors: 5,
            ..SvdParams::default()
        };

        let evaluation = evaluate_holdout(&dataset, params, 0.25).unwrap();
        assert_eq!(evaluation.test_size, 50);
        assert!(evaluation.rmse.is_finite());
        assert!(evaluation.mae <= evaluation.rmse);
    }
}
