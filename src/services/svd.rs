use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::{MovieId, Rating, RatingScale, UserId},
};

/// Hyperparameters of the factorization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvdParams {
    pub n_factors: usize,
    pub n_epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    /// Standard deviation of the initial factor values
    pub init_std: f64,
    pub seed: u64,
}

impl Default for SvdParams {
    fn default() -> Self {
        Self {
            n_factors: 100,
            n_epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            init_std: 0.1,
            seed: 42,
        }
    }
}

impl SvdParams {
    pub fn validate(&self) -> AppResult<()> {
        if self.n_factors == 0 {
            return Err(AppError::InvalidInput("n_factors must be positive".to_string()));
        }
        if self.n_epochs == 0 {
            return Err(AppError::InvalidInput("n_epochs must be positive".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        if !self.init_std.is_finite() || self.init_std < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "init_std must be non-negative, got {}",
                self.init_std
            )));
        }
        Ok(())
    }
}

/// Biased matrix factorization fitted with stochastic gradient descent
///
/// A rating is estimated as `mu + b_u + b_i + p_u . q_i`, where `mu` is the
/// global mean, `b_u`/`b_i` are user and item biases and `p_u`/`q_i` are the
/// latent factor vectors. Factor matrices are stored row-major in flat
/// vectors of `n_factors` columns.
#[derive(Debug, Clone)]
pub struct SvdModel {
    scale: RatingScale,
    n_factors: usize,
    global_mean: f64,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<MovieId, usize>,
    user_bias: Vec<f64>,
    item_bias: Vec<f64>,
    user_factors: Vec<f64>,
    item_factors: Vec<f64>,
}

impl SvdModel {
    /// Fits the model on `training`, visiting ratings in stored order each epoch
    pub fn fit(training: &[Rating], scale: RatingScale, params: SvdParams) -> AppResult<Self> {
        params.validate()?;
        if training.is_empty() {
            return Err(AppError::Execution("training set is empty".to_string()));
        }

        let mut user_index = HashMap::new();
        let mut item_index = HashMap::new();
        // Dense (user, item, rating) triples
        let triples: Vec<(usize, usize, f64)> = training
            .iter()
            .map(|r| {
                let next_user = user_index.len();
                let u = *user_index.entry(r.user_id).or_insert(next_user);
                let next_item = item_index.len();
                let i = *item_index.entry(r.movie_id).or_insert(next_item);
                (u, i, r.value)
            })
            .collect();

        let k = params.n_factors;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut model = Self {
            scale,
            n_factors: k,
            global_mean: training.iter().map(|r| r.value).sum::<f64>() / training.len() as f64,
            user_bias: vec![0.0; user_index.len()],
            item_bias: vec![0.0; item_index.len()],
            user_factors: normal_vec(&mut rng, user_index.len() * k, params.init_std)?,
            item_factors: normal_vec(&mut rng, item_index.len() * k, params.init_std)?,
            user_index,
            item_index,
        };

        tracing::info!(
            ratings = triples.len(),
            users = model.user_index.len(),
            movies = model.item_index.len(),
            factors = k,
            epochs = params.n_epochs,
            "Fitting SVD model"
        );

        let lr = params.learning_rate;
        let reg = params.regularization;
        for epoch in 0..params.n_epochs {
            let mut squared_error = 0.0;

            for &(u, i, rating) in &triples {
                let err = rating - model.raw_estimate(u, i);
                squared_error += err * err;

                let bu = model.user_bias[u];
                let bi = model.item_bias[i];
                model.user_bias[u] += lr * (err - reg * bu);
                model.item_bias[i] += lr * (err - reg * bi);

                let pu = &mut model.user_factors[u * k..(u + 1) * k];
                let qi = &mut model.item_factors[i * k..(i + 1) * k];
                for (puf, qif) in pu.iter_mut().zip(qi.iter_mut()) {
                    let (p, q) = (*puf, *qif);
                    *puf += lr * (err * q - reg * p);
                    *qif += lr * (err * p - reg * q);
                }
            }

            if !squared_error.is_finite() || !model.is_finite() {
                return Err(AppError::Execution(format!(
                    "training diverged at epoch {}; lower the learning rate",
                    epoch + 1
                )));
            }

            tracing::debug!(
                epoch = epoch + 1,
                train_rmse = (squared_error / triples.len() as f64).sqrt(),
                "SVD epoch complete"
            );
        }

        Ok(model)
    }

    /// Estimated rating clipped to the rating scale
    ///
    /// Users or movies unseen during fitting contribute no bias or factor
    /// terms, so a fully unknown pair falls back to the global mean.
    pub fn predict(&self, user_id: UserId, movie_id: MovieId) -> f64 {
        let user = self.user_index.get(&user_id).copied();
        let item = self.item_index.get(&movie_id).copied();

        let estimate = match (user, item) {
            (Some(u), Some(i)) => self.raw_estimate(u, i),
            (Some(u), None) => self.global_mean + self.user_bias[u],
            (None, Some(i)) => self.global_mean + self.item_bias[i],
            (None, None) => self.global_mean,
        };

        self.scale.clip(estimate)
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.user_index.contains_key(&user_id)
    }

    fn raw_estimate(&self, u: usize, i: usize) -> f64 {
        let k = self.n_factors;
        let dot: f64 = self.user_factors[u * k..(u + 1) * k]
            .iter()
            .zip(&self.item_factors[i * k..(i + 1) * k])
            .map(|(p, q)| p * q)
            .sum();
        self.global_mean + self.user_bias[u] + self.item_bias[i] + dot
    }

    fn is_finite(&self) -> bool {
        self.user_bias
            .iter()
            .chain(&self.item_bias)
            .chain(&self.user_factors)
            .chain(&self.item_factors)
            .all(|v| v.is_finite())
    }
}

/// Samples `len` values from N(0, std)
fn normal_vec(rng: &mut StdRng, len: usize, std: f64) -> AppResult<Vec<f64>> {
    let normal = Normal::new(0.0, std)
        .map_err(|e| AppError::InvalidInput(format!("init_std {}: {}", std, e)))?;
    Ok(rng.sample_iter(normal).take(len).collect())
}
