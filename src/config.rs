use std::path::PathBuf;

use serde::Deserialize;

use crate::models::{RatingScale, RatingsFormat};
use crate::services::svd::SvdParams;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Ratings dataset the model is fitted on
    #[serde(default = "default_ratings_path")]
    pub ratings_path: PathBuf,

    /// Layout of the ratings file (`csv` or `tsv`)
    #[serde(default)]
    pub ratings_format: RatingsFormat,

    /// Where to download the ratings file from when it is missing locally
    pub ratings_url: Option<String>,

    /// Precomputed recommendation snapshot; replaces model fitting when set
    pub snapshot_path: Option<PathBuf>,

    /// Write the computed table here as a snapshot
    pub snapshot_export_path: Option<PathBuf>,

    /// Number of recommendations kept per user
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_svd_factors")]
    pub svd_factors: usize,

    #[serde(default = "default_svd_epochs")]
    pub svd_epochs: usize,

    #[serde(default = "default_svd_learning_rate")]
    pub svd_learning_rate: f64,

    #[serde(default = "default_svd_regularization")]
    pub svd_regularization: f64,

    #[serde(default = "default_svd_init_std")]
    pub svd_init_std: f64,

    #[serde(default = "default_svd_seed")]
    pub svd_seed: u64,

    #[serde(default = "default_rating_min")]
    pub rating_min: f64,

    #[serde(default = "default_rating_max")]
    pub rating_max: f64,

    /// Share of ratings held out to report RMSE/MAE; 0 disables evaluation
    #[serde(default)]
    pub holdout_fraction: f64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_ratings_path() -> PathBuf {
    PathBuf::from("data/ratings.csv")
}

fn default_top_n() -> usize {
    5
}

fn default_svd_factors() -> usize {
    100
}

fn default_svd_epochs() -> usize {
    20
}

fn default_svd_learning_rate() -> f64 {
    0.005
}

fn default_svd_regularization() -> f64 {
    0.02
}

fn default_svd_init_std() -> f64 {
    0.1
}

fn default_svd_seed() -> u64 {
    42
}

fn default_rating_min() -> f64 {
    0.5
}

fn default_rating_max() -> f64 {
    5.0
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.top_n == 0 {
            anyhow::bail!("TOP_N must be at least 1");
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            anyhow::bail!(
                "HOLDOUT_FRACTION must be in [0, 1), got {}",
                self.holdout_fraction
            );
        }
        RatingScale::new(self.rating_min, self.rating_max)?;
        self.svd_params().validate()?;
        Ok(())
    }

    pub fn rating_scale(&self) -> anyhow::Result<RatingScale> {
        Ok(RatingScale::new(self.rating_min, self.rating_max)?)
    }

    pub fn svd_params(&self) -> SvdParams {
        SvdParams {
            n_factors: self.svd_factors,
            n_epochs: self.svd_epochs,
            learning_rate: self.svd_learning_rate,
            regularization: self.svd_regularization,
            init_std: self.svd_init_std,
            seed: self.svd_seed,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
