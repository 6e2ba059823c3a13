//! Recommendation table sources
//!
//! A source produces the table the dashboard presents. `preload` reads and
//! validates the input document so startup can fail fast; `produce` does the
//! (possibly slow) work of building the table and runs once per process.

use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{table_to_snapshot, RatingsFormat, RecommendationSet, RecommendationTable},
    services::{evaluation, loader::Loader, svd::SvdParams, top_n},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationSource: Send + Sync {
    /// Reads and validates the input document
    fn preload(&self) -> AppResult<()>;

    /// Builds the recommendation table
    async fn produce(&self) -> AppResult<RecommendationSet>;

    /// Source name for logging and status reporting
    fn name(&self) -> &'static str;
}

/// Fits an SVD model on a ratings file and ranks unseen movies per user
pub struct SvdSource {
    loader: Arc<Loader>,
    ratings_path: PathBuf,
    format: RatingsFormat,
    params: SvdParams,
    top_n: usize,
    holdout_fraction: f64,
    export_path: Option<PathBuf>,
}

impl SvdSource {
    pub fn new(
        loader: Arc<Loader>,
        ratings_path: PathBuf,
        format: RatingsFormat,
        params: SvdParams,
        top_n: usize,
    ) -> Self {
        Self {
            loader,
            ratings_path,
            format,
            params,
            top_n,
            holdout_fraction: 0.0,
            export_path: None,
        }
    }

    /// Report holdout RMSE/MAE alongside the table; 0 disables
    pub fn with_holdout(mut self, fraction: f64) -> Self {
        self.holdout_fraction = fraction;
        self
    }

    /// Write the finished table to `path` as a snapshot document
    pub fn with_export(mut self, path: Option<PathBuf>) -> Self {
        self.export_path = path;
        self
    }

    /// Clone for moving onto a blocking thread
    fn clone_for_task(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            ratings_path: self.ratings_path.clone(),
            format: self.format,
            params: self.params,
            top_n: self.top_n,
            holdout_fraction: self.holdout_fraction,
            export_path: self.export_path.clone(),
        }
    }

    fn compute(&self) -> AppResult<RecommendationSet> {
        let dataset = self.loader.load_ratings(&self.ratings_path, self.format)?;

        let evaluation = if self.holdout_fraction > 0.0 {
            Some(evaluation::evaluate_holdout(
                &dataset,
                self.params,
                self.holdout_fraction,
            )?)
        } else {
            None
        };

        let table = top_n::compute_recommendations(&dataset, self.params, self.top_n)?;

        if let Some(path) = &self.export_path {
            if let Err(e) = export_snapshot(&table, path) {
                tracing::warn!(error = %e, "Snapshot export failed");
            }
        }

        Ok(RecommendationSet::new(table, self.name()).with_evaluation(evaluation))
    }
}

#[async_trait::async_trait]
impl RecommendationSource for SvdSource {
    fn preload(&self) -> AppResult<()> {
        self.loader
            .load_ratings(&self.ratings_path, self.format)
            .map(|_| ())
    }

    async fn produce(&self) -> AppResult<RecommendationSet> {
        let source = self.clone_for_task();
        tokio::task::spawn_blocking(move || source.compute())
            .await
            .map_err(|e| AppError::Execution(format!("computation task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "svd"
    }
}

/// Serves a precomputed table from a snapshot document
pub struct SnapshotSource {
    loader: Arc<Loader>,
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(loader: Arc<Loader>, path: PathBuf) -> Self {
        Self { loader, path }
    }
}

#[async_trait::async_trait]
impl RecommendationSource for SnapshotSource {
    fn preload(&self) -> AppResult<()> {
        self.loader.load_snapshot(&self.path).map(|_| ())
    }

    async fn produce(&self) -> AppResult<RecommendationSet> {
        let table = self.loader.load_snapshot(&self.path)?;
        Ok(RecommendationSet::new(
            RecommendationTable::clone(&table),
            self.name(),
        ))
    }

    fn name(&self) -> &'static str {
        "snapshot"
    }
}

/// Writes `table` as a snapshot document readable by [`SnapshotSource`]
pub fn export_snapshot(table: &RecommendationTable, path: &std::path::Path) -> AppResult<()> {
    let json = serde_json::to_string_pretty(&table_to_snapshot(table))
        .map_err(|e| AppError::Internal(format!("snapshot serialization error: {}", e)))?;
    std::fs::write(path, json).map_err(|e| AppError::document(path, e.to_string()))?;
    tracing::info!(path = %path.display(), users = table.len(), "Snapshot exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovieId, RatingScale, UserId};
    use std::io::Write;

    fn ratings_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userId,movieId,rating,timestamp").unwrap();
        for user in 1..=5 {
            for movie in 1..=6 {
                if user == 5 && movie > 2 {
                    continue;
                }
                writeln!(file, "{},{},{},0", user, movie, 1.0 + 0.5 * movie as f64).unwrap();
            }
        }
        file
    }

    fn params() -> SvdParams {
        SvdParams {
            n_factors: 3,
            n_epochs: 30,
            learning_rate: 0.02,
            ..SvdParams::default()
        }
    }

    fn loader() -> Arc<Loader> {
        Arc::new(Loader::new(RatingScale::default()))
    }

    #[tokio::test]
    async fn test_svd_source_produces_table() {
        let file = ratings_file();
        let source = SvdSource::new(
            loader(),
            file.path().to_path_buf(),
            RatingsFormat::Csv,
            params(),
            5,
        )
        .with_holdout(0.2);

        source.preload().unwrap();
        let set = source.produce().await.unwrap();

        assert_eq!(set.source, "svd");
        assert_eq!(set.table.len(), 5);
        assert_eq!(set.table[&UserId(5)].len(), 4);
        assert!(set.table[&UserId(1)].is_empty());
        assert!(set.evaluation.is_some());
    }

    #[tokio::test]
    async fn test_svd_source_missing_file_fails_preload() {
        let source = SvdSource::new(
            loader(),
            PathBuf::from("missing/ratings.csv"),
            RatingsFormat::Csv,
            params(),
            5,
        );
        assert!(matches!(
            source.preload(),
            Err(AppError::DocumentFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_produce_reuses_preloaded_dataset() {
        let file = ratings_file();
        let path = file.path().to_path_buf();
        let source = SvdSource::new(loader(), path.clone(), RatingsFormat::Csv, params(), 5);

        source.preload().unwrap();
        drop(file);
        assert!(!path.exists());

        let set = source.produce().await.unwrap();
        assert_eq!(set.table.len(), 5);
    }

    #[tokio::test]
    async fn test_export_then_snapshot_source_round_trip() {
        let file = ratings_file();
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("top_n.json");

        let computed = SvdSource::new(
            loader(),
            file.path().to_path_buf(),
            RatingsFormat::Csv,
            params(),
            3,
        )
        .with_export(Some(export.clone()))
        .produce()
        .await
        .unwrap();

        let snapshot = SnapshotSource::new(loader(), export);
        snapshot.preload().unwrap();
        let restored = snapshot.produce().await.unwrap();

        assert_eq!(restored.source, "snapshot");
        assert_eq!(restored.table, computed.table);
        assert_eq!(restored.table[&UserId(5)][0].movie_id, MovieId(6));
    }

    #[tokio::test]
    async fn test_snapshot_source_contract_violation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"recommendations": {{}}}}"#).unwrap();

        let source = SnapshotSource::new(loader(), file.path().to_path_buf());
        assert!(matches!(
            source.preload(),
            Err(AppError::ContractViolation(_))
        ));
    }
}
