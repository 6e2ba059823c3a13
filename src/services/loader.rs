use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::{
    error::{AppError, AppResult},
    models::{
        table_from_snapshot, MovieId, Rating, RatingScale, RatingsDataset, RatingsFormat,
        RecommendationTable, UserId,
    },
};

/// Reads input documents from disk, memoized by path
///
/// Documents are assumed immutable for the life of the loader: a second
/// request for the same path returns the value parsed the first time
/// without touching the filesystem.
pub struct Loader {
    scale: RatingScale,
    ratings: Mutex<HashMap<PathBuf, Arc<RatingsDataset>>>,
    snapshots: Mutex<HashMap<PathBuf, Arc<RecommendationTable>>>,
}

impl Loader {
    pub fn new(scale: RatingScale) -> Self {
        Self {
            scale,
            ratings: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    /// Loads and validates a ratings file
    pub fn load_ratings(
        &self,
        path: impl AsRef<Path>,
        format: RatingsFormat,
    ) -> AppResult<Arc<RatingsDataset>> {
        let path = path.as_ref();
        memoized(&self.ratings, path, || {
            let ratings = read_ratings(path, format, self.scale)?;
            let dataset = RatingsDataset::new(ratings, self.scale)
                .map_err(|_| AppError::document(path, "file contains no ratings"))?;

            tracing::info!(
                path = %path.display(),
                ratings = dataset.len(),
                users = dataset.users().len(),
                movies = dataset.movies().len(),
                "Ratings loaded"
            );
            Ok(dataset)
        })
    }

    /// Loads a precomputed recommendation snapshot
    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> AppResult<Arc<RecommendationTable>> {
        let path = path.as_ref();
        memoized(&self.snapshots, path, || {
            let file = open(path)?;
            let document: serde_json::Value = serde_json::from_reader(BufReader::new(file))
                .map_err(|e| AppError::document(path, format!("invalid JSON: {}", e)))?;
            let table = table_from_snapshot(&document)?;

            tracing::info!(
                path = %path.display(),
                users = table.len(),
                "Recommendation snapshot loaded"
            );
            Ok(table)
        })
    }
}

fn memoized<V>(
    memo: &Mutex<HashMap<PathBuf, Arc<V>>>,
    path: &Path,
    load: impl FnOnce() -> AppResult<V>,
) -> AppResult<Arc<V>> {
    let mut entries = memo
        .lock()
        .map_err(|_| AppError::Internal("loader cache poisoned".to_string()))?;

    if let Some(cached) = entries.get(path) {
        tracing::debug!(path = %path.display(), "Loader cache hit");
        return Ok(Arc::clone(cached));
    }

    let value = Arc::new(load()?);
    entries.insert(path.to_path_buf(), Arc::clone(&value));
    Ok(value)
}

fn open(path: &Path) -> AppResult<File> {
    File::open(path).map_err(|e| AppError::document(path, e.to_string()))
}

fn read_ratings(path: &Path, format: RatingsFormat, scale: RatingScale) -> AppResult<Vec<Rating>> {
    let file = open(path)?;
    let (delimiter, has_headers) = match format {
        RatingsFormat::Csv => (b',', true),
        RatingsFormat::Tsv => (b'\t', false),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut ratings = Vec::new();
    for (index, row) in reader.records().enumerate() {
        // Line numbers are 1-based and count the header row
        let line = index + 1 + usize::from(has_headers);
        let row = row.map_err(|e| AppError::document(path, format!("line {}: {}", line, e)))?;
        if row.len() < 3 {
            return Err(AppError::document(
                path,
                format!("line {}: expected at least 3 columns, found {}", line, row.len()),
            ));
        }

        // Trailing columns such as the timestamp are ignored
        let user_id = parse_field::<u32>(path, line, "user id", &row[0])?;
        let movie_id = parse_field::<u32>(path, line, "movie id", &row[1])?;
        let value = parse_field::<f64>(path, line, "rating", &row[2])?;

        if !value.is_finite() || !scale.contains(value) {
            return Err(AppError::document(
                path,
                format!(
                    "line {}: rating {} outside scale [{}, {}]",
                    line, value, scale.min, scale.max
                ),
            ));
        }

        ratings.push(Rating {
            user_id: UserId(user_id),
            movie_id: MovieId(movie_id),
            value,
        });
    }

    Ok(ratings)
}

fn parse_field<T: FromStr>(path: &Path, line: usize, name: &str, raw: &str) -> AppResult<T> {
    raw.parse().map_err(|_| {
        AppError::document(path, format!("line {}: invalid {} `{}`", line, name, raw))
    })
}
