use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::{MovieId, UserId};
use crate::error::{AppError, AppResult};

/// Name of the binding a snapshot document must carry
pub const SNAPSHOT_BINDING: &str = "top_n";

/// One ranked recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub movie_id: MovieId,
    pub predicted_rating: f64,
}

impl Recommendation {
    pub fn new(movie_id: MovieId, predicted_rating: f64) -> Self {
        Self {
            movie_id,
            predicted_rating,
        }
    }
}

/// Per-user recommendations, best first
pub type RecommendationTable = BTreeMap<UserId, Vec<Recommendation>>;

/// Holdout accuracy of the fitted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub rmse: f64,
    pub mae: f64,
    pub test_size: usize,
}

/// A recommendation table together with where it came from
#[derive(Debug, Clone)]
pub struct RecommendationSet {
    pub table: RecommendationTable,
    pub source: &'static str,
    pub generated_at: DateTime<Utc>,
    pub evaluation: Option<Evaluation>,
}

impl RecommendationSet {
    pub fn new(table: RecommendationTable, source: &'static str) -> Self {
        Self {
            table,
            source,
            generated_at: Utc::now(),
            evaluation: None,
        }
    }

    pub fn with_evaluation(mut self, evaluation: Option<Evaluation>) -> Self {
        self.evaluation = evaluation;
        self
    }
}

/// Encodes a table as a snapshot document: `{"top_n": {"<user>": [[movie, rating], ...]}}`
pub fn table_to_snapshot(table: &RecommendationTable) -> Value {
    let users: Map<String, Value> = table
        .iter()
        .map(|(user_id, recs)| {
            let pairs: Vec<Value> = recs
                .iter()
                .map(|rec| json!([rec.movie_id.0, rec.predicted_rating]))
                .collect();
            (user_id.to_string(), Value::Array(pairs))
        })
        .collect();

    json!({ SNAPSHOT_BINDING: users })
}

/// Extracts the table bound to `top_n` in a snapshot document
///
/// Any shape mismatch is reported as a contract violation naming the
/// offending user or entry.
pub fn table_from_snapshot(document: &Value) -> AppResult<RecommendationTable> {
    let binding = document
        .as_object()
        .ok_or_else(|| violation("snapshot root is not an object".to_string()))?
        .get(SNAPSHOT_BINDING)
        .ok_or_else(|| violation(format!("snapshot does not bind `{}`", SNAPSHOT_BINDING)))?;

    let users = binding
        .as_object()
        .ok_or_else(|| violation(format!("`{}` is not a mapping", SNAPSHOT_BINDING)))?;

    let mut table = RecommendationTable::new();
    for (key, entries) in users {
        let user_id = key
            .parse::<u32>()
            .map(UserId)
            .map_err(|_| violation(format!("user id `{}` is not an integer", key)))?;

        let entries = entries
            .as_array()
            .ok_or_else(|| violation(format!("recommendations for user {} are not a list", key)))?;

        let mut recs = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let rec = parse_pair(entry).ok_or_else(|| {
                violation(format!(
                    "entry {} for user {} is not a [movie id, rating] pair",
                    i, key
                ))
            })?;
            recs.push(rec);
        }

        table.insert(user_id, recs);
    }

    Ok(table)
}

fn parse_pair(entry: &Value) -> Option<Recommendation> {
    let pair = entry.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    let movie_id = u32::try_from(pair[0].as_u64()?).ok()?;
    let rating = pair[1].as_f64().filter(|r| r.is_finite())?;
    Some(Recommendation::new(MovieId(movie_id), rating))
}

fn violation(message: String) -> AppError {
    AppError::ContractViolation(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> RecommendationTable {
        let mut table = RecommendationTable::new();
        table.insert(
            UserId(1),
            vec![
                Recommendation::new(MovieId(42), 4.8),
                Recommendation::new(MovieId(17), 4.5),
            ],
        );
        table.insert(UserId(2), vec![]);
        table
    }

    #[test]
    fn test_snapshot_layout() {
        let snapshot = table_to_snapshot(&sample_table());
        assert_eq!(
            snapshot,
            json!({ "top_n": { "1": [[42, 4.8], [17, 4.5]], "2": [] } })
        );
    }

    #[test]
    fn test_snapshot_preserves_order_and_empty_users() {
        let table = table_from_snapshot(&table_to_snapshot(&sample_table())).unwrap();
        assert_eq!(table, sample_table());
    }

    #[test]
    fn test_snapshot_ignores_extra_bindings() {
        let document = json!({ "top_n": { "5": [[1, 3.0]] }, "rmse": 0.87 });
        let table = table_from_snapshot(&document).unwrap();
        assert_eq!(table[&UserId(5)], vec![Recommendation::new(MovieId(1), 3.0)]);
    }

    #[test]
    fn test_missing_binding_is_contract_violation() {
        let err = table_from_snapshot(&json!({ "predictions": {} })).unwrap_err();
        assert!(matches!(err, AppError::ContractViolation(_)));
        assert!(err.to_string().contains("top_n"));
    }

    #[test]
    fn test_wrong_shapes_are_contract_violations() {
        let documents = [
            json!([1, 2, 3]),
            json!({ "top_n": [1, 2] }),
            json!({ "top_n": { "alice": [] } }),
            json!({ "top_n": { "1": { "42": 4.8 } } }),
            json!({ "top_n": { "1": [[42]] } }),
            json!({ "top_n": { "1": [["42", 4.8]] } }),
            json!({ "top_n": { "1": [[42, "high"]] } }),
        ];

        for document in documents {
            let result = table_from_snapshot(&document);
            assert!(
                matches!(result, Err(AppError::ContractViolation(_))),
                "expected violation for {}",
                document
            );
        }
    }
}
