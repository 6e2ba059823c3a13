use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};
use crate::models::RecommendationSet;
use crate::services::RecommendationSource;

/// Progress of the one-off table computation
#[derive(Debug, Clone)]
pub enum LoadStatus {
    Loading { started_at: DateTime<Utc> },
    Ready(Arc<RecommendationSet>),
    Failed { error: String },
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<RwLock<AppStateInner>>,
}

/// Inner state, written once when the computation finishes
pub struct AppStateInner {
    pub status: LoadStatus,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Creates state that is still waiting for its table
    pub fn new() -> Self {
        Self::with_status(LoadStatus::Loading {
            started_at: Utc::now(),
        })
    }

    /// Creates state around an already computed table
    pub fn ready(set: RecommendationSet) -> Self {
        Self::with_status(LoadStatus::Ready(Arc::new(set)))
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::with_status(LoadStatus::Failed {
            error: error.into(),
        })
    }

    fn with_status(status: LoadStatus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppStateInner { status })),
        }
    }

    pub async fn status(&self) -> LoadStatus {
        self.inner.read().await.status.clone()
    }

    /// The computed table, or the reason it cannot be served yet
    pub async fn recommendations(&self) -> AppResult<Arc<RecommendationSet>> {
        match self.status().await {
            LoadStatus::Ready(set) => Ok(set),
            LoadStatus::Loading { .. } => Err(AppError::Unavailable(
                "recommendations are still being computed".to_string(),
            )),
            LoadStatus::Failed { error } => Err(AppError::Internal(error)),
        }
    }

    /// Runs `source` once in the background and records the outcome
    pub fn spawn_load(&self, source: Arc<dyn RecommendationSource>) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            tracing::info!(source = source.name(), "Computing recommendations");

            let status = match source.produce().await {
                Ok(set) => {
                    tracing::info!(
                        source = set.source,
                        users = set.table.len(),
                        "Recommendations ready"
                    );
                    LoadStatus::Ready(Arc::new(set))
                }
                Err(e) => {
                    tracing::error!(source = source.name(), error = %e, "Recommendation computation failed");
                    LoadStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            state.inner.write().await.status = status;
        })
    }
}
