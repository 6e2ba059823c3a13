use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::Html,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::request_id::RequestId;
use crate::models::{Evaluation, Recommendation, UserId};
use crate::services::presenter;

use super::dashboard::{self, Selection};
use super::state::LoadStatus;
use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<LoadStatus> for StatusResponse {
    fn from(status: LoadStatus) -> Self {
        let empty = Self {
            state: "loading",
            started_at: None,
            source: None,
            generated_at: None,
            user_count: None,
            evaluation: None,
            error: None,
        };

        match status {
            LoadStatus::Loading { started_at } => Self {
                started_at: Some(started_at),
                ..empty
            },
            LoadStatus::Ready(set) => Self {
                state: "ready",
                source: Some(set.source),
                generated_at: Some(set.generated_at),
                user_count: Some(set.table.len()),
                evaluation: set.evaluation,
                ..empty
            },
            LoadStatus::Failed { error } => Self {
                state: "failed",
                error: Some(error),
                ..empty
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserRecommendationsResponse {
    pub user_id: UserId,
    pub recommendations: Vec<Recommendation>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// HTML dashboard with the user selector
pub async fn dashboard(
    State(state): State<AppState>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> Html<String> {
    // A query string that does not deserialize (e.g. a repeated `user`) selects nobody
    let selection = match &query {
        Ok(Query(query)) => Selection::parse(query.user.as_deref()),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable dashboard query");
            Selection::Invalid
        }
    };

    let page = match state.status().await {
        LoadStatus::Loading { started_at } => dashboard::loading_page(started_at),
        LoadStatus::Failed { error } => dashboard::failed_page(&error),
        LoadStatus::Ready(set) => dashboard::ready_page(&set, selection),
    };
    Html(page)
}

/// Progress of the recommendation computation
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::from(state.status().await))
}

/// All user ids, ascending
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserId>>> {
    let set = state.recommendations().await?;
    Ok(Json(presenter::enumerate_users(&set.table)))
}

/// Recommendations of a single user, best first
pub async fn get_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<UserRecommendationsResponse>> {
    let user_id = raw_id
        .parse::<u32>()
        .map(UserId)
        .map_err(|_| AppError::InvalidInput(format!("invalid user id `{}`", raw_id)))?;
    let set = state.recommendations().await?;

    let recommendations = set
        .table
        .get(&user_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("no recommendations for user {}", user_id)))?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        count = recommendations.len(),
        "Serving recommendations"
    );

    Ok(Json(UserRecommendationsResponse {
        user_id,
        recommendations,
    }))
}
