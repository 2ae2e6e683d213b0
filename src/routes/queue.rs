use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::ApiAuth;
use crate::db;
use crate::db::queue::EnqueueItem;
use crate::dispatch;
use crate::error::AppError;
use crate::models::{QueueItem, QueueStats};
use crate::quota;
use crate::scheduler;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct AddToQueue {
    pub urls: Vec<String>,
}

#[derive(Deserialize)]
pub struct ScheduleFresh {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct SeedSitemap {
    pub sitemap_url: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ProcessBatch {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct ItemsParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counts: QueueStats,
    pub quota_remaining: i64,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub processed: i64,
    pub success_count: i64,
    pub fail_count: i64,
    pub quota_hit: bool,
    pub message: String,
}

const STATUSES: [&str; 5] = ["pending", "processing", "completed", "failed", "retry"];

pub async fn add_to_queue(
    _auth: ApiAuth,
    State(state): State<SharedState>,
    Json(req): Json<AddToQueue>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.urls.is_empty() {
        return Err(AppError::BadRequest("urls must not be empty".to_string()));
    }

    let mut items = Vec::with_capacity(req.urls.len());
    for url in &req.urls {
        url::Url::parse(url)
            .map_err(|e| AppError::BadRequest(format!("Invalid URL {url:?}: {e}")))?;
        items.push(EnqueueItem {
            url: url.clone(),
            priority: "normal".to_string(),
        });
    }

    let queued = db::queue::enqueue(&state.pool, &items).await?;
    Ok(Json(json!({ "queued": queued })))
}

pub async fn schedule_fresh(
    _auth: ApiAuth,
    State(state): State<SharedState>,
    Json(req): Json<ScheduleFresh>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = req.limit.unwrap_or(state.config.batch_size).clamp(1, 100);
    let scheduled = scheduler::schedule_fresh(&state, limit).await?;
    Ok(Json(json!({ "scheduled": scheduled })))
}

pub async fn seed_sitemap(
    _auth: ApiAuth,
    State(state): State<SharedState>,
    Json(req): Json<SeedSitemap>,
) -> Result<Json<serde_json::Value>, AppError> {
    let sitemap_url = req
        .sitemap_url
        .or_else(|| state.config.sitemap_url.clone())
        .ok_or_else(|| {
            AppError::BadRequest(
                "No sitemap_url given and INDEXPING_SITEMAP_URL is unset".to_string(),
            )
        })?;
    let limit = req.limit.unwrap_or(50).clamp(1, 1000);

    let queued = scheduler::seed_from_sitemap(&state, &sitemap_url, limit).await?;
    Ok(Json(json!({ "queued": queued })))
}

pub async fn process(
    _auth: ApiAuth,
    State(state): State<SharedState>,
    Json(req): Json<ProcessBatch>,
) -> Result<Json<ProcessResponse>, AppError> {
    let limit = req.limit.unwrap_or(state.config.batch_size).clamp(1, 100);
    let outcome = dispatch::process_batch(&state, limit).await?;

    Ok(Json(ProcessResponse {
        success: true,
        processed: outcome.processed,
        success_count: outcome.success_count,
        fail_count: outcome.fail_count,
        quota_hit: outcome.quota_hit,
        message: outcome.message,
    }))
}

pub async fn stats(
    _auth: ApiAuth,
    State(state): State<SharedState>,
) -> Result<Json<StatsResponse>, AppError> {
    let counts = db::queue::stats(&state.pool).await?;
    let quota_remaining = quota::remaining(&state.pool, state.config.daily_quota).await?;
    Ok(Json(StatsResponse {
        counts,
        quota_remaining,
    }))
}

pub async fn items(
    _auth: ApiAuth,
    State(state): State<SharedState>,
    Query(params): Query<ItemsParams>,
) -> Result<Json<Vec<QueueItem>>, AppError> {
    if let Some(status) = &params.status {
        if !STATUSES.contains(&status.as_str()) {
            return Err(AppError::BadRequest(format!("Unknown status: {status}")));
        }
    }
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let items = db::queue::list(&state.pool, params.status.as_deref(), limit).await?;
    Ok(Json(items))
}

pub async fn delete_item(
    _auth: ApiAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = db::queue::delete(&state.pool, id).await?;
    if !deleted {
        return Err(AppError::NotFound("Queue item not found".to_string()));
    }
    Ok(Json(json!({ "message": "Deleted" })))
}
