use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::quota;
use crate::state::AppState;

/// Aggregate result of one claim + dispatch cycle.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub processed: i64,
    pub success_count: i64,
    pub fail_count: i64,
    pub quota_hit: bool,
    pub message: String,
}

/// Run one batch: compute the quota-bounded claim size, atomically reserve
/// that many eligible items, then dispatch them strictly in claim order.
/// Per-item outcomes are persisted immediately; only setup failures
/// (missing credential, refused token exchange, unreachable store) escape
/// as errors, and those happen before anything is claimed.
pub async fn process_batch(state: &AppState, limit: i64) -> Result<BatchOutcome, AppError> {
    let indexer = state.indexer.as_ref().ok_or_else(|| {
        AppError::BadRequest(
            "No indexing credential configured (set INDEXPING_SERVICE_ACCOUNT_FILE \
             or INDEXPING_ACCESS_TOKEN)"
                .to_string(),
        )
    })?;
    indexer.ensure_token().await?;

    let remaining = quota::remaining(&state.pool, state.config.daily_quota).await?;
    let take = limit.min(remaining);
    if take <= 0 {
        return Ok(BatchOutcome {
            processed: 0,
            success_count: 0,
            fail_count: 0,
            quota_hit: true,
            message: "Daily quota exhausted, nothing claimed".to_string(),
        });
    }

    let batch = db::queue::claim(&state.pool, take).await?;
    if batch.is_empty() {
        return Ok(BatchOutcome {
            processed: 0,
            success_count: 0,
            fail_count: 0,
            quota_hit: false,
            message: "No eligible items".to_string(),
        });
    }

    tracing::debug!("Claimed {} item(s) (quota remaining {remaining})", batch.len());

    let mut processed = 0;
    let mut success_count = 0;
    let mut fail_count = 0;
    let mut quota_hit = false;
    let mut released: Vec<Uuid> = Vec::new();

    for item in &batch {
        // After a quota response, nothing else in this batch is attempted;
        // the remainder goes back to the eligible pool.
        if quota_hit {
            released.push(item.id);
            continue;
        }

        db::queue::record_attempt(&state.pool, item.id).await?;
        processed += 1;

        match indexer.publish(&item.url).await {
            Ok(resp) if (200..300).contains(&resp.status) => {
                db::queue::mark_completed(&state.pool, item.id).await?;
                success_count += 1;
                tracing::info!("Announced {}", item.url);
            }
            Ok(resp) if resp.status == 429 => {
                db::queue::mark_retry(
                    &state.pool,
                    item.id,
                    &format!("Quota exceeded: {}", resp.body),
                    429,
                )
                .await?;
                quota_hit = true;
                tracing::warn!("Quota exceeded announcing {}, backing off 8h", item.url);
            }
            Ok(resp) => {
                db::queue::mark_failed(
                    &state.pool,
                    item.id,
                    &format!("HTTP {}: {}", resp.status, resp.body),
                    Some(resp.status as i32),
                )
                .await?;
                fail_count += 1;
                tracing::warn!("Announcing {} failed with HTTP {}", item.url, resp.status);
            }
            Err(e) if e.status == Some(429) => {
                db::queue::mark_retry(&state.pool, item.id, &e.message, 429).await?;
                quota_hit = true;
                tracing::warn!("Quota exceeded announcing {}, backing off 8h", item.url);
            }
            Err(e) => {
                db::queue::mark_failed(
                    &state.pool,
                    item.id,
                    &e.message,
                    e.status.map(i32::from),
                )
                .await?;
                fail_count += 1;
                tracing::warn!("Announcing {} failed: {}", item.url, e.message);
            }
        }
    }

    db::queue::release(&state.pool, &released).await?;

    let mut message = format!(
        "Processed {processed} item(s): {success_count} succeeded, {fail_count} failed"
    );
    if quota_hit {
        message.push_str(&format!(
            ", stopped early on quota ({} released)",
            released.len()
        ));
    }

    Ok(BatchOutcome {
        processed,
        success_count,
        fail_count,
        quota_hit,
        message,
    })
}
