use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{QueueItem, QueueStats};

/// Bound on stored failure detail.
pub const MAX_ERROR_LEN: usize = 500;

#[derive(Debug, Clone)]
pub struct EnqueueItem {
    pub url: String,
    pub priority: String,
}

/// Upsert items by URL. Existing rows are left untouched, so re-enqueueing a
/// `completed` or `failed` URL never resurrects it. Returns the number of
/// rows actually inserted.
pub async fn enqueue(pool: &PgPool, items: &[EnqueueItem]) -> Result<u64, sqlx::Error> {
    if items.is_empty() {
        return Ok(0);
    }

    let urls: Vec<String> = items.iter().map(|i| i.url.clone()).collect();
    let priorities: Vec<String> = items.iter().map(|i| i.priority.clone()).collect();

    let result = sqlx::query(
        "INSERT INTO queue_items (url, priority)
         SELECT u, p FROM UNNEST($1::text[], $2::text[]) AS t(u, p)
         ON CONFLICT (url) DO NOTHING",
    )
    .bind(&urls)
    .bind(&priorities)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Atomically claim up to `limit` eligible items using
/// SELECT FOR UPDATE SKIP LOCKED, so overlapping runs never reserve the same
/// row. Eligible means `pending`, or `retry` whose backoff has elapsed.
pub async fn claim(pool: &PgPool, limit: i64) -> Result<Vec<QueueItem>, sqlx::Error> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    let mut items = sqlx::query_as::<_, QueueItem>(
        "UPDATE queue_items SET status = 'processing', updated_at = now()
         WHERE id IN (
             SELECT id FROM queue_items
             WHERE status = 'pending'
                OR (status = 'retry' AND next_retry_at <= now())
             ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'normal' THEN 1 ELSE 2 END,
                      created_at DESC
             LIMIT $1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    // RETURNING does not preserve the subquery order; restore it.
    items.sort_by(|a, b| {
        priority_rank(&a.priority)
            .cmp(&priority_rank(&b.priority))
            .then(b.created_at.cmp(&a.created_at))
    });

    Ok(items)
}

fn priority_rank(priority: &str) -> u8 {
    match priority {
        "high" => 0,
        "normal" => 1,
        _ => 2,
    }
}

/// Stamp the attempt time before dispatching, so quota accounting sees the
/// call even if it fails or the process dies mid-request.
pub async fn record_attempt(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE queue_items SET publish_attempted_at = now(), updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_completed(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE queue_items
         SET status = 'completed',
             last_error = NULL,
             response_status = 200,
             next_retry_at = NULL,
             updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Quota-exceeded outcome: back off for 8 hours, then re-eligible.
pub async fn mark_retry(
    pool: &PgPool,
    id: Uuid,
    error: &str,
    status_code: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE queue_items
         SET status = 'retry',
             next_retry_at = now() + interval '8 hours',
             last_error = $2,
             response_status = $3,
             updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(truncate_error(error))
    .bind(status_code)
    .execute(pool)
    .await?;
    Ok(())
}

/// Terminal failure. Not retried automatically; manual delete + re-enqueue
/// is the only way back.
pub async fn mark_failed(
    pool: &PgPool,
    id: Uuid,
    error: &str,
    status_code: Option<i32>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE queue_items
         SET status = 'failed',
             last_error = $2,
             response_status = $3,
             updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(truncate_error(error))
    .bind(status_code)
    .execute(pool)
    .await?;
    Ok(())
}

/// Return claimed-but-unattempted items to the eligible pool without penalty.
pub async fn release(pool: &PgPool, ids: &[Uuid]) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "UPDATE queue_items SET status = 'pending', updated_at = now()
         WHERE id = ANY($1)",
    )
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(())
}

/// Attempts inside the rolling 24-hour quota window. Only the latest attempt
/// per URL is retained, so a URL retried more than once in the window counts
/// once.
pub async fn attempts_in_window(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT count(*) FROM queue_items
         WHERE publish_attempted_at >= now() - interval '24 hours'",
    )
    .fetch_one(pool)
    .await
}

pub async fn stats(pool: &PgPool) -> Result<QueueStats, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, count(*) FROM queue_items GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut stats = QueueStats::default();
    for (status, count) in rows {
        match status.as_str() {
            "pending" => stats.pending = count,
            "processing" => stats.processing = count,
            "completed" => stats.completed = count,
            "failed" => stats.failed = count,
            "retry" => stats.retry = count,
            _ => {}
        }
        stats.total += count;
    }
    Ok(stats)
}

pub async fn list(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as::<_, QueueItem>(
                "SELECT * FROM queue_items WHERE status = $1
                 ORDER BY created_at DESC LIMIT $2",
            )
            .bind(status)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, QueueItem>(
                "SELECT * FROM queue_items ORDER BY created_at DESC LIMIT $1",
            )
            .bind(limit)
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM queue_items WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub fn truncate_error(msg: &str) -> String {
    msg.chars().take(MAX_ERROR_LEN).collect()
}
