use sqlx::PgPool;

use crate::models::CatalogEntry;

/// Atomically claim up to `limit` entries flagged as needing announcement,
/// clearing the flag in the same statement. SKIP LOCKED keeps overlapping
/// scheduler runs from handing out the same entry twice.
pub async fn claim_fresh(pool: &PgPool, limit: i64) -> Result<Vec<CatalogEntry>, sqlx::Error> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, CatalogEntry>(
        "UPDATE catalog_entries SET needs_index = false
         WHERE id IN (
             SELECT id FROM catalog_entries
             WHERE needs_index
             ORDER BY updated_at DESC
             LIMIT $1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
