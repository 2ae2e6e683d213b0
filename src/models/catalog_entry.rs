use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Change-tracking row owned by the catalog. `needs_index` is cleared by the
/// fresh-candidate claim, so each change is announced at most once.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub slug: String,
    pub priority: String,
    pub needs_index: bool,
    pub updated_at: DateTime<Utc>,
}
