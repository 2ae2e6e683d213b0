use url::Url;

use crate::db;
use crate::db::queue::EnqueueItem;
use crate::error::AppError;
use crate::sitemap;
use crate::state::AppState;

/// Claim up to `limit` fresh catalog entries and enqueue their canonical
/// URLs with the catalog-supplied priority. An empty claim is a normal
/// zero result.
pub async fn schedule_fresh(state: &AppState, limit: i64) -> Result<u64, AppError> {
    let entries = db::catalog::claim_fresh(&state.pool, limit).await?;
    if entries.is_empty() {
        return Ok(0);
    }

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        match canonical_url(&state.config.site_base_url, &entry.slug) {
            Ok(url) => items.push(EnqueueItem {
                url,
                priority: entry.priority,
            }),
            Err(e) => {
                tracing::warn!("Skipping catalog entry with bad slug {:?}: {e}", entry.slug);
            }
        }
    }

    let queued = db::queue::enqueue(&state.pool, &items).await?;
    tracing::info!("Scheduled {queued} fresh URL(s) for announcement");
    Ok(queued)
}

/// Seed the queue from a sitemap: the `limit` most recently modified
/// entries are enqueued at normal priority.
pub async fn seed_from_sitemap(
    state: &AppState,
    sitemap_url: &str,
    limit: usize,
) -> Result<u64, AppError> {
    let entries = sitemap::fetch_sitemap(sitemap_url).await?;

    let items: Vec<EnqueueItem> = entries
        .into_iter()
        .take(limit)
        .map(|e| EnqueueItem {
            url: e.url,
            priority: "normal".to_string(),
        })
        .collect();

    let queued = db::queue::enqueue(&state.pool, &items).await?;
    tracing::info!("Seeded {queued} URL(s) from sitemap");
    Ok(queued)
}

fn canonical_url(base: &str, slug: &str) -> Result<String, String> {
    if slug.is_empty() || slug.contains('/') || slug.contains("..") {
        return Err("slug must be a single path segment".to_string());
    }
    let joined = format!("{}/products/{slug}", base.trim_end_matches('/'));
    Url::parse(&joined)
        .map(|u| u.to_string())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_url_joins_base_and_slug() {
        assert_eq!(
            canonical_url("https://shop.example.com", "red-mug").unwrap(),
            "https://shop.example.com/products/red-mug"
        );
        assert_eq!(
            canonical_url("https://shop.example.com/", "red-mug").unwrap(),
            "https://shop.example.com/products/red-mug"
        );
    }

    #[test]
    fn canonical_url_rejects_escaping_slugs() {
        assert!(canonical_url("https://shop.example.com", "").is_err());
        assert!(canonical_url("https://shop.example.com", "a/b").is_err());
        assert!(canonical_url("https://shop.example.com", "..").is_err());
        assert!(canonical_url("not a base", "ok").is_err());
    }
}
