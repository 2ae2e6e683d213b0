use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};

use crate::error::AppError;

/// A candidate URL pulled from a sitemap, with its last-modified time.
/// Entries without a usable `<lastmod>` carry the epoch and sort last.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: DateTime<Utc>,
}

/// Fetch a sitemap and extract its entries. A document that cannot be
/// fetched at all is an error; malformed entries inside it are not.
pub async fn fetch_sitemap(sitemap_url: &str) -> Result<Vec<SitemapEntry>, AppError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

    let resp = client
        .get(sitemap_url)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to fetch sitemap: {e}")))?;

    if !resp.status().is_success() {
        return Err(AppError::Upstream(format!(
            "Sitemap fetch returned HTTP {}",
            resp.status().as_u16()
        )));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to read sitemap body: {e}")))?;

    Ok(parse_sitemap(&body))
}

/// Extract `(loc, lastmod)` pairs from a sitemap document, sorted by
/// `lastmod` descending. html5ever's recovering parser handles unmatched or
/// garbled tags; `<url>` blocks without a `<loc>` are skipped.
pub fn parse_sitemap(document: &str) -> Vec<SitemapEntry> {
    let doc = Html::parse_document(document);
    let url_sel = Selector::parse("url").expect("static selector");
    let loc_sel = Selector::parse("loc").expect("static selector");
    let lastmod_sel = Selector::parse("lastmod").expect("static selector");

    let mut entries: Vec<SitemapEntry> = doc
        .select(&url_sel)
        .filter_map(|node| {
            let loc = node
                .select(&loc_sel)
                .next()
                .map(|l| l.text().collect::<String>().trim().to_string())
                .filter(|l| !l.is_empty())?;

            let lastmod = node
                .select(&lastmod_sel)
                .next()
                .map(|l| l.text().collect::<String>())
                .map(|t| parse_lastmod(t.trim()))
                .unwrap_or(DateTime::UNIX_EPOCH);

            Some(SitemapEntry { url: loc, lastmod })
        })
        .collect();

    entries.sort_by(|a, b| b.lastmod.cmp(&a.lastmod));
    entries
}

/// Sitemaps use the W3C datetime subset: full RFC 3339 or a bare date.
fn parse_lastmod(raw: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return dt.and_utc();
        }
    }
    DateTime::UNIX_EPOCH
}
