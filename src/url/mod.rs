//! URL handling module for Reel-Harvest
//!
//! This module provides URL normalization, task deduplication keys, query
//! parameter merging for pagination, and title identifier parsing.

mod normalize;
mod title_id;

use crate::state::Stage;
use crate::UrlError;
use url::Url;

// Re-export main functions
pub use normalize::normalize_url;
pub use title_id::TitleId;

/// Builds the deduplication key for a task
///
/// The key combines the normalized URL with the stage label, so the same page
/// can legitimately be queued once per stage (a title URL seeded directly as a
/// parental-guide lookup never collides with its detail fetch).
///
/// # Examples
///
/// ```
/// use reel_harvest::state::Stage;
/// use reel_harvest::url::dedup_key;
/// use url::Url;
///
/// let a = Url::parse("https://www.example.test/list?genre=x#top").unwrap();
/// let b = Url::parse("https://example.test/list/?genre=x").unwrap();
/// assert_eq!(dedup_key(&a, Stage::List).unwrap(), dedup_key(&b, Stage::List).unwrap());
/// ```
pub fn dedup_key(url: &Url, stage: Stage) -> Result<String, UrlError> {
    let normalized = normalize_url(url.as_str())?;
    Ok(format!("{}|{}", stage.to_db_string(), normalized))
}

/// Returns a copy of `url` with `key=value` merged into its query string
///
/// A URL without a query gains `?key=value`; a URL with a query gains
/// `&key=value` and keeps its existing parameters untouched. If `key` is
/// already present its value is replaced.
///
/// # Examples
///
/// ```
/// use reel_harvest::url::with_query_param;
/// use url::Url;
///
/// let url = Url::parse("https://example.test/list?genre=x").unwrap();
/// assert_eq!(
///     with_query_param(&url, "start", "51").as_str(),
///     "https://example.test/list?genre=x&start=51"
/// );
/// ```
pub fn with_query_param(url: &Url, key: &str, value: &str) -> Url {
    let mut merged = url.clone();

    if url.query_pairs().any(|(k, _)| k == key) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut pairs = merged.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(key, value);
    } else {
        merged.query_pairs_mut().append_pair(key, value);
    }

    merged
}
