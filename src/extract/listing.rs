//! Listing-page extraction: result count and item links

use crate::extract::Document;
use crate::url::TitleId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Results shown per listing page
pub const PAGE_SIZE: u64 = 50;

const RESULT_COUNT_SELECTOR: &str = ".desc span";
const ITEM_LINK_SELECTOR: &str = ".lister-list .lister-item a";

/// "1-50 of 1,234 titles." → "1,234"
static TOTAL_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"of\s+(\d+[.,]?\d*[.,]?\d*)").expect("result count pattern is valid")
});

/// Parses the total result count out of a listing summary line
///
/// Thousands separators (`,` or `.`) are dropped. Returns `None` when the
/// text carries no count.
pub fn parse_total_count(text: &str) -> Option<u64> {
    let caps = TOTAL_COUNT.captures(text)?;
    let digits: String = caps
        .get(1)?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Total result count announced by a listing page
pub fn total_result_count(doc: &Document) -> Option<u64> {
    doc.texts(RESULT_COUNT_SELECTOR)
        .iter()
        .find_map(|text| parse_total_count(text))
}

/// Number of listing pages for a result count
pub fn page_count(total: u64) -> u64 {
    total / PAGE_SIZE
}

/// `start` offsets of the listing pages after the first
///
/// One offset `i * 50 + 1` for every `i` in `1..page_count`.
pub fn page_offsets(total: u64) -> Vec<u64> {
    (1..page_count(total)).map(|i| i * PAGE_SIZE + 1).collect()
}

/// Title ids linked from a listing page, in document order, without repeats
pub fn item_title_ids(doc: &Document) -> Vec<TitleId> {
    let mut seen = HashSet::new();
    doc.attrs(ITEM_LINK_SELECTOR, "href")
        .iter()
        .filter(|href| href.contains("/title/"))
        .filter_map(|href| TitleId::from_href(href))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
