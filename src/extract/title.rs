//! Title-page and parental-guide extraction

use crate::extract::Document;
use crate::output::{DebugInfo, TitleRecord};
use once_cell::sync::Lazy;
use regex::Regex;

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("number pattern is valid"));

/// Characters left behind by mis-decoded summary markup
const MOJIBAKE: &[char] = &['\u{00C2}', '\u{00BB}', '\u{FFFD}'];

/// Certificate shown on a parental-guide page
///
/// The list layout yields its items joined with `", "`; otherwise the whole
/// certification block is returned trimmed. Empty when the block is missing.
pub fn extract_certificate(doc: &Document) -> String {
    let items: Vec<String> = doc
        .texts("#certificates .ipl-inline-list__item")
        .iter()
        .map(|item| collapse_whitespace(item))
        .filter(|item| !item.is_empty())
        .collect();

    if !items.is_empty() {
        return items.join(", ");
    }

    doc.text("#certificates")
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// Builds the record for a title page
///
/// Every field the page lacks is left empty.
pub fn extract_title_record(
    doc: &Document,
    url: &str,
    certificate: &str,
    debug: DebugInfo,
) -> TitleRecord {
    let title = doc
        .text(".title_wrapper h1")
        .map(|t| collapse_whitespace(&t))
        .unwrap_or_default();

    let year = FIRST_NUMBER
        .find(&title)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let runtime = labeled_value(doc, "#titleDetails div", "Runtime")
        .map(|v| truncate_after(&v, "min"))
        .unwrap_or_default();

    let rating = doc
        .text(".ratingValue")
        .map(|t| t.split('/').next().unwrap_or_default().trim().to_string())
        .unwrap_or_default();

    let rating_count = doc
        .text("[itemprop=\"ratingCount\"]")
        .map(|t| t.chars().filter(|c| c.is_ascii_digit()).collect())
        .unwrap_or_default();

    let description = doc
        .text_without(".summary_text", ".see-more, a[href*=\"plotsummary\"]")
        .map(|t| clean_description(&t))
        .unwrap_or_default();

    let stars = labeled_value(doc, ".credit_summary_item", "Stars")
        .map(|v| v.split('|').next().unwrap_or_default().trim().to_string())
        .unwrap_or_default();

    let director = labeled_value(doc, ".credit_summary_item", "Director").unwrap_or_default();

    let genres = labeled_value(doc, "#titleStoryLine div", "Genres")
        .map(|v| comma_join(&v))
        .unwrap_or_default();

    let country = labeled_value(doc, "#titleDetails div", "Country")
        .map(|v| comma_join(&v))
        .unwrap_or_default();

    let original_title = doc
        .text(".originalTitle")
        .map(|t| collapse_whitespace(&t.replace("(original title)", "")))
        .unwrap_or_default();

    let id = doc
        .attr("meta[property=pageId]", "content")
        .unwrap_or_default();

    TitleRecord {
        url: url.to_string(),
        id,
        title,
        original_title,
        description,
        genres,
        country,
        runtime,
        rating,
        rating_count,
        director,
        stars,
        year,
        certificate: certificate.to_string(),
        debug,
        extra: Default::default(),
    }
}

/// Value of a labelled row: everything after the heading's colon
fn labeled_value(doc: &Document, container: &str, label: &str) -> Option<String> {
    let row = doc.labeled_text(container, "h4", label)?;
    let row = collapse_whitespace(&row);
    let value = match row.split_once(':') {
        Some((_, rest)) => rest,
        None => row.trim_start_matches(label),
    };
    Some(value.trim().to_string())
}

fn truncate_after(text: &str, marker: &str) -> String {
    match text.find(marker) {
        Some(idx) => text[..idx + marker.len()].to_string(),
        None => text.to_string(),
    }
}

fn comma_join(text: &str) -> String {
    text.split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn clean_description(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !MOJIBAKE.contains(c)).collect();
    collapse_whitespace(&stripped)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
