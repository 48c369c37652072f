//! Records appended to the result store

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request metadata attached to every record under `#debug`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    /// Persistent id of the task that produced the record
    pub request_id: Option<i64>,
    pub url: String,
    /// URL after redirects (empty when nothing was loaded)
    pub loaded_url: String,
    pub method: String,
    pub retry_count: u32,
    pub error_messages: Vec<String>,
    pub status_code: Option<u16>,
}

/// One harvested title
///
/// Every built-in field is always present; extraction misses are empty
/// strings. Extension output that does not name a built-in field lands in
/// `extra` and is serialized alongside the built-in keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleRecord {
    pub url: String,
    pub id: String,
    pub title: String,
    pub original_title: String,
    pub description: String,
    pub genres: String,
    pub country: String,
    pub runtime: String,
    pub rating: String,
    pub rating_count: String,
    pub director: String,
    pub stars: String,
    pub year: String,
    pub certificate: String,
    #[serde(rename = "#debug")]
    pub debug: DebugInfo,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl TitleRecord {
    /// Merges extension output over the extracted fields
    ///
    /// Keys naming a built-in field (by their serialized name) replace its
    /// value; any other key is kept as an extra field.
    pub fn apply_extension(&mut self, fields: BTreeMap<String, String>) {
        for (key, value) in fields {
            match self.builtin_mut(&key) {
                Some(slot) => *slot = value,
                None => {
                    self.extra.insert(key, value);
                }
            }
        }
    }

    fn builtin_mut(&mut self, key: &str) -> Option<&mut String> {
        let slot = match key {
            "url" => &mut self.url,
            "id" => &mut self.id,
            "title" => &mut self.title,
            "originalTitle" => &mut self.original_title,
            "description" => &mut self.description,
            "genres" => &mut self.genres,
            "country" => &mut self.country,
            "runtime" => &mut self.runtime,
            "rating" => &mut self.rating,
            "ratingCount" => &mut self.rating_count,
            "director" => &mut self.director,
            "stars" => &mut self.stars,
            "year" => &mut self.year,
            "certificate" => &mut self.certificate,
            _ => return None,
        };
        Some(slot)
    }
}

/// Stand-in record for a page that could not be fetched or parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    #[serde(rename = "#isFailed")]
    pub is_failed: bool,
    #[serde(rename = "#debug")]
    pub debug: DebugInfo,
}

impl FailedRecord {
    pub fn new(debug: DebugInfo) -> Self {
        Self {
            is_failed: true,
            debug,
        }
    }
}

/// Anything the result store accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Title(Box<TitleRecord>),
    Failed(FailedRecord),
}

impl Record {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Source URL of the record
    pub fn url(&self) -> &str {
        match self {
            Self::Title(record) => &record.url,
            Self::Failed(record) => &record.debug.url,
        }
    }

    pub fn debug(&self) -> &DebugInfo {
        match self {
            Self::Title(record) => &record.debug,
            Self::Failed(record) => &record.debug,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Title(record) => serde_json::to_string(record),
            Self::Failed(record) => serde_json::to_string(record),
        }
    }
}

impl From<TitleRecord> for Record {
    fn from(record: TitleRecord) -> Self {
        Self::Title(Box::new(record))
    }
}

impl From<FailedRecord> for Record {
    fn from(record: FailedRecord) -> Self {
        Self::Failed(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_overrides_builtin() {
        let mut record = TitleRecord {
            year: "1994".to_string(),
            ..Default::default()
        };

        let mut fields = BTreeMap::new();
        fields.insert("year".to_string(), "1999".to_string());
        fields.insert("poster".to_string(), "/img/p.jpg".to_string());
        record.apply_extension(fields);

        assert_eq!(record.year, "1999");
        assert_eq!(record.extra.get("poster").map(String::as_str), Some("/img/p.jpg"));
        assert!(!record.extra.contains_key("year"));
    }

    #[test]
    fn test_title_record_keys() {
        let mut record = TitleRecord {
            original_title: "Le Samouraï".to_string(),
            rating_count: "12345".to_string(),
            ..Default::default()
        };
        record.extra.insert("poster".to_string(), "p.jpg".to_string());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["originalTitle"], "Le Samouraï");
        assert_eq!(json["ratingCount"], "12345");
        assert_eq!(json["poster"], "p.jpg");
        assert_eq!(json["#debug"]["method"], "");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_failed_record_shape() {
        let record = FailedRecord::new(DebugInfo {
            url: "https://example.test/title/tt0000001".to_string(),
            method: "GET".to_string(),
            error_messages: vec!["HTTP 404".to_string()],
            status_code: Some(404),
            ..Default::default()
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["#isFailed"], true);
        assert_eq!(json["#debug"]["statusCode"], 404);
        assert_eq!(json["#debug"]["errorMessages"][0], "HTTP 404");
    }

    #[test]
    fn test_record_accessors() {
        let failed: Record = FailedRecord::new(DebugInfo {
            url: "https://example.test/x".to_string(),
            ..Default::default()
        })
        .into();
        assert!(failed.is_failed());
        assert_eq!(failed.url(), "https://example.test/x");

        let title: Record = TitleRecord::default().into();
        assert!(!title.is_failed());
    }
}
