use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Fixed-width token following `/title/` in an item link
static TITLE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/title/(.{9})").expect("title path pattern is valid"));

/// Identifier of a single title, e.g. `tt0111161`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(String);

impl TitleId {
    /// Extracts the identifier embedded in an href or URL
    ///
    /// Returns `None` when the text has no `/title/` segment or fewer than
    /// nine characters follow it.
    ///
    /// ```
    /// use reel_harvest::url::TitleId;
    ///
    /// let id = TitleId::from_href("/title/tt0111161/?ref_=adv_li_tt").unwrap();
    /// assert_eq!(id.as_str(), "tt0111161");
    /// ```
    pub fn from_href(href: &str) -> Option<Self> {
        TITLE_PATH
            .captures(href)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL of the parental-guide page for this title on the site of `base`
    pub fn parental_guide_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        base.join(&format!("/title/{}/parentalguide", self.0))
    }

    /// Canonical title page URL on the site of `base`
    pub fn title_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        base.join(&format!("/title/{}", self.0))
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
