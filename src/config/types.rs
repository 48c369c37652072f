use serde::Deserialize;

/// Main configuration structure for Reel-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub extension: Option<ExtensionConfig>,
}

/// Run behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Listing or title URLs the run is seeded from
    #[serde(rename = "start-urls", default)]
    pub start_urls: Vec<StartUrl>,

    /// Total number of records after which the run stops (unlimited if absent)
    #[serde(rename = "max-items", default)]
    pub max_items: Option<u64>,

    /// Maximum number of concurrent page fetches
    #[serde(
        rename = "max-concurrent-pages-open",
        default = "default_max_concurrent_pages_open"
    )]
    pub max_concurrent_pages_open: u32,

    /// Retries after the first failed attempt of a request
    #[serde(rename = "max-request-retries", default = "default_max_request_retries")]
    pub max_request_retries: u32,

    /// Delay between attempts of a failed request (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Queue parental-guide lookups ahead of remaining listing pages
    #[serde(rename = "prioritize-details", default = "default_prioritize_details")]
    pub prioritize_details: bool,
}

fn default_max_concurrent_pages_open() -> u32 {
    10
}

fn default_max_request_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_prioritize_details() -> bool {
    true
}

/// One configured start URL
#[derive(Debug, Clone, Deserialize)]
pub struct StartUrl {
    pub url: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding the queue and the records
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Outbound proxy passed through to the HTTP client
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
}

/// Declarative output extension
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExtensionConfig {
    #[serde(default)]
    pub fields: Vec<ExtensionField>,
}

/// One extra (or overriding) record field read from the title page
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionField {
    /// Record key the value is stored under
    pub name: String,

    /// CSS selector; the first match is used
    pub selector: String,

    /// Attribute to read instead of the element text
    #[serde(default)]
    pub attribute: Option<String>,

    /// Fail the run when the selector matches nothing
    #[serde(default)]
    pub required: bool,
}
