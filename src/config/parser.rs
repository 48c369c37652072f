use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use reel_harvest::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Start URLs: {}", config.run.start_urls.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded on every run so a resumed run can be traced to the configuration
/// it was started with.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID: &str = r#"
[run]
start-urls = [{ url = "https://www.imdb.com/search/title/?genres=drama" }]
max-items = 100
max-concurrent-pages-open = 5

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./test.db"

[proxy]
url = "http://proxy.local:8080"

[[extension.fields]]
name = "poster"
selector = ".poster img"
attribute = "src"
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.run.start_urls.len(), 1);
        assert_eq!(config.run.max_items, Some(100));
        assert_eq!(config.run.max_concurrent_pages_open, 5);
        assert_eq!(config.user_agent.crawler_name, "TestHarvester");
        assert_eq!(config.proxy.unwrap().url, "http://proxy.local:8080");

        let extension = config.extension.unwrap();
        assert_eq!(extension.fields.len(), 1);
        assert_eq!(extension.fields[0].attribute.as_deref(), Some("src"));
        assert!(!extension.fields[0].required);
    }

    #[test]
    fn test_run_defaults() {
        let content = r#"
[run]
start-urls = [{ url = "https://www.imdb.com/search/title/" }]

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./test.db"
"#;
        let config = parse_config(content).unwrap();

        assert_eq!(config.run.max_items, None);
        assert_eq!(config.run.max_concurrent_pages_open, 10);
        assert_eq!(config.run.max_request_retries, 3);
        assert_eq!(config.run.retry_delay_ms, 1000);
        assert!(config.run.prioritize_details);
        assert!(config.proxy.is_none());
        assert!(config.extension.is_none());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::Io(_)));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_start_urls_is_fatal() {
        let content = VALID.replace(
            r#"start-urls = [{ url = "https://www.imdb.com/search/title/?genres=drama" }]"#,
            "",
        );
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_bad_extension_selector_is_fatal() {
        let content = VALID.replace(".poster img", "div[[");
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidExtension(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
