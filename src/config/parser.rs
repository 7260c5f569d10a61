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
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so two runs writing the same CSV can be told apart
/// when they used different settings.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
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
    use crate::storage::SchemaVariant;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
max-concurrent-fetches = 10
cooldown-secs = 5
max-retries = 2

[user-agent]
value = "TestCrawler/1.0"

[headers]
Accept-Language = "ru"

[site]
base-url = "https://example.com"
page-size = 25

[output]
columns = "geo"

[[category]]
id = "toyota"
item-count = 120

[[city]]
name = "Almaty"
latitude = 43.25
longitude = 76.95
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_concurrent_fetches, 10);
        assert_eq!(config.crawler.cooldown_secs, 5);
        assert_eq!(config.crawler.max_retries, 2);
        assert_eq!(config.user_agent.value, "TestCrawler/1.0");
        assert_eq!(config.headers.get("Accept-Language").unwrap(), "ru");
        assert_eq!(config.site.page_size, 25);
        assert_eq!(config.output.columns, SchemaVariant::Geo);
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[0].item_count, 120);
        assert_eq!(config.cities[0].name, "Almaty");
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse_config(
            r#"
[[category]]
id = "lexus"
item-count = 3
"#,
        )
        .unwrap();

        assert_eq!(config.crawler.max_concurrent_fetches, 50);
        assert_eq!(config.crawler.cooldown_secs, 30);
        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(config.site.base_url, "https://kolesa.kz");
        assert_eq!(config.site.page_size, 20);
        assert_eq!(config.output.encoding, "windows-1251");
        assert_eq!(config.output.columns, SchemaVariant::Minimal);
        assert!(config.output.sync_each_record);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawler]
max-concurrent-fetches = 0

[[category]]
id = "toyota"
item-count = 10
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
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
