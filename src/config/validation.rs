use crate::config::types::{
    CategoryEntry, CityEntry, Config, CrawlerConfig, OutputConfig, SelectorConfig, SiteConfig,
    UserAgentConfig,
};
use crate::storage::Codepage;
use crate::frontier::listing_page_count;
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use scraper::Selector;
use std::collections::BTreeMap;
use url::Url;

/// Listing pages a single category may expand to without `max-listing-pages`
pub const MAX_LISTING_PAGES_PER_CATEGORY: u32 = 10_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_headers(&config.headers)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    validate_selectors(&config.selectors)?;
    validate_categories(config)?;
    validate_cities(&config.cities)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 500 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 500, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.max_listing_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_listing_pages must be at least 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user agent cannot be empty".to_string(),
        ));
    }

    HeaderValue::from_str(&config.value).map_err(|_| {
        ConfigError::Validation(format!("user agent is not a valid header: '{}'", config.value))
    })?;

    Ok(())
}

/// Validates the extra request headers
fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }
    Ok(())
}

/// Validates the target site layout
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use HTTP or HTTPS, got '{}'",
            config.base_url
        )));
    }

    if !config.listing_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "listing_path must start with '/', got '{}'",
            config.listing_path
        )));
    }

    if config.page_param.is_empty() {
        return Err(ConfigError::Validation(
            "page_param cannot be empty".to_string(),
        ));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "page_size must be at least 1".to_string(),
        ));
    }

    Codepage::from_label(&config.page_encoding)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    Codepage::from_label(&config.encoding)?;
    Ok(())
}

/// Validates that every selector compiles
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (field, selector) in [
        ("listing-link", &config.listing_link),
        ("name", &config.name),
        ("price", &config.price),
        ("year", &config.year),
        ("city", &config.city),
        ("parameter-row", &config.parameter_row),
        ("parameter-label", &config.parameter_label),
        ("parameter-value", &config.parameter_value),
    ] {
        if Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidSelector {
                field,
                selector: selector.clone(),
            });
        }
    }
    Ok(())
}

/// Validates category entries
///
/// An uncapped category must not expand to more listing pages than
/// [`MAX_LISTING_PAGES_PER_CATEGORY`]; a mistyped item count would otherwise
/// build a huge frontier before the first fetch.
fn validate_categories(config: &Config) -> Result<(), ConfigError> {
    if config.categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[category]] must be configured".to_string(),
        ));
    }

    for entry in &config.categories {
        validate_category_id(&entry.id)?;
        validate_category_size(entry, config)?;
    }

    Ok(())
}

fn validate_category_size(entry: &CategoryEntry, config: &Config) -> Result<(), ConfigError> {
    if config.crawler.max_listing_pages.is_some() {
        return Ok(());
    }

    let pages = listing_page_count(entry.item_count, config.site.page_size);
    if pages > MAX_LISTING_PAGES_PER_CATEGORY {
        return Err(ConfigError::Validation(format!(
            "category '{}' has item-count {} ({} listing pages, limit {}); \
             check the count or set max-listing-pages",
            entry.id, entry.item_count, pages, MAX_LISTING_PAGES_PER_CATEGORY
        )));
    }
    Ok(())
}

/// Validates a category id used as a path segment
fn validate_category_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Validation(
            "category id cannot be empty".to_string(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "category id must contain only ASCII letters, digits, '-' or '_', got '{}'",
            id
        )));
    }

    Ok(())
}

/// Validates the geocoding table
fn validate_cities(cities: &[CityEntry]) -> Result<(), ConfigError> {
    for city in cities {
        if city.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "city name cannot be empty".to_string(),
            ));
        }

        if !(-90.0..=90.0).contains(&city.latitude) || !(-180.0..=180.0).contains(&city.longitude)
        {
            return Err(ConfigError::Validation(format!(
                "coordinates of '{}' are out of range: {}, {}",
                city.name, city.latitude, city.longitude
            )));
        }
    }
    Ok(())
}
