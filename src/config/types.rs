use serde::Deserialize;
use std::collections::BTreeMap;

use crate::storage::SchemaVariant;

/// Main configuration structure for Kolesa-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(rename = "category", default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(rename = "city", default)]
    pub cities: Vec<CityEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of fetches in flight at once
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent")]
    pub max_concurrent_fetches: u32,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Pause applied to new admissions after a transient failure (seconds)
    #[serde(rename = "cooldown-secs", default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// How many times a transiently failed item is re-enqueued
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on listing pages per category
    #[serde(rename = "max-listing-pages", default)]
    pub max_listing_pages: Option<u32>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            cooldown_secs: default_cooldown(),
            max_retries: default_max_retries(),
            max_listing_pages: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Full `User-Agent` header value
    #[serde(default = "default_user_agent")]
    pub value: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: default_user_agent(),
        }
    }
}

/// Target site layout
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Absolute base address every relative link is resolved against
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Listing path; `{category}` is replaced by the category id
    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,

    /// Query parameter carrying the listing page index
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// Adverts shown per listing page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Encoding used when a response does not declare a charset
    #[serde(rename = "page-encoding", default = "default_encoding")]
    pub page_encoding: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_path: default_listing_path(),
            page_param: default_page_param(),
            page_size: default_page_size(),
            page_encoding: default_encoding(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Codepage of the CSV file
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Column set written to the file
    #[serde(default)]
    pub columns: SchemaVariant,

    /// Call `fsync` after every appended record
    #[serde(rename = "sync-each-record", default = "default_true")]
    pub sync_each_record: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            columns: SchemaVariant::default(),
            sync_each_record: true,
        }
    }
}

/// CSS selectors used by the default extractor
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Links to advert pages on a listing page
    #[serde(rename = "listing-link", default = "default_listing_link")]
    pub listing_link: String,

    #[serde(default = "default_name_selector")]
    pub name: String,

    #[serde(default = "default_price_selector")]
    pub price: String,

    #[serde(default = "default_year_selector")]
    pub year: String,

    #[serde(default = "default_city_selector")]
    pub city: String,

    /// One label/value row of the advert's parameter list
    #[serde(rename = "parameter-row", default = "default_parameter_row")]
    pub parameter_row: String,

    #[serde(rename = "parameter-label", default = "default_parameter_label")]
    pub parameter_label: String,

    #[serde(rename = "parameter-value", default = "default_parameter_value")]
    pub parameter_value: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_link: default_listing_link(),
            name: default_name_selector(),
            price: default_price_selector(),
            year: default_year_selector(),
            city: default_city_selector(),
            parameter_row: default_parameter_row(),
            parameter_label: default_parameter_label(),
            parameter_value: default_parameter_value(),
        }
    }
}

/// A listing category (usually a brand) and its advert count
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    /// Path segment identifying the category (e.g., "toyota")
    pub id: String,

    /// Number of adverts the site reports for this category
    #[serde(rename = "item-count")]
    pub item_count: u64,
}

/// Known coordinates of a city, used for geocoding
#[derive(Debug, Clone, Deserialize)]
pub struct CityEntry {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

fn default_max_concurrent() -> u32 {
    50
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_cooldown() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.001 (windows; U; NT4.0; en-US; rv:1.0) Gecko/25250101".to_string()
}

fn default_base_url() -> String {
    "https://kolesa.kz".to_string()
}

fn default_listing_path() -> String {
    "/cars/{category}/".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_encoding() -> String {
    "windows-1251".to_string()
}

fn default_true() -> bool {
    true
}

fn default_listing_link() -> String {
    "a.list-link.ddl_product_link".to_string()
}

fn default_name_selector() -> String {
    "h1.offer__title".to_string()
}

fn default_price_selector() -> String {
    ".offer__price".to_string()
}

fn default_year_selector() -> String {
    "h1.offer__title .year".to_string()
}

fn default_city_selector() -> String {
    ".offer__location".to_string()
}

fn default_parameter_row() -> String {
    ".offer__parameters dl".to_string()
}

fn default_parameter_label() -> String {
    "dt".to_string()
}

fn default_parameter_value() -> String {
    "dd".to_string()
}
