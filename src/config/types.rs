use crate::extract::{FieldSpec, Validity};
use serde::Deserialize;

/// Main configuration structure for Listing-Scraper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listing: ListingConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub validity: Validity,
    pub output: OutputConfig,
    pub fields: Vec<FieldSpec>,
}

/// Listing walk configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Listing URL without the price and page parameters
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum price filter; omitted from the URL when unset
    #[serde(rename = "max-price", default)]
    pub max_price: Option<u64>,

    /// Query parameter carrying the price ceiling
    #[serde(rename = "price-param", default = "default_price_param")]
    pub price_param: String,

    /// Query parameter carrying the page number
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// Upper bound on listing pages to walk; unbounded when unset
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Listings shown per page, used to turn a results count into a page count
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Page count assumed when neither the counter nor pagination can be read
    #[serde(rename = "fallback-page-ceiling", default = "default_page_ceiling")]
    pub fallback_page_ceiling: u32,

    /// CSS selector for candidate detail links
    #[serde(rename = "link-selector", default = "default_link_selector")]
    pub link_selector: String,

    /// Substring an href must contain to count as a detail link
    #[serde(rename = "link-pattern")]
    pub link_pattern: String,

    /// CSS selector for the element holding the total results count
    #[serde(rename = "results-count-selector", default)]
    pub results_count_selector: Option<String>,

    /// Text the results count element must contain (e.g. "найдено")
    #[serde(rename = "results-count-contains", default)]
    pub results_count_contains: Option<String>,

    /// CSS selector for pagination links carrying the page parameter
    #[serde(rename = "pagination-selector", default = "default_pagination_selector")]
    pub pagination_selector: String,

    /// Delay between listing pages (milliseconds)
    #[serde(rename = "pagination-delay-ms", default)]
    pub pagination_delay_ms: u64,
}

/// HTTP fetch behavior, shared by listing and detail fetches
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connection establishment timeout (milliseconds)
    #[serde(rename = "connect-timeout-ms", default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Number of retries after the first attempt
    #[serde(rename = "retry-ceiling", default = "default_retry_ceiling")]
    pub retry_ceiling: u32,

    /// Base delay after HTTP 429, doubled on every further attempt (milliseconds)
    #[serde(rename = "rate-limit-backoff-ms", default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Fixed delay after a timeout or transport error (milliseconds)
    #[serde(rename = "transient-backoff-ms", default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,

    /// Bodies shorter than this are treated as stub pages
    #[serde(rename = "min-body-bytes", default = "default_min_body_bytes")]
    pub min_body_bytes: usize,

    /// Skip TLS certificate verification. Weakens the trust boundary; off by default.
    #[serde(rename = "accept-invalid-certs", default)]
    pub accept_invalid_certs: bool,

    #[serde(rename = "pool-max-idle-per-host", default = "default_pool_size")]
    pub pool_max_idle_per_host: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_timeout_ms(),
            retry_ceiling: default_retry_ceiling(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            transient_backoff_ms: default_transient_backoff_ms(),
            min_body_bytes: default_min_body_bytes(),
            accept_invalid_certs: false,
            pool_max_idle_per_host: default_pool_size(),
        }
    }
}

/// How detail pages are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ConcurrencyMode {
    /// Fixed number of workers, each finishing one URL before taking the next
    #[default]
    WorkerPool,
    /// One task multiplexing fetches behind a semaphore gate
    InFlight,
    /// One fetch at a time with a pause after every unit
    Sequential,
}

/// Detail collection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CollectConfig {
    #[serde(default)]
    pub mode: ConcurrencyMode,

    /// Worker count or in-flight limit, depending on the mode
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause after each unit in sequential mode (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Log progress every this many processed records
    #[serde(rename = "progress-every", default = "default_progress_every")]
    pub progress_every: u64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            mode: ConcurrencyMode::default(),
            concurrency: default_concurrency(),
            request_delay_ms: default_request_delay_ms(),
            progress_every: default_progress_every(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the tabular output file
    pub path: String,

    /// Field holding the posting date, normalized and used for ordering
    #[serde(rename = "date-field", default)]
    pub date_field: Option<String>,

    /// chrono format of the posting date as shown on the site
    #[serde(rename = "date-format", default = "default_date_format")]
    pub date_format: String,

    /// Field holding the view count, coerced to an integer
    #[serde(rename = "views-field", default)]
    pub views_field: Option<String>,

    /// Field summarized as the price column
    #[serde(rename = "price-field", default)]
    pub price_field: Option<String>,
}

fn default_price_param() -> String {
    "price_to".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_page_ceiling() -> u32 {
    1200
}

fn default_link_selector() -> String {
    "a[href]".to_string()
}

fn default_pagination_selector() -> String {
    "a[href*='page=']".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_retry_ceiling() -> u32 {
    3
}

fn default_rate_limit_backoff_ms() -> u64 {
    1000
}

fn default_transient_backoff_ms() -> u64 {
    500
}

fn default_min_body_bytes() -> usize {
    500
}

fn default_pool_size() -> usize {
    20
}

fn default_concurrency() -> usize {
    12
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_progress_every() -> u64 {
    100
}

fn default_date_format() -> String {
    "%d %B %Y".to_string()
}
