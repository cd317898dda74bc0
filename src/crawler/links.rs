//! Listing walk and detail link collection
//!
//! This module handles:
//! - Fetching listing pages through a [`ListingSource`]
//! - Discovering how many listing pages exist
//! - Extracting and deduplicating detail-page links
//! - Carrying on past individual page failures

use crate::config::ListingConfig;
use crate::crawler::fetcher::{FailureKind, FetchResult, PageFetcher};
use crate::url::{listing_url_for, normalize_detail_url, page_number_from_href};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Transport for listing pages
///
/// Listing pages may need a different transport than detail pages (for example a
/// browser session that renders scripts), so they get their own seam.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Loads a listing page and returns its HTML
    async fn fetch_listing(&self, url: &Url) -> Result<String, (FailureKind, String)>;

    /// Releases the transport
    async fn close(&self);
}

/// Listing source backed by plain HTTP
pub struct HttpListingSource {
    fetcher: PageFetcher,
}

impl HttpListingSource {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch_listing(&self, url: &Url) -> Result<String, (FailureKind, String)> {
        match self.fetcher.fetch(url.as_str()).await {
            FetchResult::Fetched { body, .. } => Ok(body),
            FetchResult::Failed { kind, detail, .. } => Err((kind, detail)),
        }
    }

    async fn close(&self) {
        self.fetcher.pool().close();
    }
}

/// Outcome of a listing walk
#[derive(Debug, Clone, Default)]
pub struct LinkCollection {
    /// Unique normalized detail URLs
    pub links: BTreeSet<String>,
    /// Number of pages the walk intended to visit
    pub total_pages: u32,
    /// Pages that loaded successfully
    pub pages_visited: u32,
    /// Pages that failed to load
    pub failed_pages: Vec<u32>,
    /// True if the walk stopped early on cancellation
    pub interrupted: bool,
}

/// Extracts detail links from a listing page
///
/// Only anchors matched by `link_selector` whose href contains `link_pattern` are kept.
/// Hrefs are resolved against `page_url` and normalized.
pub fn extract_detail_links(html: &str, page_url: &Url, config: &ListingConfig) -> Vec<Url> {
    let Ok(selector) = Selector::parse(&config.link_selector) else {
        tracing::warn!("Invalid link selector '{}'", config.link_selector);
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| href.contains(config.link_pattern.as_str()))
        .filter_map(|href| match normalize_detail_url(href, page_url) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!("Skipping link {}: {}", href, e);
                None
            }
        })
        .collect()
}

/// Works out how many listing pages exist from the first one
///
/// Tries, in order:
/// 1. The results counter: `ceil(total / page_size)`
/// 2. The highest page number referenced by a pagination link
///
/// Returns None when neither is available.
pub fn discover_page_count(html: &str, page_url: &Url, config: &ListingConfig) -> Option<u32> {
    let document = Html::parse_document(html);
    pages_from_counter(&document, config).or_else(|| pages_from_pagination(&document, page_url, config))
}

fn pages_from_counter(document: &Html, config: &ListingConfig) -> Option<u32> {
    let selector = Selector::parse(config.results_count_selector.as_deref()?).ok()?;

    let text = document
        .select(&selector)
        .map(|element| element.text().collect::<String>())
        .find(|text| match &config.results_count_contains {
            Some(needle) => text.contains(needle.as_str()),
            None => text.chars().any(|c| c.is_ascii_digit()),
        })?;

    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    let total: u64 = digits.parse().ok()?;
    let pages = total.div_ceil(u64::from(config.page_size));

    tracing::info!("Results counter reports {} listings (~{} pages)", total, pages);
    u32::try_from(pages).ok()
}

fn pages_from_pagination(document: &Html, page_url: &Url, config: &ListingConfig) -> Option<u32> {
    let selector = Selector::parse(&config.pagination_selector).ok()?;

    let max_page = document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| page_number_from_href(href, &config.page_param, page_url))
        .max()?;

    tracing::info!("Pagination references up to page {}", max_page);
    Some(max_page)
}

/// Walks the paginated listing and gathers detail links
pub struct LinkCollector<'a, S: ListingSource + ?Sized> {
    source: &'a S,
    config: &'a ListingConfig,
}

impl<'a, S: ListingSource + ?Sized> LinkCollector<'a, S> {
    pub fn new(source: &'a S, config: &'a ListingConfig) -> Self {
        Self { source, config }
    }

    /// Walks pages `1..=min(max_pages, discovered total)`
    ///
    /// A page that fails to load is recorded in `failed_pages` and the walk goes on.
    /// Cancellation abandons the page being loaded and keeps what was found.
    pub async fn collect(&self, max_pages: Option<u32>, cancel: &CancellationToken) -> LinkCollection {
        let mut collection = LinkCollection::default();
        let delay = Duration::from_millis(self.config.pagination_delay_ms);

        tracing::info!("Determining number of listing pages...");
        let first = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Link collection interrupted before the first page loaded");
                collection.interrupted = true;
                return collection;
            }
            loaded = self.load_page(1) => loaded,
        };

        let discovered = match &first {
            Ok((url, html)) => discover_page_count(html, url, self.config),
            Err(_) => None,
        };
        let total = discovered.unwrap_or_else(|| {
            tracing::warn!(
                "Could not determine page count, assuming {}",
                self.config.fallback_page_ceiling
            );
            self.config.fallback_page_ceiling
        });
        collection.total_pages = max_pages.map_or(total, |limit| total.min(limit)).max(1);

        tracing::info!("Collecting links from {} pages", collection.total_pages);

        let mut pending_first = Some(first);
        for page in 1..=collection.total_pages {
            if cancel.is_cancelled() {
                tracing::warn!("Link collection interrupted at page {}", page);
                collection.interrupted = true;
                break;
            }

            let loaded = match pending_first.take() {
                Some(first) => first,
                None => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::warn!("Link collection interrupted at page {}", page);
                        collection.interrupted = true;
                        break;
                    }
                    loaded = self.load_page(page) => loaded,
                },
            };

            match loaded {
                Ok((url, html)) => {
                    let before = collection.links.len();
                    for link in extract_detail_links(&html, &url, self.config) {
                        collection.links.insert(link.into());
                    }
                    collection.pages_visited += 1;
                    tracing::info!(
                        "Page {}/{}: {} new links (total: {})",
                        page,
                        collection.total_pages,
                        collection.links.len() - before,
                        collection.links.len()
                    );
                }
                Err(e) => {
                    tracing::warn!("Page {} failed: {}", page, e);
                    collection.failed_pages.push(page);
                }
            }

            if !delay.is_zero() && page < collection.total_pages {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        if !collection.failed_pages.is_empty() {
            tracing::warn!("Failed listing pages: {:?}", collection.failed_pages);
        }

        collection
    }

    async fn load_page(&self, page: u32) -> Result<(Url, String), String> {
        let url = listing_url_for(self.config, page).map_err(|e| e.to_string())?;
        tracing::debug!("Opening listing page {}", url);
        match self.source.fetch_listing(&url).await {
            Ok(html) => Ok((url, html)),
            Err((kind, detail)) => Err(format!("{} ({})", kind, detail)),
        }
    }
}
