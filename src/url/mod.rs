//! URL handling module for Listing-Scraper
//!
//! This module builds listing page URLs and normalizes detail-page links so that
//! the same listing reached through different query strings is collected once.

mod listing;
mod normalize;

pub use listing::{listing_page_url, listing_url_for, page_number_from_href};
pub use normalize::normalize_detail_url;
