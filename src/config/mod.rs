//! Configuration module for Listing-Scraper
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and layering command-line overrides on top of them.
//!
//! # Example
//!
//! ```no_run
//! use listing_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Walking {}", config.listing.base_url);
//! ```

mod overrides;
mod parser;
mod types;
mod validation;

pub use overrides::Overrides;
pub use types::{
    CollectConfig, ConcurrencyMode, Config, FetchConfig, ListingConfig, OutputConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
