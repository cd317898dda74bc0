use crate::config::types::{CollectConfig, Config, FetchConfig, ListingConfig, OutputConfig};
use crate::extract::{FieldSpec, Validity};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_listing_config(&config.listing)?;
    validate_fetch_config(&config.fetch)?;
    validate_collect_config(&config.collect)?;
    validate_fields(&config.fields)?;
    validate_validity(&config.validity, &config.fields)?;
    validate_output_config(&config.output, &config.fields)?;
    Ok(())
}

fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must be http or https, got '{}'",
            config.base_url
        )));
    }

    if config.page_size == 0 {
        return Err(ConfigError::Validation(
            "page-size must be >= 1".to_string(),
        ));
    }

    if config.fallback_page_ceiling == 0 {
        return Err(ConfigError::Validation(
            "fallback-page-ceiling must be >= 1".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.link_pattern.is_empty() {
        return Err(ConfigError::Validation(
            "link-pattern cannot be empty".to_string(),
        ));
    }

    check_selector("listing", &config.link_selector)?;
    check_selector("listing", &config.pagination_selector)?;
    if let Some(selector) = &config.results_count_selector {
        check_selector("listing", selector)?;
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_ms == 0 || config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms and connect-timeout-ms must be > 0".to_string(),
        ));
    }

    if !(1..=10).contains(&config.retry_ceiling) {
        return Err(ConfigError::Validation(format!(
            "retry-ceiling must be between 1 and 10, got {}",
            config.retry_ceiling
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_collect_config(config: &CollectConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 256 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 256, got {}",
            config.concurrency
        )));
    }

    if config.progress_every == 0 {
        return Err(ConfigError::Validation(
            "progress-every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the field table: unique names, at least one rule, parseable selectors
fn validate_fields(fields: &[FieldSpec]) -> Result<(), ConfigError> {
    if fields.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[fields]] entry is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for field in fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(
                "field name cannot be empty".to_string(),
            ));
        }

        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate field name '{}'",
                field.name
            )));
        }

        if field.rules.is_empty() {
            return Err(ConfigError::Validation(format!(
                "field '{}' must have at least one rule",
                field.name
            )));
        }

        for rule in &field.rules {
            check_selector(&field.name, &rule.selector)?;
        }
    }

    Ok(())
}

fn validate_validity(validity: &Validity, fields: &[FieldSpec]) -> Result<(), ConfigError> {
    match validity {
        Validity::AcceptAll => Ok(()),
        Validity::NonZero { field } => require_field("validity", field, fields),
    }
}

fn validate_output_config(config: &OutputConfig, fields: &[FieldSpec]) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    for name in [&config.date_field, &config.views_field, &config.price_field]
        .into_iter()
        .flatten()
    {
        require_field("output", name, fields)?;
    }

    Ok(())
}

fn require_field(section: &str, name: &str, fields: &[FieldSpec]) -> Result<(), ConfigError> {
    if fields.iter().any(|f| f.name == name) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "[{}] refers to unknown field '{}'",
            section, name
        )))
    }
}

fn check_selector(field: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
        })
}
