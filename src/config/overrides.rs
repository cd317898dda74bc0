use crate::config::types::{ConcurrencyMode, Config};
use crate::config::validation::validate;
use crate::ConfigError;

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub max_price: Option<u64>,
    pub max_pages: Option<u32>,
    pub mode: Option<ConcurrencyMode>,
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub delay_ms: Option<u64>,
    pub retry_ceiling: Option<u32>,
    pub output: Option<String>,
}

impl Overrides {
    /// Returns true if no value is set
    pub fn is_empty(&self) -> bool {
        self.max_price.is_none()
            && self.max_pages.is_none()
            && self.mode.is_none()
            && self.concurrency.is_none()
            && self.timeout_ms.is_none()
            && self.delay_ms.is_none()
            && self.retry_ceiling.is_none()
            && self.output.is_none()
    }

    /// Applies the overrides and re-validates the result
    pub fn apply(&self, mut config: Config) -> Result<Config, ConfigError> {
        if let Some(max_price) = self.max_price {
            config.listing.max_price = Some(max_price);
        }
        if let Some(max_pages) = self.max_pages {
            config.listing.max_pages = Some(max_pages);
        }
        if let Some(mode) = self.mode {
            config.collect.mode = mode;
        }
        if let Some(concurrency) = self.concurrency {
            config.collect.concurrency = concurrency;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.fetch.timeout_ms = timeout_ms;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.collect.request_delay_ms = delay_ms;
        }
        if let Some(retry_ceiling) = self.retry_ceiling {
            config.fetch.retry_ceiling = retry_ceiling;
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }

        validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const MINIMAL: &str = r#"
[listing]
base-url = "https://auto.example/cars/"
link-pattern = "/sale/"

[output]
path = "out.csv"

[[fields]]
name = "price"
post = "integer"
[[fields.rules]]
selector = ".price"
"#;

    #[test]
    fn test_empty_overrides_change_nothing() {
        let config = parse_config(MINIMAL).unwrap();
        let overrides = Overrides::default();
        assert!(overrides.is_empty());

        let applied = overrides.apply(config.clone()).unwrap();
        assert_eq!(applied.output.path, config.output.path);
        assert_eq!(applied.collect.concurrency, config.collect.concurrency);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = parse_config(MINIMAL).unwrap();
        let overrides = Overrides {
            max_price: Some(500_000),
            max_pages: Some(3),
            mode: Some(ConcurrencyMode::Sequential),
            retry_ceiling: Some(5),
            output: Some("other.csv".to_string()),
            ..Default::default()
        };

        let applied = overrides.apply(config).unwrap();
        assert_eq!(applied.listing.max_price, Some(500_000));
        assert_eq!(applied.listing.max_pages, Some(3));
        assert_eq!(applied.collect.mode, ConcurrencyMode::Sequential);
        assert_eq!(applied.fetch.retry_ceiling, 5);
        assert_eq!(applied.output.path, "other.csv");
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let config = parse_config(MINIMAL).unwrap();
        let overrides = Overrides {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            overrides.apply(config),
            Err(ConfigError::Validation(_))
        ));
    }
}
