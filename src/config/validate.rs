//! One-shot `JobConfig` validation, run once at construction time so
//! the engine never has to re-check invariants mid-run.

use super::{JobConfig, ScrapeMode};
use crate::error::ConfigError;

pub fn validate(config: &JobConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 {
        return Err(ConfigError::OutOfRange {
            field: "concurrency",
            min: 1,
            actual: i64::from(config.concurrency),
        });
    }
    if config.rate_limit < 1 {
        return Err(ConfigError::OutOfRange {
            field: "rate_limit",
            min: 1,
            actual: i64::from(config.rate_limit),
        });
    }
    if let Some(pagination) = &config.pagination {
        if pagination.max_pages < 1 {
            return Err(ConfigError::OutOfRange {
                field: "pagination.max_pages",
                min: 1,
                actual: i64::from(pagination.max_pages),
            });
        }
    }

    match config.mode {
        ScrapeMode::Pagination => {
            if config.base_url.is_none() {
                return Err(ConfigError::MissingBaseUrl);
            }
        }
        ScrapeMode::List => {
            if config.start_urls.is_empty() {
                return Err(ConfigError::EmptyStartUrls);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSpec;

    fn base_config() -> JobConfig {
        serde_json::from_value(serde_json::json!({
            "name": "test-job",
            "mode": "pagination",
            "base_url": "http://example.com",
            "fields": [],
        }))
        .unwrap()
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut cfg = base_config();
        cfg.concurrency = 0;
        assert!(matches!(
            validate(&cfg),
            Err(ConfigError::OutOfRange { field: "concurrency", .. })
        ));
    }

    #[test]
    fn pagination_requires_base_url() {
        let mut cfg = base_config();
        cfg.base_url = None;
        assert!(matches!(validate(&cfg), Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn list_requires_seed_urls() {
        let mut cfg = base_config();
        cfg.mode = ScrapeMode::List;
        cfg.start_urls.clear();
        assert!(matches!(validate(&cfg), Err(ConfigError::EmptyStartUrls)));
    }

    #[test]
    fn accepts_well_formed_config() {
        let cfg = base_config();
        assert!(validate(&cfg).is_ok());
        let _ = FieldSpec::leaf("x", crate::config::Selector::css("h1"));
    }
}
