use crate::config::types::{
    Config, CrawlerConfig, FeedEntry, OutputConfig, PipelineConfig, ThrottleConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_throttle_config(&config.throttle)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_output_config(&config.output)?;
    validate_feeds(&config.feeds)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages_per_feed < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages_per_feed must be >= 1, got {}",
            config.max_pages_per_feed
        )));
    }

    if config.max_workers < 1 || config.max_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 64, got {}",
            config.max_workers
        )));
    }

    if config.max_concurrent_per_domain < 1 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_per_domain must be >= 1, got {}",
            config.max_concurrent_per_domain
        )));
    }

    if config.fetch_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout must be >= 100ms, got {}ms",
            config.fetch_timeout
        )));
    }

    if config.retry_count > 10 {
        return Err(ConfigError::Validation(format!(
            "retry_count must be <= 10, got {}",
            config.retry_count
        )));
    }

    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    if config.min_delay > config.max_delay {
        return Err(ConfigError::Validation(format!(
            "min_delay ({}ms) must not exceed max_delay ({}ms)",
            config.min_delay, config.max_delay
        )));
    }

    if !(config.target_concurrency > 0.0) || !config.target_concurrency.is_finite() {
        return Err(ConfigError::Validation(format!(
            "target_concurrency must be a positive number, got {}",
            config.target_concurrency
        )));
    }

    if !(0.0..=1.0).contains(&config.jitter) {
        return Err(ConfigError::Validation(format!(
            "jitter must be between 0.0 and 1.0, got {}",
            config.jitter
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.source_website.trim().is_empty() {
        return Err(ConfigError::Validation(
            "source_website cannot be empty".to_string(),
        ));
    }

    if config.id_prefix.is_empty()
        || !config
            .id_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "id_prefix must be non-empty and contain only letters, digits and '_', got '{}'",
            config.id_prefix
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.backup_dir.is_empty() {
        return Err(ConfigError::Validation(
            "backup_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_feeds(feeds: &[FeedEntry]) -> Result<(), ConfigError> {
    if feeds.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[feed]] must be configured".to_string(),
        ));
    }

    for feed in feeds {
        let url = Url::parse(&feed.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid feed URL '{}': {}", feed.url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Feed URL '{}' must use http or https",
                feed.url
            )));
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports a leading `*.` wildcard)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_domain_string(domain)
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid email format: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(min: u64, max: u64, target: f64, jitter: f64) -> ThrottleConfig {
        ThrottleConfig {
            min_delay: min,
            max_delay: max,
            target_concurrency: target,
            jitter,
        }
    }

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("dev.to").is_ok());
        assert!(validate_domain_pattern("*.dev.to").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern("localhost").is_err());
        assert!(validate_domain_pattern(".dev.to").is_err());
        assert!(validate_domain_pattern("dev..to").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn test_validate_throttle() {
        assert!(validate_throttle_config(&throttle(1000, 10000, 2.0, 0.5)).is_ok());
        assert!(validate_throttle_config(&throttle(500, 500, 1.0, 0.0)).is_ok());

        assert!(validate_throttle_config(&throttle(2000, 1000, 2.0, 0.5)).is_err());
        assert!(validate_throttle_config(&throttle(1000, 2000, 0.0, 0.5)).is_err());
        assert!(validate_throttle_config(&throttle(1000, 2000, f64::NAN, 0.5)).is_err());
        assert!(validate_throttle_config(&throttle(1000, 2000, 2.0, 1.5)).is_err());
    }

    #[test]
    fn test_validate_id_prefix() {
        let mut config = PipelineConfig::default();
        assert!(validate_pipeline_config(&config).is_ok());

        config.id_prefix = "my_blog2".to_string();
        assert!(validate_pipeline_config(&config).is_ok());

        config.id_prefix = "dev-to".to_string();
        assert!(validate_pipeline_config(&config).is_err());

        config.id_prefix = String::new();
        assert!(validate_pipeline_config(&config).is_err());
    }

    #[test]
    fn test_validate_feeds() {
        let ok = vec![FeedEntry {
            url: "http://127.0.0.1:8080/feed".to_string(),
        }];
        assert!(validate_feeds(&ok).is_ok());

        let bad_scheme = vec![FeedEntry {
            url: "ftp://dev.to".to_string(),
        }];
        assert!(validate_feeds(&bad_scheme).is_err());

        let unparseable = vec![FeedEntry {
            url: "not a url".to_string(),
        }];
        assert!(matches!(
            validate_feeds(&unparseable),
            Err(ConfigError::InvalidUrl(_))
        ));

        assert!(validate_feeds(&[]).is_err());
    }
}
