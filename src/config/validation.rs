use crate::config::types::{Config, CrawlerConfig, HttpConfig, IndexConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seeds(&config.seeds)?;
    validate_blocked_domains(&config.blocked_domains)?;
    validate_blocked_extensions(&config.blocked_extensions)?;
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_index_config(&config.index)?;
    validate_lease(&config.crawler, &config.http)?;

    if config.frontier.path.is_empty() {
        return Err(ConfigError::Validation(
            "frontier.path cannot be empty".to_string(),
        ));
    }

    if config.reseed.interval_secs == 0 {
        return Err(ConfigError::Validation(
            "reseed.interval-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed URLs: they must parse and use http or https
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }
    Ok(())
}

fn validate_blocked_domains(domains: &[String]) -> Result<(), ConfigError> {
    for domain in domains {
        validate_domain_pattern(domain)?;
    }
    Ok(())
}

fn validate_blocked_extensions(extensions: &[String]) -> Result<(), ConfigError> {
    for ext in extensions {
        if ext.is_empty() || ext.starts_with('.') || !ext.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::Validation(format!(
                "Blocked extension '{}' must be alphanumeric without a leading dot",
                ext
            )));
        }
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "crawler.workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.max_content_chars < 1 {
        return Err(ConfigError::Validation(
            "crawler.max-content-chars must be >= 1".to_string(),
        ));
    }

    if config.politeness_delay_min_ms > config.politeness_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "crawler.politeness-delay-min-ms ({}) must not exceed politeness-delay-max-ms ({})",
            config.politeness_delay_min_ms, config.politeness_delay_max_ms
        )));
    }

    if config.lease_secs < 1 {
        return Err(ConfigError::Validation(
            "crawler.lease-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a claim outlives the slowest fetch a worker can make while holding it
///
/// Worst case: every worker waits on the same domain, so the last one is admitted
/// `workers × min-domain-interval` late, then sleeps the maximum jitter and runs into
/// the request timeout.
fn validate_lease(crawler: &CrawlerConfig, http: &HttpConfig) -> Result<(), ConfigError> {
    let worst_case_ms = http
        .timeout_secs
        .saturating_mul(1_000)
        .saturating_add(crawler.politeness_delay_max_ms)
        .saturating_add(
            u64::from(crawler.workers).saturating_mul(crawler.min_domain_interval_ms),
        );
    let lease_ms = crawler.lease_secs.saturating_mul(1_000);

    if lease_ms <= worst_case_ms {
        return Err(ConfigError::Validation(format!(
            "crawler.lease-secs ({}) must exceed http.timeout-secs + politeness-delay-max-ms \
             + workers * min-domain-interval-ms ({}ms)",
            crawler.lease_secs, worst_case_ms
        )));
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 || config.timeout_secs > 120 {
        return Err(ConfigError::Validation(format!(
            "http.timeout-secs must be between 1 and 120, got {}",
            config.timeout_secs
        )));
    }

    if config.max_connections < 1 {
        return Err(ConfigError::Validation(
            "http.max-connections must be >= 1".to_string(),
        ));
    }

    if config.max_body_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "http.max-body-bytes must be >= 1024, got {}",
            config.max_body_bytes
        )));
    }

    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "http.user-agents must contain at least one entry".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "http.user-agents entries cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates index configuration
fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "index.path cannot be empty".to_string(),
        ));
    }

    // tantivy refuses writer budgets below 15MB
    if config.writer_heap_bytes < 15_000_000 {
        return Err(ConfigError::Validation(format!(
            "index.writer-heap-bytes must be >= 15000000, got {}",
            config.writer_heap_bytes
        )));
    }

    if config.commit_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "index.commit-interval-secs must be >= 1".to_string(),
        ));
    }

    if config.max_pending_documents < 1 {
        return Err(ConfigError::Validation(
            "index.max-pending-documents must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)?;
    } else {
        validate_domain_string(pattern)?;
    }

    Ok(())
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

    // Must contain at least one dot (e.g., example.com, not just "example")
    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("example.com").is_ok());
        assert!(validate_domain_pattern("*.example.com").is_ok());
        assert!(validate_domain_pattern("sub.example.com").is_ok());
        assert!(validate_domain_pattern("x.com").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern("example").is_err());
        assert!(validate_domain_pattern(".example.com").is_err());
        assert!(validate_domain_pattern("example.com.").is_err());
    }

    #[test]
    fn test_seed_scheme_must_be_http() {
        assert!(validate_seeds(&["https://example.com/".to_string()]).is_ok());
        assert!(validate_seeds(&["http://example.com/".to_string()]).is_ok());
        assert!(validate_seeds(&["ftp://example.com/".to_string()]).is_err());
        assert!(validate_seeds(&["not a url".to_string()]).is_err());
    }

    #[test]
    fn test_politeness_bounds_ordered() {
        let mut config = Config::default();
        config.crawler.politeness_delay_min_ms = 5_000;
        config.crawler.politeness_delay_max_ms = 1_000;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_user_agents_required() {
        let mut config = Config::default();
        config.http.user_agents.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blocked_extension_format() {
        assert!(validate_blocked_extensions(&["pdf".to_string()]).is_ok());
        assert!(validate_blocked_extensions(&[".pdf".to_string()]).is_err());
        assert!(validate_blocked_extensions(&["".to_string()]).is_err());
    }

    #[test]
    fn test_lease_must_outlive_slowest_fetch() {
        let mut config = Config::default();
        config.crawler.lease_secs = 1;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));

        // 25 workers queued 20s apart on one domain wait up to 500s
        let mut config = Config::default();
        config.crawler.min_domain_interval_ms = 20_000;
        assert!(validate(&config).is_err());
        config.crawler.lease_secs = 600;
        assert!(validate(&config).is_ok());

        let mut config = Config::default();
        config.crawler.workers = 1;
        config.crawler.min_domain_interval_ms = 0;
        config.crawler.politeness_delay_min_ms = 0;
        config.crawler.politeness_delay_max_ms = 0;
        config.http.timeout_secs = 10;
        config.crawler.lease_secs = 10;
        assert!(validate(&config).is_err());
        config.crawler.lease_secs = 11;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_writer_heap_floor() {
        let mut config = Config::default();
        config.index.writer_heap_bytes = 1_000;
        assert!(validate(&config).is_err());
    }
}
