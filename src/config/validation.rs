use crate::config::types::{
    Config, CredentialEntry, HttpConfig, ReplyConfig, SiteConfig, StorageConfig, TrackerConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_tracker_config(&config.tracker)?;
    validate_http_config(&config.http)?;
    validate_reply_config(&config.reply)?;
    validate_storage_config(&config.storage)?;
    validate_credentials(&config.credentials)?;
    Ok(())
}

/// Validates the site section
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use HTTPS scheme",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates polling configuration
fn validate_tracker_config(config: &TrackerConfig) -> Result<(), ConfigError> {
    if config.poll_interval_secs < 5 {
        return Err(ConfigError::Validation(format!(
            "poll-interval-secs must be >= 5, got {}",
            config.poll_interval_secs
        )));
    }

    if config.max_concurrent_checks < 1 || config.max_concurrent_checks > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-checks must be between 1 and 64, got {}",
            config.max_concurrent_checks
        )));
    }

    if config.forum_topic_window < 1 || config.forum_topic_window > 50 {
        return Err(ConfigError::Validation(format!(
            "forum-topic-window must be between 1 and 50, got {}",
            config.forum_topic_window
        )));
    }

    if config.keepalive_enabled && config.keepalive_interval_secs < 30 {
        return Err(ConfigError::Validation(format!(
            "keepalive-interval-secs must be >= 30, got {}",
            config.keepalive_interval_secs
        )));
    }

    Ok(())
}

/// Validates HTTP timeouts
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.attempt_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "attempt-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.fetch_ceiling_secs < config.attempt_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "fetch-ceiling-secs ({}) must be >= attempt-timeout-secs ({})",
            config.fetch_ceiling_secs, config.attempt_timeout_secs
        )));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates reply submission settings
fn validate_reply_config(config: &ReplyConfig) -> Result<(), ConfigError> {
    if config.verify_attempts < 1 || config.verify_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "verify-attempts must be between 1 and 10, got {}",
            config.verify_attempts
        )));
    }

    if config.snippet_words < 1 {
        return Err(ConfigError::Validation(
            "snippet-words must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the credential sets
fn validate_credentials(entries: &[CredentialEntry]) -> Result<(), ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[credentials]] set is required".to_string(),
        ));
    }

    for entry in entries {
        if entry.label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "credential label cannot be empty".to_string(),
            ));
        }

        if entry.tokens.is_empty() {
            return Err(ConfigError::InvalidCredentials {
                label: entry.label.clone(),
                reason: "no tokens".to_string(),
            });
        }

        for (name, value) in &entry.tokens {
            validate_cookie_name(name).map_err(|reason| ConfigError::InvalidCredentials {
                label: entry.label.clone(),
                reason,
            })?;
            validate_cookie_value(name, value).map_err(|reason| {
                ConfigError::InvalidCredentials {
                    label: entry.label.clone(),
                    reason,
                }
            })?;
        }
    }

    Ok(())
}

fn validate_cookie_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("token name cannot be empty".to_string());
    }

    if name
        .chars()
        .any(|c| c == ';' || c == '=' || c.is_whitespace() || c.is_control())
    {
        return Err(format!("token name '{}' contains invalid characters", name));
    }

    Ok(())
}

fn validate_cookie_value(name: &str, value: &str) -> Result<(), String> {
    if value
        .chars()
        .any(|c| c == ';' || c.is_whitespace() || c.is_control())
    {
        return Err(format!("value of token '{}' contains invalid characters", name));
    }

    Ok(())
}
