//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SECONDHAND_API_URL` - Base URL of the SecondHand REST backend
//!
//! ## Optional
//! - `SECONDHAND_AUTH_TOKEN` - Bearer token for the signed-in buyer
//! - `SECONDHAND_HTTP_TIMEOUT_SECS` - Request timeout (default: 30)
//! - `SECONDHAND_RESERVATION_TIMEOUT_MINUTES` - Fallback stock hold (default: 15)
//! - `SECONDHAND_NOTIFICATION_TTL_SECS` - Auto-dismiss delay, 0 disables (default: 5)
//! - `SECONDHAND_PAYMENT_CACHE_TTL_SECS` - Saved card/IBAN cache TTL (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use secondhand_core::RESERVATION_TIMEOUT_MINUTES;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_LENGTH: usize = 16;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// SecondHand client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend base URL
    pub api_url: Url,
    /// Bearer token for authenticated calls
    pub auth_token: Option<SecretString>,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Reservation length when the backend sends only `reservedAt`
    pub reservation_timeout: chrono::Duration,
    /// Auto-dismiss delay for notifications (`None` keeps them until dismissed)
    pub notification_ttl: Option<Duration>,
    /// How long saved cards and bank accounts stay cached
    pub payment_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_timeout", &self.http_timeout)
            .field("reservation_timeout", &self.reservation_timeout)
            .field("notification_ttl", &self.notification_ttl)
            .field("payment_cache_ttl", &self.payment_cache_ttl)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the auth token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_required_env("SECONDHAND_API_URL")?)?;
        let auth_token = get_optional_env("SECONDHAND_AUTH_TOKEN")
            .map(|token| {
                validate_token(&token, "SECONDHAND_AUTH_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;

        let http_timeout = Duration::from_secs(get_parsed_env("SECONDHAND_HTTP_TIMEOUT_SECS", 30)?);
        let reservation_timeout = chrono::Duration::minutes(get_parsed_env(
            "SECONDHAND_RESERVATION_TIMEOUT_MINUTES",
            RESERVATION_TIMEOUT_MINUTES,
        )?);
        let notification_ttl = match get_parsed_env::<u64>("SECONDHAND_NOTIFICATION_TTL_SECS", 5)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let payment_cache_ttl =
            Duration::from_secs(get_parsed_env("SECONDHAND_PAYMENT_CACHE_TTL_SECS", 60)?);

        Ok(Self {
            api_url,
            auth_token,
            http_timeout,
            reservation_timeout,
            notification_ttl,
            payment_cache_ttl,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration with defaults for everything except the backend URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            auth_token: None,
            http_timeout: Duration::from_secs(30),
            reservation_timeout: chrono::Duration::minutes(RESERVATION_TIMEOUT_MINUTES),
            notification_ttl: Some(Duration::from_secs(5)),
            payment_cache_ttl: Duration::from_secs(60),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Same configuration with a bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(SecretString::from(token.into()));
        self
    }

    /// Bearer header value, if a token is configured.
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.auth_token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse the backend URL, ensuring a trailing slash so `join` keeps the path.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized).map_err(|e| {
        ConfigError::InvalidEnvVar("SECONDHAND_API_URL".to_string(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "SECONDHAND_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Token length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a token is not a placeholder and looks randomly generated.
fn validate_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_TOKEN_LENGTH} characters (got {})",
                token.len()
            ),
        ));
    }

    let lower = token.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(token);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_token_placeholder() {
        let result = validate_token("your-token-goes-here-1234", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_token_too_short() {
        assert!(validate_token("aB3$xY9", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_token_low_entropy() {
        assert!(validate_token("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_token_jwt_like() {
        let result = validate_token("eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiI0MiJ9.Qm9n", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_api_url_appends_slash() {
        let url = parse_api_url("https://api.secondhand.test/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.secondhand.test/v1/");
        assert_eq!(
            url.join("api/cart").unwrap().as_str(),
            "https://api.secondhand.test/v1/api/cart"
        );
    }

    #[test]
    fn test_parse_api_url_rejects_other_schemes() {
        assert!(parse_api_url("ftp://files.secondhand.test").is_err());
        assert!(parse_api_url("not a url").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::new(Url::parse("http://localhost:8080/").unwrap())
            .with_auth_token("super-secret-bearer-token");
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-bearer-token"));
        assert_eq!(
            config.bearer().as_deref(),
            Some("Bearer super-secret-bearer-token")
        );
    }
}
