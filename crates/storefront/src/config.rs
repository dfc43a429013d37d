//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront, used for provider return URLs
//! - `PAYMENT_PROVIDER` - Active payment provider: `liqpay` or `stripe`
//!
//! ## LiqPay (when `PAYMENT_PROVIDER=liqpay`)
//! - `LIQPAY_PUBLIC_KEY` - Merchant public key
//! - `LIQPAY_PRIVATE_KEY` - Merchant private key (high entropy)
//! - `LIQPAY_CURRENCY` - Charge currency (default: UAH)
//! - `LIQPAY_LANGUAGE` - Checkout page language (default: uk)
//! - `LIQPAY_SANDBOX` - Send `sandbox=1` with every payment (default: false)
//!
//! ## Stripe (when `PAYMENT_PROVIDER=stripe`)
//! - `STRIPE_SECRET_KEY` - API secret key (high entropy)
//! - `STRIPE_WEBHOOK_SECRET` - Webhook endpoint signing secret (high entropy)
//! - `STRIPE_CURRENCY` - Charge currency (default: uah)
//! - `STRIPE_API_BASE` - API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_TIMEOUT_SECS` - Outgoing request timeout (default: 15)
//! - `STRIPE_WEBHOOK_TOLERANCE_SECS` - Maximum webhook signature age (default: 300)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bulava_core::Currency;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// The one payment provider active in this deployment
    pub payment: PaymentConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Payment provider selection, read from `PAYMENT_PROVIDER`.
#[derive(Debug, Clone)]
pub enum PaymentConfig {
    LiqPay(LiqPayConfig),
    Stripe(StripeConfig),
}

impl PaymentConfig {
    /// Provider name as stored on orders.
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        match self {
            Self::LiqPay(_) => "liqpay",
            Self::Stripe(_) => "stripe",
        }
    }
}

/// LiqPay merchant configuration.
///
/// Implements `Debug` manually to redact the private key.
#[derive(Clone)]
pub struct LiqPayConfig {
    pub public_key: String,
    pub private_key: SecretString,
    pub currency: Currency,
    pub language: String,
    pub sandbox: bool,
}

impl std::fmt::Debug for LiqPayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiqPayConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("language", &self.language)
            .field("sandbox", &self.sandbox)
            .finish()
    }
}

/// Stripe Checkout configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub currency: Currency,
    pub api_base: Url,
    pub timeout: Duration,
    pub webhook_tolerance: Duration,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("api_base", &self.api_base.as_str())
            .field("timeout", &self.timeout)
            .field("webhook_tolerance", &self.webhook_tolerance)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if provider secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = parse_url("STOREFRONT_BASE_URL", &get_required_env("STOREFRONT_BASE_URL")?)?;
        let payment = PaymentConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            payment,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Absolute URL for a storefront path, e.g. `/payments/callback`.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let provider = get_required_env("PAYMENT_PROVIDER")?;
        match provider.trim().to_ascii_lowercase().as_str() {
            "liqpay" => Ok(Self::LiqPay(LiqPayConfig::from_env()?)),
            "stripe" => Ok(Self::Stripe(StripeConfig::from_env()?)),
            other => Err(ConfigError::InvalidEnvVar(
                "PAYMENT_PROVIDER".to_string(),
                format!("expected 'liqpay' or 'stripe', got '{other}'"),
            )),
        }
    }
}

impl LiqPayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            public_key: get_required_env("LIQPAY_PUBLIC_KEY")?,
            private_key: get_validated_secret("LIQPAY_PRIVATE_KEY")?,
            currency: parse_env("LIQPAY_CURRENCY", "UAH")?,
            language: get_env_or_default("LIQPAY_LANGUAGE", "uk"),
            sandbox: parse_env("LIQPAY_SANDBOX", "false")?,
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_base = get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com");
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            currency: parse_env("STRIPE_CURRENCY", "uah")?,
            api_base: parse_url("STRIPE_API_BASE", &api_base)?,
            timeout: Duration::from_secs(parse_env("STRIPE_TIMEOUT_SECS", "15")?),
            webhook_tolerance: Duration::from_secs(parse_env(
                "STRIPE_WEBHOOK_TOLERANCE_SECS",
                "300",
            )?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
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

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn liqpay_config() -> LiqPayConfig {
        LiqPayConfig {
            public_key: "sandbox_i00000000".to_string(),
            private_key: SecretString::from("sandbox_super_private_key_value"),
            currency: Currency::Uah,
            language: "uk".to_string(),
            sandbox: true,
        }
    }

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("https://shop.bulava.test/").unwrap(),
            payment: PaymentConfig::LiqPay(liqpay_config()),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

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
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-liqpay-private-key", "LIQPAY_PRIVATE_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_stripe_shaped_key() {
        let result = validate_secret_strength("whsec_9fK2mQx7LpZ4vB8nR1tY6cH3", "STRIPE_WEBHOOK_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_absolute_url_joins_single_slash() {
        let config = config();
        assert_eq!(
            config.absolute_url("/payments/callback"),
            "https://shop.bulava.test/payments/callback"
        );
        assert_eq!(
            config.absolute_url("payments/result"),
            "https://shop.bulava.test/payments/result"
        );
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(config().payment.provider_name(), "liqpay");
    }

    #[test]
    fn test_payment_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", liqpay_config());
        assert!(debug_output.contains("sandbox_i00000000"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_private"));

        let stripe = StripeConfig {
            secret_key: SecretString::from("sk_test_51Hsecretvalue"),
            webhook_secret: SecretString::from("whsec_hiddenvalue"),
            currency: Currency::Uah,
            api_base: Url::parse("https://api.stripe.com").unwrap(),
            timeout: Duration::from_secs(15),
            webhook_tolerance: Duration::from_secs(300),
        };
        let debug_output = format!("{stripe:?}");
        assert!(!debug_output.contains("sk_test_51Hsecretvalue"));
        assert!(!debug_output.contains("whsec_hiddenvalue"));
    }
}
