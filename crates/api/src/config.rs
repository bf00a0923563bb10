//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `API_BASE_URL` - Public URL of the shop (used for cookie security and checkout redirects)
//! - `JWT_KEY` - Credential signing secret (min 32 chars, high entropy)
//! - `STRIPE_KEY` - Stripe secret API key
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 8080)
//! - `COOKIE_NAME` - Cart credential cookie (default: dam-nation-shop)
//! - `ADMIN_COOKIE_NAME` - Admin credential cookie (default: dam-nation-shop-admin)
//! - `CREDENTIAL_TTL_HOURS` - Credential lifetime, 1..=720 (default: 24)
//! - `STRIPE_API_BASE` - Stripe API origin (default: <https://api.stripe.com>)
//! - `STRIPE_SUCCESS_URL` - Redirect after payment (default: `{base}/checkout/success`)
//! - `STRIPE_CANCEL_URL` - Redirect after cancel (default: `{base}/checkout/cancel`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0..=1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate, 0.0..=1.0 (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SIGNING_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MAX_CREDENTIAL_TTL_HOURS: i64 = 720;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the shop
    pub base_url: Url,
    /// Key the login rate limit on client-IP headers set by a reverse proxy.
    /// Off unless every request arrives through a proxy that overwrites them.
    pub trust_proxy_headers: bool,
    /// Credential signing and cookie settings
    pub credentials: CredentialConfig,
    /// Stripe Checkout settings
    pub stripe: StripeConfig,
    /// Sentry error tracking settings
    pub sentry: SentryConfig,
}

/// Session credential configuration.
///
/// Implements `Debug` manually to redact the signing key.
#[derive(Clone)]
pub struct CredentialConfig {
    /// HMAC-SHA256 signing key shared by cart and admin credentials
    pub signing_key: SecretString,
    /// Cookie carrying the cart credential
    pub cart_cookie: String,
    /// Cookie carrying the admin credential
    pub admin_cookie: String,
    /// Lifetime of issued credentials and their cookies
    pub ttl: Duration,
    /// Whether cookies get the `Secure` attribute
    pub secure_cookies: bool,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("signing_key", &"[REDACTED]")
            .field("cart_cookie", &self.cart_cookie)
            .field("admin_cookie", &self.admin_cookie)
            .field("ttl", &self.ttl)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

/// Stripe Checkout configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key
    pub secret_key: SecretString,
    /// API origin, overridable for test doubles
    pub api_base: Url,
    /// Where Stripe sends the shopper after payment
    pub success_url: Url,
    /// Where Stripe sends the shopper after cancelling
    pub cancel_url: Url,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("success_url", &self.success_url.as_str())
            .field("cancel_url", &self.cancel_url.as_str())
            .finish()
    }
}

/// Sentry configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ApiConfig::from_env`].
    pub fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(source);

        let database_url = env.database_url("API_DATABASE_URL")?;
        let host = env
            .or_default("API_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = env
            .or_default("API_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_PORT".to_string(), e.to_string()))?;
        let base_url = env.url("API_BASE_URL")?;
        let trust_proxy_headers = env.flag("TRUST_PROXY_HEADERS")?;

        let credentials = CredentialConfig::from_env(&env, &base_url)?;
        let stripe = StripeConfig::from_env(&env, &base_url)?;
        let sentry = SentryConfig::from_env(&env)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            trust_proxy_headers,
            credentials,
            stripe,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CredentialConfig {
    fn from_env(env: &Env<'_>, base_url: &Url) -> Result<Self, ConfigError> {
        let signing_key = env.validated_secret("JWT_KEY")?;
        validate_signing_key(&signing_key, "JWT_KEY")?;

        let ttl_hours = env
            .or_default("CREDENTIAL_TTL_HOURS", "24")
            .parse::<i64>()
            .ok()
            .filter(|h| (1..=MAX_CREDENTIAL_TTL_HOURS).contains(h))
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "CREDENTIAL_TTL_HOURS".to_string(),
                    format!("must be a whole number of hours in 1..={MAX_CREDENTIAL_TTL_HOURS}"),
                )
            })?;

        Ok(Self {
            signing_key,
            cart_cookie: env.or_default("COOKIE_NAME", "dam-nation-shop"),
            admin_cookie: env.or_default("ADMIN_COOKIE_NAME", "dam-nation-shop-admin"),
            ttl: Duration::hours(ttl_hours),
            secure_cookies: base_url.scheme() == "https",
        })
    }
}

impl StripeConfig {
    fn from_env(env: &Env<'_>, base_url: &Url) -> Result<Self, ConfigError> {
        let api_base = match env.optional("STRIPE_API_BASE") {
            Some(_) => env.url("STRIPE_API_BASE")?,
            None => Url::parse("https://api.stripe.com").map_err(|e| {
                ConfigError::InvalidEnvVar("STRIPE_API_BASE".to_string(), e.to_string())
            })?,
        };

        Ok(Self {
            secret_key: env.validated_secret("STRIPE_KEY")?,
            api_base,
            success_url: env.url_or_join("STRIPE_SUCCESS_URL", base_url, "checkout/success")?,
            cancel_url: env.url_or_join("STRIPE_CANCEL_URL", base_url, "checkout/cancel")?,
        })
    }
}

impl SentryConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: env.optional("SENTRY_DSN"),
            environment: env.optional("SENTRY_ENVIRONMENT"),
            sample_rate: env.rate("SENTRY_SAMPLE_RATE", 1.0)?,
            traces_sample_rate: env.rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Key lookup used while loading configuration.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Boolean variable, false when unset.
    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("false" | "0" | "no") => Ok(false),
            Some("true" | "1" | "yes") => Ok(true),
            Some(other) => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected true or false, got {other:?}"),
            )),
        }
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Get a required absolute URL.
    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        let raw = self.required(key)?;
        Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Get a URL, defaulting to `path` under `base`.
    fn url_or_join(&self, key: &str, base: &Url, path: &str) -> Result<Url, ConfigError> {
        if self.optional(key).is_some() {
            return self.url(key);
        }
        let mut root = base.clone();
        if !root.path().ends_with('/') {
            let with_slash = format!("{}/", root.path());
            root.set_path(&with_slash);
        }
        root.join(path)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Get a sample rate in `0.0..=1.0`.
    fn rate(&self, key: &str, default: f32) -> Result<f32, ConfigError> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        raw.parse::<f32>()
            .ok()
            .filter(|r| (0.0..=1.0).contains(r))
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(key.to_string(), "must be between 0.0 and 1.0".into())
            })
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Validate that a signing key meets minimum length requirements.
fn validate_signing_key(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SIGNING_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SIGNING_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}
