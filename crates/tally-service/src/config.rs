//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use tally_core::IdError;

use crate::dispatch::CounterRoutes;
use crate::signature::DEFAULT_TOLERANCE;
use crate::store_client::DEFAULT_STORE_TIMEOUT;
use crate::stripe::{CheckoutConfig, STRIPE_API_BASE};

/// Default port when neither `LISTEN_ADDR` nor `PORT` is set.
const DEFAULT_PORT: u16 = 3000;

/// Stripe retries failed deliveries for up to three days.
const DEFAULT_DEDUPE_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The webhook signing secret is required.
    #[error("STRIPE_WEBHOOK_SECRET is not set; webhooks cannot be verified")]
    MissingWebhookSecret,

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },

    /// A `COUNTED_EVENTS` entry is not `type=counter`.
    #[error("invalid event route {0:?}, expected `event.type=counter`")]
    InvalidRoute(String),

    /// A counter name in `COUNTED_EVENTS` is not valid.
    #[error(transparent)]
    InvalidCounter(#[from] IdError),
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: `0.0.0.0:$PORT`, port 3000).
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/tally").
    pub data_dir: String,

    /// Stripe secret API key, used for checkout sessions (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (`whsec_...`).
    pub stripe_webhook_secret: String,

    /// Stripe API base URL.
    pub stripe_api_base: String,

    /// What the checkout session sells.
    pub checkout: CheckoutConfig,

    /// Frontend URL for checkout redirects.
    pub frontend_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Bound on a single store call.
    pub store_timeout: Duration,

    /// Accepted distance between a signature timestamp and now.
    pub signature_tolerance: Duration,

    /// Which event types increment which counters.
    pub counted_events: CounterRoutes,

    /// Count each provider event id at most once.
    pub dedupe_events: bool,

    /// How long counted event ids are remembered for deduplication.
    pub dedupe_retention: Duration,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Defaults for everything except the webhook secret.
    pub fn new(stripe_webhook_secret: impl Into<String>) -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            data_dir: "/data/tally".into(),
            stripe_api_key: None,
            stripe_webhook_secret: stripe_webhook_secret.into(),
            stripe_api_base: STRIPE_API_BASE.into(),
            checkout: CheckoutConfig::default(),
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024, // 1MB
            request_timeout_seconds: 30,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            signature_tolerance: DEFAULT_TOLERANCE,
            counted_events: CounterRoutes::default(),
            dedupe_events: false,
            dedupe_retention: DEFAULT_DEDUPE_RETENTION,
        }
    }

    /// Load configuration from environment variables and secrets files.
    ///
    /// # Errors
    ///
    /// Fails if the webhook secret is missing or a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load Stripe secrets from file first, then fall back to env vars
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();

        let stripe_webhook_secret = stripe_webhook_secret
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingWebhookSecret)?;

        let defaults = Self::new(stripe_webhook_secret);

        let listen_addr = match env("LISTEN_ADDR") {
            Some(addr) => addr,
            None => format!("0.0.0.0:{}", parse_env("PORT", DEFAULT_PORT)?),
        };

        let counted_events = match env("COUNTED_EVENTS") {
            Some(routes) => routes.parse()?,
            None => defaults.counted_events.clone(),
        };

        let checkout = CheckoutConfig {
            price_id: env("STRIPE_PRICE_ID"),
            amount_cents: parse_env("CHECKOUT_AMOUNT_CENTS", defaults.checkout.amount_cents)?,
            currency: env("CHECKOUT_CURRENCY").unwrap_or(defaults.checkout.currency.clone()),
            product_name: env("CHECKOUT_PRODUCT_NAME")
                .unwrap_or(defaults.checkout.product_name.clone()),
        };

        Ok(Self {
            listen_addr,
            data_dir: env("DATA_DIR").unwrap_or(defaults.data_dir),
            stripe_api_key,
            stripe_api_base: env("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            checkout,
            frontend_url: env("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            cors_origins: env("CORS_ORIGINS").map_or(defaults.cors_origins, |origins| {
                origins.split(',').map(|s| s.trim().to_string()).collect()
            }),
            max_body_bytes: parse_env("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            request_timeout_seconds: parse_env(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            )?,
            store_timeout: Duration::from_millis(parse_env(
                "STORE_TIMEOUT_MS",
                millis(defaults.store_timeout),
            )?),
            signature_tolerance: Duration::from_secs(parse_env(
                "SIGNATURE_TOLERANCE_SECONDS",
                defaults.signature_tolerance.as_secs(),
            )?),
            counted_events,
            dedupe_events: parse_env("DEDUPE_EVENTS", defaults.dedupe_events)?,
            dedupe_retention: Duration::from_secs(
                parse_env(
                    "DEDUPE_RETENTION_HOURS",
                    defaults.dedupe_retention.as_secs() / 3600,
                )?
                .saturating_mul(3600),
            ),
            stripe_webhook_secret: defaults.stripe_webhook_secret,
        })
    }
}

/// Read a non-empty environment variable.
fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [".secrets/stripe.json", "../.secrets/stripe.json"];

    let file = secret_paths.iter().find_map(|path| {
        let secrets = load_secrets_file::<StripeSecrets>(path).ok()?;
        tracing::info!(path = %path, "Loaded Stripe secrets from file");
        Some(secrets)
    });

    if file.is_none() {
        tracing::debug!("Stripe secrets file not found, using environment variables");
    }

    merge_stripe_secrets(file, env)
}

/// Combine the secrets file with the environment, field by field. The file
/// wins where it sets a value.
fn merge_stripe_secrets(
    file: Option<StripeSecrets>,
    env: impl Fn(&str) -> Option<String>,
) -> (Option<String>, Option<String>) {
    let (file_api_key, file_webhook_secret) = match file {
        Some(secrets) => (Some(secrets.api_key), secrets.webhook_secret),
        None => (None, None),
    };

    (
        file_api_key
            .or_else(|| env("STRIPE_SECRET_KEY"))
            .or_else(|| env("STRIPE_API_KEY")),
        file_webhook_secret
            .filter(|s| !s.trim().is_empty())
            .or_else(|| env("STRIPE_WEBHOOK_SECRET")),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
