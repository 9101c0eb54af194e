//! Application configuration loaded from environment variables.

use common::Money;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `DATABASE_URL` — PostgreSQL connection string
/// - `PAYSTACK_SECRET_KEY` — gateway secret, also the webhook HMAC key
/// - `PAYMENT_CALLBACK_URL` — where the gateway redirects after payment
/// - `DELIVERY_FEE_CENTS` — flat delivery fee in minor units
/// - `OUTBOX_POLL_MS` — outbox dispatcher poll interval
/// - `AUTO_CANCEL_POLL_MS` — stale-group sweep interval
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub paystack_secret_key: String,
    pub payment_callback_url: String,
    pub delivery_fee: Money,
    pub outbox_poll_ms: u64,
    pub auto_cancel_poll_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            paystack_secret_key: std::env::var("PAYSTACK_SECRET_KEY")
                .unwrap_or(defaults.paystack_secret_key),
            payment_callback_url: std::env::var("PAYMENT_CALLBACK_URL")
                .unwrap_or(defaults.payment_callback_url),
            delivery_fee: std::env::var("DELIVERY_FEE_CENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Money::from_cents)
                .unwrap_or(defaults.delivery_fee),
            outbox_poll_ms: std::env::var("OUTBOX_POLL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.outbox_poll_ms),
            auto_cancel_poll_ms: std::env::var("AUTO_CANCEL_POLL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_cancel_poll_ms),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "postgres://localhost/marketplace".to_string(),
            paystack_secret_key: String::new(),
            payment_callback_url: "http://localhost:3000/payments/callback".to_string(),
            delivery_fee: domain::checkout::DEFAULT_DELIVERY_FEE,
            outbox_poll_ms: 1_000,
            auto_cancel_poll_ms: 60_000,
        }
    }
}
