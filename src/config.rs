use rust_decimal::Decimal;
use std::time::Duration;

// ============================================================================
// Runtime Configuration
// ============================================================================
//
// Everything is read from environment variables with sensible defaults so the
// binary runs out of the box. Parse failures fall back to the default rather
// than aborting startup.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct Config {
    /// Port for the /metrics and /health endpoint
    pub metrics_port: u16,
    /// Flat courier fee credited on delivery confirmation
    pub delivery_fee: Decimal,
    /// Offset added to "now" for the default estimated delivery time
    pub eta_offset: Duration,
    /// Max optimistic-commit retries for totals recompute
    pub commit_retries: u32,
    /// Display label for money amounts; the math itself is currency-agnostic
    pub currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            delivery_fee: Decimal::new(500, 2), // 5.00
            eta_offset: Duration::from_secs(30 * 60),
            commit_retries: 3,
            currency: "USD".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            metrics_port: env_parse("METRICS_PORT", defaults.metrics_port),
            delivery_fee: env_parse("DELIVERY_FEE", defaults.delivery_fee),
            eta_offset: Duration::from_secs(
                env_parse("ETA_OFFSET_MINUTES", 30u64) * 60,
            ),
            commit_retries: env_parse("COMMIT_RETRIES", defaults.commit_retries),
            currency: env_parse("CURRENCY", defaults.currency),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.delivery_fee, Decimal::new(500, 2));
        assert_eq!(config.eta_offset, Duration::from_secs(1800));
    }

    #[test]
    fn test_env_parse_falls_back_on_junk() {
        std::env::set_var("TEST_CONFIG_JUNK", "not-a-number");
        assert_eq!(env_parse("TEST_CONFIG_JUNK", 42u16), 42);
        std::env::remove_var("TEST_CONFIG_JUNK");
    }
}
