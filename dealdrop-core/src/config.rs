// File: dealdrop-core/src/config.rs

use std::str::FromStr;
use chrono::Duration;
use dotenv::dotenv;
use tracing::warn;

/// Engine tunables. Everything can be overridden from the environment
/// (`DEALDROP_*`); unset or unparsable values fall back to the defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a reservation holds its unit before the reaper may reclaim
    /// it.
    pub reservation_ttl_minutes: i64,
    /// Cadence of the background expiry sweep.
    pub sweep_interval_secs: u64,
    /// Maximum overdue claims processed per sweep. Bounded so a large
    /// backlog cannot starve reservation traffic on a shared store.
    pub sweep_page_size: i64,
    /// Remaining-quantity level at or below which a `SlotLowStock` event is
    /// emitted after a successful reservation.
    pub low_stock_threshold: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reservation_ttl_minutes: 30,
            sweep_interval_secs: 30,
            sweep_page_size: 200,
            low_stock_threshold: 5,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("Ignoring unparsable {}={:?}; using default.", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();
        Self {
            reservation_ttl_minutes: env_or(
                "DEALDROP_RESERVATION_TTL_MINUTES",
                defaults.reservation_ttl_minutes,
            ),
            sweep_interval_secs: env_or(
                "DEALDROP_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
            sweep_page_size: env_or("DEALDROP_SWEEP_PAGE_SIZE", defaults.sweep_page_size),
            low_stock_threshold: env_or(
                "DEALDROP_LOW_STOCK_THRESHOLD",
                defaults.low_stock_threshold,
            ),
        }
    }

    pub fn reservation_ttl(&self) -> Duration {
        Duration::minutes(self.reservation_ttl_minutes)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.reservation_ttl(), Duration::minutes(30));
        assert_eq!(cfg.sweep_interval(), std::time::Duration::from_secs(30));
        assert!(cfg.sweep_page_size > 0);
    }
}
