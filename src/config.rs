//! # config
//!
//! Service configuration, read once from the environment (and `.env`) at
//! startup.
//!
//! | Variable                    | Default        |
//! |-----------------------------|----------------|
//! | `BIND_ADDR`                 | `0.0.0.0:3000` |
//! | `API_KEY`                   | empty = dev mode, no auth |
//! | `QUOTE_SOURCE_URL`          | unset          |
//! | `QUOTE_CACHE_SECS`          | `60`           |
//! | `NOTIFY_WEBHOOK_URL`        | unset = log notifier |
//! | `NOTIFICATIONS_ENABLED`     | `true`         |
//! | `BIG_MOVER_INTERVAL_SECS`   | `1800`         |
//! | `PRICE_ALERT_INTERVAL_SECS` | `900`          |
//! | `BIG_MOVER_COOLDOWN_SECS`   | `21600`        |
//! | `EVENT_BUS_CAPACITY`        | `256`          |
//! | `DATABASE_URL`              | unset (feature `postgres`) |

use std::time::Duration;

use crate::engine::dedup::DEFAULT_COOLDOWN_SECS;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub api_key: String,
    pub quote_source_url: Option<String>,
    pub quote_cache_secs: u64,
    pub notify_webhook_url: Option<String>,
    /// Backs `Notifier::can_post_notification`.
    pub notifications_enabled: bool,
    pub big_mover_interval_secs: u64,
    pub price_alert_interval_secs: u64,
    pub big_mover_cooldown_secs: u64,
    pub event_bus_capacity: usize,
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            api_key: String::new(),
            quote_source_url: None,
            quote_cache_secs: 60,
            notify_webhook_url: None,
            notifications_enabled: true,
            big_mover_interval_secs: 30 * 60,
            price_alert_interval_secs: 15 * 60,
            big_mover_cooldown_secs: DEFAULT_COOLDOWN_SECS,
            event_bus_capacity: 256,
            database_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source; unset, empty or unparsable values
    /// fall back to the defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let text = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let num = |key: &str, default: u64| text(key).and_then(|v| v.parse().ok()).unwrap_or(default);

        Self {
            bind_addr:                 text("BIND_ADDR").unwrap_or(d.bind_addr),
            api_key:                   text("API_KEY").unwrap_or_default(),
            quote_source_url:          text("QUOTE_SOURCE_URL").map(|u| u.trim_end_matches('/').to_string()),
            quote_cache_secs:          num("QUOTE_CACHE_SECS", d.quote_cache_secs),
            notify_webhook_url:        text("NOTIFY_WEBHOOK_URL"),
            notifications_enabled:     text("NOTIFICATIONS_ENABLED")
                                           .map(|v| parse_bool(&v))
                                           .unwrap_or(d.notifications_enabled),
            big_mover_interval_secs:   num("BIG_MOVER_INTERVAL_SECS", d.big_mover_interval_secs).max(1),
            price_alert_interval_secs: num("PRICE_ALERT_INTERVAL_SECS", d.price_alert_interval_secs).max(1),
            big_mover_cooldown_secs:   num("BIG_MOVER_COOLDOWN_SECS", d.big_mover_cooldown_secs),
            event_bus_capacity:        num("EVENT_BUS_CAPACITY", d.event_bus_capacity as u64).max(1) as usize,
            database_url:              text("DATABASE_URL"),
        }
    }

    pub fn quote_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_cache_secs)
    }

    pub fn big_mover_interval(&self) -> Duration {
        Duration::from_secs(self.big_mover_interval_secs)
    }

    pub fn price_alert_interval(&self) -> Duration {
        Duration::from_secs(self.price_alert_interval_secs)
    }

    /// Out-of-range values fall back to the 6 hour default.
    pub fn cooldown(&self) -> chrono::Duration {
        i64::try_from(self.big_mover_cooldown_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::hours(6))
    }
}

fn parse_bool(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_config(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = make_config(&[]);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.big_mover_interval_secs, 1800);
        assert_eq!(config.price_alert_interval_secs, 900);
        assert_eq!(config.cooldown(), chrono::Duration::hours(6));
        assert!(config.notifications_enabled);
        assert!(config.quote_source_url.is_none());
    }

    #[test]
    fn test_overrides_and_garbage() {
        let config = make_config(&[
            ("QUOTE_SOURCE_URL", "http://quotes.local/"),
            ("NOTIFICATIONS_ENABLED", "off"),
            ("BIG_MOVER_INTERVAL_SECS", "not-a-number"),
            ("EVENT_BUS_CAPACITY", "0"),
            ("API_KEY", "  "),
        ]);
        assert_eq!(config.quote_source_url.as_deref(), Some("http://quotes.local"));
        assert!(!config.notifications_enabled);
        assert_eq!(config.big_mover_interval_secs, 1800);
        assert_eq!(config.event_bus_capacity, 1);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_oversized_cooldown_falls_back() {
        let config = make_config(&[("BIG_MOVER_COOLDOWN_SECS", "18446744073709551615")]);
        assert_eq!(config.cooldown(), chrono::Duration::hours(6));

        let config = make_config(&[("BIG_MOVER_COOLDOWN_SECS", "9223372036854775807")]);
        assert_eq!(config.cooldown(), chrono::Duration::hours(6));

        let config = make_config(&[("BIG_MOVER_COOLDOWN_SECS", "60")]);
        assert_eq!(config.cooldown(), chrono::Duration::minutes(1));
    }
}
