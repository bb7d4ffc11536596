//! Runtime configuration for the overlay engine

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::error::MapError;

const DEFAULT_API_BASE: &str = "http://localhost:3000/";
const DEFAULT_USER_AGENT: &str = "TrapMap/0.1";

/// Tunables shared by every overlay on a map
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    /// Base URL the overlay endpoints are resolved against
    pub api_base: Url,
    /// Trailing debounce window for viewport changes
    pub debounce_ms: u64,
    /// Delay between layer creation and binding pointer handlers
    pub handler_bind_delay_ms: u64,
    /// Number of native fetch workers
    pub fetch_workers: usize,
    pub user_agent: String,
    /// Pointer hit radius used by the retained engine
    pub hit_radius_px: f32,
}

impl MapConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn handler_bind_delay(&self) -> Duration {
        Duration::from_millis(self.handler_bind_delay_ms)
    }

    /// Build a config from `TRAPMAP_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, MapError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MapError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("TRAPMAP_API_BASE") {
            config.api_base = Url::parse(&raw).map_err(|e| MapError::Config {
                key: "TRAPMAP_API_BASE",
                reason: e.to_string(),
            })?;
        }
        if let Some(raw) = lookup("TRAPMAP_DEBOUNCE_MS") {
            config.debounce_ms = parse_number("TRAPMAP_DEBOUNCE_MS", &raw)?;
        }
        if let Some(raw) = lookup("TRAPMAP_BIND_DELAY_MS") {
            config.handler_bind_delay_ms = parse_number("TRAPMAP_BIND_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("TRAPMAP_FETCH_WORKERS") {
            config.fetch_workers = parse_number("TRAPMAP_FETCH_WORKERS", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file; absent keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading map config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing map config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MapError> {
        if self.fetch_workers == 0 {
            return Err(MapError::Config {
                key: "fetch_workers",
                reason: "at least one worker is required".to_string(),
            });
        }
        if self.api_base.cannot_be_a_base() {
            return Err(MapError::Config {
                key: "api_base",
                reason: format!("{} cannot be used as a base URL", self.api_base),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, MapError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| MapError::Config {
        key,
        reason: e.to_string(),
    })
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            debounce_ms: 300,
            handler_bind_delay_ms: 100,
            fetch_workers: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            hit_radius_px: 12.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = MapConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.handler_bind_delay(), Duration::from_millis(100));
        assert_eq!(config.fetch_workers, 4);
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = MapConfig::from_lookup(lookup(&[
            ("TRAPMAP_API_BASE", "https://api.example.com/v1/"),
            ("TRAPMAP_DEBOUNCE_MS", "150"),
        ]))
        .unwrap();

        assert_eq!(config.api_base.as_str(), "https://api.example.com/v1/");
        assert_eq!(config.debounce_ms, 150);
        assert_eq!(config.handler_bind_delay_ms, 100);
    }

    #[test]
    fn rejects_non_numeric_debounce() {
        let err = MapConfig::from_lookup(lookup(&[("TRAPMAP_DEBOUNCE_MS", "soon")])).unwrap_err();
        assert!(matches!(err, MapError::Config { key: "TRAPMAP_DEBOUNCE_MS", .. }));
    }

    #[test]
    fn rejects_zero_workers() {
        let err = MapConfig::from_lookup(lookup(&[("TRAPMAP_FETCH_WORKERS", "0")])).unwrap_err();
        assert!(matches!(err, MapError::Config { key: "fetch_workers", .. }));
    }

    #[test]
    fn json_file_keeps_defaults_for_missing_keys() {
        let path = std::env::temp_dir().join(format!("trapmap-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "debounce_ms": 500 }"#).unwrap();

        let config = MapConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.fetch_workers, 4);
    }
}
