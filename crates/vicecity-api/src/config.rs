use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct NetworkConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub discovery_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct NanoleafConfig {
    pub confirm_delay_ms: u64,
    pub max_confirm_retries: u32,
    pub effects_interval_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct SpotifyConfig {
    /// Market (ISO 3166 country code) used for player and search requests
    pub market: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct HubConfig {
    pub scene_step_delay_ms: u64,
    pub change_buffer: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub nanoleaf: NanoleafConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    pub hub: HubConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "Vice City Dashboard".to_string(),
            request_timeout_secs: 30,
            discovery_timeout_secs: 15,
        }
    }
}

impl Default for NanoleafConfig {
    fn default() -> Self {
        Self {
            confirm_delay_ms: 500,
            max_confirm_retries: 10,
            effects_interval_secs: 60,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            scene_step_delay_ms: 200,
            change_buffer: 256,
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

impl NanoleafConfig {
    #[must_use]
    pub const fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    #[must_use]
    pub const fn effects_interval(&self) -> Duration {
        Duration::from_secs(self.effects_interval_secs)
    }
}

impl HubConfig {
    #[must_use]
    pub const fn scene_step_delay(&self) -> Duration {
        Duration::from_millis(self.scene_step_delay_ms)
    }
}

impl SpotifyConfig {
    /// Configured market, falling back to the country part of a POSIX
    /// locale string such as `en_GB.UTF-8`.
    #[must_use]
    pub fn market_or_locale(&self, locale: Option<&str>) -> String {
        if let Some(market) = self.market.as_deref().filter(|m| !m.is_empty()) {
            return market.to_string();
        }

        locale
            .and_then(|loc| loc.split('.').next())
            .and_then(|loc| loc.split_once('_'))
            .map(|(_, country)| country.to_uppercase())
            .filter(|country| country.len() == 2)
            .unwrap_or_else(|| "US".to_string())
    }
}

/// Language subtag of a POSIX locale string (`de_AT.UTF-8` is `de`), or
/// `en` when unknown.
#[must_use]
pub fn language_from_locale(locale: Option<&str>) -> String {
    locale
        .and_then(|loc| loc.split(['.', '_', '@']).next())
        .filter(|lang| lang.len() == 2 && lang.chars().all(|c| c.is_ascii_alphabetic()))
        .map_or_else(|| "en".to_string(), str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use crate::config::{SpotifyConfig, language_from_locale};

    #[test]
    fn language_subtag() {
        assert_eq!(language_from_locale(Some("de_AT.UTF-8")), "de");
        assert_eq!(language_from_locale(Some("FR")), "fr");
        assert_eq!(language_from_locale(Some("C")), "en");
        assert_eq!(language_from_locale(Some("POSIX")), "en");
        assert_eq!(language_from_locale(None), "en");
    }

    #[test]
    fn market_prefers_config() {
        let cfg = SpotifyConfig {
            market: Some("DK".to_string()),
        };
        assert_eq!(cfg.market_or_locale(Some("en_GB.UTF-8")), "DK");
    }

    #[test]
    fn market_from_locale() {
        let cfg = SpotifyConfig::default();
        assert_eq!(cfg.market_or_locale(Some("en_GB.UTF-8")), "GB");
        assert_eq!(cfg.market_or_locale(Some("de_at")), "AT");
        assert_eq!(cfg.market_or_locale(Some("C")), "US");
        assert_eq!(cfg.market_or_locale(None), "US");
    }
}
