//! Persisted settings.
//!
//! The settings file is a flat JSON object whose keys name a property as
//! `Object.property` (e.g. `Weather.latitude`). Keys are resolved against
//! a static registry of typed setters and getters. Only keys present in
//! the file are tracked, and only those are written back on save.

use std::fs::{File, OpenOptions};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::Instant;

use vicecity_api::request::PluginId;

use crate::error::{ApiError, ApiResult};
use crate::hub::Hub;
use crate::plugin::interval_from_millis;

#[derive(Error, Debug)]
pub enum SettingError {
    #[error("Expected {0}")]
    WrongType(&'static str),

    #[error("Invalid scenes: {0}")]
    InvalidScenes(#[from] serde_json::Error),
}

type ApplyFn = fn(&mut Hub, &Value, Instant) -> Result<(), SettingError>;
type ReadFn = fn(&Hub) -> Value;

/// A settable, persisted property
pub struct Setting {
    pub key: &'static str,
    apply: ApplyFn,
    read: ReadFn,
}

fn as_bool(value: &Value) -> Result<bool, SettingError> {
    value.as_bool().ok_or(SettingError::WrongType("a boolean"))
}

fn as_str(value: &Value) -> Result<&str, SettingError> {
    value.as_str().ok_or(SettingError::WrongType("a string"))
}

fn as_f64(value: &Value) -> Result<f64, SettingError> {
    value.as_f64().ok_or(SettingError::WrongType("a number"))
}

pub static SETTINGS: &[Setting] = &[
    Setting {
        key: "Hub.use24HourClock",
        apply: |hub, v, _| {
            hub.set_use_24_hour_clock(as_bool(v)?);
            Ok(())
        },
        read: |hub| hub.use_24_hour_clock().into(),
    },
    Setting {
        key: "Hub.darkerBackground",
        apply: |hub, v, _| {
            hub.set_darker_background(as_bool(v)?);
            Ok(())
        },
        read: |hub| hub.darker_background().into(),
    },
    Setting {
        key: "Hub.screensaverEnabled",
        apply: |hub, v, _| {
            hub.set_screensaver_enabled(as_bool(v)?);
            Ok(())
        },
        read: |hub| hub.screensaver_enabled().into(),
    },
    Setting {
        key: "Hub.homeMap",
        apply: |hub, v, _| {
            hub.set_home_map(as_str(v)?);
            Ok(())
        },
        read: |hub| hub.home_map().into(),
    },
    Setting {
        key: "Hub.scenes",
        apply: |hub, v, _| {
            hub.set_scenes(serde_json::from_value(v.clone())?);
            Ok(())
        },
        read: |hub| serde_json::to_value(hub.scenes()).unwrap_or_default(),
    },
    Setting {
        key: "Hue.bridgeUsername",
        apply: |hub, v, now| {
            hub.hue.set_bridge_username(as_str(v)?, now);
            Ok(())
        },
        read: |hub| hub.hue.bridge_username().into(),
    },
    Setting {
        key: "Hue.mapModel",
        apply: |hub, v, _| {
            hub.hue.set_map_model(v.clone());
            Ok(())
        },
        read: |hub| hub.hue.map_model().clone(),
    },
    Setting {
        key: "Nanoleaf.authToken",
        apply: |hub, v, now| {
            hub.nanoleaf.set_auth_token(as_str(v)?, now);
            Ok(())
        },
        read: |hub| hub.nanoleaf.auth_token().into(),
    },
    Setting {
        key: "Nanoleaf.mapPoint",
        apply: |hub, v, _| {
            hub.nanoleaf.set_map_point(v.clone());
            Ok(())
        },
        read: |hub| hub.nanoleaf.map_point().clone(),
    },
    Setting {
        key: "PiHole.serverHostname",
        apply: |hub, v, _| {
            hub.pihole.set_server_hostname(as_str(v)?);
            Ok(())
        },
        read: |hub| hub.pihole.server_hostname().into(),
    },
    Setting {
        key: "Weather.latitude",
        apply: |hub, v, now| {
            hub.weather.set_latitude(as_f64(v)?, now);
            Ok(())
        },
        read: |hub| hub.weather.latitude().into(),
    },
    Setting {
        key: "Weather.longitude",
        apply: |hub, v, now| {
            hub.weather.set_longitude(as_f64(v)?, now);
            Ok(())
        },
        read: |hub| hub.weather.longitude().into(),
    },
    Setting {
        key: "Weather.apiKey",
        apply: |hub, v, now| {
            hub.weather.set_api_key(as_str(v)?, now);
            Ok(())
        },
        read: |hub| hub.weather.api_key().into(),
    },
    Setting {
        key: "Facts.language",
        apply: |hub, v, _| {
            hub.facts.set_language(as_str(v)?);
            Ok(())
        },
        read: |hub| hub.facts.language().into(),
    },
    Setting {
        key: "Insults.language",
        apply: |hub, v, _| {
            hub.insults.set_language(as_str(v)?);
            Ok(())
        },
        read: |hub| hub.insults.language().into(),
    },
    Setting {
        key: "Spotify.clientID",
        apply: |hub, v, _| {
            hub.spotify.set_client_id(as_str(v)?);
            Ok(())
        },
        read: |hub| hub.spotify.client_id().into(),
    },
    Setting {
        key: "Spotify.clientSecret",
        apply: |hub, v, _| {
            hub.spotify.set_client_secret(as_str(v)?);
            Ok(())
        },
        read: |hub| hub.spotify.client_secret().into(),
    },
    Setting {
        key: "Spotify.refreshToken",
        apply: |hub, v, _| {
            hub.spotify.set_refresh_token(as_str(v)?);
            Ok(())
        },
        read: |hub| hub.spotify.refresh_token().into(),
    },
    Setting {
        key: "Spotify.preferredDevice",
        apply: |hub, v, _| {
            hub.spotify.set_preferred_device(as_str(v)?);
            Ok(())
        },
        read: |hub| hub.spotify.preferred_device().into(),
    },
];

/// A resolved settings key
#[derive(Clone, Copy)]
pub enum SettingKey {
    Fixed(&'static Setting),
    UpdateInterval(PluginId),
    IsActive(PluginId),
}

impl SettingKey {
    #[must_use]
    pub fn resolve(key: &str) -> Option<Self> {
        if let Some(setting) = SETTINGS.iter().find(|setting| setting.key == key) {
            return Some(Self::Fixed(setting));
        }

        let (object, property) = key.split_once('.')?;
        let id = PluginId::ALL.into_iter().find(|id| id.name() == object)?;
        match property {
            "updateInterval" => Some(Self::UpdateInterval(id)),
            "isActive" => Some(Self::IsActive(id)),
            _ => None,
        }
    }

    pub fn apply(self, hub: &mut Hub, value: &Value, now: Instant) -> Result<(), SettingError> {
        match self {
            Self::Fixed(setting) => (setting.apply)(hub, value, now),
            Self::UpdateInterval(id) => {
                let interval =
                    interval_from_millis(value).ok_or(SettingError::WrongType("milliseconds"))?;
                hub.plugin_mut(id).set_update_interval(interval, now);
                Ok(())
            }
            Self::IsActive(id) => {
                hub.plugin_mut(id).set_active(as_bool(value)?, now);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn read(self, hub: &Hub) -> Value {
        match self {
            Self::Fixed(setting) => (setting.read)(hub),
            Self::UpdateInterval(id) => {
                let interval = hub.plugin(id).base().update_interval();
                u64::try_from(interval.as_millis())
                    .unwrap_or(u64::MAX)
                    .into()
            }
            Self::IsActive(id) => hub.plugin(id).base().is_active().into(),
        }
    }
}

pub struct SettingsStore {
    path: Utf8PathBuf,
    document: Map<String, Value>,
    keys: Vec<(String, SettingKey)>,
    saved: Map<String, Value>,
}

impl SettingsStore {
    /// Read the settings file, which must exist, be writable, and hold a
    /// JSON object.
    pub fn open(path: &Utf8Path) -> ApiResult<Self> {
        if let Err(err) = OpenOptions::new().read(true).write(true).open(path) {
            log::error!("Cannot open settings file {path}: {err}");
            return Err(ApiError::SettingsFile(path.to_string()));
        }

        log::debug!("Loading settings file {path}");
        let fd = File::open(path)?;
        let Value::Object(document) = serde_json::from_reader(fd)? else {
            return Err(ApiError::SettingsFile(path.to_string()));
        };

        Ok(Self {
            path: path.to_path_buf(),
            document,
            keys: vec![],
            saved: Map::new(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Directory relative settings (such as the home map) are resolved in
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        self.path.parent().unwrap_or_else(|| Utf8Path::new("."))
    }

    /// Apply every resolvable key to `hub`, remembering which keys were
    /// present. Unknown keys and mistyped values are skipped.
    pub fn apply(&mut self, hub: &mut Hub, now: Instant) {
        self.keys.clear();
        for (name, value) in &self.document {
            let Some(key) = SettingKey::resolve(name) else {
                log::warn!("Ignoring settings key because it does not resolve: {name}");
                continue;
            };

            if let Err(err) = key.apply(hub, value, now) {
                log::warn!("Ignoring settings key {name}: {err}");
                continue;
            }

            self.keys.push((name.clone(), key));
        }
        self.saved = self.snapshot(hub);
    }

    /// Current values of the tracked keys
    #[must_use]
    pub fn snapshot(&self, hub: &Hub) -> Map<String, Value> {
        self.keys
            .iter()
            .map(|(name, key)| (name.clone(), key.read(hub)))
            .collect()
    }

    /// Write the tracked keys back if any of them changed since the last
    /// save. Keys that were skipped on load are preserved as found.
    pub fn save_if_changed(&mut self, hub: &Hub) -> ApiResult<bool> {
        let snapshot = self.snapshot(hub);
        if snapshot == self.saved {
            return Ok(false);
        }

        let mut document = self.document.clone();
        document.extend(snapshot.clone());

        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &document)?;
        log::debug!("Saved settings file {}", self.path);

        self.document = document;
        self.saved = snapshot;
        Ok(true)
    }
}
