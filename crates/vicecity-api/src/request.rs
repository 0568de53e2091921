use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PluginId {
    Hue,
    Nanoleaf,
    PiHole,
    Weather,
    Facts,
    Insults,
    Spotify,
}

impl PluginId {
    pub const ALL: [Self; 7] = [
        Self::Hue,
        Self::Nanoleaf,
        Self::PiHole,
        Self::Weather,
        Self::Facts,
        Self::Insults,
        Self::Spotify,
    ];

    /// Object name used as the first segment of settings keys
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hue => "Hue",
            Self::Nanoleaf => "Nanoleaf",
            Self::PiHole => "PiHole",
            Self::Weather => "Weather",
            Self::Facts => "Facts",
            Self::Insults => "Insults",
            Self::Spotify => "Spotify",
        }
    }
}

impl Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum HueCommand {
    Power(bool),
    /// Percentage, `0.0..=100.0`
    Brightness(f64),
    /// Kelvin
    ColorTemperature(u32),
    Xy(f64, f64),
    /// Degrees, `0..=359`
    Hue(i64),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpotifyCommand {
    Play(Option<String>),
    Pause,
    Previous,
    Next,
    /// Seconds into the current track
    Seek(u32),
    EnableShuffle(bool),
    EnableRepeat { value: bool, all: bool },
    SetVolume(u8),
    Search(String),
    Queue(String),
    Transfer(String),
    RefreshDevices,
    RefreshPlaylists,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum HubRequest {
    SetActive(bool),
    SetUse24HourClock(bool),
    SetDarkerBackground(bool),
    SetScreensaverEnabled(bool),

    SetPluginActive(PluginId, bool),
    /// Poll interval in milliseconds
    SetUpdateInterval(PluginId, u64),

    RunScene(String),

    Hue(u32, HueCommand),

    NanoleafPower(bool),
    NanoleafSelectEffect(String),

    Spotify(SpotifyCommand),
}
