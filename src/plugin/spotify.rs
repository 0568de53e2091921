//! Spotify Web API player.
//!
//! Authorization uses a long-lived refresh token to obtain short-lived
//! bearer tokens. Playback state is polled every second once a token is
//! held; a 401 from any endpoint drops the token and asks for a new one.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use itertools::Itertools;
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use url::form_urlencoded;

use vicecity_api::request::{PluginId, SpotifyCommand};

use crate::changes::{ChangeBus, update};
use crate::error::ApiResult;
use crate::gateway::{Gateway, Sender};
use crate::plugin::{OneShot, Plugin, PluginBase, PollTimer, earliest};

const API_URL: &str = "https://api.spotify.com/v1";
const PLAYER_URL: &str = "https://api.spotify.com/v1/me/player";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// One minute less than the standard token lifetime
const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(59 * 60);
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);
const ACTION_HOLD: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub name: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub name: String,
    pub uri: String,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackDevice {
    pub name: String,
    pub id: String,
}

/// Render a duration in seconds as `m:ss`.
#[must_use]
pub fn format_duration(secs: i64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn str_of<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a str {
    obj.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Url of the first (largest) image in an `images` array
fn first_image(obj: &Map<String, Value>) -> Option<Option<String>> {
    let images = obj.get("images")?.as_array()?;
    Some(
        images
            .first()
            .and_then(|img| img.get("url"))
            .and_then(Value::as_str)
            .map(ToString::to_string),
    )
}

/// Comma separated artist names, or `None` when there are none.
fn artist_names(obj: &Map<String, Value>) -> Option<String> {
    let names = obj
        .get("artists")?
        .as_array()?
        .iter()
        .filter_map(|artist| artist.get("name").and_then(Value::as_str))
        .filter(|name| !name.is_empty())
        .join(", ");
    (!names.is_empty()).then_some(names)
}

fn encode(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

#[allow(clippy::struct_excessive_bools)]
pub struct SpotifyPlugin {
    base: PluginBase,
    market: String,

    client_id: String,
    client_secret: String,
    refresh_token: String,
    authorization: Option<String>,
    token_timer: PollTimer,

    preferred_device: String,
    preferred_device_id: String,

    user_name: String,
    user_email: String,
    user_subscription: String,
    user_image: Option<String>,

    playback_active: bool,
    is_playing: bool,
    shuffle_enabled: bool,
    repeat_one_enabled: bool,
    repeat_all_enabled: bool,
    track_name: String,
    track_artist: String,
    track_album: String,
    track_album_art: Option<String>,
    track_position: i64,
    track_duration: i64,
    playlist_name: String,
    device_name: String,
    device_type: String,
    device_volume: i64,

    playlists: Vec<Playlist>,
    devices: Vec<PlaybackDevice>,
    search_results: Vec<SearchResult>,

    inactivity: OneShot,
    action_hold: OneShot,
}

impl SpotifyPlugin {
    pub fn new(gateway: Gateway, changes: ChangeBus, market: String) -> ApiResult<Self> {
        let base = PluginBase::new(PluginId::Spotify, PluginId::Spotify.name(), gateway, changes)?
            .with_update_interval(Duration::from_secs(1));

        Ok(Self {
            base,
            market,
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            authorization: None,
            token_timer: PollTimer::new(TOKEN_REFRESH_INTERVAL),
            preferred_device: String::new(),
            preferred_device_id: String::new(),
            user_name: String::new(),
            user_email: String::new(),
            user_subscription: String::new(),
            user_image: None,
            playback_active: false,
            is_playing: false,
            shuffle_enabled: false,
            repeat_one_enabled: false,
            repeat_all_enabled: false,
            track_name: String::new(),
            track_artist: String::new(),
            track_album: String::new(),
            track_album_art: None,
            track_position: 0,
            track_duration: 0,
            playlist_name: String::new(),
            device_name: String::new(),
            device_type: String::new(),
            device_volume: 0,
            playlists: vec![],
            devices: vec![],
            search_results: vec![],
            inactivity: OneShot::default(),
            action_hold: OneShot::default(),
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    #[must_use]
    pub fn preferred_device(&self) -> &str {
        &self.preferred_device
    }

    pub fn set_client_id(&mut self, value: &str) {
        if update(&mut self.client_id, value.to_string()) {
            self.refresh_access_token();
        }
    }

    pub fn set_client_secret(&mut self, value: &str) {
        if update(&mut self.client_secret, value.to_string()) {
            self.refresh_access_token();
        }
    }

    pub fn set_refresh_token(&mut self, value: &str) {
        if update(&mut self.refresh_token, value.to_string()) {
            self.refresh_access_token();
        }
    }

    pub fn set_preferred_device(&mut self, name: &str) {
        let name = name.to_string();
        self.base
            .publish("preferredDevice", &mut self.preferred_device, name);
    }

    #[must_use]
    pub const fn is_playback_active(&self) -> bool {
        self.playback_active
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.is_playing
    }

    #[must_use]
    pub const fn track_position(&self) -> i64 {
        self.track_position
    }

    #[must_use]
    pub const fn track_duration(&self) -> i64 {
        self.track_duration
    }

    #[must_use]
    pub fn track_name(&self) -> &str {
        &self.track_name
    }

    #[must_use]
    pub fn track_artist(&self) -> &str {
        &self.track_artist
    }

    #[must_use]
    pub fn playlist_name(&self) -> &str {
        &self.playlist_name
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    #[must_use]
    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    #[must_use]
    pub fn devices(&self) -> &[PlaybackDevice] {
        &self.devices
    }

    #[must_use]
    pub fn search_results(&self) -> &[SearchResult] {
        &self.search_results
    }

    #[must_use]
    pub const fn token_refresh_interval(&self) -> Duration {
        self.token_timer.period()
    }

    /// Exchange the refresh token for a new bearer token, once all three
    /// credentials are known.
    pub fn refresh_access_token(&self) {
        if self.client_id.is_empty() || self.client_secret.is_empty() || self.refresh_token.is_empty()
        {
            return;
        }

        log::info!("[{}] Refreshing access token", self.base.name());
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", &self.refresh_token)
            .finish();
        let client_info = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        self.base.gateway.send_request(
            TOKEN_URL,
            self.base.sender(),
            Method::POST,
            Some(Bytes::from(body)),
            Some("application/x-www-form-urlencoded"),
            Some(&format!("Basic {client_info}")),
        );
    }

    fn send(&self, destination: &str, method: Method, body: Option<&Value>) {
        let auth = self.authorization.as_deref();
        let sender = self.base.sender();
        match body {
            Some(body) => self
                .base
                .gateway
                .send_json_request(destination, sender, method, body, auth),
            None => self
                .base
                .gateway
                .send_request(destination, sender, method, None, None, auth),
        }
    }

    fn send_get(&self, destination: &str) {
        self.send(destination, Method::GET, None);
    }

    pub fn refresh_devices(&self) {
        if self.authorization.is_some() {
            self.send_get(&format!("{PLAYER_URL}/devices"));
        }
    }

    pub fn refresh_user_profile(&self) {
        if self.authorization.is_some() {
            self.send_get(&format!("{API_URL}/me"));
        }
    }

    pub fn refresh_playlists(&self) {
        if self.authorization.is_some() {
            self.send_get(&format!("{API_URL}/me/playlists"));
        }
    }

    fn hold_actions(&mut self, now: Instant) {
        self.action_hold.arm(now, ACTION_HOLD);
    }

    fn holding(&self, now: Instant) -> bool {
        self.action_hold.deadline().is_some_and(|at| at > now)
    }

    fn reset_track_progress(&mut self) {
        self.base
            .publish("trackPosition", &mut self.track_position, 0);
        self.base
            .publish("trackDuration", &mut self.track_duration, 0);
    }

    /// Start playback, of `uri` if given. When idle, playback starts on the
    /// preferred device if its id is known.
    pub fn play(&mut self, uri: Option<&str>, now: Instant) {
        let mut destination = format!("{PLAYER_URL}/play");
        if !self.playback_active {
            if self.preferred_device_id.is_empty() {
                log::debug!(
                    "[{}] Playback is not active, and no preferred device to start on",
                    self.base.name()
                );
            } else {
                log::debug!(
                    "[{}] Playback is not active, so defaulting to device {}",
                    self.base.name(),
                    self.preferred_device
                );
                destination.push_str(&format!("?device_id={}", self.preferred_device_id));
            }
        }

        let body = uri
            .filter(|uri| !uri.is_empty())
            .map(|uri| json!({"context_uri": uri}));
        self.send(&destination, Method::PUT, body.as_ref());

        self.base.publish("isPlaying", &mut self.is_playing, true);
        self.hold_actions(now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.send(&format!("{PLAYER_URL}/pause"), Method::PUT, None);
        self.base.publish("isPlaying", &mut self.is_playing, false);
        self.hold_actions(now);
    }

    pub fn previous(&mut self, now: Instant) {
        self.send(&format!("{PLAYER_URL}/previous"), Method::POST, None);
        self.reset_track_progress();
        self.hold_actions(now);
    }

    pub fn next(&mut self, now: Instant) {
        self.send(&format!("{PLAYER_URL}/next"), Method::POST, None);
        self.reset_track_progress();
        self.hold_actions(now);
    }

    /// Seek to `position` seconds into the current track.
    pub fn seek(&mut self, position: u32, now: Instant) {
        let ms = u64::from(position) * 1000;
        self.send(
            &format!("{PLAYER_URL}/seek?position_ms={ms}"),
            Method::PUT,
            None,
        );
        self.base
            .publish("trackPosition", &mut self.track_position, i64::from(position));
        self.hold_actions(now);
    }

    pub fn enable_shuffle(&self, value: bool) {
        self.send(
            &format!("{PLAYER_URL}/shuffle?state={value}"),
            Method::PUT,
            None,
        );
    }

    pub fn enable_repeat(&self, value: bool, all: bool) {
        let state = match (value, all) {
            (false, _) => "off",
            (true, false) => "track",
            (true, true) => "context",
        };
        self.send(
            &format!("{PLAYER_URL}/repeat?state={state}"),
            Method::PUT,
            None,
        );
    }

    pub fn set_volume(&self, percent: u8) {
        self.send(
            &format!("{PLAYER_URL}/volume?volume_percent={}", percent.min(100)),
            Method::PUT,
            None,
        );
    }

    /// Search for tracks. An empty query clears the results.
    pub fn search(&mut self, query: &str) {
        if query.is_empty() {
            self.base
                .publish("searchResults", &mut self.search_results, vec![]);
            return;
        }
        self.send_get(&format!(
            "{API_URL}/search?type=track&market={}&limit=20&q={}",
            self.market,
            encode(query)
        ));
    }

    pub fn queue(&self, uri: &str) {
        self.send(
            &format!("{PLAYER_URL}/queue?uri={}", encode(uri)),
            Method::POST,
            None,
        );
    }

    pub fn transfer(&self, device_id: &str) {
        self.send(
            PLAYER_URL,
            Method::PUT,
            Some(&json!({"device_ids": [device_id]})),
        );
    }

    pub fn command(&mut self, cmd: &SpotifyCommand, now: Instant) {
        match cmd {
            SpotifyCommand::Play(uri) => self.play(uri.as_deref(), now),
            SpotifyCommand::Pause => self.pause(now),
            SpotifyCommand::Previous => self.previous(now),
            SpotifyCommand::Next => self.next(now),
            SpotifyCommand::Seek(pos) => self.seek(*pos, now),
            SpotifyCommand::EnableShuffle(value) => self.enable_shuffle(*value),
            SpotifyCommand::EnableRepeat { value, all } => self.enable_repeat(*value, *all),
            SpotifyCommand::SetVolume(pct) => self.set_volume(*pct),
            SpotifyCommand::Search(query) => self.search(query),
            SpotifyCommand::Queue(uri) => self.queue(uri),
            SpotifyCommand::Transfer(id) => self.transfer(id),
            SpotifyCommand::RefreshDevices => self.refresh_devices(),
            SpotifyCommand::RefreshPlaylists => self.refresh_playlists(),
        }
    }

    fn handle_token(&mut self, obj: &Map<String, Value>, now: Instant) {
        let token = str_of(obj, "access_token");
        let token_type = str_of(obj, "token_type");

        // only ever shorten the refresh interval to fit a tighter expiry
        let expires_in = obj.get("expires_in").and_then(Value::as_u64).unwrap_or(0);
        let interval = Duration::from_secs(expires_in.saturating_sub(60));
        if !interval.is_zero() && interval < self.token_timer.period() {
            self.token_timer.set_period(interval, now);
        }

        self.authorization = Some(format!("{token_type} {token}"));

        self.base.start_polling(now);
        self.token_timer.start(now);

        self.refresh();
        self.refresh_user_profile();
        self.refresh_playlists();
        self.refresh_devices();

        log::info!(
            "[{}] Received new access token, asking again in {} seconds",
            self.base.name(),
            self.token_timer.period().as_secs()
        );
    }

    fn go_idle(&mut self) {
        if !self.playback_active {
            return;
        }
        self.playback_active = false;
        self.base.notify("isPlaybackActive", false);
        self.reset_track_progress();
        self.base
            .publish("playlistName", &mut self.playlist_name, String::new());
    }

    fn handle_playback(&mut self, obj: &Map<String, Value>, now: Instant) {
        self.inactivity.arm(now, INACTIVITY_TIMEOUT);
        self.base
            .publish("isPlaybackActive", &mut self.playback_active, true);

        let holding = self.holding(now);

        if !holding {
            let playing = obj.get("is_playing").and_then(Value::as_bool).unwrap_or(false);
            self.base.publish("isPlaying", &mut self.is_playing, playing);
        }

        if let Some(device) = obj.get("device").and_then(Value::as_object) {
            if let Some(name) = device.get("name") {
                let name = name.as_str().unwrap_or_default().to_string();
                self.base.publish("deviceName", &mut self.device_name, name);
            }
            if let Some(kind) = device.get("type") {
                let kind = kind.as_str().unwrap_or_default().to_string();
                self.base.publish("deviceType", &mut self.device_type, kind);
            }
            if let Some(volume) = device.get("volume_percent").and_then(Value::as_i64) {
                self.base
                    .publish("deviceVolume", &mut self.device_volume, volume);
            }
        }

        if let Some(shuffle) = obj.get("shuffle_state") {
            let shuffle = shuffle.as_bool().unwrap_or(false);
            self.base
                .publish("shuffleEnabled", &mut self.shuffle_enabled, shuffle);
        }

        if let Some(repeat) = obj.get("repeat_state") {
            let repeat = repeat.as_str().unwrap_or_default();
            self.base
                .publish("repeatOneEnabled", &mut self.repeat_one_enabled, repeat == "track");
            self.base
                .publish("repeatAllEnabled", &mut self.repeat_all_enabled, repeat == "context");
        }

        if let Some(progress) = obj.get("progress_ms") {
            if !holding {
                let secs = progress.as_i64().unwrap_or(0) / 1000;
                self.base
                    .publish("trackPosition", &mut self.track_position, secs);
            }
        }

        if let Some(context) = obj.get("context") {
            self.handle_context(context);
        }

        if let Some(item) = obj.get("item").and_then(Value::as_object) {
            self.handle_item(item, holding);
        }
    }

    fn handle_context(&mut self, context: &Value) {
        let empty = Map::new();
        let context = context.as_object().unwrap_or(&empty);

        match (context.get("type"), context.get("uri")) {
            (Some(kind), Some(uri)) => {
                if kind.as_str() == Some("playlist") {
                    let uri = uri.as_str().unwrap_or_default();
                    let id = uri.rsplit(':').next().unwrap_or_default();
                    self.send_get(&format!("{API_URL}/playlists/{id}?fields=name,uri"));
                } else {
                    self.base
                        .publish("playlistName", &mut self.playlist_name, String::new());
                }
            }
            _ if context.is_empty() => {
                self.base
                    .publish("playlistName", &mut self.playlist_name, String::new());
            }
            _ => {}
        }
    }

    fn handle_item(&mut self, item: &Map<String, Value>, holding: bool) {
        if let Some(name) = item.get("name") {
            let name = name.as_str().unwrap_or_default().to_string();
            self.base.publish("trackName", &mut self.track_name, name);
        }

        if let Some(duration) = item.get("duration_ms") {
            if !holding {
                let secs = duration.as_i64().unwrap_or(0) / 1000;
                self.base
                    .publish("trackDuration", &mut self.track_duration, secs);
            }
        }

        if let Some(album) = item.get("album").and_then(Value::as_object) {
            if let Some(name) = album.get("name") {
                let name = name.as_str().unwrap_or_default().to_string();
                self.base.publish("trackAlbum", &mut self.track_album, name);
            }
            if let Some(art) = first_image(album) {
                self.base
                    .publish("trackAlbumArt", &mut self.track_album_art, art);
            }
        }

        if let Some(artist) = artist_names(item) {
            self.base.publish("trackArtist", &mut self.track_artist, artist);
        }
    }

    fn handle_search(&mut self, tracks: &Value) {
        let results = tracks
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .filter(|item| !item.is_empty())
                    .map(|item| {
                        let album = item.get("album").and_then(Value::as_object);
                        SearchResult {
                            name: str_of(item, "name").to_string(),
                            uri: str_of(item, "uri").to_string(),
                            artist: artist_names(item),
                            album: album
                                .and_then(|album| album.get("name"))
                                .and_then(Value::as_str)
                                .map(ToString::to_string),
                            image: album.and_then(first_image).flatten(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.base
            .publish("searchResults", &mut self.search_results, results);
    }

    fn handle_playlists(&mut self, items: &[Value]) {
        let playlists = items
            .iter()
            .filter_map(Value::as_object)
            .filter(|item| !item.is_empty())
            .map(|item| Playlist {
                name: str_of(item, "name").to_string(),
                uri: str_of(item, "uri").to_string(),
                is_public: item.get("public").and_then(Value::as_bool).unwrap_or(false),
                track_count: item
                    .get("tracks")
                    .map(|tracks| tracks.get("total").and_then(Value::as_i64).unwrap_or(0)),
                image: first_image(item).flatten(),
            })
            .collect();

        self.base.publish("playlists", &mut self.playlists, playlists);
    }

    fn handle_devices(&mut self, items: &[Value]) {
        let mut devices: Vec<PlaybackDevice> = items
            .iter()
            .filter_map(Value::as_object)
            .filter(|item| !item.is_empty())
            .map(|item| PlaybackDevice {
                name: str_of(item, "name").to_string(),
                id: str_of(item, "id").to_string(),
            })
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(preferred) = devices.iter().find(|dev| dev.name == self.preferred_device) {
            if update(&mut self.preferred_device_id, preferred.id.clone()) {
                log::debug!(
                    "[{}] Received id of preferred device {}",
                    self.base.name(),
                    self.preferred_device
                );
            }
        }

        self.base.publish("devices", &mut self.devices, devices);
    }

    fn handle_profile(&mut self, obj: &Map<String, Value>) {
        if let Some(name) = obj.get("display_name") {
            let name = name.as_str().unwrap_or_default().to_string();
            self.base.publish("userName", &mut self.user_name, name);
        }
        if let Some(email) = obj.get("email") {
            let email = email.as_str().unwrap_or_default().to_string();
            self.base.publish("userEmail", &mut self.user_email, email);
        }
        if let Some(product) = obj.get("product") {
            let product = product.as_str().unwrap_or_default().to_string();
            self.base
                .publish("userSubscription", &mut self.user_subscription, product);
        }
        if let Some(Some(image)) = first_image(obj) {
            self.base
                .publish("userImage", &mut self.user_image, Some(image));
        }
    }
}

impl Plugin for SpotifyPlugin {
    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PluginBase {
        &mut self.base
    }

    fn refresh(&mut self) {
        if self.authorization.is_some() {
            self.send_get(&format!("{PLAYER_URL}?market={}", self.market));
        }
    }

    fn is_configured(&self) -> bool {
        self.authorization.is_some()
    }

    fn handle_json_reply(&mut self, status: u16, _sender: Sender, body: &Value, now: Instant) {
        match status {
            200 => {}
            // no content, and expired tokens are handled from the raw reply
            204 | 401 => return,
            _ => {
                log::debug!(
                    "[{}] Ignoring unsuccessful reply with status code {status}",
                    self.base.name()
                );
                return;
            }
        }

        let Some(obj) = body.as_object() else {
            log::debug!("[{}] Failed to parse reply", self.base.name());
            return;
        };

        if obj.contains_key("access_token") {
            self.handle_token(obj, now);
        } else if obj.contains_key("is_playing") {
            self.handle_playback(obj, now);
        } else if obj.len() == 2 && obj.contains_key("name") && obj.contains_key("uri") {
            let name = str_of(obj, "name").to_string();
            self.base
                .publish("playlistName", &mut self.playlist_name, name);
        } else if let Some(tracks) = obj.get("tracks") {
            self.handle_search(tracks);
        } else if let Some(items) = obj.get("items").and_then(Value::as_array) {
            self.handle_playlists(items);
        } else if let Some(devices) = obj.get("devices").and_then(Value::as_array) {
            self.handle_devices(devices);
        } else {
            self.handle_profile(obj);
        }
    }

    fn handle_reply(&mut self, status: u16, _sender: Sender, _body: &Bytes, _now: Instant) {
        if status != 401 {
            return;
        }

        log::info!(
            "[{}] Access token expired, requesting a new one",
            self.base.name()
        );
        self.authorization = None;
        self.base.timer.stop();
        self.token_timer.stop();
        self.refresh_access_token();
    }

    fn poll(&mut self, now: Instant) {
        if self.base.timer.fire(now) {
            self.refresh();
        }
        if self.token_timer.fire(now) {
            self.refresh_access_token();
        }
        if self.inactivity.fire(now) {
            self.go_idle();
        }
        self.action_hold.fire(now);
    }

    fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.base.timer.deadline(),
            self.token_timer.deadline(),
            self.inactivity.deadline(),
            self.action_hold.deadline(),
        ])
    }
}
