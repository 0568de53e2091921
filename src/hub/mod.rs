//! The dashboard hub.
//!
//! The hub owns every plugin, the scene runner and the settings store, and
//! drives them all from a single `select!` loop: gateway events are routed
//! to the plugin that asked for them, hub requests are dispatched, and
//! plugin timers fire when their earliest deadline passes. Nothing here is
//! shared across tasks, so no state needs locking.

pub mod events;
pub mod scene;

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local, TimeZone};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use vicecity_api::config::{AppConfig, language_from_locale};
use vicecity_api::request::{HubRequest, PluginId};
use vicecity_api::scene::{Scene, find_steps, parse_scene_colors};

use crate::changes::{ChangeBus, ChangeSource, update};
use crate::error::ApiResult;
use crate::gateway::{Gateway, GatewayEvent};
use crate::hub::scene::{SceneRunner, apply_step};
use crate::plugin::facts::FactsPlugin;
use crate::plugin::hue::HuePlugin;
use crate::plugin::insults::InsultsPlugin;
use crate::plugin::nanoleaf::NanoleafPlugin;
use crate::plugin::pihole::PiHolePlugin;
use crate::plugin::spotify::SpotifyPlugin;
use crate::plugin::weather::WeatherPlugin;
use crate::plugin::{Plugin, PollTimer, earliest};
use crate::service::Service;
use crate::settings::SettingsStore;

const CLOCK_INTERVAL: Duration = Duration::from_secs(10);

#[allow(clippy::struct_excessive_bools)]
pub struct Hub {
    events: UnboundedReceiver<GatewayEvent>,
    requests: UnboundedReceiver<HubRequest>,
    changes: ChangeBus,

    active: bool,
    use_24_hour_clock: bool,
    darker_background: bool,
    screensaver_enabled: bool,
    home_map: String,
    home_map_path: Option<Utf8PathBuf>,
    scenes: Vec<Scene>,

    pub(crate) hue: HuePlugin,
    pub(crate) nanoleaf: NanoleafPlugin,
    pub(crate) pihole: PiHolePlugin,
    pub(crate) weather: WeatherPlugin,
    pub(crate) facts: FactsPlugin,
    pub(crate) insults: InsultsPlugin,
    pub(crate) spotify: SpotifyPlugin,

    runner: SceneRunner,
    clock: PollTimer,
    settings: Option<SettingsStore>,
}

impl Hub {
    pub fn new(
        config: &AppConfig,
        gateway: &Gateway,
        events: UnboundedReceiver<GatewayEvent>,
        requests: UnboundedReceiver<HubRequest>,
        changes: ChangeBus,
    ) -> ApiResult<Self> {
        log::debug!("Initializing dashboard hub");

        let locale = std::env::var("LANG").ok();
        let language = language_from_locale(locale.as_deref());
        let market = config.spotify.market_or_locale(locale.as_deref());

        Ok(Self {
            hue: HuePlugin::new(gateway.clone(), changes.clone())?,
            nanoleaf: NanoleafPlugin::new(gateway.clone(), changes.clone(), config.nanoleaf.clone())?,
            pihole: PiHolePlugin::new(gateway.clone(), changes.clone())?,
            weather: WeatherPlugin::new(gateway.clone(), changes.clone())?,
            facts: FactsPlugin::new(gateway.clone(), changes.clone(), &language)?,
            insults: InsultsPlugin::new(gateway.clone(), changes.clone(), &language)?,
            spotify: SpotifyPlugin::new(gateway.clone(), changes.clone(), market)?,
            events,
            requests,
            changes,
            active: true,
            use_24_hour_clock: false,
            darker_background: false,
            screensaver_enabled: true,
            home_map: String::new(),
            home_map_path: None,
            scenes: vec![],
            runner: SceneRunner::new(config.hub.scene_step_delay()),
            clock: PollTimer::new(CLOCK_INTERVAL),
            settings: None,
        })
    }

    fn notify(&self, property: &'static str, value: impl Into<serde_json::Value>) {
        self.changes.notify(ChangeSource::Hub, property, value);
    }

    #[must_use]
    pub fn plugin(&self, id: PluginId) -> &dyn Plugin {
        match id {
            PluginId::Hue => &self.hue,
            PluginId::Nanoleaf => &self.nanoleaf,
            PluginId::PiHole => &self.pihole,
            PluginId::Weather => &self.weather,
            PluginId::Facts => &self.facts,
            PluginId::Insults => &self.insults,
            PluginId::Spotify => &self.spotify,
        }
    }

    pub fn plugin_mut(&mut self, id: PluginId) -> &mut dyn Plugin {
        match id {
            PluginId::Hue => &mut self.hue,
            PluginId::Nanoleaf => &mut self.nanoleaf,
            PluginId::PiHole => &mut self.pihole,
            PluginId::Weather => &mut self.weather,
            PluginId::Facts => &mut self.facts,
            PluginId::Insults => &mut self.insults,
            PluginId::Spotify => &mut self.spotify,
        }
    }

    #[must_use]
    pub const fn hue(&self) -> &HuePlugin {
        &self.hue
    }

    #[must_use]
    pub const fn nanoleaf(&self) -> &NanoleafPlugin {
        &self.nanoleaf
    }

    #[must_use]
    pub const fn spotify(&self) -> &SpotifyPlugin {
        &self.spotify
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Pause or resume polling everywhere.
    pub fn set_active(&mut self, active: bool, now: Instant) {
        if update(&mut self.active, active) {
            self.notify("isActive", active);
            for id in PluginId::ALL {
                self.plugin_mut(id).set_active(active, now);
            }
        }
    }

    #[must_use]
    pub const fn use_24_hour_clock(&self) -> bool {
        self.use_24_hour_clock
    }

    pub fn set_use_24_hour_clock(&mut self, value: bool) {
        if update(&mut self.use_24_hour_clock, value) {
            self.notify("use24HourClock", value);
            self.notify_current_time();
        }
    }

    #[must_use]
    pub const fn darker_background(&self) -> bool {
        self.darker_background
    }

    pub fn set_darker_background(&mut self, value: bool) {
        if update(&mut self.darker_background, value) {
            self.notify("darkerBackground", value);
        }
    }

    #[must_use]
    pub const fn screensaver_enabled(&self) -> bool {
        self.screensaver_enabled
    }

    pub fn set_screensaver_enabled(&mut self, value: bool) {
        if update(&mut self.screensaver_enabled, value) {
            self.notify("screensaverEnabled", value);
        }
    }

    /// Home map path, as configured
    #[must_use]
    pub fn home_map(&self) -> &str {
        &self.home_map
    }

    /// Home map path, resolved against the settings directory
    #[must_use]
    pub fn home_map_path(&self) -> Option<&Utf8Path> {
        self.home_map_path.as_deref()
    }

    pub fn set_home_map(&mut self, path: &str) {
        if update(&mut self.home_map, path.to_string()) {
            let base = self.settings.as_ref().map(SettingsStore::directory);
            self.home_map_path = resolve_home_map(path, base);
            self.notify(
                "homeMap",
                self.home_map_path.as_ref().map(ToString::to_string),
            );
        }
    }

    #[must_use]
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn set_scenes(&mut self, scenes: Vec<Scene>) {
        if update(&mut self.scenes, scenes) {
            let names: Vec<_> = self.scenes.iter().map(|scene| scene.name.clone()).collect();
            self.notify("scenes", names);
        }
    }

    #[must_use]
    pub fn scene_colors(&self, name: &str) -> Vec<String> {
        parse_scene_colors(&self.scenes, name)
    }

    #[must_use]
    pub const fn is_running_scene(&self) -> bool {
        self.runner.is_running()
    }

    /// Load the settings file, applying every key it holds.
    pub fn load_settings(&mut self, path: &Utf8Path, now: Instant) -> ApiResult<()> {
        let mut store = SettingsStore::open(path)?;
        store.apply(self, now);

        // relative paths are resolved once the file location is known
        self.home_map_path = resolve_home_map(&self.home_map, Some(store.directory()));
        if self.home_map_path.is_some() {
            self.notify(
                "homeMap",
                self.home_map_path.as_ref().map(ToString::to_string),
            );
        }

        self.settings = Some(store);
        Ok(())
    }

    /// Persist settings if anything tracked changed. Failures are logged,
    /// the next turn tries again.
    pub fn autosave(&mut self) {
        let Some(mut store) = self.settings.take() else {
            return;
        };
        if let Err(err) = store.save_if_changed(self) {
            log::warn!("Failed to save settings file {}: {err}", store.path());
        }
        self.settings = Some(store);
    }

    pub fn start_plugins(&mut self, now: Instant) {
        self.clock.start(now);
        self.notify_current_time();
        for id in PluginId::ALL {
            self.plugin_mut(id).start(now);
        }
    }

    /// Start running the named scene. Unknown or empty scenes, and requests
    /// while another scene is running, are ignored.
    pub fn run_scene(&mut self, name: &str, now: Instant) {
        let steps = find_steps(&self.scenes, name);
        if steps.is_empty() {
            log::debug!("Ignoring request to run unknown scene {name:?}");
            return;
        }
        if self.runner.is_running() {
            log::debug!(
                "Ignoring request to run scene {name:?} while {:?} is running",
                self.runner.name()
            );
            return;
        }

        log::debug!("Processing scene {name:?} with {} steps", steps.len());
        self.runner.begin(name, steps);
        self.notify("isRunningScene", true);
        self.advance_scene(now);
    }

    /// Execute the next scene step, or finish the scene if none remain.
    fn advance_scene(&mut self, now: Instant) {
        let Some((number, step)) = self.runner.next_step(now) else {
            log::debug!("Finished processing scene {:?}", self.runner.name());
            self.runner.finish();
            self.notify("isRunningScene", false);
            return;
        };

        let report = apply_step(
            &self.hue,
            &mut self.nanoleaf,
            self.runner.name(),
            number,
            &step,
        );
        if let Some(report) = report {
            log::trace!("Step {number} of {:?}: {report:?}", self.runner.name());
        }
    }

    pub fn handle_hub_request(&mut self, req: HubRequest, now: Instant) {
        match req {
            HubRequest::SetActive(active) => self.set_active(active, now),
            HubRequest::SetUse24HourClock(value) => self.set_use_24_hour_clock(value),
            HubRequest::SetDarkerBackground(value) => self.set_darker_background(value),
            HubRequest::SetScreensaverEnabled(value) => self.set_screensaver_enabled(value),
            HubRequest::SetPluginActive(id, active) => self.plugin_mut(id).set_active(active, now),
            HubRequest::SetUpdateInterval(id, ms) => self
                .plugin_mut(id)
                .set_update_interval(Duration::from_millis(ms), now),
            HubRequest::RunScene(name) => self.run_scene(&name, now),
            HubRequest::Hue(id, cmd) => self.hue.command(id, &cmd),
            HubRequest::NanoleafPower(on) => self.nanoleaf.command_power(on),
            HubRequest::NanoleafSelectEffect(effect) => self.nanoleaf.select_effect(&effect),
            HubRequest::Spotify(cmd) => self.spotify.command(&cmd, now),
        }
    }

    /// Fire every timer that is due.
    pub fn poll(&mut self, now: Instant) {
        for id in PluginId::ALL {
            self.plugin_mut(id).poll(now);
        }
        if self.runner.due(now) {
            self.advance_scene(now);
        }
        if self.clock.fire(now) {
            self.notify_current_time();
        }
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(
            PluginId::ALL
                .into_iter()
                .map(|id| self.plugin(id).next_deadline())
                .chain([self.runner.deadline(), self.clock.deadline()]),
        )
    }

    fn notify_current_time(&self) {
        let now = Local::now();
        self.notify("currentTime", self.format_time(&now));
        self.notify("dayOfWeek", day_of_week(&now));
    }

    /// Time of day, honoring the 24-hour clock setting
    #[must_use]
    pub fn format_time<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> String
    where
        Tz::Offset: Display,
    {
        format_time(time, self.use_24_hour_clock)
    }
}

#[must_use]
pub fn format_time<Tz: TimeZone>(time: &DateTime<Tz>, use_24_hour_clock: bool) -> String
where
    Tz::Offset: Display,
{
    let fmt = if use_24_hour_clock { "%H:%M" } else { "%-I:%M %p" };
    time.format(fmt).to_string()
}

#[must_use]
pub fn day_of_week<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    time.format("%A").to_string()
}

fn resolve_home_map(path: &str, base: Option<&Utf8Path>) -> Option<Utf8PathBuf> {
    if path.is_empty() {
        return None;
    }
    let path = Utf8Path::new(path);
    match base {
        Some(base) if path.is_relative() => Some(base.join(path)),
        _ => Some(path.to_path_buf()),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl Service for Hub {
    async fn start(&mut self) -> ApiResult<()> {
        self.start_plugins(Instant::now());
        Ok(())
    }

    async fn run(&mut self) -> ApiResult<()> {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                ev = self.events.recv() => {
                    let Some(ev) = ev else {
                        log::debug!("Gateway closed, stopping hub");
                        break;
                    };
                    self.handle_gateway_event(ev, Instant::now());
                }
                req = self.requests.recv() => {
                    let Some(req) = req else {
                        log::debug!("Request channel closed, stopping hub");
                        break;
                    };
                    self.handle_hub_request(req, Instant::now());
                }
                () = sleep_until(deadline) => {}
            }

            self.poll(Instant::now());
            self.autosave();
        }

        Ok(())
    }

    async fn stop(&mut self) -> ApiResult<()> {
        self.autosave();
        Ok(())
    }
}

#[cfg(test)]
mod tests;
