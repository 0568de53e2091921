use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::time::Instant;

use hue::colorspace::hsv_to_rgb;
use vicecity_api::config::NanoleafConfig;
use vicecity_api::request::PluginId;

use crate::changes::{ChangeBus, update};
use crate::error::ApiResult;
use crate::gateway::{Gateway, Sender};
use crate::plugin::{OneShot, Plugin, PluginBase, PollTimer, earliest};

pub const NANOLEAF_SERVICE_TYPE: &str = "_nanoleafapi._tcp";
pub const NANOLEAF_PORT: u16 = 16021;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub name: String,
    pub colors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans_time: Option<f64>,
}

impl Effect {
    fn from_animation(animation: &Value) -> Option<Self> {
        let obj = animation.as_object().filter(|obj| !obj.is_empty())?;

        let mut effect = Self {
            name: obj
                .get("animName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            colors: vec![],
            delay_time: None,
            trans_time: None,
        };

        let number = |entry: &Value, key: &str| entry.get(key).and_then(Value::as_f64).unwrap_or(0.0);

        for entry in obj.get("palette").and_then(Value::as_array).into_iter().flatten() {
            if entry.as_object().is_none_or(|obj| obj.is_empty()) {
                continue;
            }
            let hue = number(entry, "hue") / 359.0 * 360.0;
            let saturation = number(entry, "saturation") / 100.0;
            let brightness = number(entry, "brightness") / 100.0;
            effect
                .colors
                .push(hsv_to_rgb(hue, saturation, brightness).name());
        }

        // option values are reported in tenths of a second
        for option in obj.get("pluginOptions").and_then(Value::as_array).into_iter().flatten() {
            let seconds = Some(number(option, "value") / 10.0);
            match option.get("name").and_then(Value::as_str) {
                Some("delayTime") => effect.delay_time = seconds,
                Some("transTime") => effect.trans_time = seconds,
                _ => {}
            }
        }

        Some(effect)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verdict {
    /// The observed value is authoritative
    Apply,
    /// The device disagrees with the last command, which will be resent
    Retry,
}

/// Optimistic command marker, resent until the device reports agreement.
#[derive(Debug)]
struct Confirm<T> {
    commanded: Option<T>,
    attempts: u32,
    resend: OneShot,
}

impl<T> Default for Confirm<T> {
    fn default() -> Self {
        Self {
            commanded: None,
            attempts: 0,
            resend: OneShot::default(),
        }
    }
}

impl<T: PartialEq + std::fmt::Debug> Confirm<T> {
    fn command(&mut self, value: T) {
        self.commanded = Some(value);
        self.attempts = 0;
        self.resend.cancel();
    }

    fn clear(&mut self) {
        self.commanded = None;
        self.attempts = 0;
        self.resend.cancel();
    }

    fn observe(&mut self, observed: &T, now: Instant, config: &NanoleafConfig) -> Verdict {
        match &self.commanded {
            Some(commanded) if commanded != observed => {
                if self.attempts >= config.max_confirm_retries {
                    log::warn!(
                        "Giving up on {commanded:?} after {} attempts, device reports {observed:?}",
                        self.attempts
                    );
                    self.clear();
                    Verdict::Apply
                } else {
                    self.attempts += 1;
                    self.resend.arm(now, config.confirm_delay());
                    Verdict::Retry
                }
            }
            _ => {
                self.clear();
                Verdict::Apply
            }
        }
    }
}

pub struct NanoleafPlugin {
    base: PluginBase,
    config: NanoleafConfig,
    address: Option<Ipv4Addr>,
    auth_token: String,
    base_url: Option<String>,
    name: String,
    is_on: bool,
    selected_effect: String,
    effects: Vec<Effect>,
    map_point: Value,
    effects_timer: PollTimer,
    power: Confirm<bool>,
    effect: Confirm<String>,
}

impl NanoleafPlugin {
    pub fn new(gateway: Gateway, changes: ChangeBus, config: NanoleafConfig) -> ApiResult<Self> {
        let base = PluginBase::new(PluginId::Nanoleaf, PluginId::Nanoleaf.name(), gateway, changes)?
            .with_update_interval(Duration::from_secs(3));

        Ok(Self {
            base,
            effects_timer: PollTimer::new(config.effects_interval()),
            config,
            address: None,
            auth_token: String::new(),
            base_url: None,
            name: String::new(),
            is_on: false,
            selected_effect: String::new(),
            effects: vec![],
            map_point: Value::Null,
            power: Confirm::default(),
            effect: Confirm::default(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.is_on
    }

    #[must_use]
    pub fn selected_effect(&self) -> &str {
        &self.selected_effect
    }

    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn set_auth_token(&mut self, token: &str, now: Instant) {
        if update(&mut self.auth_token, token.to_string()) {
            self.base.notify("authToken", token);
            self.update_base_url(now);
        }
    }

    #[must_use]
    pub const fn map_point(&self) -> &Value {
        &self.map_point
    }

    pub fn set_map_point(&mut self, point: Value) {
        if update(&mut self.map_point, point) {
            self.base.notify("mapPoint", self.map_point.clone());
        }
    }

    fn update_base_url(&mut self, now: Instant) {
        let Some(address) = self.address else {
            return;
        };
        if self.auth_token.is_empty() {
            return;
        }

        self.base_url = Some(format!(
            "http://{address}:{NANOLEAF_PORT}/api/v1/{}",
            self.auth_token
        ));
        log::info!("[{}] Configured for panel at {address}", self.base.name());

        if self.base.start_polling(now) {
            self.effects_timer.start(now);
            self.refresh();
            self.refresh_effects();
        }
    }

    fn put(&self, path: &str, body: &Value) {
        if let Some(base_url) = &self.base_url {
            self.base.gateway.send_json_request(
                &format!("{base_url}/{path}"),
                self.base.sender(),
                Method::PUT,
                body,
                None,
            );
        }
    }

    pub fn refresh_effects(&self) {
        self.put("effects", &json!({"write": {"command": "requestAll"}}));
    }

    fn send_power(&self, on: bool) {
        self.put("state", &json!({"on": {"value": on}}));
    }

    fn send_effect(&self, effect: &str) {
        self.put("effects", &json!({ "select": effect }));
    }

    pub fn command_power(&mut self, on: bool) {
        self.power.command(on);
        self.is_on = on;
        self.base.notify("isOn", on);
        self.send_power(on);
    }

    pub fn select_effect(&mut self, effect: &str) {
        self.effect.command(effect.to_string());
        self.selected_effect = effect.to_string();
        self.base.notify("selectedEffect", effect);
        self.send_effect(effect);
    }

    fn handle_selected_effect(&mut self, selected: &str, now: Instant) {
        let selected = selected.to_string();
        if self.effect.observe(&selected, now, &self.config) == Verdict::Apply
            && update(&mut self.selected_effect, selected)
        {
            self.base
                .notify("selectedEffect", self.selected_effect.clone());
        }
    }

    fn handle_power(&mut self, on: bool, now: Instant) {
        if self.power.observe(&on, now, &self.config) == Verdict::Apply
            && update(&mut self.is_on, on)
        {
            self.base.notify("isOn", on);
        }
    }

    fn handle_animations(&mut self, animations: &[Value]) {
        let mut effects: Vec<Effect> = animations.iter().filter_map(Effect::from_animation).collect();
        if effects.is_empty() {
            return;
        }

        effects.sort_by(|a, b| a.name.cmp(&b.name));
        if update(&mut self.effects, effects) {
            self.base.notify("effects", json!(self.effects));
        }
    }
}

impl Plugin for NanoleafPlugin {
    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PluginBase {
        &mut self.base
    }

    fn refresh(&mut self) {
        if let Some(url) = &self.base_url {
            self.base.gateway.get(url, self.base.sender(), None);
        }
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn start(&mut self, now: Instant) {
        self.base.gateway.browse_service_type(NANOLEAF_SERVICE_TYPE);
        if self.is_configured() && self.base.start_polling(now) {
            self.effects_timer.start(now);
            self.refresh();
        }
    }

    fn handle_json_reply(&mut self, status: u16, _sender: Sender, body: &Value, now: Instant) {
        match status {
            200 => {}
            204 => return,
            _ => {
                log::debug!(
                    "[{}] Ignoring unsuccessful reply with status code {status}",
                    self.base.name()
                );
                return;
            }
        }

        let Some(obj) = body.as_object() else {
            log::debug!("[{}] Failed to parse response", self.base.name());
            return;
        };

        if let Some(name) = obj.get("name").and_then(Value::as_str) {
            if update(&mut self.name, name.to_string()) {
                self.base.notify("name", name);
            }
        }

        if let Some(selected) = obj
            .get("effects")
            .and_then(|effects| effects.get("select"))
            .and_then(Value::as_str)
        {
            self.handle_selected_effect(selected, now);
        }

        if let Some(on) = body
            .pointer("/state/on/value")
            .and_then(Value::as_bool)
        {
            self.handle_power(on, now);
        }

        if let Some(animations) = obj.get("animations").and_then(Value::as_array) {
            self.handle_animations(animations);
        }
    }

    fn handle_service_found(&mut self, service_type: &str, address: Ipv4Addr, now: Instant) {
        if self.address.is_some() || !service_type.starts_with(NANOLEAF_SERVICE_TYPE) {
            return;
        }

        log::info!("[{}] Panel found at {address}", self.base.name());
        self.address = Some(address);
        self.base.notify("ipAddress", address.to_string());
        self.update_base_url(now);
    }

    fn poll(&mut self, now: Instant) {
        if self.base.timer.fire(now) {
            self.refresh();
        }
        if self.effects_timer.fire(now) {
            self.refresh_effects();
        }
        if self.power.resend.fire(now) {
            if let Some(on) = self.power.commanded {
                log::debug!("[{}] Resending power {on}", self.base.name());
                self.send_power(on);
            }
        }
        if self.effect.resend.fire(now) {
            if let Some(effect) = &self.effect.commanded {
                log::debug!("[{}] Resending effect {effect:?}", self.base.name());
                self.send_effect(effect);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.base.timer.deadline(),
            self.effects_timer.deadline(),
            self.power.resend.deadline(),
            self.effect.resend.deadline(),
        ])
    }

    fn set_active(&mut self, active: bool, now: Instant) {
        if !self.base.set_active(active) {
            return;
        }

        if !active {
            self.base.timer.stop();
            self.effects_timer.stop();
        } else if self.is_configured() && self.base.start_polling(now) {
            self.effects_timer.start(now);
            self.refresh();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use reqwest::Method;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    use vicecity_api::config::NanoleafConfig;
    use vicecity_api::request::PluginId;

    use crate::changes::ChangeBus;
    use crate::gateway::{Gateway, GatewayCommand, Request, Sender, drain_requests};
    use crate::plugin::Plugin;
    use crate::plugin::nanoleaf::{Effect, NanoleafPlugin};

    const SELF: Sender = Sender::Plugin(PluginId::Nanoleaf);
    const DELAY: Duration = Duration::from_millis(500);

    fn configured(now: Instant) -> (NanoleafPlugin, UnboundedReceiver<GatewayCommand>) {
        let (gw, mut rx) = Gateway::channel();
        let mut leaf = NanoleafPlugin::new(gw, ChangeBus::default(), NanoleafConfig::default()).unwrap();
        leaf.set_auth_token("tok", now);
        leaf.handle_service_found("_nanoleafapi._tcp.local.", Ipv4Addr::new(10, 0, 0, 3), now);
        drain_requests(&mut rx);
        (leaf, rx)
    }

    fn power_state(on: bool) -> serde_json::Value {
        json!({"state": {"on": {"value": on}}})
    }

    fn is_power_command(req: &Request, on: bool) -> bool {
        req.method == Method::PUT
            && req.url.as_str() == "http://10.0.0.3:16021/api/v1/tok/state"
            && req.json_body() == json!({"on": {"value": on}})
    }

    #[test]
    fn configuration_requests_state_and_effects() {
        let now = Instant::now();
        let (gw, mut rx) = Gateway::channel();
        let mut leaf = NanoleafPlugin::new(gw, ChangeBus::default(), NanoleafConfig::default()).unwrap();
        leaf.handle_service_found("_nanoleafapi._tcp.local.", Ipv4Addr::new(10, 0, 0, 3), now);
        assert!(drain_requests(&mut rx).is_empty());

        leaf.set_auth_token("tok", now);
        let reqs = drain_requests(&mut rx);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].method, Method::GET);
        assert_eq!(reqs[0].url.as_str(), "http://10.0.0.3:16021/api/v1/tok");
        assert_eq!(reqs[1].url.path(), "/api/v1/tok/effects");
        assert_eq!(
            reqs[1].json_body(),
            json!({"write": {"command": "requestAll"}})
        );
    }

    #[test]
    fn effects_on_slower_timer() {
        let now = Instant::now();
        let (mut leaf, mut rx) = configured(now);

        leaf.poll(now + Duration::from_secs(3));
        let reqs = drain_requests(&mut rx);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, Method::GET);

        leaf.poll(now + Duration::from_secs(60));
        let reqs = drain_requests(&mut rx);
        assert_eq!(reqs.len(), 2);
        assert!(reqs.iter().any(|r| r.url.path().ends_with("/effects")));
    }

    #[test]
    fn power_resent_until_confirmed() {
        let mut now = Instant::now();
        let (mut leaf, mut rx) = configured(now);

        leaf.command_power(true);
        assert!(leaf.is_on());
        let reqs = drain_requests(&mut rx);
        assert!(is_power_command(&reqs[0], true));

        for _ in 0..3 {
            leaf.handle_json_reply(200, SELF, &power_state(false), now);
            // optimistic state is kept while retrying
            assert!(leaf.is_on());
            assert_eq!(leaf.next_deadline(), Some(now + DELAY));

            now += DELAY;
            leaf.poll(now);
            let reqs = drain_requests(&mut rx);
            assert_eq!(reqs.len(), 1);
            assert!(is_power_command(&reqs[0], true));
        }

        leaf.handle_json_reply(200, SELF, &power_state(true), now);
        now += DELAY;
        leaf.poll(now);
        assert!(drain_requests(&mut rx).is_empty());

        // agreement cleared the marker: later reports are authoritative
        leaf.handle_json_reply(200, SELF, &power_state(false), now);
        assert!(!leaf.is_on());
    }

    #[test]
    fn power_retry_is_capped() {
        let mut now = Instant::now();
        let (mut leaf, mut rx) = configured(now);
        leaf.command_power(true);
        drain_requests(&mut rx);

        let mut resent = 0;
        for _ in 0..20 {
            leaf.handle_json_reply(200, SELF, &power_state(false), now);
            now += DELAY;
            leaf.poll(now);
            resent += drain_requests(&mut rx)
                .iter()
                .filter(|req| is_power_command(req, true))
                .count();
        }

        assert_eq!(resent, 10);
        assert!(!leaf.is_on());
    }

    #[test]
    fn effect_resent_until_confirmed() {
        let mut now = Instant::now();
        let (mut leaf, mut rx) = configured(now);

        leaf.select_effect("Northern Lights");
        assert_eq!(leaf.selected_effect(), "Northern Lights");
        drain_requests(&mut rx);

        leaf.handle_json_reply(200, SELF, &json!({"effects": {"select": "Flames"}}), now);
        now += DELAY;
        leaf.poll(now);
        let reqs = drain_requests(&mut rx);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].json_body(), json!({"select": "Northern Lights"}));

        leaf.handle_json_reply(
            200,
            SELF,
            &json!({"effects": {"select": "Northern Lights"}}),
            now,
        );
        assert_eq!(leaf.selected_effect(), "Northern Lights");
        assert!(!leaf.effect.resend.is_armed());
    }

    #[test]
    fn animations_parsed_and_sorted() {
        let now = Instant::now();
        let (mut leaf, _rx) = configured(now);

        leaf.handle_json_reply(
            200,
            SELF,
            &json!({
                "name": "Shapes",
                "animations": [
                    {
                        "animName": "Sunset",
                        "palette": [{"hue": 0, "saturation": 100, "brightness": 100}, {}],
                        "pluginOptions": [
                            {"name": "delayTime", "value": 25},
                            {"name": "transTime", "value": 10},
                            {"name": "loop", "value": true}
                        ]
                    },
                    {
                        "animName": "Arctic",
                        "palette": [{"hue": 359, "saturation": 0, "brightness": 100}]
                    },
                    {}
                ]
            }),
            now,
        );

        assert_eq!(leaf.name(), "Shapes");
        assert_eq!(
            leaf.effects(),
            &[
                Effect {
                    name: "Arctic".into(),
                    colors: vec!["#ffffff".into()],
                    delay_time: None,
                    trans_time: None,
                },
                Effect {
                    name: "Sunset".into(),
                    colors: vec!["#ff0000".into()],
                    delay_time: Some(2.5),
                    trans_time: Some(1.0),
                },
            ]
        );
    }

    #[test]
    fn no_content_and_errors_ignored() {
        let now = Instant::now();
        let (mut leaf, _rx) = configured(now);
        leaf.handle_json_reply(204, SELF, &serde_json::Value::Null, now);
        leaf.handle_json_reply(500, SELF, &power_state(true), now);
        assert!(!leaf.is_on());
    }
}
