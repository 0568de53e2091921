pub mod device;

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Method;
use serde_json::{Value, json};
use tokio::time::Instant;

use hue::HUE_SERVICE_TYPE;
use hue::legacy_api::{ApiGroup, ApiLightStateUpdate};
use vicecity_api::request::{HueCommand, PluginId};

use crate::changes::{ChangeBus, ChangeSource, update};
use crate::error::ApiResult;
use crate::gateway::{Gateway, Sender};
use crate::plugin::hue::device::{CommandResult, DeviceKind, HueDevice};
use crate::plugin::{Plugin, PluginBase};

pub struct HuePlugin {
    base: PluginBase,
    bridge_address: Option<Ipv4Addr>,
    bridge_username: String,
    lights_url: Option<String>,
    groups_url: Option<String>,
    devices: BTreeMap<u32, HueDevice>,
    map_model: Value,
}

impl HuePlugin {
    pub fn new(gateway: Gateway, changes: ChangeBus) -> ApiResult<Self> {
        let base = PluginBase::new(PluginId::Hue, PluginId::Hue.name(), gateway, changes)?
            .with_update_interval(Duration::from_secs(1));

        Ok(Self {
            base,
            bridge_address: None,
            bridge_username: String::new(),
            lights_url: None,
            groups_url: None,
            devices: BTreeMap::new(),
            map_model: Value::Null,
        })
    }

    #[must_use]
    pub const fn bridge_address(&self) -> Option<Ipv4Addr> {
        self.bridge_address
    }

    #[must_use]
    pub fn bridge_username(&self) -> &str {
        &self.bridge_username
    }

    pub fn set_bridge_username(&mut self, username: &str, now: Instant) {
        if update(&mut self.bridge_username, username.to_string()) {
            self.base.notify("bridgeUsername", username);
            self.update_base_url(now);
        }
    }

    #[must_use]
    pub const fn map_model(&self) -> &Value {
        &self.map_model
    }

    pub fn set_map_model(&mut self, model: Value) {
        if update(&mut self.map_model, model) {
            self.base.notify("mapModel", self.map_model.clone());
        }
    }

    /// Devices, ordered by id
    pub fn devices(&self) -> impl Iterator<Item = &HueDevice> {
        self.devices.values()
    }

    #[must_use]
    pub fn device(&self, id: u32) -> Option<&HueDevice> {
        self.devices.get(&id)
    }

    #[must_use]
    pub fn device_by_name(&self, name: &str) -> Option<&HueDevice> {
        self.devices.values().find(|dev| dev.name() == name)
    }

    #[must_use]
    pub fn on_devices_count(&self) -> usize {
        self.devices.values().filter(|dev| dev.is_on()).count()
    }

    fn update_base_url(&mut self, now: Instant) {
        let Some(address) = self.bridge_address else {
            return;
        };
        if self.bridge_username.is_empty() {
            return;
        }

        let base_url = format!("http://{address}/api/{}", self.bridge_username);
        self.lights_url = Some(format!("{base_url}/lights"));
        self.groups_url = Some(format!("{base_url}/groups"));
        log::info!("[{}] Configured for bridge at {address}", self.base.name());

        if self.base.start_polling(now) {
            self.refresh();
            self.refresh_groups();
        }
    }

    pub fn refresh_groups(&self) {
        if let Some(url) = &self.groups_url {
            self.base.gateway.get(url, self.base.sender(), None);
        }
    }

    /// Send a state change to one light.
    pub fn command_device_state(&self, id: u32, state: &ApiLightStateUpdate) {
        if !self.devices.contains_key(&id) {
            log::debug!(
                "[{}] Ignoring request to command state of unknown device {id}",
                self.base.name()
            );
            return;
        }
        let Some(lights_url) = &self.lights_url else {
            return;
        };

        match serde_json::to_value(state) {
            Ok(body) => self.base.gateway.send_json_request(
                &format!("{lights_url}/{id}/state"),
                Sender::HueDevice(id),
                Method::PUT,
                &body,
                None,
            ),
            Err(err) => log::debug!("[{}] Failed to encode state: {err}", self.base.name()),
        }
    }

    /// Send the result of a device command, or log why it was refused.
    pub fn send_commands(&self, id: u32, commands: CommandResult) {
        match commands {
            Ok(commands) => {
                for cmd in &commands {
                    self.command_device_state(id, cmd);
                }
            }
            Err(err) => log::debug!(
                "[{}] Ignoring command for device {id}: {err}",
                self.base.name()
            ),
        }
    }

    pub fn command(&self, id: u32, cmd: &HueCommand) {
        let Some(dev) = self.devices.get(&id) else {
            log::debug!(
                "[{}] Ignoring request to command unknown device {id}",
                self.base.name()
            );
            return;
        };

        self.send_commands(id, dev.command(cmd));
    }

    fn forward(&mut self, id: u32, payload: &Value) {
        let Some(dev) = self.devices.get_mut(&id) else {
            return;
        };

        let changed = dev.handle_response(payload);
        for &prop in &changed {
            self.base
                .changes()
                .notify(ChangeSource::HueDevice(id), prop, dev.property(prop));
        }

        if changed.contains(&"isOn") {
            self.base.notify("onDevicesCount", self.on_devices_count());
        }
    }

    /// Returns true if the item described a device not seen before.
    fn handle_device_data(&mut self, id: u32, item: &Value) -> bool {
        let created = !self.devices.contains_key(&id);
        if created {
            let device_type = item.get("type").and_then(Value::as_str).unwrap_or_default();
            let kind = DeviceKind::from_type(device_type);
            self.devices.insert(id, HueDevice::new(id, kind));
            self.base
                .notify("devices", json!(self.devices.keys().collect::<Vec<_>>()));
        }

        self.forward(id, item);
        created
    }

    fn handle_group_data(&mut self, item: &Value) {
        let group: ApiGroup = match serde_json::from_value(item.clone()) {
            Ok(group) => group,
            Err(err) => {
                log::debug!("[{}] Malformed group data: {err}", self.base.name());
                return;
            }
        };

        if group.name.is_empty() || !group.is_room() {
            return;
        }

        for light in &group.lights {
            let Ok(id) = light.parse::<u32>() else {
                log::debug!("[{}] Invalid light id {light:?} in groups", self.base.name());
                continue;
            };
            // unknown lights get their room on the next groups refresh
            if let Some(dev) = self.devices.get_mut(&id) {
                if dev.set_room(&group.name) {
                    self.base
                        .changes()
                        .notify(ChangeSource::HueDevice(id), "room", group.name.clone());
                }
            }
        }
    }

    fn handle_query_reply(&mut self, status: u16, body: &Value) {
        if status != 200 {
            log::debug!(
                "[{}] Ignoring unsuccessful reply from bridge with status code {status}",
                self.base.name()
            );
            return;
        }

        let Some(items) = body.as_object() else {
            log::debug!("[{}] Failed to parse query response", self.base.name());
            return;
        };

        let mut new_devices = false;
        for (key, item) in items {
            let Ok(id) = key.parse::<u32>() else {
                log::debug!("[{}] Invalid id {key:?} in query response", self.base.name());
                continue;
            };

            let Some(obj) = item.as_object().filter(|obj| !obj.is_empty()) else {
                log::debug!("[{}] Empty or invalid item at key {key}", self.base.name());
                continue;
            };

            if obj.contains_key("lights") {
                self.handle_group_data(item);
            } else {
                new_devices |= self.handle_device_data(id, item);
            }
        }

        if new_devices {
            self.refresh_groups();
        }
    }
}

impl Plugin for HuePlugin {
    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PluginBase {
        &mut self.base
    }

    fn refresh(&mut self) {
        if let Some(url) = &self.lights_url {
            self.base.gateway.get(url, self.base.sender(), None);
        }
    }

    fn is_configured(&self) -> bool {
        self.lights_url.is_some()
    }

    fn start(&mut self, now: Instant) {
        self.base.gateway.browse_service_type(HUE_SERVICE_TYPE);
        if self.is_configured() && self.base.start_polling(now) {
            self.refresh();
        }
    }

    fn handle_json_reply(&mut self, status: u16, sender: Sender, body: &Value, _now: Instant) {
        match sender {
            Sender::Plugin(_) => self.handle_query_reply(status, body),
            Sender::HueDevice(id) => {
                if status == 200 {
                    self.forward(id, body);
                } else {
                    log::debug!(
                        "[{}] Ignoring unsuccessful reply for device {id} with status code {status}",
                        self.base.name()
                    );
                }
            }
        }
    }

    fn handle_service_found(&mut self, service_type: &str, address: Ipv4Addr, now: Instant) {
        if self.bridge_address.is_some() || !service_type.starts_with(HUE_SERVICE_TYPE) {
            return;
        }

        log::info!("[{}] Bridge found at {address}", self.base.name());
        self.bridge_address = Some(address);
        self.base.notify("bridgeIPAddress", address.to_string());
        self.update_base_url(now);
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use reqwest::Method;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    use hue::legacy_api::ApiLightStateUpdate;
    use vicecity_api::request::{HueCommand, PluginId};

    use crate::changes::{ChangeBus, ChangeSource, drain};
    use crate::gateway::{
        Gateway, GatewayCommand, Sender, drain_commands, drain_requests,
    };
    use crate::plugin::Plugin;
    use crate::plugin::hue::HuePlugin;
    use crate::plugin::hue::device::DeviceKind;

    const BRIDGE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
    const SELF: Sender = Sender::Plugin(PluginId::Hue);

    fn configured() -> (HuePlugin, UnboundedReceiver<GatewayCommand>, ChangeBus) {
        let (gw, mut rx) = Gateway::channel();
        let bus = ChangeBus::default();
        let mut hue = HuePlugin::new(gw, bus.clone()).unwrap();
        let now = Instant::now();

        hue.start(now);
        hue.set_bridge_username("user", now);
        hue.handle_service_found("_hue._tcp.local.", BRIDGE, now);
        drain_commands(&mut rx);

        (hue, rx, bus)
    }

    fn lights() -> serde_json::Value {
        json!({
            "3": {"name": "Strip", "type": "Extended color light", "state": {"on": true, "bri": 254}},
            "1": {"name": "Lamp", "type": "Dimmable light", "state": {"on": false, "bri": 1}},
            "2": {"name": "Spot", "type": "Color temperature light", "state": {"on": false, "ct": 366}},
            "x": {"name": "bogus"},
            "7": {}
        })
    }

    #[test]
    fn start_browses_then_configures() {
        let (gw, mut rx) = Gateway::channel();
        let mut hue = HuePlugin::new(gw, ChangeBus::default()).unwrap();
        let now = Instant::now();

        hue.start(now);
        assert_eq!(
            drain_commands(&mut rx),
            vec![GatewayCommand::Browse("_hue._tcp".into())]
        );

        // address alone is not enough
        hue.handle_service_found("_hue._tcp.local.", BRIDGE, now);
        assert!(!hue.is_configured());
        assert!(drain_commands(&mut rx).is_empty());

        hue.set_bridge_username("user", now);
        let urls: Vec<_> = drain_requests(&mut rx)
            .into_iter()
            .map(|req| req.url.to_string())
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://10.0.0.2/api/user/lights",
                "http://10.0.0.2/api/user/groups"
            ]
        );
        assert!(hue.base().timer.is_running());
    }

    #[test]
    fn other_service_types_ignored() {
        let (gw, _rx) = Gateway::channel();
        let mut hue = HuePlugin::new(gw, ChangeBus::default()).unwrap();
        hue.handle_service_found("_nanoleafapi._tcp.local.", BRIDGE, Instant::now());
        assert_eq!(hue.bridge_address(), None);
    }

    #[test]
    fn devices_created_by_type_and_sorted() {
        let (mut hue, mut rx, _bus) = configured();
        hue.handle_json_reply(200, SELF, &lights(), Instant::now());

        let devices: Vec<_> = hue.devices().map(|d| (d.id(), d.kind())).collect();
        assert_eq!(
            devices,
            vec![
                (1, DeviceKind::Light),
                (2, DeviceKind::Ambiance),
                (3, DeviceKind::Color)
            ]
        );
        assert_eq!(hue.device_by_name("Spot").unwrap().color_temperature(), 2732);
        assert_eq!(hue.on_devices_count(), 1);

        // new devices trigger a groups refresh
        let reqs = drain_requests(&mut rx);
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].url.path().ends_with("/groups"));

        // known devices do not
        hue.handle_json_reply(200, SELF, &lights(), Instant::now());
        assert!(drain_requests(&mut rx).is_empty());
    }

    #[test]
    fn groups_assign_rooms() {
        let (mut hue, _rx, bus) = configured();
        hue.handle_json_reply(200, SELF, &lights(), Instant::now());
        let mut changes = bus.subscribe();

        hue.handle_json_reply(
            200,
            SELF,
            &json!({
                "1": {"name": "Living room", "type": "Room", "lights": ["1", "3", "9", "z"]},
                "2": {"name": "Everything", "type": "LightGroup", "lights": ["2"]}
            }),
            Instant::now(),
        );

        assert_eq!(hue.device(1).unwrap().room(), Some("Living room"));
        assert_eq!(hue.device(3).unwrap().room(), Some("Living room"));
        assert_eq!(hue.device(2).unwrap().room(), None);
        assert_eq!(drain(&mut changes).len(), 2);
    }

    #[test]
    fn device_replies_forwarded() {
        let (mut hue, _rx, bus) = configured();
        hue.handle_json_reply(200, SELF, &lights(), Instant::now());
        let mut changes = bus.subscribe();

        hue.handle_json_reply(
            200,
            Sender::HueDevice(1),
            &json!([{"success": {"/lights/1/state/on": true}}]),
            Instant::now(),
        );
        assert!(hue.device(1).unwrap().is_on());

        let changes = drain(&mut changes);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].source, ChangeSource::HueDevice(1));
        assert_eq!(changes[0].property, "isOn");
        assert_eq!(changes[1].property, "onDevicesCount");
        assert_eq!(changes[1].value, json!(2));
    }

    #[test]
    fn unsuccessful_replies_dropped() {
        let (mut hue, _rx, _bus) = configured();
        hue.handle_json_reply(500, SELF, &lights(), Instant::now());
        assert_eq!(hue.devices().count(), 0);

        hue.handle_json_reply(200, SELF, &lights(), Instant::now());
        hue.handle_json_reply(
            404,
            Sender::HueDevice(1),
            &json!({"state": {"on": true}}),
            Instant::now(),
        );
        assert!(!hue.device(1).unwrap().is_on());
    }

    #[test]
    fn commands_sent_to_device_state() {
        let (mut hue, mut rx, _bus) = configured();
        hue.handle_json_reply(200, SELF, &lights(), Instant::now());
        drain_commands(&mut rx);

        hue.command(1, &HueCommand::Brightness(60.0));
        let reqs = drain_requests(&mut rx);
        assert_eq!(reqs.len(), 2);
        for req in &reqs {
            assert_eq!(req.method, Method::PUT);
            assert_eq!(req.sender, Sender::HueDevice(1));
            assert_eq!(req.url.as_str(), "http://10.0.0.2/api/user/lights/1/state");
        }
        assert_eq!(reqs[0].json_body(), json!({"on": true}));
        assert_eq!(reqs[1].json_body(), json!({"bri": 153}));

        // rejected and unknown commands send nothing
        hue.command(1, &HueCommand::Hue(10));
        hue.command(42, &HueCommand::Power(true));
        hue.command_device_state(42, &ApiLightStateUpdate::power(true));
        assert!(drain_requests(&mut rx).is_empty());
    }
}
