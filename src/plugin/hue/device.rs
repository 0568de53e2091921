use serde_json::{Map, Value, json};
use thiserror::Error;

use hue::colorspace::{Rgb, ambient_color, hue_to_rgb, rgb_to_xy, xy_to_rgb};
use hue::legacy_api::{ApiLight, ApiLightState, ApiLightStateUpdate, ApiStateAck, HueApiResult};
use hue::scale::{
    brightness_from_wire, brightness_to_wire, kelvin_range, kelvin_to_mirek, mirek_to_kelvin,
};

use vicecity_api::request::HueCommand;

use crate::changes::update;

/// Capability level of a bridge accessory. Each kind includes everything
/// the previous kinds support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceKind {
    Device,
    Light,
    Ambiance,
    Color,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Power,
    Brightness,
    ColorTemperature,
    Color,
}

impl DeviceKind {
    /// Pick the kind from the bridge-reported `type` string.
    #[must_use]
    pub fn from_type(device_type: &str) -> Self {
        let device_type = device_type.to_lowercase();
        if device_type == "dimmable light" {
            Self::Light
        } else if device_type == "color temperature light" {
            Self::Ambiance
        } else if device_type.ends_with("color light") {
            Self::Color
        } else {
            Self::Device
        }
    }

    #[must_use]
    pub fn supports(self, capability: Capability) -> bool {
        let required = match capability {
            Capability::Power => Self::Device,
            Capability::Brightness => Self::Light,
            Capability::ColorTemperature => Self::Ambiance,
            Capability::Color => Self::Color,
        };
        self >= required
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Invalid brightness {0}")]
    InvalidBrightness(f64),

    #[error("Invalid color temperature {0}K")]
    InvalidColorTemperature(u32),

    #[error("Invalid xy coordinates ({0}, {1})")]
    InvalidXy(f64, f64),

    #[error("Invalid hue {0}")]
    InvalidHue(i64),

    #[error("Invalid color {0}")]
    InvalidColor(Rgb),

    #[error("Device does not support {0:?}")]
    Unsupported(Capability),
}

pub type CommandResult = Result<Vec<ApiLightStateUpdate>, CommandError>;

#[derive(Clone, Debug)]
pub struct HueDevice {
    id: u32,
    kind: DeviceKind,
    name: String,
    device_type: String,
    product_name: String,
    reachable: bool,
    on: bool,
    room: Option<String>,
    brightness: f64,
    color_temperature: u32,
    color: Option<Rgb>,
}

impl HueDevice {
    #[must_use]
    pub fn new(id: u32, kind: DeviceKind) -> Self {
        log::debug!("Created Hue device {id} ({kind:?})");
        Self {
            id,
            kind,
            name: String::new(),
            device_type: String::new(),
            product_name: String::new(),
            reachable: false,
            on: false,
            room: None,
            brightness: 0.0,
            color_temperature: 0,
            color: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> DeviceKind {
        self.kind
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.kind.supports(capability)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.on
    }

    #[must_use]
    pub const fn is_reachable(&self) -> bool {
        self.reachable
    }

    #[must_use]
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    #[must_use]
    pub const fn brightness(&self) -> f64 {
        self.brightness
    }

    #[must_use]
    pub const fn color_temperature(&self) -> u32 {
        self.color_temperature
    }

    #[must_use]
    pub fn ambient_color(&self) -> Option<Rgb> {
        ambient_color(self.color_temperature)
    }

    #[must_use]
    pub const fn color(&self) -> Option<Rgb> {
        self.color
    }

    /// Returns true if the room changed.
    pub fn set_room(&mut self, room: &str) -> bool {
        update(&mut self.room, Some(room.to_string()))
    }

    /// Current value of an observable property, as published on the change
    /// stream.
    #[must_use]
    pub fn property(&self, property: &str) -> Value {
        match property {
            "id" => json!(self.id),
            "name" => json!(self.name),
            "type" => json!(self.device_type),
            "productName" => json!(self.product_name),
            "isReachable" => json!(self.reachable),
            "isOn" => json!(self.on),
            "room" => json!(self.room),
            "brightness" => json!(self.brightness),
            "colorTemperature" => json!(self.color_temperature),
            "ambientColor" => json!(self.ambient_color()),
            "color" => json!(self.color),
            _ => Value::Null,
        }
    }

    /// Apply a poll result or command acknowledgement, returning the names
    /// of the properties that changed.
    pub fn handle_response(&mut self, payload: &Value) -> Vec<&'static str> {
        match payload {
            Value::Array(acks) => {
                let state = self.collect_acks(acks);
                self.handle_response_data(&json!({ "state": state }))
            }
            Value::Object(_) => self.handle_response_data(payload),
            _ => {
                log::debug!("Failed to parse response for Hue device {}", self.id);
                vec![]
            }
        }
    }

    /// Flatten `[{"success": {"/lights/<id>/state/<prop>": v}}, ..]` into a
    /// state object.
    fn collect_acks(&self, acks: &[Value]) -> Map<String, Value> {
        let prefix = format!("/lights/{}/state/", self.id);
        let mut state = Map::new();

        for ack in acks {
            match serde_json::from_value::<ApiStateAck>(ack.clone()) {
                Ok(HueApiResult::Success(items)) => {
                    for (path, value) in items {
                        if path.starts_with(&prefix) {
                            let prop = path.rsplit('/').next().unwrap_or_default();
                            state.insert(prop.to_string(), value);
                        } else {
                            log::debug!("Unexpected argument {path:?} for Hue device {}", self.id);
                        }
                    }
                }
                Ok(HueApiResult::Error(err)) => {
                    log::debug!(
                        "Received error for Hue device {}: {}",
                        self.id,
                        err.description
                    );
                }
                Err(err) => log::debug!("Malformed reply for Hue device {}: {err}", self.id),
            }
        }

        state
    }

    fn handle_response_data(&mut self, payload: &Value) -> Vec<&'static str> {
        let light: ApiLight = match serde_json::from_value(payload.clone()) {
            Ok(light) => light,
            Err(err) => {
                log::debug!("Failed to parse data for Hue device {}: {err}", self.id);
                return vec![];
            }
        };

        let mut changed = vec![];

        if let Some(name) = light.name {
            if update(&mut self.name, name) {
                changed.push("name");
            }
        }
        if let Some(device_type) = light.light_type {
            if update(&mut self.device_type, device_type) {
                changed.push("type");
            }
        }
        if let Some(product_name) = light.productname {
            if update(&mut self.product_name, product_name) {
                changed.push("productName");
            }
        }

        self.handle_state_data(&light.state, &mut changed);
        changed
    }

    fn handle_state_data(&mut self, state: &ApiLightState, changed: &mut Vec<&'static str>) {
        if let Some(reachable) = state.reachable {
            if update(&mut self.reachable, reachable) {
                changed.push("isReachable");
            }
        }
        if let Some(on) = state.on {
            if update(&mut self.on, on) {
                changed.push("isOn");
            }
        }

        if !self.supports(Capability::Brightness) {
            return;
        }
        if let Some(bri) = state.bri {
            if update(&mut self.brightness, brightness_from_wire(bri)) {
                changed.push("brightness");
            }
        }

        if !self.supports(Capability::ColorTemperature) {
            return;
        }
        if let Some(kelvin) = state.ct.and_then(mirek_to_kelvin) {
            let before = self.ambient_color();
            if update(&mut self.color_temperature, kelvin) {
                changed.push("colorTemperature");
                if before != self.ambient_color() {
                    changed.push("ambientColor");
                }
            }
        }

        if !self.supports(Capability::Color) {
            return;
        }
        if let Some(&[x, y]) = state.xy.as_deref() {
            if update(&mut self.color, xy_to_rgb(x, y)) {
                changed.push("color");
            }
        }
    }

    fn require(&self, capability: Capability) -> Result<(), CommandError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(CommandError::Unsupported(capability))
        }
    }

    /// Prefix `cmd` with a power-on, since the bridge rejects state changes
    /// on a light that is off.
    fn powered(&self, cmd: ApiLightStateUpdate) -> Vec<ApiLightStateUpdate> {
        if self.on {
            vec![cmd]
        } else {
            vec![ApiLightStateUpdate::power(true), cmd]
        }
    }

    /// Power commands are always sent, even if the cached state matches.
    #[must_use]
    pub fn command_power(&self, on: bool) -> Vec<ApiLightStateUpdate> {
        vec![ApiLightStateUpdate::power(on)]
    }

    pub fn command_brightness(&self, percent: f64) -> CommandResult {
        self.require(Capability::Brightness)?;
        let bri = brightness_to_wire(percent).ok_or(CommandError::InvalidBrightness(percent))?;
        Ok(self.powered(ApiLightStateUpdate::brightness(bri)))
    }

    pub fn command_color_temperature(&self, kelvin: u32) -> CommandResult {
        self.require(Capability::ColorTemperature)?;
        let mirek = kelvin_range()
            .contains(&kelvin)
            .then(|| kelvin_to_mirek(kelvin))
            .flatten()
            .ok_or(CommandError::InvalidColorTemperature(kelvin))?;
        Ok(self.powered(ApiLightStateUpdate::color_temperature(mirek)))
    }

    pub fn command_xy(&self, x: f64, y: f64) -> CommandResult {
        self.require(Capability::Color)?;
        if x.is_nan() || y.is_nan() {
            return Err(CommandError::InvalidXy(x, y));
        }
        Ok(self.powered(ApiLightStateUpdate::xy(x, y)))
    }

    pub fn command_rgb(&self, color: Rgb) -> CommandResult {
        self.require(Capability::Color)?;
        let xy = rgb_to_xy(color).ok_or(CommandError::InvalidColor(color))?;
        self.command_xy(xy.x, xy.y)
    }

    pub fn command_hue(&self, hue: i64) -> CommandResult {
        self.require(Capability::Color)?;
        let color = u16::try_from(hue)
            .ok()
            .and_then(hue_to_rgb)
            .ok_or(CommandError::InvalidHue(hue))?;
        self.command_rgb(color)
    }

    /// Wire updates for a hub command, or why the device refuses it.
    pub fn command(&self, cmd: &HueCommand) -> CommandResult {
        match cmd {
            HueCommand::Power(on) => Ok(self.command_power(*on)),
            HueCommand::Brightness(pct) => self.command_brightness(*pct),
            HueCommand::ColorTemperature(kelvin) => self.command_color_temperature(*kelvin),
            HueCommand::Xy(x, y) => self.command_xy(*x, *y),
            HueCommand::Hue(hue) => self.command_hue(*hue),
        }
    }
}
