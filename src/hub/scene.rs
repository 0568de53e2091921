use std::collections::VecDeque;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

use vicecity_api::request::HueCommand;
use vicecity_api::scene::{HUE_CLASS, NANOLEAF_CLASS, SceneStep};

use crate::plugin::OneShot;
use crate::plugin::hue::HuePlugin;
use crate::plugin::hue::device::{Capability, HueDevice};
use crate::plugin::nanoleaf::NanoleafPlugin;

/// Hue state keys, in the order they are applied
const HUE_KEYS: [&str; 5] = ["on", "brightness", "colorTemperature", "xy", "hue"];

/// Paces the steps of the running scene.
///
/// The runner only tracks progress; the hub executes each step it hands
/// out, so replies and timers keep being serviced between steps.
#[derive(Debug)]
pub struct SceneRunner {
    name: String,
    steps: VecDeque<Value>,
    step_number: usize,
    running: bool,
    pause: OneShot,
    step_delay: Duration,
}

/// What happened to the keys of one step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub applied: Vec<String>,
    /// Keys the device lacks the capability for
    pub mismatched: Vec<String>,
    /// Keys with a value of the wrong shape, or one the device rejects
    pub invalid: Vec<String>,
    /// Keys no device class handles
    pub unsupported: Vec<String>,
}

impl SceneRunner {
    #[must_use]
    pub fn new(step_delay: Duration) -> Self {
        Self {
            name: String::new(),
            steps: VecDeque::new(),
            step_number: 0,
            running: false,
            pause: OneShot::default(),
            step_delay,
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn begin(&mut self, name: &str, steps: &[Value]) {
        self.name = name.to_string();
        self.steps = steps.iter().cloned().collect();
        self.step_number = 0;
        self.running = true;
    }

    /// Next step to execute, with its 1-based number. Arms the pause that
    /// follows it.
    pub fn next_step(&mut self, now: Instant) -> Option<(usize, Value)> {
        let step = self.steps.pop_front()?;
        self.step_number += 1;
        self.pause.arm(now, self.step_delay);
        Some((self.step_number, step))
    }

    /// True once the pause after the previous step has passed.
    pub fn due(&mut self, now: Instant) -> bool {
        self.pause.fire(now)
    }

    pub fn finish(&mut self) {
        self.running = false;
        self.steps.clear();
        self.pause.cancel();
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.pause.deadline()
    }
}

/// Integer value of a JSON number, rounding fractional ones.
#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite() && v.abs() < 9.0e15)
            .map(|v| v.round() as i64)
    })
}

fn hue_command(key: &str, value: &Value) -> Option<(HueCommand, Capability)> {
    let res = match key {
        "on" => (HueCommand::Power(value.as_bool()?), Capability::Power),
        "brightness" => (HueCommand::Brightness(value.as_f64()?), Capability::Brightness),
        "colorTemperature" => {
            let kelvin = u32::try_from(as_integer(value)?).ok()?;
            (HueCommand::ColorTemperature(kelvin), Capability::ColorTemperature)
        }
        "xy" => match value.as_array()?.as_slice() {
            [x, y] => (HueCommand::Xy(x.as_f64()?, y.as_f64()?), Capability::Color),
            _ => return None,
        },
        "hue" => (HueCommand::Hue(as_integer(value)?), Capability::Color),
        _ => return None,
    };
    Some(res)
}

fn apply_hue_state(
    hue: &HuePlugin,
    device: &HueDevice,
    state: &mut Map<String, Value>,
    report: &mut StepReport,
) {
    let id = device.id();
    for key in HUE_KEYS {
        let Some(value) = state.remove(key) else {
            continue;
        };

        match hue_command(key, &value) {
            Some((_, capability)) if !device.supports(capability) => {
                log::debug!(
                    "Hue device {:?} lacks the capability for {key:?}",
                    device.name()
                );
                report.mismatched.push(key.to_string());
            }
            Some((cmd, _)) => match device.command(&cmd) {
                Ok(updates) => {
                    log::debug!("\t=> {key} on {:?}", device.name());
                    hue.send_commands(id, Ok(updates));
                    report.applied.push(key.to_string());
                }
                Err(err) => {
                    log::debug!("Rejected {key:?} for {:?}: {err}", device.name());
                    report.invalid.push(key.to_string());
                }
            },
            None => {
                log::debug!("Invalid value {value} for {key:?}");
                report.invalid.push(key.to_string());
            }
        }
    }
}

fn apply_nanoleaf_state(
    nanoleaf: &mut NanoleafPlugin,
    state: &mut Map<String, Value>,
    report: &mut StepReport,
) {
    if let Some(value) = state.remove("on") {
        if let Some(on) = value.as_bool() {
            nanoleaf.command_power(on);
            report.applied.push("on".to_string());
        } else {
            report.invalid.push("on".to_string());
        }
    }

    if let Some(value) = state.remove("effect") {
        if let Some(effect) = value.as_str() {
            nanoleaf.select_effect(effect);
            report.applied.push("effect".to_string());
        } else {
            report.invalid.push("effect".to_string());
        }
    }
}

/// Execute one scene step against the device it names.
///
/// Returns `None` when the step is malformed or its device cannot be
/// resolved, in which case nothing was sent.
pub fn apply_step(
    hue: &HuePlugin,
    nanoleaf: &mut NanoleafPlugin,
    scene: &str,
    number: usize,
    step: &Value,
) -> Option<StepReport> {
    let Some(SceneStep { device, mut state }) = SceneStep::from_value(step) else {
        log::debug!("Missing device and/or state for step {number} in scene {scene:?}");
        return None;
    };

    let mut report = StepReport::default();
    match device.class.as_str() {
        HUE_CLASS => {
            let Some(dev) = hue.device_by_name(&device.name) else {
                log::debug!(
                    "Unknown Hue device {:?} in step {number} of scene {scene:?}",
                    device.name
                );
                return None;
            };
            log::debug!("Executing step {number} on Hue device {:?}", device.name);
            apply_hue_state(hue, dev, &mut state, &mut report);
        }
        NANOLEAF_CLASS => {
            if device.name.is_empty() || device.name != nanoleaf.name() {
                log::debug!(
                    "Unknown Nanoleaf {:?} in step {number} of scene {scene:?}",
                    device.name
                );
                return None;
            }
            log::debug!("Executing step {number} on Nanoleaf {:?}", device.name);
            apply_nanoleaf_state(nanoleaf, &mut state, &mut report);
        }
        other => {
            log::debug!("Unsupported class {other:?} in step {number} of scene {scene:?}");
            return None;
        }
    }

    if !state.is_empty() {
        report.unsupported = state.keys().cloned().collect();
        log::debug!(
            "Unsupported state properties {:?} for {:?} in step {number} of scene {scene:?}",
            report.unsupported,
            device.name
        );
    }

    Some(report)
}
