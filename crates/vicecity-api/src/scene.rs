use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use hue::colorspace::{hue_to_rgb, xy_to_rgb};

/// Device class tag for lights behind the Hue bridge
pub const HUE_CLASS: &str = "hue";

/// Device class tag for the Nanoleaf panel
pub const NANOLEAF_CLASS: &str = "nanoleaf";

/// A named, ordered list of steps.
///
/// Steps are kept as raw JSON so that one malformed step can be reported
/// and skipped without rejecting the whole scene.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SceneStep {
    pub device: DeviceRef,
    pub state: Map<String, Value>,
}

impl SceneStep {
    /// Parse a raw step, or `None` if `device` or `state` is missing.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let device = serde_json::from_value(obj.get("device")?.clone()).ok()?;
        let state = obj.get("state")?.as_object()?.clone();
        Some(Self { device, state })
    }
}

/// Steps of the first scene with a matching, non-empty name.
#[must_use]
pub fn find_steps<'a>(scenes: &'a [Scene], name: &str) -> &'a [Value] {
    scenes
        .iter()
        .find(|scene| !scene.name.is_empty() && scene.name == name)
        .map_or(&[], |scene| scene.steps.as_slice())
}

fn xy_color(value: &Value) -> Option<String> {
    match value.as_array()?.as_slice() {
        [x, y] => xy_to_rgb(x.as_f64()?, y.as_f64()?).map(|rgb| rgb.name()),
        _ => None,
    }
}

fn hue_color(value: &Value) -> Option<String> {
    let hue = u16::try_from(value.as_i64()?).ok()?;
    hue_to_rgb(hue).map(|rgb| rgb.name())
}

/// Preview colors of a scene: every literal `xy` and `hue` value, as sorted
/// `#rrggbb` names. Performs no device I/O.
#[must_use]
pub fn parse_scene_colors(scenes: &[Scene], name: &str) -> Vec<String> {
    let mut colors = vec![];
    for step in find_steps(scenes, name) {
        let Some(state) = step.get("state").and_then(Value::as_object) else {
            continue;
        };
        if let Some(color) = state.get("xy").and_then(xy_color) {
            colors.push(color);
        }
        if let Some(color) = state.get("hue").and_then(hue_color) {
            colors.push(color);
        }
    }
    colors.sort();
    colors
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::scene::{Scene, SceneStep, find_steps, parse_scene_colors};

    fn scenes() -> Vec<Scene> {
        serde_json::from_value(json!([
            {"name": "", "steps": [{"device": {}, "state": {}}]},
            {
                "name": "Party",
                "steps": [
                    {"device": {"name": "Strip", "class": "hue"}, "state": {"hue": 240}},
                    {"device": {"name": "Bulb", "class": "hue"}, "state": {"xy": [0.7006, 0.2993], "hue": 0}},
                    {"device": {"name": "Bulb", "class": "hue"}, "state": {"xy": [0.5], "hue": 400}},
                    {"device": {"name": "Panel", "class": "nanoleaf"}, "state": {"on": true}}
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn find_steps_by_name() {
        let scenes = scenes();
        assert_eq!(find_steps(&scenes, "Party").len(), 4);
        assert!(find_steps(&scenes, "").is_empty());
        assert!(find_steps(&scenes, "nonexistent").is_empty());
    }

    #[test]
    fn step_requires_device_and_state() {
        assert!(SceneStep::from_value(&json!({"device": {"name": "a", "class": "hue"}})).is_none());
        assert!(SceneStep::from_value(&json!({"state": {"on": true}})).is_none());

        let step = SceneStep::from_value(&json!({
            "device": {"name": "Lamp", "class": "hue"},
            "state": {"on": true}
        }))
        .unwrap();
        assert_eq!(step.device.name, "Lamp");
        assert_eq!(step.state.len(), 1);
    }

    #[test]
    fn scene_colors_sorted_and_filtered() {
        let colors = parse_scene_colors(&scenes(), "Party");
        // blue, red (xy) and red (hue); the invalid xy and hue are skipped
        assert_eq!(colors, vec!["#0000ff", "#ff0000", "#ff0000"]);
    }

    #[test]
    fn scene_colors_unknown_scene() {
        assert!(parse_scene_colors(&scenes(), "Quiet").is_empty());
    }
}
