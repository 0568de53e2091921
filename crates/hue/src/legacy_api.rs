use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HueError {
    #[serde(rename = "type")]
    pub typ: u32,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HueApiResult<T> {
    Success(T),
    Error(HueError),
}

/// One entry of the array returned by `PUT /lights/<id>/state`.
///
/// Successful entries map a flat path (`/lights/<id>/state/<prop>`) to the
/// value that was applied.
pub type ApiStateAck = HueApiResult<Map<String, Value>>;

/// Light state as reported by `GET /lights`.
///
/// Every field is optional, since acknowledgement replies only carry the
/// properties that were changed.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiLightState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bri: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xy: Option<Vec<f64>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApiLight {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub light_type: Option<String>,
    #[serde(default)]
    pub productname: Option<String>,
    #[serde(default)]
    pub state: ApiLightState,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApiGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lights: Vec<String>,
    #[serde(default, rename = "type")]
    pub group_type: String,
}

impl ApiGroup {
    #[must_use]
    pub fn is_room(&self) -> bool {
        self.group_type.eq_ignore_ascii_case("room")
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiLightStateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
}

impl ApiLightStateUpdate {
    #[must_use]
    pub fn power(on: bool) -> Self {
        Self {
            on: Some(on),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn brightness(bri: u8) -> Self {
        Self {
            bri: Some(bri),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn color_temperature(mirek: u16) -> Self {
        Self {
            ct: Some(mirek),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            xy: Some([x, y]),
            ..Self::default()
        }
    }
}
