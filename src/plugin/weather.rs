use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::time::Instant;

use vicecity_api::request::PluginId;

use crate::changes::{ChangeBus, update};
use crate::error::ApiResult;
use crate::gateway::{Gateway, Sender};
use crate::plugin::{Plugin, PluginBase};

const ONECALL_URL: &str = "https://api.openweathermap.org/data/2.5/onecall";

pub const HOURLY_FORECASTS: usize = 6;
pub const DAILY_FORECASTS: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyForecast {
    pub time: Option<DateTime<Utc>>,
    pub temperature: Option<f64>,
    pub icon_key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub time: Option<DateTime<Utc>>,
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub icon_key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: i64,
    pub wind_speed: Option<f64>,
    pub sunrise_time: Option<DateTime<Utc>>,
    pub sunset_time: Option<DateTime<Utc>>,
    pub condition: String,
    pub icon_key: String,
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.as_i64()?, 0)
}

/// Icon key of the first entry of a `weather` array
fn first_icon(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("weather")?.as_array()?.first()?.get("icon")?.as_str()
}

impl HourlyForecast {
    /// Fold one `hourly` entry into the forecast, keeping fields it lacks.
    fn merge(&mut self, obj: &Map<String, Value>) {
        if let Some(dt) = obj.get("dt") {
            self.time = timestamp(dt);
        }
        if let Some(temp) = obj.get("temp") {
            self.temperature = temp.as_f64();
        }
        if let Some(icon) = first_icon(obj) {
            self.icon_key = icon.to_string();
        }
    }
}

impl DailyForecast {
    fn merge(&mut self, obj: &Map<String, Value>) {
        if let Some(dt) = obj.get("dt") {
            self.time = timestamp(dt);
        }
        if let Some(temp) = obj.get("temp").and_then(Value::as_object) {
            if let Some(min) = temp.get("min") {
                self.temperature_min = min.as_f64();
            }
            if let Some(max) = temp.get("max") {
                self.temperature_max = max.as_f64();
            }
        }
        if let Some(icon) = first_icon(obj) {
            self.icon_key = icon.to_string();
        }
    }
}

pub struct WeatherPlugin {
    base: PluginBase,
    latitude: Option<f64>,
    longitude: Option<f64>,
    api_key: String,
    destination: Option<String>,
    current: CurrentWeather,
    hourly: Vec<HourlyForecast>,
    daily: Vec<DailyForecast>,
}

impl WeatherPlugin {
    pub fn new(gateway: Gateway, changes: ChangeBus) -> ApiResult<Self> {
        let base = PluginBase::new(PluginId::Weather, PluginId::Weather.name(), gateway, changes)?
            .with_update_interval(Duration::from_secs(5 * 60));

        Ok(Self {
            base,
            latitude: None,
            longitude: None,
            api_key: String::new(),
            destination: None,
            current: CurrentWeather::default(),
            hourly: vec![HourlyForecast::default(); HOURLY_FORECASTS],
            daily: vec![DailyForecast::default(); DAILY_FORECASTS],
        })
    }

    #[must_use]
    pub const fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    #[must_use]
    pub const fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub const fn current(&self) -> &CurrentWeather {
        &self.current
    }

    #[must_use]
    pub fn hourly(&self) -> &[HourlyForecast] {
        &self.hourly
    }

    #[must_use]
    pub fn daily(&self) -> &[DailyForecast] {
        &self.daily
    }

    pub fn set_latitude(&mut self, latitude: f64, now: Instant) {
        if update(&mut self.latitude, Some(latitude)) {
            self.base.notify("latitude", latitude);
            self.update_destination(now);
        }
    }

    pub fn set_longitude(&mut self, longitude: f64, now: Instant) {
        if update(&mut self.longitude, Some(longitude)) {
            self.base.notify("longitude", longitude);
            self.update_destination(now);
        }
    }

    pub fn set_api_key(&mut self, key: &str, now: Instant) {
        if update(&mut self.api_key, key.to_string()) {
            self.base.notify("apiKey", key);
            self.update_destination(now);
        }
    }

    fn update_destination(&mut self, now: Instant) {
        let (Some(lat), Some(lon)) = (self.latitude, self.longitude) else {
            return;
        };
        if self.api_key.is_empty() {
            return;
        }

        self.destination = Some(format!(
            "{ONECALL_URL}?lat={lat}&lon={lon}&appid={}&units=imperial&exclude=minutely",
            self.api_key
        ));

        if self.base.start_polling(now) {
            self.refresh();
        }
    }

    fn handle_current(&mut self, obj: &Map<String, Value>) {
        let mut next = self.current.clone();

        if let Some(temp) = obj.get("temp") {
            next.temperature = temp.as_f64();
        }
        if let Some(feels) = obj.get("feels_like") {
            next.feels_like = feels.as_f64();
        }
        if let Some(humidity) = obj.get("humidity") {
            next.humidity = humidity.as_i64().unwrap_or_default();
        }
        if let Some(wind) = obj.get("wind_speed") {
            next.wind_speed = wind.as_f64();
        }
        if let Some(sunrise) = obj.get("sunrise") {
            next.sunrise_time = timestamp(sunrise);
        }
        if let Some(sunset) = obj.get("sunset") {
            next.sunset_time = timestamp(sunset);
        }
        if let Some(first) = obj
            .get("weather")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(Value::as_object)
        {
            if let Some(main) = first.get("main").and_then(Value::as_str) {
                next.condition = main.to_string();
            }
            if let Some(icon) = first.get("icon").and_then(Value::as_str) {
                next.icon_key = icon.to_string();
            }
        }

        if update(&mut self.current, next) {
            self.base.notify("current", json!(self.current));
        }
    }

    fn handle_hourly(&mut self, entries: &[Value]) {
        let mut next = self.hourly.clone();
        for (forecast, entry) in next.iter_mut().zip(entries) {
            if let Some(obj) = entry.as_object() {
                forecast.merge(obj);
            }
        }
        if update(&mut self.hourly, next) {
            self.base.notify("hourly", json!(self.hourly));
        }
    }

    fn handle_daily(&mut self, entries: &[Value]) {
        let mut next = self.daily.clone();
        for (forecast, entry) in next.iter_mut().zip(entries) {
            if let Some(obj) = entry.as_object() {
                forecast.merge(obj);
            }
        }
        if update(&mut self.daily, next) {
            self.base.notify("daily", json!(self.daily));
        }
    }
}

impl Plugin for WeatherPlugin {
    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PluginBase {
        &mut self.base
    }

    fn refresh(&mut self) {
        if let Some(url) = &self.destination {
            self.base.gateway.get(url, self.base.sender(), None);
        }
    }

    fn is_configured(&self) -> bool {
        self.destination.is_some()
    }

    fn handle_json_reply(&mut self, status: u16, _sender: Sender, body: &Value, _now: Instant) {
        if status != 200 {
            log::debug!(
                "[{}] Ignoring unsuccessful reply from weather server with status code {status}",
                self.base.name()
            );
            return;
        }

        let Some(obj) = body.as_object() else {
            log::debug!("[{}] Failed to parse response from weather server", self.base.name());
            return;
        };

        if let Some(current) = obj.get("current").and_then(Value::as_object) {
            self.handle_current(current);
        }
        if let Some(hourly) = obj.get("hourly").and_then(Value::as_array) {
            self.handle_hourly(hourly);
        }
        if let Some(daily) = obj.get("daily").and_then(Value::as_array) {
            self.handle_daily(daily);
        }
    }
}
