//! Polling integrations.
//!
//! Every integration embeds a [`PluginBase`] carrying the shared lifecycle
//! (name, update interval, active flag and poll timer) and implements
//! [`Plugin`] on top of it. Plugins never perform I/O themselves: they
//! submit work to the [`Gateway`] and are fed the results by the hub.

pub mod facts;
pub mod hue;
pub mod insults;
pub mod nanoleaf;
pub mod pihole;
pub mod spotify;
pub mod weather;

use std::net::Ipv4Addr;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use vicecity_api::request::PluginId;

use crate::changes::{ChangeBus, ChangeSource, update};
use crate::error::{ApiError, ApiResult};
use crate::gateway::{Gateway, Sender};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest period a timer accepts, so a zero interval cannot spin the loop
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Repeating deadline, driven explicitly by the caller's clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollTimer {
    period: Duration,
    next: Option<Instant>,
}

impl PollTimer {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            next: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    pub const fn stop(&mut self) {
        self.next = None;
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.next.is_some()
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Change the period, re-arming the timer if it is running.
    pub fn set_period(&mut self, period: Duration, now: Instant) {
        self.period = period.max(MIN_PERIOD);
        if self.is_running() {
            self.start(now);
        }
    }

    /// Returns true (and re-arms) if the deadline has passed. Missed periods
    /// are skipped rather than replayed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if next <= now => {
                self.start(now);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.next
    }
}

/// One-shot deadline, for confirmation and hold delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OneShot {
    at: Option<Instant>,
}

impl OneShot {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.at = Some(now + delay);
    }

    pub const fn cancel(&mut self) {
        self.at = None;
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// Returns true once, when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.at {
            Some(at) if at <= now => {
                self.at = None;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.at
    }
}

/// Earliest of a set of optional deadlines
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}

pub struct PluginBase {
    id: PluginId,
    name: String,
    update_interval: Duration,
    active: bool,
    pub timer: PollTimer,
    pub gateway: Gateway,
    changes: ChangeBus,
}

impl PluginBase {
    pub fn new(id: PluginId, name: &str, gateway: Gateway, changes: ChangeBus) -> ApiResult<Self> {
        if name.is_empty() {
            return Err(ApiError::MissingPluginName);
        }
        log::debug!("[{name}] Initializing plugin");

        Ok(Self {
            id,
            name: name.to_string(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            active: true,
            timer: PollTimer::new(DEFAULT_UPDATE_INTERVAL),
            gateway,
            changes,
        })
    }

    /// Builder-style override of the default update interval
    #[must_use]
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self.timer = PollTimer::new(interval);
        self
    }

    #[must_use]
    pub const fn id(&self) -> PluginId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn sender(&self) -> Sender {
        Sender::Plugin(self.id)
    }

    #[must_use]
    pub const fn update_interval(&self) -> Duration {
        self.update_interval
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    pub fn notify(&self, property: &'static str, value: impl Into<Value>) {
        self.changes
            .notify(ChangeSource::Plugin(self.id), property, value);
    }

    /// Store `value` in `slot`, publishing it only if it differs.
    pub fn publish<T: PartialEq + Serialize>(
        &self,
        property: &'static str,
        slot: &mut T,
        value: T,
    ) -> bool {
        if !update(slot, value) {
            return false;
        }
        match serde_json::to_value(&*slot) {
            Ok(value) => self.notify(property, value),
            Err(err) => log::debug!("[{}] Failed to encode {property}: {err}", self.name),
        }
        true
    }

    #[must_use]
    pub const fn changes(&self) -> &ChangeBus {
        &self.changes
    }

    pub fn set_update_interval(&mut self, interval: Duration, now: Instant) {
        if update(&mut self.update_interval, interval) {
            self.timer.set_period(interval, now);
            self.notify(
                "updateInterval",
                u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            );
        }
    }

    /// Record the active flag, returning true if it changed.
    pub fn set_active(&mut self, active: bool) -> bool {
        if update(&mut self.active, active) {
            self.notify("isActive", active);
            true
        } else {
            false
        }
    }

    /// Start polling, if allowed. Returns true if the timer is now running.
    pub fn start_polling(&mut self, now: Instant) -> bool {
        if self.active {
            self.timer.start(now);
        }
        self.timer.is_running()
    }
}

pub trait Plugin {
    fn base(&self) -> &PluginBase;

    fn base_mut(&mut self) -> &mut PluginBase;

    /// Issue the periodic poll request(s).
    fn refresh(&mut self);

    /// Whether everything needed to poll (addresses, credentials) is known
    fn is_configured(&self) -> bool {
        true
    }

    /// Called once by the hub after settings have been applied. A plugin
    /// already polling (configured while settings loaded) is left alone.
    fn start(&mut self, now: Instant) {
        if self.base().timer.is_running() {
            return;
        }
        if self.is_configured() && self.base_mut().start_polling(now) {
            self.refresh();
        }
    }

    fn handle_json_reply(&mut self, _status: u16, _sender: Sender, _body: &Value, _now: Instant) {}

    fn handle_reply(&mut self, _status: u16, _sender: Sender, _body: &Bytes, _now: Instant) {}

    fn handle_service_found(&mut self, _service_type: &str, _address: Ipv4Addr, _now: Instant) {}

    fn handle_host_resolved(
        &mut self,
        _sender: Sender,
        _hostname: &str,
        _address: Option<Ipv4Addr>,
        _now: Instant,
    ) {
    }

    /// Run any timers that are due.
    fn poll(&mut self, now: Instant) {
        if self.base_mut().timer.fire(now) {
            self.refresh();
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.base().timer.deadline()
    }

    fn set_active(&mut self, active: bool, now: Instant) {
        if !self.base_mut().set_active(active) {
            return;
        }

        if !active {
            self.base_mut().timer.stop();
        } else if self.is_configured() && self.base_mut().start_polling(now) {
            self.refresh();
        }
    }

    fn set_update_interval(&mut self, interval: Duration, now: Instant) {
        self.base_mut().set_update_interval(interval, now);
    }
}

/// Parse an `updateInterval` setting, given in milliseconds.
#[must_use]
pub fn interval_from_millis(value: &Value) -> Option<Duration> {
    value.as_u64().map(Duration::from_millis)
}
