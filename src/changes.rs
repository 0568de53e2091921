//! Change notification stream.
//!
//! Every observable property update in the hub is published as a [`Change`]
//! on a broadcast channel. Publishers never block and never fail: when nobody
//! is subscribed, the change is simply dropped.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use vicecity_api::request::PluginId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeSource {
    Hub,
    Plugin(PluginId),
    HueDevice(u32),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Change {
    pub source: ChangeSource,
    pub property: &'static str,
    pub value: Value,
}

#[derive(Clone, Debug)]
pub struct ChangeBus {
    chan: broadcast::Sender<Change>,
}

impl ChangeBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (chan, _) = broadcast::channel(capacity.max(1));
        Self { chan }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.chan.subscribe()
    }

    pub fn notify(&self, source: ChangeSource, property: &'static str, value: impl Into<Value>) {
        let _ = self.chan.send(Change {
            source,
            property,
            value: value.into(),
        });
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Replace `slot` with `value` and report whether anything changed.
pub fn update<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

#[cfg(test)]
pub fn drain(rx: &mut broadcast::Receiver<Change>) -> Vec<Change> {
    let mut res = vec![];
    while let Ok(change) = rx.try_recv() {
        res.push(change);
    }
    res
}
