use tokio::time::Instant;

use vicecity_api::request::PluginId;

use crate::gateway::{GatewayEvent, Sender};
use crate::hub::Hub;
use crate::plugin::Plugin;

impl Hub {
    fn plugin_for(&mut self, sender: Sender) -> &mut dyn Plugin {
        match sender {
            Sender::Plugin(id) => self.plugin_mut(id),
            Sender::HueDevice(_) => self.plugin_mut(PluginId::Hue),
        }
    }

    /// Route a gateway event to the plugin that is waiting for it.
    pub fn handle_gateway_event(&mut self, event: GatewayEvent, now: Instant) {
        match event {
            GatewayEvent::JsonReply {
                status,
                sender,
                body,
            } => self
                .plugin_for(sender)
                .handle_json_reply(status, sender, &body, now),

            GatewayEvent::Reply {
                status,
                sender,
                body,
            } => self
                .plugin_for(sender)
                .handle_reply(status, sender, &body, now),

            GatewayEvent::ServiceFound {
                service_type,
                address,
            } => {
                log::trace!("Service {service_type} found at {address}");
                self.hue.handle_service_found(&service_type, address, now);
                self.nanoleaf
                    .handle_service_found(&service_type, address, now);
            }

            GatewayEvent::HostResolved {
                sender,
                hostname,
                address,
            } => self
                .plugin_for(sender)
                .handle_host_resolved(sender, &hostname, address, now),
        }
    }
}
