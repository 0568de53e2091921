//! Network gateway.
//!
//! The gateway is the single owner of outbound network I/O. Plugins hold a
//! cheap [`Gateway`] handle and submit fire-and-forget operations through
//! it; results come back later as [`GatewayEvent`]s tagged with the
//! [`Sender`] that asked for them.

pub mod browser;
pub mod http;

use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use url::Url;

use vicecity_api::config::NetworkConfig;
use vicecity_api::request::PluginId;

use crate::error::ApiResult;
use crate::gateway::browser::MdnsBrowser;
use crate::gateway::http::HttpDispatcher;
use crate::service::Service;

/// Correlation token for a gateway operation. Never dereferenced by the
/// gateway itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sender {
    Plugin(PluginId),
    HueDevice(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub enum GatewayEvent {
    Reply {
        status: u16,
        sender: Sender,
        body: Bytes,
    },
    JsonReply {
        status: u16,
        sender: Sender,
        body: Value,
    },
    ServiceFound {
        service_type: String,
        address: Ipv4Addr,
    },
    HostResolved {
        sender: Sender,
        hostname: String,
        address: Option<Ipv4Addr>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub sender: Sender,
    pub method: Method,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCommand {
    Request(Request),
    Browse(String),
    Lookup { hostname: String, sender: Sender },
}

#[derive(Clone, Debug)]
pub struct Gateway {
    chan: UnboundedSender<GatewayCommand>,
}

impl Gateway {
    /// Create a handle plus the receiving end of its command queue.
    ///
    /// The receiver is normally handed to a [`GatewayService`]; tests keep
    /// it to inspect what plugins asked for.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<GatewayCommand>) {
        let (chan, rx) = unbounded_channel();
        (Self { chan }, rx)
    }

    fn submit(&self, cmd: GatewayCommand) {
        if self.chan.send(cmd).is_err() {
            log::debug!("Gateway is shut down, dropping command");
        }
    }

    pub fn send_request(
        &self,
        destination: &str,
        sender: Sender,
        method: Method,
        body: Option<Bytes>,
        content_type: Option<&str>,
        authorization: Option<&str>,
    ) {
        let url = match Url::parse(destination) {
            Ok(url) => url,
            Err(err) => {
                log::debug!("Invalid request destination {destination:?}: {err}");
                return;
            }
        };

        self.submit(GatewayCommand::Request(Request {
            url,
            sender,
            method,
            body,
            content_type: content_type.map(ToString::to_string),
            authorization: authorization.map(ToString::to_string),
        }));
    }

    pub fn get(&self, destination: &str, sender: Sender, authorization: Option<&str>) {
        self.send_request(destination, sender, Method::GET, None, None, authorization);
    }

    pub fn send_json_request(
        &self,
        destination: &str,
        sender: Sender,
        method: Method,
        body: &Value,
        authorization: Option<&str>,
    ) {
        match serde_json::to_vec(body) {
            Ok(data) => self.send_request(
                destination,
                sender,
                method,
                Some(Bytes::from(data)),
                Some("application/json"),
                authorization,
            ),
            Err(err) => log::debug!("Failed to serialize request body for {destination}: {err}"),
        }
    }

    pub fn browse_service_type(&self, service_type: &str) {
        if service_type.is_empty() {
            log::debug!("Ignoring browse request for empty service type");
            return;
        }
        self.submit(GatewayCommand::Browse(service_type.to_string()));
    }

    pub fn lookup_host(&self, hostname: &str, sender: Sender) {
        self.submit(GatewayCommand::Lookup {
            hostname: hostname.to_string(),
            sender,
        });
    }
}

pub fn first_ipv4<'a>(addrs: impl IntoIterator<Item = &'a IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(_) => None,
    })
}

async fn resolve_host(hostname: String, sender: Sender, events: UnboundedSender<GatewayEvent>) {
    let address = match tokio::net::lookup_host((hostname.as_str(), 0)).await {
        Ok(addrs) => first_ipv4(&addrs.map(|sa| sa.ip()).collect::<Vec<_>>()),
        Err(err) => {
            log::debug!("Host lookup for {hostname} failed: {err}");
            None
        }
    };

    let _ = events.send(GatewayEvent::HostResolved {
        sender,
        hostname,
        address,
    });
}

pub struct GatewayService {
    commands: UnboundedReceiver<GatewayCommand>,
    events: UnboundedSender<GatewayEvent>,
    http: HttpDispatcher,
    browser: MdnsBrowser,
}

impl GatewayService {
    pub fn new(
        config: &NetworkConfig,
        commands: UnboundedReceiver<GatewayCommand>,
        events: UnboundedSender<GatewayEvent>,
    ) -> ApiResult<Self> {
        Ok(Self {
            commands,
            http: HttpDispatcher::new(config, events.clone())?,
            browser: MdnsBrowser::new(config.discovery_timeout()),
            events,
        })
    }

    fn handle_command(&mut self, cmd: GatewayCommand) {
        match cmd {
            GatewayCommand::Request(req) => self.http.dispatch(req),
            GatewayCommand::Browse(service_type) => self.browser.browse(service_type),
            GatewayCommand::Lookup { hostname, sender } => {
                tokio::spawn(resolve_host(hostname, sender, self.events.clone()));
            }
        }
    }
}

#[async_trait]
impl Service for GatewayService {
    async fn start(&mut self) -> ApiResult<()> {
        self.browser.start()
    }

    async fn run(&mut self) -> ApiResult<()> {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else {
                        break;
                    };
                    self.handle_command(cmd);
                }
                ev = self.browser.next_event() => {
                    if let Some(found) = self.browser.handle_event(ev) {
                        let _ = self.events.send(found);
                    }
                }
                () = self.browser.expired() => {
                    self.browser.expire();
                }
            }
        }
        Ok(())
    }

    async fn stop(&mut self) -> ApiResult<()> {
        self.browser.shutdown();
        Ok(())
    }
}

#[cfg(test)]
pub fn drain_commands(rx: &mut UnboundedReceiver<GatewayCommand>) -> Vec<GatewayCommand> {
    let mut res = vec![];
    while let Ok(cmd) = rx.try_recv() {
        res.push(cmd);
    }
    res
}

#[cfg(test)]
pub fn drain_requests(rx: &mut UnboundedReceiver<GatewayCommand>) -> Vec<Request> {
    drain_commands(rx)
        .into_iter()
        .filter_map(|cmd| match cmd {
            GatewayCommand::Request(req) => Some(req),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
impl Request {
    pub fn json_body(&self) -> Value {
        self.body
            .as_ref()
            .map_or(Value::Null, |body| serde_json::from_slice(body).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use reqwest::Method;
    use serde_json::json;

    use vicecity_api::request::PluginId;

    use crate::gateway::{Gateway, GatewayCommand, Sender, drain_commands, first_ipv4};

    const SENDER: Sender = Sender::Plugin(PluginId::Hue);

    #[test]
    fn invalid_destination_is_dropped() {
        let (gw, mut rx) = Gateway::channel();
        gw.get("not a url", SENDER, None);
        gw.get("", SENDER, None);
        assert!(drain_commands(&mut rx).is_empty());
    }

    #[test]
    fn json_request_is_compact() {
        let (gw, mut rx) = Gateway::channel();
        gw.send_json_request(
            "http://10.0.0.2/api/x/lights/1/state",
            Sender::HueDevice(1),
            Method::PUT,
            &json!({"on": true}),
            None,
        );

        let cmds = drain_commands(&mut rx);
        let [GatewayCommand::Request(req)] = cmds.as_slice() else {
            panic!("expected one request, got {cmds:?}");
        };
        assert_eq!(req.method, Method::PUT);
        assert_eq!(req.sender, Sender::HueDevice(1));
        assert_eq!(req.content_type.as_deref(), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(&b"{\"on\":true}"[..]));
    }

    #[test]
    fn empty_browse_is_ignored() {
        let (gw, mut rx) = Gateway::channel();
        gw.browse_service_type("");
        gw.browse_service_type("_hue._tcp");
        assert_eq!(
            drain_commands(&mut rx),
            vec![GatewayCommand::Browse("_hue._tcp".to_string())]
        );
    }

    #[test]
    fn first_ipv4_skips_v6() {
        let addrs = [
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
        ];
        assert_eq!(first_ipv4(&addrs), Some(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(first_ipv4(&addrs[..1]), None);
    }
}
