use std::collections::VecDeque;
use std::future;
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent};
use tokio::time::{Instant, sleep_until};

use crate::error::ApiResult;
use crate::gateway::{GatewayEvent, first_ipv4};

/// FIFO of pending discovery requests. Only the front entry is ever being
/// browsed.
#[derive(Debug, Default)]
pub struct BrowseQueue {
    queue: VecDeque<String>,
}

impl BrowseQueue {
    /// Queue a service type. Returns the type to start browsing if the
    /// queue was idle.
    pub fn enqueue(&mut self, service_type: String) -> Option<String> {
        let start = self.queue.is_empty().then(|| service_type.clone());
        self.queue.push_back(service_type);
        start
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    #[must_use]
    pub fn matches(&self, found_type: &str) -> bool {
        self.current()
            .is_some_and(|current| found_type.starts_with(current))
    }

    /// Drop the front entry, returning the next type to browse.
    pub fn advance(&mut self) -> Option<String> {
        self.queue.pop_front();
        self.queue.front().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

fn mdns_name(service_type: &str) -> String {
    format!("{service_type}.local.")
}

pub struct MdnsBrowser {
    daemon: Option<ServiceDaemon>,
    receiver: Option<flume::Receiver<ServiceEvent>>,
    queue: BrowseQueue,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl MdnsBrowser {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            daemon: None,
            receiver: None,
            queue: BrowseQueue::default(),
            timeout,
            deadline: None,
        }
    }

    pub fn start(&mut self) -> ApiResult<()> {
        self.daemon = Some(ServiceDaemon::new()?);
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.stop_current();
        if let Some(daemon) = self.daemon.take() {
            if let Err(err) = daemon.shutdown() {
                log::debug!("mDNS daemon shutdown failed: {err}");
            }
        }
    }

    pub fn browse(&mut self, service_type: String) {
        log::debug!("Queueing browse for {service_type}");
        if let Some(next) = self.queue.enqueue(service_type) {
            self.begin(&next);
        }
    }

    fn begin(&mut self, service_type: &str) {
        self.deadline = Some(Instant::now() + self.timeout);

        let Some(daemon) = &self.daemon else {
            log::warn!("mDNS daemon not running, cannot browse for {service_type}");
            return;
        };

        match daemon.browse(&mdns_name(service_type)) {
            Ok(rx) => {
                log::debug!("Browsing for {service_type}");
                self.receiver = Some(rx);
            }
            Err(err) => log::warn!("Failed to browse for {service_type}: {err}"),
        }
    }

    fn stop_current(&mut self) {
        self.receiver = None;
        self.deadline = None;
        if let (Some(daemon), Some(current)) = (&self.daemon, self.queue.current()) {
            if let Err(err) = daemon.stop_browse(&mdns_name(current)) {
                log::debug!("Failed to stop browsing for {current}: {err}");
            }
        }
    }

    fn advance(&mut self) {
        self.stop_current();
        if let Some(next) = self.queue.advance() {
            self.begin(&next);
        }
    }

    pub async fn next_event(&self) -> Option<ServiceEvent> {
        match &self.receiver {
            Some(rx) => rx.recv_async().await.ok(),
            None => future::pending().await,
        }
    }

    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => future::pending().await,
        }
    }

    pub fn expire(&mut self) {
        if let Some(current) = self.queue.current() {
            log::info!("Browse for {current} timed out");
        }
        self.advance();
    }

    pub fn handle_event(&mut self, event: Option<ServiceEvent>) -> Option<GatewayEvent> {
        let Some(event) = event else {
            self.receiver = None;
            return None;
        };

        let ServiceEvent::ServiceResolved(info) = event else {
            return None;
        };

        let service_type = info.get_type().to_string();
        if !self.queue.matches(&service_type) {
            return None;
        }

        let Some(address) = first_ipv4(info.get_addresses()) else {
            log::debug!("Resolved {} without an IPv4 address", info.get_fullname());
            return None;
        };

        log::info!("Found {service_type} at {address}");
        self.advance();

        Some(GatewayEvent::ServiceFound {
            service_type,
            address,
        })
    }
}
