use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::time::Instant;

use vicecity_api::request::PluginId;

use crate::changes::{ChangeBus, update};
use crate::error::ApiResult;
use crate::gateway::{Gateway, Sender};
use crate::plugin::{Plugin, PluginBase};

/// Query history in 10 minute buckets, ordered by timestamp.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalData {
    pub timestamps: Vec<i64>,
    pub total_queries: Vec<i64>,
    pub max_total_queries: i64,
    pub blocked_queries: Vec<i64>,
    pub allowed_queries: Vec<i64>,
    pub block_percentages: Vec<f64>,
    pub min_block_percentage: f64,
    pub max_block_percentage: f64,
}

impl HistoricalData {
    /// Build from the `domains_over_time`/`ads_over_time` maps, which must be
    /// non-empty and of equal size.
    #[must_use]
    pub fn from_series(domains: &Map<String, Value>, ads: &Map<String, Value>) -> Option<Self> {
        if domains.is_empty() || domains.len() != ads.len() {
            return None;
        }

        let mut timestamps: Vec<i64> = domains.keys().filter_map(|key| key.parse().ok()).collect();
        timestamps.sort_unstable();

        let mut res = Self {
            min_block_percentage: 100.0,
            ..Self::default()
        };

        for ts in &timestamps {
            let key = ts.to_string();
            let total = domains.get(&key).and_then(Value::as_i64).unwrap_or_default();
            let blocked = ads.get(&key).and_then(Value::as_i64).unwrap_or_default();
            #[allow(clippy::cast_precision_loss)]
            let percentage = if total == 0 {
                0.0
            } else {
                blocked as f64 / total as f64 * 100.0
            };

            res.total_queries.push(total);
            res.blocked_queries.push(blocked);
            res.allowed_queries.push(total - blocked);
            res.block_percentages.push(percentage);

            res.max_total_queries = res.max_total_queries.max(total);
            res.min_block_percentage = res.min_block_percentage.min(percentage);
            res.max_block_percentage = res.max_block_percentage.max(percentage);
        }
        res.timestamps = timestamps;

        Some(res)
    }
}

pub struct PiHolePlugin {
    base: PluginBase,
    server_hostname: String,
    server_address: Option<Ipv4Addr>,
    summary_url: Option<String>,
    history_url: Option<String>,
    is_enabled: bool,
    total_queries: i64,
    blocked_queries: i64,
    percent_blocked: Option<f64>,
    blocked_domains: i64,
    historical_data: HistoricalData,
}

impl PiHolePlugin {
    pub fn new(gateway: Gateway, changes: ChangeBus) -> ApiResult<Self> {
        let base = PluginBase::new(PluginId::PiHole, PluginId::PiHole.name(), gateway, changes)?
            .with_update_interval(Duration::from_secs(1));

        Ok(Self {
            base,
            server_hostname: String::new(),
            server_address: None,
            summary_url: None,
            history_url: None,
            is_enabled: false,
            total_queries: 0,
            blocked_queries: 0,
            percent_blocked: None,
            blocked_domains: 0,
            historical_data: HistoricalData::default(),
        })
    }

    #[must_use]
    pub fn server_hostname(&self) -> &str {
        &self.server_hostname
    }

    /// Setting a non-empty hostname starts an address lookup.
    pub fn set_server_hostname(&mut self, hostname: &str) {
        if update(&mut self.server_hostname, hostname.to_string()) {
            self.base.notify("serverHostname", hostname);
            if !hostname.is_empty() {
                self.base.gateway.lookup_host(hostname, self.base.sender());
            }
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    #[must_use]
    pub const fn total_queries(&self) -> i64 {
        self.total_queries
    }

    #[must_use]
    pub const fn blocked_queries(&self) -> i64 {
        self.blocked_queries
    }

    #[must_use]
    pub const fn percent_blocked(&self) -> Option<f64> {
        self.percent_blocked
    }

    #[must_use]
    pub const fn blocked_domains(&self) -> i64 {
        self.blocked_domains
    }

    #[must_use]
    pub const fn historical_data(&self) -> &HistoricalData {
        &self.historical_data
    }

    pub fn refresh_historical_data(&self) {
        if let Some(url) = &self.history_url {
            self.base.gateway.get(url, self.base.sender(), None);
        }
    }

}

/// A counter from the summary reply. Present but non-numeric counts as zero.
fn summary_count(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    obj.get(key).map(|value| value.as_i64().unwrap_or_default())
}

impl Plugin for PiHolePlugin {
    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PluginBase {
        &mut self.base
    }

    fn refresh(&mut self) {
        if let Some(url) = &self.summary_url {
            self.base.gateway.get(url, self.base.sender(), None);
        }
    }

    fn is_configured(&self) -> bool {
        self.summary_url.is_some()
    }

    fn handle_host_resolved(
        &mut self,
        _sender: Sender,
        hostname: &str,
        address: Option<Ipv4Addr>,
        now: Instant,
    ) {
        let Some(address) = address else {
            log::debug!("[{}] Failed to find server {hostname}", self.base.name());
            return;
        };

        log::info!("[{}] Server found at {address}", self.base.name());
        self.server_address = Some(address);

        let base_url = format!("http://{address}/admin/api.php");
        self.summary_url = Some(format!("{base_url}?summaryRaw"));
        self.history_url = Some(format!("{base_url}?overTimeData10mins"));

        if self.base.start_polling(now) {
            self.refresh();
            self.refresh_historical_data();
        }
    }

    fn handle_json_reply(&mut self, status: u16, _sender: Sender, body: &Value, _now: Instant) {
        if status != 200 {
            log::debug!(
                "[{}] Ignoring unsuccessful reply with status code {status}",
                self.base.name()
            );
            return;
        }

        let Some(obj) = body.as_object() else {
            log::debug!("[{}] Failed to parse response", self.base.name());
            return;
        };

        if let Some(status) = obj.get("status") {
            let enabled = status.as_str() == Some("enabled");
            if update(&mut self.is_enabled, enabled) {
                self.base.notify("isEnabled", enabled);
            }
        }

        let counts = [
            ("dns_queries_today", "totalQueries", &mut self.total_queries),
            ("ads_blocked_today", "blockedQueries", &mut self.blocked_queries),
            ("domains_being_blocked", "blockedDomains", &mut self.blocked_domains),
        ];
        for (key, property, slot) in counts {
            let Some(value) = summary_count(obj, key) else {
                continue;
            };
            if update(slot, value) {
                self.base.notify(property, value);
            }
        }

        if let Some(pct) = obj.get("ads_percentage_today") {
            let pct = pct.as_f64().unwrap_or_default();
            if update(&mut self.percent_blocked, Some(pct)) {
                self.base.notify("percentBlocked", pct);
            }
        }

        if let (Some(Value::Object(domains)), Some(Value::Object(ads))) =
            (obj.get("domains_over_time"), obj.get("ads_over_time"))
        {
            if let Some(history) = HistoricalData::from_series(domains, ads) {
                self.historical_data = history;
                self.base
                    .notify("historicalData", json!(self.historical_data));
            }
        }
    }
}
