use std::time::Duration;

use itertools::Itertools;
use serde_json::Value;
use tokio::time::Instant;

use vicecity_api::request::PluginId;

use crate::changes::{ChangeBus, update};
use crate::error::ApiResult;
use crate::gateway::{Gateway, Sender};
use crate::plugin::{Plugin, PluginBase};

pub struct FactsPlugin {
    base: PluginBase,
    language: String,
    request_url: String,
    fact: String,
}

fn request_url(language: &str) -> String {
    format!("https://uselessfacts.jsph.pl/random.json?language={language}")
}

/// Collapse runs of whitespace and swap backticks for apostrophes.
#[must_use]
pub fn clean_fact(text: &str) -> String {
    text.split_whitespace().join(" ").replace('`', "'")
}

impl FactsPlugin {
    pub fn new(gateway: Gateway, changes: ChangeBus, language: &str) -> ApiResult<Self> {
        let base = PluginBase::new(PluginId::Facts, PluginId::Facts.name(), gateway, changes)?
            .with_update_interval(Duration::from_secs(60));

        Ok(Self {
            base,
            language: language.to_string(),
            request_url: request_url(language),
            fact: String::new(),
        })
    }

    #[must_use]
    pub fn fact(&self) -> &str {
        &self.fact
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: &str) {
        if update(&mut self.language, language.to_string()) {
            self.request_url = request_url(language);
            self.base.notify("language", language);
        }
    }
}

impl Plugin for FactsPlugin {
    fn base(&self) -> &PluginBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PluginBase {
        &mut self.base
    }

    fn refresh(&mut self) {
        self.base
            .gateway
            .get(&self.request_url, self.base.sender(), None);
    }

    fn handle_json_reply(&mut self, status: u16, _sender: Sender, body: &Value, _now: Instant) {
        if status != 200 {
            log::debug!("[{}] Ignoring bad reply when requesting fact", self.base.name());
            return;
        }
        let Some(text) = body.get("text") else {
            if !body.is_object() {
                log::debug!("[{}] Failed to parse facts response", self.base.name());
            }
            return;
        };

        let fact = clean_fact(text.as_str().unwrap_or_default());
        if fact.is_empty() {
            log::debug!("[{}] No fact received in reply", self.base.name());
            return;
        }

        // every new fact is announced, even a repeat
        self.fact = fact;
        self.base.notify("fact", self.fact.as_str());
    }
}
