use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use vicecity_api::request::PluginId;

use crate::changes::{ChangeBus, update};
use crate::error::ApiResult;
use crate::gateway::{Gateway, Sender};
use crate::plugin::{Plugin, PluginBase};

const ENTITIES: [(&str, &str); 5] = [
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    // last, so an escaped entity is not decoded twice
    ("&amp;", "&"),
];

/// Undo the HTML escaping the insult service applies to its plain text.
#[must_use]
pub fn unescape_html(text: &str) -> String {
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, ch)| acc.replace(entity, ch))
}

fn request_url(language: &str) -> String {
    format!("https://evilinsult.com/generate_insult.php?lang={language}")
}

pub struct InsultsPlugin {
    base: PluginBase,
    language: String,
    request_url: String,
    insult: String,
}

impl InsultsPlugin {
    pub fn new(gateway: Gateway, changes: ChangeBus, language: &str) -> ApiResult<Self> {
        let base = PluginBase::new(PluginId::Insults, PluginId::Insults.name(), gateway, changes)?
            .with_update_interval(Duration::from_secs(60));

        Ok(Self {
            base,
            language: language.to_string(),
            request_url: request_url(language),
            insult: String::new(),
        })
    }

    #[must_use]
    pub fn insult(&self) -> &str {
        &self.insult
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

impl Plugin for InsultsPlugin {
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

    fn handle_reply(&mut self, status: u16, _sender: Sender, body: &Bytes, _now: Instant) {
        if status != 200 {
            log::debug!("[{}] Ignoring bad reply when requesting insult", self.base.name());
            return;
        }

        let insult = unescape_html(&String::from_utf8_lossy(body));
        if insult.is_empty() {
            log::debug!("[{}] No insult received in reply", self.base.name());
            return;
        }

        self.insult = insult;
        self.base.notify("insult", self.insult.as_str());
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::time::Instant;

    use vicecity_api::request::PluginId;

    use crate::changes::{ChangeBus, drain};
    use crate::gateway::{Gateway, Sender, drain_requests};
    use crate::plugin::Plugin;
    use crate::plugin::insults::{InsultsPlugin, unescape_html};

    const SELF: Sender = Sender::Plugin(PluginId::Insults);

    #[test]
    fn entities_unescaped() {
        assert_eq!(
            unescape_html("&quot;You&apos;re&quot; &lt;b&gt; &amp;amp;"),
            "\"You're\" <b> &amp;"
        );
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
        assert_eq!(unescape_html("&amp;quot;"), "&quot;");
    }

    #[test]
    fn raw_reply_updates_insult() {
        let (gw, mut rx) = Gateway::channel();
        let bus = ChangeBus::default();
        let mut changes = bus.subscribe();
        let mut insults = InsultsPlugin::new(gw, bus, "en").unwrap();
        let now = Instant::now();

        insults.set_language("de");
        insults.start(now);
        let reqs = drain_requests(&mut rx);
        assert_eq!(
            reqs[0].url.as_str(),
            "https://evilinsult.com/generate_insult.php?lang=de"
        );

        insults.handle_reply(200, SELF, &Bytes::from_static(b"Go &amp; away"), now);
        insults.handle_reply(200, SELF, &Bytes::new(), now);
        insults.handle_reply(404, SELF, &Bytes::from_static(b"Not found"), now);
        assert_eq!(insults.insult(), "Go & away");

        let props: Vec<_> = drain(&mut changes).iter().map(|c| c.property).collect();
        assert_eq!(props, vec!["language", "insult"]);
    }
}
