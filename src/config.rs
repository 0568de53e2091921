use camino::Utf8Path;
use config::{Config, ConfigError, Environment};

pub use vicecity_api::config::*;

const USER_AGENT: &str = concat!("Vice City Dashboard ", env!("CARGO_PKG_VERSION"));

/// Load the application config. The file is optional; every key has a
/// default and can be overridden with `VICECITY__SECTION__KEY`.
pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default("network.user_agent", USER_AGENT)?
        .set_default("network.request_timeout_secs", 30)?
        .set_default("network.discovery_timeout_secs", 15)?
        .set_default("nanoleaf.confirm_delay_ms", 500)?
        .set_default("nanoleaf.max_confirm_retries", 10)?
        .set_default("nanoleaf.effects_interval_secs", 60)?
        .set_default("hub.scene_step_delay_ms", 200)?
        .set_default("hub.change_buffer", 256)?
        .add_source(config::File::with_name(filename.as_str()).required(false))
        .add_source(Environment::with_prefix("VICECITY").separator("__"))
        .build()?;

    settings.try_deserialize()
}
