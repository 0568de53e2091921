use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::Instant;

use vicecity::changes::ChangeBus;
use vicecity::config;
use vicecity::error::ApiResult;
use vicecity::gateway::{Gateway, GatewayService};
use vicecity::hub::Hub;
use vicecity::service::spawn_service;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Settings file (JSON), which must exist and be writable
    #[arg(short, long)]
    config: Utf8PathBuf,

    /// Application config (YAML)
    #[arg(long, default_value = "vicecity.yaml")]
    app_config: Utf8PathBuf,
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> ApiResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &["debug", "mdns_sd=off", "reqwest=info", "hyper_util=info"];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

async fn shutdown_signal() -> ApiResult<()> {
    let mut terminate = signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = signal::ctrl_c() => log::warn!("Ctrl-C pressed, exiting.."),
        _ = terminate.recv() => log::warn!("SIGTERM received, exiting.."),
    }
    let _ = std::io::stderr().flush();
    Ok(())
}

fn spawn_change_logger(changes: &ChangeBus) {
    let mut rx = changes.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => log::trace!(
                    "{:?}.{} = {}",
                    change.source,
                    change.property,
                    change.value
                ),
                Err(RecvError::Lagged(count)) => {
                    log::debug!("Change logger fell behind, skipped {count} changes");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn run() -> ApiResult<()> {
    init_logging()?;

    let args = Args::parse();

    let config = config::parse(&args.app_config)?;
    log::debug!("Configuration loaded successfully");

    let changes = ChangeBus::new(config.hub.change_buffer);
    spawn_change_logger(&changes);

    let (gateway, commands) = Gateway::channel();
    let (events_tx, events) = mpsc::unbounded_channel();
    let (requests_tx, requests) = mpsc::unbounded_channel();

    let mut hub = Hub::new(&config, &gateway, events, requests, changes)?;
    hub.load_settings(&args.config, Instant::now())?;
    drop(gateway);

    let gateway_task = spawn_service(
        "gateway",
        GatewayService::new(&config.network, commands, events_tx)?,
    );
    let hub_task = spawn_service("hub", hub);

    shutdown_signal().await?;

    // closing the request channel ends the hub, which releases the gateway
    drop(requests_tx);
    hub_task.await??;
    gateway_task.await??;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("Vice City error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
    }
}
