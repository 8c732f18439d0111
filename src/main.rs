use color_eyre::{eyre::eyre, Result};
use gaze_bridge::bridge;
use gaze_bridge::config::BridgeConfig;
use gaze_bridge::BridgeError;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = BridgeConfig::resolve(config_path).await?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                interrupt.cancel();
            }
            Err(e) => warn!("Unable to listen for interrupt: {}", e),
        }
    });

    match bridge::run(config, cancel).await {
        Ok(summary) => {
            info!(
                "Bridge stopped after {} ticks ({} send failures)",
                summary.ticks, summary.send_failures
            );
            Ok(())
        }
        Err(BridgeError::Cancelled) => {
            info!("Cancelled before tracking started");
            Ok(())
        }
        Err(e) => {
            if e.is_handshake_timeout() {
                error!("Make sure the tracker runtime is running and the firewall allows UDP traffic");
            }
            error!("Bridge failed: {}", e);
            Err(eyre!(e))
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
