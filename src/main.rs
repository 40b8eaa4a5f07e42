use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use alarm_sync::actuator::StdinPrompt;
use alarm_sync::bridge::{BridgeSettings, EventBridge, LiveConnector};
use alarm_sync::config::BridgeConfig;
use alarm_sync::error::{BridgeError, Error};
use alarm_sync::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Error: failed to install rustls crypto provider");
        return ExitCode::FAILURE;
    }

    let config = BridgeConfig::from_env();
    let log_dir = config.as_ref().ok().and_then(|c| c.log_dir.clone());
    let _log_guard = logging::init(log_dir.as_deref().map(Path::new));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("alarm-sync v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mailbox: {} ({})", config.mail.address, config.mail.imap_host);
    eprintln!("   Watching: {}", config.alarm_sender);
    eprintln!("   Reports to: {}\n", config.report_recipient);

    let connector = LiveConnector::new(config.clone(), Arc::new(StdinPrompt));
    let mut bridge = EventBridge::new(BridgeSettings::from_config(&config));

    let subscription = match bridge.start(&connector).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = subscription.closed() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{}", Error::from(BridgeError::WatchEnded(e)));
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            ExitCode::SUCCESS
        }
    }
}
