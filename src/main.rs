//! binwatch - chat-driven bin fullness monitoring
//!
//! Entry point: wires the session registry, the event-dispatch task, and
//! the periodic monitor task together and runs until shutdown.

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use binwatch::alert::AlertDispatcher;
use binwatch::analyser::ThingSpeakAnalyser;
use binwatch::cli::{Cli, Command};
use binwatch::config::Config;
use binwatch::dialogue::AuthDialogue;
use binwatch::registry::SessionRegistry;
use binwatch::router::{EventRouter, run_dispatch};
use binwatch::services::HttpAuthClient;
use binwatch::transport::TelegramTransport;
use binwatch::{Monitor, SensorAnalyser};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Command::CheckConfig) => {
            config.validate()?;
            println!("Configuration OK");
            Ok(())
        }
        Some(Command::Run) | None => run_bot(&config).await,
    }
}

async fn run_bot(config: &Config) -> Result<()> {
    info!("binwatch starting...");

    // Fail fast before spawning anything
    config.validate()?;
    let token = config.telegram.token()?;

    // Session registry task - the single owner of all session state
    let registry = SessionRegistry::new();
    let registry_handle = registry.handle();
    let registry_task = tokio::spawn(registry.run());
    info!("Session registry started");

    // External collaborators
    let transport = Arc::new(
        TelegramTransport::new(&config.telegram.api_base, &token).context("Failed to create chat transport")?,
    );
    let auth = Arc::new(HttpAuthClient::new(&config.services.base_url).context("Failed to create auth client")?);
    let analyser: Arc<dyn SensorAnalyser> = Arc::new(
        ThingSpeakAnalyser::new(
            &config.thingspeak.api_base,
            config.thingspeak.channel_id,
            &config.thingspeak.read_key(),
            &config.thingspeak.write_key(),
            config.thingspeak.bin_tags.clone(),
            config.thingspeak.artifact_dir.clone(),
        )
        .context("Failed to create sensor analyser")?,
    );
    info!(
        channel_id = config.thingspeak.channel_id,
        sensors = analyser.sensor_count(),
        "Sensor analyser initialized"
    );

    // Shutdown plumbing: one watch channel fans out to every task, and
    // the router can trigger it through the quit channel (/quit)
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (quit_tx, mut quit_rx) = mpsc::channel::<()>(1);

    // Event-dispatch task
    let dialogue = AuthDialogue::new(registry_handle.clone(), auth, transport.clone());
    let router = Arc::new(EventRouter::new(
        registry_handle.clone(),
        dialogue,
        transport.clone(),
        analyser.clone(),
        config.services.dashboard_url.clone(),
        quit_tx,
    ));

    let (events_tx, events_rx) = mpsc::channel(256);
    let dispatch_task = tokio::spawn(run_dispatch(router, events_rx));

    let poll_transport = transport.clone();
    let poll_shutdown = shutdown_rx.clone();
    let poll_task = tokio::spawn(async move {
        poll_transport.run_polling(events_tx, poll_shutdown).await;
    });
    info!("Event dispatch started");

    // Periodic monitor task
    let dispatcher = AlertDispatcher::new(registry_handle.clone(), transport.clone());
    let monitor = Monitor::new(config.monitor.clone(), analyser, dispatcher);
    let monitor_task = tokio::spawn(monitor.run(shutdown_rx));
    info!(
        interval_secs = config.monitor.interval_secs,
        alert_frequency = config.monitor.alert_frequency,
        "Monitor started"
    );

    info!("binwatch running. Press Ctrl+C to stop.");

    // Wait for a shutdown trigger
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
            _ = quit_rx.recv() => info!("Shutdown requested via chat"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("Ctrl+C received"),
            _ = quit_rx.recv() => info!("Shutdown requested via chat"),
        }
    }

    info!("binwatch shutting down...");

    // Stop the poller and the monitor, then the registry; dispatch ends
    // once the poller drops the event channel
    let _ = shutdown_tx.send(true);
    let _ = registry_handle.shutdown().await;

    let _ = poll_task.await;
    let _ = dispatch_task.await;
    let _ = monitor_task.await;
    let _ = registry_task.await;

    info!("binwatch stopped");
    Ok(())
}
