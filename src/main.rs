// src/main.rs
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use pose_mimic::app::MimicApp;
use pose_mimic::receiver::PoseReceiver;
use pose_mimic::RetargetConfig;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = RetargetConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    let addr: SocketAddr = format!("{}:{}", config.receiver.bind_address, config.receiver.port)
        .parse()
        .context("Invalid receiver address")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let mut app = MimicApp::new(&config);

    let running = Arc::new(AtomicBool::new(true));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Receiver runs on the runtime's workers; the frame loop stays on this thread
    let receiver = runtime
        .block_on(PoseReceiver::bind(addr, app.dispatch_handle()))
        .with_context(|| format!("Failed to start UDP receiver on {addr}"))?;
    let receiver_task = runtime.spawn(receiver.run(shutdown_rx));

    {
        let running = Arc::clone(&running);
        runtime.spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            info!("Shutdown requested");
            running.store(false, Ordering::SeqCst);
        });
    }

    app.run(&running);

    shutdown_tx.send(true).ok();
    match runtime.block_on(receiver_task) {
        Ok(Ok(stats)) => info!("Receiver stats: {:?}", stats),
        Ok(Err(e)) => warn!("Receiver ended with error: {}", e),
        Err(e) => warn!("Receiver task failed: {}", e),
    }

    if let Some(recorder) = app.shutdown() {
        if recorder.is_empty() {
            info!("No poses recorded");
        } else {
            let path = recorder.export_csv().context("Failed to export pose recording")?;
            info!("Recorded {} poses to {}", recorder.len(), path.display());
        }
    }

    Ok(())
}
