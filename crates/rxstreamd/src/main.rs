//! rxstreamd — receives chunked sensor frames over UDP and reports each one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};

use rxstream_core::config::RxConfig;
use rxstream_transport::{Datagram, Frame, FrameReceiver};

mod socket;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = RxConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = RxConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        RxConfig::default()
    });

    if let Some(port) = std::env::args().nth(1) {
        config.network.port = port
            .parse()
            .with_context(|| format!("invalid port argument {port:?}"))?;
    }

    let socket = Arc::new(socket::bind(&config.network)?);
    tracing::info!(
        addr = %socket.local_addr()?,
        max_chunks = config.reassembly.max_chunks,
        max_frame_bytes = config.reassembly.max_frame_bytes,
        entry_timeout_ms = config.reassembly.entry_timeout_ms,
        "rxstreamd listening"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Socket → queue → receiver ────────────────────────────────────────────
    let (datagram_tx, datagram_rx) =
        mpsc::channel::<Datagram>(config.network.queue_depth.max(1));

    let socket_task = {
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = socket::socket_loop(socket, datagram_tx, shutdown).await {
                tracing::error!(error = %e, "socket loop terminated");
            }
        })
    };

    let mut receiver = FrameReceiver::new(datagram_rx, &config.reassembly);
    let mut shutdown = shutdown_tx.subscribe();
    let stats_every = Duration::from_secs(config.daemon.stats_interval_secs);
    let mut stats_interval = tokio::time::interval(stats_every.max(Duration::from_secs(1)));
    stats_interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,

            _ = stats_interval.tick(), if !stats_every.is_zero() => {
                let stats = receiver.stats();
                tracing::info!(
                    datagrams = stats.datagrams,
                    frames = stats.frames_completed,
                    crc_failures = stats.crc_failures,
                    duplicates = stats.duplicates,
                    malformed = stats.malformed.total(),
                    expired = stats.expired,
                    in_flight = receiver.table().len(),
                    "receive stats"
                );
            }

            frame = receiver.recv_frame() => {
                if !frame.valid {
                    tracing::error!("datagram transport failed, stopping");
                    break;
                }
                report(&frame);
            }
        }
    }

    let _ = shutdown_tx.send(());
    let _ = socket_task.await;

    let summary = serde_json::to_string(receiver.stats()).context("failed to serialize stats")?;
    println!("{summary}");
    Ok(())
}

fn report(frame: &Frame) {
    tracing::info!(
        frame_id = frame.frame_id,
        sensor = %frame.sensor(),
        bytes = frame.data.len(),
        crc_ok = frame.crc_ok,
        "frame received"
    );
}
