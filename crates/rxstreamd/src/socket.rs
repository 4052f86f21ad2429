//! Datagram socket — bind and the socket → queue pump.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};

use rxstream_core::config::NetworkConfig;
use rxstream_transport::{Datagram, DatagramSource, ReceiveError, UdpSource};

/// Bind the receive socket with SO_REUSEADDR and the configured SO_RCVBUF.
pub fn bind(network: &NetworkConfig) -> Result<UdpSocket> {
    let addr: SocketAddr = format!("{}:{}", network.bind_addr, network.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", network.bind_addr, network.port))?;

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .context("socket()")?;
    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    if network.recv_buffer_bytes > 0 {
        if let Err(e) = socket.set_recv_buffer_size(network.recv_buffer_bytes) {
            tracing::warn!(error = %e, bytes = network.recv_buffer_bytes, "SO_RCVBUF not applied");
        }
    }
    socket.set_nonblocking(true).context("set_nonblocking")?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind UDP {addr}"))?;

    UdpSocket::from_std(socket.into()).context("failed to register socket with tokio")
}

/// Read datagrams off the socket and queue them for the receiver.
///
/// Returns on shutdown, when the receiver goes away, or on a socket error.
/// Dropping `tx` on return is what tells the receiver the transport is gone.
pub async fn socket_loop(
    socket: Arc<UdpSocket>,
    tx: mpsc::Sender<Datagram>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut source = UdpSource::new(socket);

    loop {
        let datagram = tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("socket loop shutting down");
                return Ok(());
            }
            received = source.recv_datagram() => match received {
                Ok(datagram) => datagram,
                Err(ReceiveError::Transport(e)) => {
                    return Err(e).context("recv_from failed");
                }
                Err(e) => bail!(e),
            },
        };

        if tx.send(datagram).await.is_err() {
            bail!("frame receiver dropped, terminating socket loop");
        }
    }
}
