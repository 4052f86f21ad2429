//! Where the receiver's raw datagrams come from.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::receiver::ReceiveError;

/// One received datagram.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Bytes,
    pub from: SocketAddr,
}

/// Yields raw datagrams, or the transport error that ended the stream.
///
/// `recv_datagram` must be cancel safe: `FrameReceiver` races it against its
/// sweep timer and drops the future when the timer wins.
pub trait DatagramSource {
    fn recv_datagram(&mut self) -> impl Future<Output = Result<Datagram, ReceiveError>> + Send;
}

/// Reads straight from a UDP socket.
pub struct UdpSource {
    socket: Arc<UdpSocket>,
    buf: Vec<u8>,
}

/// Receive buffer size. Larger than any UDP payload, so a datagram over the
/// configured ceiling is seen whole instead of truncated.
const RECV_BUF_LEN: usize = 65_536;

impl UdpSource {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self {
            socket,
            buf: vec![0u8; RECV_BUF_LEN],
        }
    }
}

impl DatagramSource for UdpSource {
    async fn recv_datagram(&mut self) -> Result<Datagram, ReceiveError> {
        let (len, from) = self.socket.recv_from(&mut self.buf).await?;
        Ok(Datagram {
            payload: Bytes::copy_from_slice(&self.buf[..len]),
            from,
        })
    }
}

/// Drains a queue fed by a separate socket task. The queue closing is the
/// transport failing.
impl DatagramSource for mpsc::Receiver<Datagram> {
    async fn recv_datagram(&mut self) -> Result<Datagram, ReceiveError> {
        self.recv().await.ok_or(ReceiveError::Closed)
    }
}
