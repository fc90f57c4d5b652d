//! Transport seam between the connection manager and the wire.
//!
//! The connection owns exactly one channel behind this trait; tests
//! inject scripted transports, the binary injects [`UdpTransport`].

use std::io;
use tokio::net::UdpSocket;

/// One byte-frame channel to the game server.
///
/// Sends are best-effort and non-blocking; receives never block. There
/// is no fallback negotiation: a transport is a single channel kind
/// for its whole lifetime.
pub trait Transport {
    /// Queues one frame for delivery.
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Returns the next pending frame's length after copying it into
    /// `buf`, or `None` when nothing is queued.
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    /// Tears the channel down. Safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Production transport over a connected UDP socket.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(server_addr).await?;
        Ok(Self {
            socket: Some(socket),
        })
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        match &self.socket {
            Some(socket) => socket.try_send(frame).map(|_| ()),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport closed",
            )),
        }
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let socket = match &self.socket {
            Some(socket) => socket,
            None => return Ok(None),
        };

        match socket.try_recv(buf) {
            Ok(len) => Ok(Some(len)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}
