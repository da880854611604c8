//! UDP transport implementation
//!
//! Connected UDP socket: writes go to the configured peer, reads accept
//! datagrams from it. Datagram boundaries are irrelevant to the callers,
//! which treat both links as byte streams.

use super::Transport;
use crate::error::Result;
use std::net::UdpSocket;
use std::time::Duration;

/// UDP transport for the drone link
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Open a UDP transport toward `peer` (e.g., "192.168.9.1:1337")
    pub fn open(peer: &str, timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(peer)?;
        socket.set_read_timeout(Some(timeout))?;

        log::info!("Opened UDP link to {}", peer);

        Ok(UdpTransport { socket })
    }

    /// Bind a listening UDP transport on `address` (e.g., "0.0.0.0:1338")
    ///
    /// Used for the inbound telemetry stream; the first sender becomes the
    /// implicit peer for any replies.
    pub fn listen(address: &str, timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(address)?;
        socket.set_read_timeout(Some(timeout))?;

        log::info!("Listening for UDP datagrams on {}", address);

        Ok(UdpTransport { socket })
    }
}

impl Transport for UdpTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.socket.recv_from(buffer) {
            Ok((n, _)) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.socket.send(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
