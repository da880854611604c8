//! Transport layer for link I/O abstraction

use crate::error::Result;

mod mock;
mod serial;
mod udp;

pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use udp::UdpTransport;

/// Byte transport for drone and platform links
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 on timeout)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0) // Default implementation
    }
}
