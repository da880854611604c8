//! Platform text protocol
//!
//! The platform speaks a synchronous line protocol: newline-terminated ASCII
//! commands out, free-form ASCII replies terminated by `>` back. Requests:
//!
//! - `L0` - query illumination; reply carries `L<lux>`
//! - `L1` - query motion; reply carries `S<speed>`, `A<lat>`, `O<lon>`,
//!   `N<sats>`, `P<pressure>`
//! - `L2 S<phase>` - report the current flight phase (acknowledge only)
//! - `M3` / `M5` - backlight on / off (acknowledge only)
//!
//! Values are located by a one-character code and read up to the next space
//! or the end of the reply. An exchange blocks until `>` arrives or the
//! caller's timeout elapses; timeout means "no data for this tick" and the
//! caller skips the update rather than retrying.

use crate::error::Result;
use crate::transport::Transport;
use std::time::{Duration, Instant};

/// Pause between polls of the transport while waiting for the terminator
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Extract the numeric value following `code` in a reply
///
/// Scans for the code character and parses everything up to the next space
/// (or the end of the string). Returns `None` when the code is absent or the
/// number is malformed.
pub fn parse_value(reply: &str, code: char) -> Option<f64> {
    let start = reply.find(code)? + code.len_utf8();
    let rest = &reply[start..];
    let end = rest.find(' ').unwrap_or(rest.len());
    rest[..end].trim().parse().ok()
}

/// Synchronous request/reply client for the platform link
pub struct PlatformClient {
    transport: Box<dyn Transport>,
}

impl PlatformClient {
    /// Create a client over `transport`
    pub fn new(transport: Box<dyn Transport>) -> Self {
        PlatformClient { transport }
    }

    /// Send `request` and block for the `>`-terminated reply
    ///
    /// Returns `Ok(None)` when no full reply arrived within `timeout`; I/O
    /// failures propagate. The reply is returned without the terminator.
    pub fn exchange(&mut self, request: &str, timeout: Duration) -> Result<Option<String>> {
        self.transport.write(request.as_bytes())?;
        self.transport.flush()?;

        let deadline = Instant::now() + timeout;
        let mut reply = String::new();
        let mut buffer = [0u8; 32];

        loop {
            let read = self.transport.read(&mut buffer)?;
            for &byte in &buffer[..read] {
                if byte == b'>' {
                    log::trace!("Platform RX: {:?}", reply);
                    return Ok(Some(reply));
                }
                reply.push(byte as char);
            }

            if Instant::now() >= deadline {
                log::debug!("Platform reply timeout for {:?}", request.trim_end());
                return Ok(None);
            }
            if read == 0 {
                std::thread::sleep(REPLY_POLL_INTERVAL);
            }
        }
    }
}
