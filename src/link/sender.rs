//! Frame transmission over the configured transports
//!
//! Every frame is broadcast to all transports unconditionally (serial and
//! UDP at once when both are configured) - deliberate redundancy, not a bug.
//! Frame construction and transmission happen under one lock: the controller
//! and the arm/disarm path both send, and a frame must never interleave with
//! another on the wire.

use crate::link::frame::{LinkCommand, FRAME_LEN};
use crate::transport::Transport;
use parking_lot::Mutex;

struct SenderInner {
    transports: Vec<Box<dyn Transport>>,
    frame: [u8; FRAME_LEN],
}

/// Shared frame sender for the drone link
pub struct LinkSender {
    inner: Mutex<SenderInner>,
    suffix: (u8, u8),
}

impl LinkSender {
    /// Create a sender broadcasting to `transports`
    pub fn new(transports: Vec<Box<dyn Transport>>, suffix: (u8, u8)) -> Self {
        LinkSender {
            inner: Mutex::new(SenderInner {
                transports,
                frame: [0u8; FRAME_LEN],
            }),
            suffix,
        }
    }

    /// Encode and broadcast a command
    ///
    /// Transport errors are logged and the frame dropped: commands are
    /// fire-and-forget, the next controller tick supersedes a lost frame.
    pub fn send(&self, command: &LinkCommand) {
        let mut inner = self.inner.lock();
        inner.frame = command.encode(self.suffix);

        log::trace!("Link TX CMD={} {:02X?}", command.code(), &inner.frame);

        let frame = inner.frame;
        for transport in inner.transports.iter_mut() {
            if let Err(e) = transport.write(&frame) {
                log::error!("Link write error for CMD={}: {}", command.code(), e);
            }
        }
    }

    /// Number of configured transports
    pub fn transport_count(&self) -> usize {
        self.inner.lock().transports.len()
    }
}
