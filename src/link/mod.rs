//! Drone command link
//!
//! Frame format: [PAYLOAD (8)] [CMD] [XOR CHECK] [SUFFIX1] [SUFFIX2]
//!
//! The 12-byte frame is the only uplink the drone understands; it must match
//! the airborne firmware byte for byte. Frames are broadcast to every
//! configured transport at once.

mod frame;
mod sender;

pub use frame::{decode, encode_raw, LinkCommand, FRAME_LEN, PAYLOAD_LEN};
pub use sender::LinkSender;
