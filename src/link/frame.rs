//! Command frame codec
//!
//! Layout of the 12-byte frame:
//! - Bytes 0-7: payload, big-endian fields per command
//! - Byte 8: command code
//! - Byte 9: XOR of bytes 0-8
//! - Bytes 10-11: configured suffix constants
//!
//! Encoding is total: every payload/command pair yields a valid frame.

use crate::error::{Error, Result};

/// Full frame length in bytes
pub const FRAME_LEN: usize = 12;
/// Payload length in bytes
pub const PAYLOAD_LEN: usize = 8;

/// Command codes of the drone link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum CommandCode {
    /// Keep-alive, requests telemetry
    Idle = 0,
    /// Direct per-axis correction (optical stabilization and descent)
    DirectControl = 1,
    /// Barometric waypoint
    PressureWaypoint = 2,
    /// GPS waypoint
    GpsWaypoint = 3,
    /// Stop motors immediately (touchdown)
    MotorsStop = 4,
    /// Begin auto-takeoff
    StartSequence = 5,
    /// Abort the sequence
    Abort = 6,
}

/// Drone link commands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkCommand {
    /// Keep-alive, requests telemetry
    Idle,
    /// Direct per-axis correction, values centered at 1500
    DirectControl {
        roll: i16,
        pitch: i16,
        yaw: i16,
        throttle: i16,
    },
    /// Barometric waypoint (pressure in Pa)
    PressureWaypoint { pressure: i32 },
    /// GPS waypoint (1e-6 degree units)
    GpsWaypoint { lat: i32, lon: i32 },
    /// Stop motors immediately
    MotorsStop,
    /// Begin auto-takeoff
    StartSequence,
    /// Abort the sequence
    Abort,
}

impl LinkCommand {
    /// Command code byte
    pub fn code(&self) -> u8 {
        match self {
            LinkCommand::Idle => CommandCode::Idle as u8,
            LinkCommand::DirectControl { .. } => CommandCode::DirectControl as u8,
            LinkCommand::PressureWaypoint { .. } => CommandCode::PressureWaypoint as u8,
            LinkCommand::GpsWaypoint { .. } => CommandCode::GpsWaypoint as u8,
            LinkCommand::MotorsStop => CommandCode::MotorsStop as u8,
            LinkCommand::StartSequence => CommandCode::StartSequence as u8,
            LinkCommand::Abort => CommandCode::Abort as u8,
        }
    }

    /// Build the 8-byte payload
    fn payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut payload = [0u8; PAYLOAD_LEN];
        match self {
            LinkCommand::DirectControl {
                roll,
                pitch,
                yaw,
                throttle,
            } => {
                payload[0..2].copy_from_slice(&roll.to_be_bytes());
                payload[2..4].copy_from_slice(&pitch.to_be_bytes());
                payload[4..6].copy_from_slice(&yaw.to_be_bytes());
                payload[6..8].copy_from_slice(&throttle.to_be_bytes());
            }
            LinkCommand::PressureWaypoint { pressure } => {
                payload[0..4].copy_from_slice(&pressure.to_be_bytes());
            }
            LinkCommand::GpsWaypoint { lat, lon } => {
                payload[0..4].copy_from_slice(&lat.to_be_bytes());
                payload[4..8].copy_from_slice(&lon.to_be_bytes());
            }
            LinkCommand::Idle
            | LinkCommand::MotorsStop
            | LinkCommand::StartSequence
            | LinkCommand::Abort => {}
        }
        payload
    }

    /// Encode into a ready-to-transmit frame
    pub fn encode(&self, suffix: (u8, u8)) -> [u8; FRAME_LEN] {
        encode_raw(self.code(), self.payload(), suffix)
    }
}

/// Encode an arbitrary command/payload pair into a frame
pub fn encode_raw(command: u8, payload: [u8; PAYLOAD_LEN], suffix: (u8, u8)) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..PAYLOAD_LEN].copy_from_slice(&payload);
    frame[8] = command;

    let mut check = 0u8;
    for byte in &frame[..=8] {
        check ^= byte;
    }
    frame[9] = check;

    frame[10] = suffix.0;
    frame[11] = suffix.1;
    frame
}

/// Decode a frame back into its command code and payload, verifying the
/// check byte
pub fn decode(frame: &[u8; FRAME_LEN]) -> Result<(u8, [u8; PAYLOAD_LEN])> {
    let mut check = 0u8;
    for byte in &frame[..=8] {
        check ^= byte;
    }
    if check != frame[9] {
        return Err(Error::ChecksumError {
            expected: check,
            actual: frame[9],
        });
    }

    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&frame[..PAYLOAD_LEN]);
    Ok((frame[8], payload))
}
