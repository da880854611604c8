//! Self-synchronizing telemetry frame decoder
//!
//! The downlink is a raw byte stream (serial or UDP, arbitrary chunking).
//! Frame format, 30 bytes total:
//! - Bytes 0-26: payload fields (big-endian)
//! - Byte 27: XOR of bytes 0-26
//! - Bytes 28-29: suffix constants marking the frame end
//!
//! The scanner feeds one byte at a time into a working buffer and watches
//! for the suffix pair. On a suffix match it validates the checksum and
//! decodes; on mismatch the partial frame is discarded and scanning resumes.
//! Decoding is chunk-independent: a frame split across any number of reads
//! produces the same result.

use crate::geo::GpsCoordinate;

/// Working buffer length (payload + checksum + suffix)
const BUFFER_LEN: usize = 30;
/// Index of the checksum byte
const CHECKSUM_POS: usize = 27;

/// One decoded telemetry frame
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    pub error_status: u8,
    pub flight_mode: u8,
    /// Volts
    pub battery_voltage: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Degrees
    pub angle_roll: i32,
    /// Degrees
    pub angle_pitch: i32,
    pub start_status: u8,
    /// Centimeters
    pub altitude: i32,
    pub takeoff_throttle: u16,
    pub takeoff_detected: bool,
    /// Degrees
    pub angle_yaw: i32,
    pub heading_lock: bool,
    pub satellites: u8,
    pub fix_type: u8,
    /// 1e-6 degree units
    pub gps_lat: i32,
    /// 1e-6 degree units
    pub gps_lon: i32,
    pub waypoint_step: u8,
    pub altitude_waypoint_acked: bool,
    pub gps_waypoint_acked: bool,
}

impl TelemetryFrame {
    /// Drone GPS fix as a coordinate value
    pub fn gps(&self) -> GpsCoordinate {
        let mut gps = GpsCoordinate::from_int(self.gps_lat, self.gps_lon);
        gps.set_satellites(self.satellites);
        gps
    }

    fn parse(buffer: &[u8; BUFFER_LEN]) -> Self {
        let raw_temperature = i16::from_be_bytes([buffer[3], buffer[4]]);
        let packed_waypoint = buffer[26];
        let ack_flags = packed_waypoint / 10;

        TelemetryFrame {
            error_status: buffer[0],
            flight_mode: buffer[1],
            battery_voltage: buffer[2] as f64 / 10.0,
            temperature: raw_temperature as f64 / 340.0 + 36.53,
            angle_roll: buffer[5] as i32 - 100,
            angle_pitch: buffer[6] as i32 - 100,
            start_status: buffer[7],
            altitude: u16::from_be_bytes([buffer[8], buffer[9]]) as i32 - 1000,
            takeoff_throttle: u16::from_be_bytes([buffer[10], buffer[11]]),
            takeoff_detected: buffer[12] > 0,
            angle_yaw: u16::from_be_bytes([buffer[13], buffer[14]]) as i32,
            heading_lock: buffer[15] > 0,
            satellites: buffer[16],
            fix_type: buffer[17],
            gps_lat: i32::from_be_bytes([buffer[18], buffer[19], buffer[20], buffer[21]]),
            gps_lon: i32::from_be_bytes([buffer[22], buffer[23], buffer[24], buffer[25]]),
            waypoint_step: packed_waypoint % 10,
            altitude_waypoint_acked: ack_flags == 1 || ack_flags == 3,
            gps_waypoint_acked: ack_flags == 2 || ack_flags == 3,
        }
    }
}

/// Stateful scanner over the telemetry byte stream
pub struct TelemetryDecoder {
    buffer: [u8; BUFFER_LEN],
    cursor: usize,
    previous: u8,
    suffix: (u8, u8),
}

impl TelemetryDecoder {
    /// Create a decoder synchronizing on `suffix`
    pub fn new(suffix: (u8, u8)) -> Self {
        TelemetryDecoder {
            buffer: [0u8; BUFFER_LEN],
            cursor: 0,
            previous: 0,
            suffix,
        }
    }

    /// Feed one byte; returns a frame when one completes and validates
    pub fn feed(&mut self, byte: u8) -> Option<TelemetryFrame> {
        self.buffer[self.cursor] = byte;
        let previous = self.previous;
        self.previous = byte;

        if previous == self.suffix.0 && byte == self.suffix.1 {
            // Candidate frame in positions 0..=27; no resync beyond the reset
            self.cursor = 0;

            let mut check = 0u8;
            for b in &self.buffer[..CHECKSUM_POS] {
                check ^= b;
            }

            if check == self.buffer[CHECKSUM_POS] {
                return Some(TelemetryFrame::parse(&self.buffer));
            }

            log::warn!(
                "Telemetry frame discarded: checksum expected {:#04x}, got {:#04x}",
                check,
                self.buffer[CHECKSUM_POS]
            );
            return None;
        }

        self.cursor += 1;
        if self.cursor >= BUFFER_LEN {
            // Stale partial frame, start over
            self.cursor = 0;
        }
        None
    }

    /// Feed a chunk of bytes, collecting any completed frames
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Vec<TelemetryFrame> {
        bytes.iter().filter_map(|b| self.feed(*b)).collect()
    }

    /// Current write cursor (diagnostics)
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUFFIX: (u8, u8) = (0xEE, 0xEF);

    /// Build a valid 30-byte frame around the given payload bytes
    fn build_frame(fill: impl Fn(&mut [u8; 30])) -> [u8; 30] {
        let mut frame = [0u8; 30];
        fill(&mut frame);
        let mut check = 0u8;
        for b in &frame[..27] {
            check ^= b;
        }
        frame[27] = check;
        frame[28] = SUFFIX.0;
        frame[29] = SUFFIX.1;
        frame
    }

    fn sample_frame() -> [u8; 30] {
        build_frame(|f| {
            f[0] = 0; // error status
            f[1] = 2; // flight mode
            f[2] = 124; // battery 12.4 V
            f[3..5].copy_from_slice(&3400i16.to_be_bytes()); // temperature raw
            f[5] = 103; // roll +3
            f[6] = 95; // pitch -5
            f[7] = 1; // start status
            f[8..10].copy_from_slice(&1500u16.to_be_bytes()); // altitude 500
            f[10..12].copy_from_slice(&1520u16.to_be_bytes()); // takeoff throttle
            f[12] = 1; // takeoff detected
            f[13..15].copy_from_slice(&270u16.to_be_bytes()); // yaw
            f[15] = 1; // heading lock
            f[16] = 9; // satellites
            f[17] = 3; // fix type
            f[18..22].copy_from_slice(&55_751_244i32.to_be_bytes());
            f[22..26].copy_from_slice(&37_618_423i32.to_be_bytes());
            f[26] = 32; // step 2, gps waypoint acked
        })
    }

    #[test]
    fn test_decodes_valid_frame() {
        let mut decoder = TelemetryDecoder::new(SUFFIX);
        let frames = decoder.feed_slice(&sample_frame());
        assert_eq!(frames.len(), 1);

        let frame = &frames[0];
        assert_eq!(frame.flight_mode, 2);
        assert!((frame.battery_voltage - 12.4).abs() < 1e-9);
        assert!((frame.temperature - (3400.0 / 340.0 + 36.53)).abs() < 1e-9);
        assert_eq!(frame.angle_roll, 3);
        assert_eq!(frame.angle_pitch, -5);
        assert_eq!(frame.altitude, 500);
        assert_eq!(frame.takeoff_throttle, 1520);
        assert!(frame.takeoff_detected);
        assert_eq!(frame.angle_yaw, 270);
        assert!(frame.heading_lock);
        assert_eq!(frame.satellites, 9);
        assert_eq!(frame.gps_lat, 55_751_244);
        assert_eq!(frame.gps_lon, 37_618_423);
        assert_eq!(frame.waypoint_step, 2);
        assert!(!frame.altitude_waypoint_acked);
        assert!(frame.gps_waypoint_acked);
    }

    #[test]
    fn test_chunking_independent() {
        let frame = sample_frame();

        // Whole frame, byte by byte, and odd split points must all agree
        let mut whole = TelemetryDecoder::new(SUFFIX);
        let reference = whole.feed_slice(&frame).pop().unwrap();

        for split in [1usize, 7, 13, 29] {
            let mut decoder = TelemetryDecoder::new(SUFFIX);
            let mut frames = decoder.feed_slice(&frame[..split]);
            frames.extend(decoder.feed_slice(&frame[split..]));
            assert_eq!(frames.len(), 1, "split at {}", split);
            assert_eq!(frames[0], reference, "split at {}", split);
        }
    }

    #[test]
    fn test_resynchronizes_after_garbage() {
        let mut decoder = TelemetryDecoder::new(SUFFIX);
        // Garbage that contains no suffix pair
        let garbage = [0x01u8, 0x02, 0xEE, 0x10, 0x55, 0x00];
        assert!(decoder.feed_slice(&garbage).is_empty());

        // Buffer content is now stale; the next suffix triggers a checksum
        // check that fails, resetting the scanner
        assert!(decoder.feed(SUFFIX.0).is_none());
        assert!(decoder.feed(SUFFIX.1).is_none());

        // A clean frame afterwards decodes fine
        let frames = decoder.feed_slice(&sample_frame());
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_never_panics_on_arbitrary_stream_and_cursor_wraps() {
        let mut decoder = TelemetryDecoder::new(SUFFIX);
        // Suffix-free stream long enough to wrap the buffer several times
        for i in 0..200u32 {
            let byte = (i % 7) as u8; // never 0xEE 0xEF
            assert!(decoder.feed(byte).is_none());
        }
        assert!(decoder.cursor() < 30);

        // Exactly 30 suffix-free bytes from a fresh scanner wrap to zero
        let mut fresh = TelemetryDecoder::new(SUFFIX);
        for _ in 0..30 {
            fresh.feed(0x11);
        }
        assert_eq!(fresh.cursor(), 0);
    }

    #[test]
    fn test_checksum_mismatch_discards_frame() {
        let mut frame = sample_frame();
        frame[2] ^= 0xFF; // corrupt battery byte, checksum now stale

        let mut decoder = TelemetryDecoder::new(SUFFIX);
        assert!(decoder.feed_slice(&frame).is_empty());
        assert_eq!(decoder.cursor(), 0);
    }

    #[test]
    fn test_waypoint_flag_packing() {
        for (packed, step, alt_acked, gps_acked) in [
            (0u8, 0u8, false, false),
            (12, 2, true, false),
            (25, 5, false, true),
            (33, 3, true, true),
        ] {
            let frame = build_frame(|f| f[26] = packed);
            let mut decoder = TelemetryDecoder::new(SUFFIX);
            let decoded = decoder.feed_slice(&frame).pop().unwrap();
            assert_eq!(decoded.waypoint_step, step);
            assert_eq!(decoded.altitude_waypoint_acked, alt_acked);
            assert_eq!(decoded.gps_waypoint_acked, gps_acked);
        }
    }
}
