//! Drone telemetry reception
//!
//! A dedicated thread drains the telemetry transport, feeds the frame
//! decoder and applies decoded frames to the shared [`TelemetryState`].
//! A staleness check runs every iteration independent of decode activity:
//! telemetry is "lost" purely by elapsed time since the last valid frame.

mod decoder;

pub use decoder::{TelemetryDecoder, TelemetryFrame};

use crate::state::{Shared, TelemetryState};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Idle pause when the transport had nothing to read
const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Apply a decoded frame to the shared state
fn apply_frame(state: &mut TelemetryState, frame: &TelemetryFrame) {
    state.error_status = frame.error_status;
    state.flight_mode = frame.flight_mode;
    state.battery_voltage = frame.battery_voltage;
    state.temperature = frame.temperature;
    state.angle_roll = frame.angle_roll;
    state.angle_pitch = frame.angle_pitch;
    state.start_status = frame.start_status;
    state.altitude = frame.altitude;
    state.takeoff_throttle = frame.takeoff_throttle;
    state.takeoff_detected = frame.takeoff_detected;
    state.angle_yaw = frame.angle_yaw;
    state.heading_lock = frame.heading_lock;
    state.fix_type = frame.fix_type;
    state.gps = frame.gps();
    state.waypoint_step = frame.waypoint_step;
    state.altitude_waypoint_acked = frame.altitude_waypoint_acked;
    state.gps_waypoint_acked = frame.gps_waypoint_acked;

    if state.telemetry_lost && state.packets > 0 {
        log::warn!("Drone telemetry restored");
    }
    state.telemetry_lost = false;
    state.packets += 1;
    state.last_frame_time = Some(Instant::now());
}

/// Flip the lost flag when the staleness window has elapsed
fn check_staleness(state: &Shared<TelemetryState>, lost_timeout: Duration) {
    let mut state = state.lock();
    if state.telemetry_lost {
        return;
    }
    let stale = match state.last_frame_time {
        Some(t) => t.elapsed() >= lost_timeout,
        None => true,
    };
    if stale {
        log::error!("Drone telemetry lost!");
        state.telemetry_lost = true;
    }
}

/// Spawn the telemetry receive thread
pub fn spawn_telemetry_thread(
    mut transport: Box<dyn Transport>,
    state: Shared<TelemetryState>,
    suffix: (u8, u8),
    lost_timeout: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("telemetry".to_string())
        .spawn(move || {
            log::info!("Telemetry thread started");
            let mut decoder = TelemetryDecoder::new(suffix);
            let mut buffer = [0u8; 64];

            while !stop.load(Ordering::Relaxed) {
                check_staleness(&state, lost_timeout);

                let read = match transport.read(&mut buffer) {
                    Ok(n) => n,
                    Err(e) => {
                        log::error!("Error reading telemetry from the drone: {}", e);
                        thread::sleep(IDLE_SLEEP);
                        continue;
                    }
                };

                if read == 0 {
                    thread::sleep(IDLE_SLEEP);
                    continue;
                }

                // Bytes decode strictly in arrival order; a frame spanning
                // two reads continues where the previous chunk stopped
                for frame in decoder.feed_slice(&buffer[..read]) {
                    let mut state = state.lock();
                    apply_frame(&mut state, &frame);
                }
            }

            log::info!("Telemetry thread stopped");
        })
        .expect("Failed to spawn telemetry thread")
}
