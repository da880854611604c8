//! Shared state containers
//!
//! Three single-writer records connect the loops: the position/phase
//! controller owns [`PositionState`], the platform poll loop owns
//! [`PlatformState`], the telemetry loop owns [`TelemetryState`]. Every other
//! component sees them read-only through cloned snapshots taken under the
//! lock, never through live references.

use crate::geo::GpsCoordinate;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Shared handle to a single-writer state record
pub type Shared<T> = Arc<Mutex<T>>;

/// Neutral actuation value: no correction on any DDC axis
pub const DDC_NEUTRAL: i32 = 1500;

/// Flight phase of the landing sequence
///
/// Exactly one phase is active per session. `Idle` is the initial phase,
/// `Done` is terminal and reachable only from `Land`. All transitions are
/// driven by the position controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlightPhase {
    /// Waiting for the sequence to be armed
    Idle,
    /// Auto-takeoff handshake in progress
    Takeoff,
    /// GPS waypoint flight toward the platform
    Waypoint,
    /// Optical stabilization above the marker
    Stab,
    /// Optical descent onto the marker
    Land,
    /// Marker temporarily lost, holding the previous position
    Prev,
    /// Marker lost beyond the allowance, sequence aborted
    Lost,
    /// Landing finished, motors stopped
    Done,
}

impl FlightPhase {
    /// Numeric code pushed to the platform in status reports
    pub fn code(&self) -> u8 {
        match self {
            FlightPhase::Idle => 0,
            FlightPhase::Takeoff => 1,
            FlightPhase::Waypoint => 2,
            FlightPhase::Stab => 3,
            FlightPhase::Land => 4,
            FlightPhase::Prev => 5,
            FlightPhase::Lost => 6,
            FlightPhase::Done => 7,
        }
    }

    /// Short display name
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightPhase::Idle => "IDLE",
            FlightPhase::Takeoff => "TAKEOFF",
            FlightPhase::Waypoint => "WAYPOINT",
            FlightPhase::Stab => "STAB",
            FlightPhase::Land => "LAND",
            FlightPhase::Prev => "PREV",
            FlightPhase::Lost => "LOST",
            FlightPhase::Done => "DONE",
        }
    }
}

impl Default for FlightPhase {
    fn default() -> Self {
        FlightPhase::Idle
    }
}

/// Marker pose reported by the vision collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarkerPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
}

/// Position, setpoints and correction outputs of the drone
///
/// Owned exclusively by the position controller and mutated once per vision
/// frame.
#[derive(Debug, Clone)]
pub struct PositionState {
    /// Filtered marker pose
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    /// Active (aligned) setpoints
    pub setpoint_x: f64,
    pub setpoint_y: f64,
    pub setpoint_z: f64,
    pub setpoint_yaw: f64,
    /// Raw optical setpoints captured on stabilization entry
    pub setpoint_abs_x: f64,
    pub setpoint_abs_y: f64,
    /// Altitude recorded when the landing sequence started
    pub entry_z: f64,
    /// Per-axis correction outputs, centered on [`DDC_NEUTRAL`]
    pub ddc_x: i32,
    pub ddc_y: i32,
    pub ddc_z: i32,
    pub ddc_roll: i32,
    pub ddc_pitch: i32,
    pub ddc_yaw: i32,
    /// Current flight phase
    pub phase: FlightPhase,
    /// Last computed drone-platform distance in meters
    pub distance_m: i32,
}

impl Default for PositionState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw: 0.0,
            setpoint_x: 0.0,
            setpoint_y: 0.0,
            setpoint_z: 0.0,
            setpoint_yaw: 0.0,
            setpoint_abs_x: 0.0,
            setpoint_abs_y: 0.0,
            entry_z: 0.0,
            ddc_x: DDC_NEUTRAL,
            ddc_y: DDC_NEUTRAL,
            ddc_z: DDC_NEUTRAL,
            ddc_roll: DDC_NEUTRAL,
            ddc_pitch: DDC_NEUTRAL,
            ddc_yaw: DDC_NEUTRAL,
            phase: FlightPhase::Idle,
            distance_m: 0,
        }
    }
}

impl PositionState {
    /// Reset all correction outputs to neutral
    pub fn reset_ddc(&mut self) {
        self.ddc_x = DDC_NEUTRAL;
        self.ddc_y = DDC_NEUTRAL;
        self.ddc_z = DDC_NEUTRAL;
        self.ddc_roll = DDC_NEUTRAL;
        self.ddc_pitch = DDC_NEUTRAL;
        self.ddc_yaw = DDC_NEUTRAL;
    }

    /// Read-only snapshot for display/API collaborators
    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            x: self.x,
            y: self.y,
            z: self.z,
            yaw: self.yaw,
            setpoint_x: self.setpoint_x,
            setpoint_y: self.setpoint_y,
            setpoint_z: self.setpoint_z,
            setpoint_yaw: self.setpoint_yaw,
            ddc_roll: self.ddc_roll,
            ddc_pitch: self.ddc_pitch,
            ddc_z: self.ddc_z,
            ddc_yaw: self.ddc_yaw,
            phase: self.phase,
            distance_m: self.distance_m,
        }
    }
}

/// Serializable view of [`PositionState`]
#[derive(Debug, Clone, Serialize)]
pub struct PositionSnapshot {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub setpoint_x: f64,
    pub setpoint_y: f64,
    pub setpoint_z: f64,
    pub setpoint_yaw: f64,
    pub ddc_roll: i32,
    pub ddc_pitch: i32,
    pub ddc_z: i32,
    pub ddc_yaw: i32,
    pub phase: FlightPhase,
    pub distance_m: i32,
}

/// State of the landing platform
///
/// Owned by the platform poll loop; the controller reads it through
/// snapshots.
#[derive(Debug, Clone)]
pub struct PlatformState {
    /// Last illumination reading in lux
    pub illumination: f64,
    /// Camera exposure derived from illumination (last applied value)
    pub camera_exposure: f64,
    /// Platform backlight state as last commanded
    pub backlight: bool,
    /// Platform GPS fix
    pub gps: GpsCoordinate,
    /// Barometric pressure at the platform in Pa
    pub pressure: i32,
    /// Filtered platform ground speed in km/h
    pub speed: f64,
    /// No valid reply within the staleness window
    pub platform_lost: bool,
    /// Valid replies received this session
    pub packets: u64,
    /// Arrival time of the last valid reply
    pub last_reply_time: Option<Instant>,
}

impl Default for PlatformState {
    fn default() -> Self {
        Self {
            illumination: 0.0,
            camera_exposure: 0.0,
            backlight: false,
            gps: GpsCoordinate::new(),
            pressure: 0,
            speed: 0.0,
            platform_lost: true,
            packets: 0,
            last_reply_time: None,
        }
    }
}

impl PlatformState {
    /// Record a successful exchange: refresh staleness tracking
    pub fn mark_reply(&mut self) {
        if self.platform_lost && self.packets > 0 {
            log::warn!("Platform communication restored");
        }
        self.platform_lost = false;
        self.packets += 1;
        self.last_reply_time = Some(Instant::now());
    }

    /// Read-only snapshot for display/API collaborators
    pub fn snapshot(&self) -> PlatformSnapshot {
        PlatformSnapshot {
            illumination: self.illumination,
            camera_exposure: self.camera_exposure,
            backlight: self.backlight,
            lat: self.gps.lat_deg(),
            lon: self.gps.lon_deg(),
            satellites: self.gps.satellites(),
            pressure: self.pressure,
            speed: self.speed,
            platform_lost: self.platform_lost,
            packets: self.packets,
        }
    }
}

/// Serializable view of [`PlatformState`]
#[derive(Debug, Clone, Serialize)]
pub struct PlatformSnapshot {
    pub illumination: f64,
    pub camera_exposure: f64,
    pub backlight: bool,
    pub lat: f64,
    pub lon: f64,
    pub satellites: u8,
    pub pressure: i32,
    pub speed: f64,
    pub platform_lost: bool,
    pub packets: u64,
}

/// Drone telemetry decoded from the downlink stream
///
/// Owned by the telemetry loop; the controller reads it through snapshots.
#[derive(Debug, Clone)]
pub struct TelemetryState {
    /// Error code reported by the flight controller (0 = none)
    pub error_status: u8,
    /// Flight mode reported by the flight controller
    pub flight_mode: u8,
    /// Battery voltage in volts
    pub battery_voltage: f64,
    /// IMU temperature in degrees Celsius
    pub temperature: f64,
    /// Roll angle in degrees
    pub angle_roll: i32,
    /// Pitch angle in degrees
    pub angle_pitch: i32,
    /// Start sequence status
    pub start_status: u8,
    /// Barometric altitude in centimeters
    pub altitude: i32,
    /// Throttle captured during takeoff
    pub takeoff_throttle: u16,
    /// Drone reports being airborne
    pub takeoff_detected: bool,
    /// Yaw angle in degrees
    pub angle_yaw: i32,
    /// Heading lock engaged
    pub heading_lock: bool,
    /// GPS fix type
    pub fix_type: u8,
    /// Drone GPS fix
    pub gps: GpsCoordinate,
    /// Waypoint sequence step reported by the drone
    pub waypoint_step: u8,
    /// Altitude (pressure) waypoint acknowledged
    pub altitude_waypoint_acked: bool,
    /// GPS waypoint acknowledged
    pub gps_waypoint_acked: bool,
    /// No valid frame within the staleness window
    pub telemetry_lost: bool,
    /// Valid frames received this session
    pub packets: u64,
    /// Arrival time of the last valid frame
    pub last_frame_time: Option<Instant>,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self {
            error_status: 0,
            flight_mode: 0,
            battery_voltage: 0.0,
            temperature: 0.0,
            angle_roll: 0,
            angle_pitch: 0,
            start_status: 0,
            altitude: 0,
            takeoff_throttle: 0,
            takeoff_detected: false,
            angle_yaw: 0,
            heading_lock: false,
            fix_type: 0,
            gps: GpsCoordinate::new(),
            waypoint_step: 0,
            altitude_waypoint_acked: false,
            gps_waypoint_acked: false,
            telemetry_lost: true,
            packets: 0,
            last_frame_time: None,
        }
    }
}

impl TelemetryState {
    /// Read-only snapshot for display/API collaborators
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            error_status: self.error_status,
            flight_mode: self.flight_mode,
            battery_voltage: self.battery_voltage,
            temperature: self.temperature,
            angle_roll: self.angle_roll,
            angle_pitch: self.angle_pitch,
            altitude: self.altitude,
            takeoff_detected: self.takeoff_detected,
            angle_yaw: self.angle_yaw,
            lat: self.gps.lat_deg(),
            lon: self.gps.lon_deg(),
            satellites: self.gps.satellites(),
            waypoint_step: self.waypoint_step,
            telemetry_lost: self.telemetry_lost,
            packets: self.packets,
        }
    }
}

/// Serializable view of [`TelemetryState`], also the JSON telemetry summary
/// served to the control API collaborator
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub error_status: u8,
    pub flight_mode: u8,
    pub battery_voltage: f64,
    pub temperature: f64,
    pub angle_roll: i32,
    pub angle_pitch: i32,
    pub altitude: i32,
    pub takeoff_detected: bool,
    pub angle_yaw: i32,
    pub lat: f64,
    pub lon: f64,
    pub satellites: u8,
    pub waypoint_step: u8,
    pub telemetry_lost: bool,
    pub packets: u64,
}

impl TelemetrySnapshot {
    /// JSON summary for the control API
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
