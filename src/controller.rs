//! Position and flight-phase controller
//!
//! The heart of the landing sequence. Invoked once per captured camera
//! frame with either a marker pose or "no marker", it drives the flight
//! phase state machine, runs the per-axis PID corrections and emits command
//! frames over the drone link.
//!
//! Marker loss is not an error, it is an expected mode of operation with an
//! escalation ladder: STAB/LAND fall back to PREV on the first missed
//! frame, PREV tolerates a configured number of misses on the held
//! position, then the sequence aborts into LOST and finally hands over to
//! the GPS waypoint flight.

use crate::blackbox::{Blackbox, BlackboxEntry};
use crate::config::AppConfig;
use crate::geo::{self, GpsCoordinate};
use crate::gps::{GpsEstimator, GpsPredictor};
use crate::link::{LinkCommand, LinkSender};
use crate::pid::Pid;
use crate::state::{
    FlightPhase, MarkerPose, PlatformState, PositionState, Shared, TelemetryState, DDC_NEUTRAL,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Position/phase controller
pub struct PositionController {
    config: AppConfig,
    sender: Arc<LinkSender>,
    position: Shared<PositionState>,
    platform: Shared<PlatformState>,
    telemetry: Shared<TelemetryState>,
    blackbox: Arc<Blackbox>,
    /// Mirror of the current phase code for the platform status push
    phase_code: Arc<AtomicU8>,

    pid_x: Pid,
    pid_y: Pid,
    pid_z: Pid,
    pid_yaw: Pid,

    predictor: GpsPredictor,
    estimator: GpsEstimator,
    /// Last platform fix recorded into the prediction histories
    last_recorded_fix: Option<(i32, i32)>,

    armed: bool,
    lost_counter: u32,
    /// Step of the waypoint handshake currently being transmitted
    waypoint_step: u8,
    arm_error: String,
}

impl PositionController {
    /// Create a controller over the shared state records
    pub fn new(
        config: AppConfig,
        sender: Arc<LinkSender>,
        position: Shared<PositionState>,
        platform: Shared<PlatformState>,
        telemetry: Shared<TelemetryState>,
        blackbox: Arc<Blackbox>,
        phase_code: Arc<AtomicU8>,
    ) -> Self {
        let pid_x = Pid::from_config(&config.pid.x);
        let pid_y = Pid::from_config(&config.pid.y);
        let pid_z = Pid::from_config(&config.pid.z);
        let pid_yaw = Pid::from_config(&config.pid.yaw);

        PositionController {
            config,
            sender,
            position,
            platform,
            telemetry,
            blackbox,
            phase_code,
            pid_x,
            pid_y,
            pid_z,
            pid_yaw,
            predictor: GpsPredictor::new(),
            estimator: GpsEstimator::new(),
            last_recorded_fix: None,
            armed: false,
            lost_counter: 0,
            waypoint_step: 0,
            arm_error: String::new(),
        }
    }

    /// Process one vision frame
    ///
    /// Called by the vision collaborator at camera frame rate, strictly in
    /// capture order. Must stay cheap: this call gates the achievable frame
    /// rate.
    pub fn proceed(&mut self, pose: Option<MarkerPose>) {
        let platform = self.platform.lock().clone();
        let telemetry = self.telemetry.lock().clone();

        let mut pos = self.position.lock().clone();

        pos.reset_ddc();

        if matches!(
            pos.phase,
            FlightPhase::Idle | FlightPhase::Lost | FlightPhase::Done
        ) {
            self.reset_pids();
        }

        self.track_platform_gps(&platform, &telemetry, &mut pos);

        // Armed on the ground with both links live: begin the sequence
        if self.armed && pos.phase == FlightPhase::Idle && self.links_live(&platform, &telemetry) {
            log::warn!("Starting landing sequence: auto-takeoff");
            pos.phase = FlightPhase::Takeoff;
        }

        let mut entered_stab = false;
        if let Some(pose) = pose {
            entered_stab = self.absorb_pose(&pose, &telemetry, &mut pos);
        }

        // The capture call itself sends nothing: corrections start on the
        // next frame, once the setpoints have something to diverge from
        if self.armed
            && !entered_stab
            && matches!(
                pos.phase,
                FlightPhase::Stab | FlightPhase::Land | FlightPhase::Prev
            )
        {
            self.optical_correction(&mut pos);
        }

        if pose.is_none() {
            self.escalate_marker_loss(&platform, &telemetry, &mut pos);
        }

        // Publish the new state before signalling the logger
        self.phase_code.store(pos.phase.code(), Ordering::Relaxed);
        *self.position.lock() = pos.clone();

        if self.armed && pos.phase != FlightPhase::Done {
            self.blackbox.push_entry(BlackboxEntry {
                position: pos.snapshot(),
                platform: platform.snapshot(),
            });
        } else {
            self.blackbox.set_enabled(false);
        }
    }

    /// Arm or disarm the landing sequence
    ///
    /// Either edge resets the phase to IDLE and the waypoint handshake.
    /// Arming refuses (returns false) when the pre-arm checks fail.
    pub fn set_armed(&mut self, armed: bool) -> bool {
        if armed == self.armed {
            return true;
        }

        let telemetry = self.telemetry.lock().clone();

        if armed {
            let platform = self.platform.lock().clone();
            if let Err(reason) = self.pre_arm_checks(&platform, &telemetry) {
                log::error!("Error during pre-arm checks! {}", reason);
                self.arm_error = reason;
                return false;
            }
            self.arm_error.clear();
            log::info!("Pre-arm checks passed");
            log::warn!("CAUTION! Arming the landing sequence, motor start possible!");

            // Taking over an airborne drone starts from a clean abort
            if telemetry.takeoff_detected {
                self.sender.send(&LinkCommand::Abort);
            } else {
                self.sender.send(&LinkCommand::Idle);
            }
            self.blackbox.set_enabled(true);
            self.armed = true;
        } else {
            log::warn!("Disarming the landing sequence");
            self.sender.send(&LinkCommand::Idle);
            self.blackbox.set_enabled(false);
            self.armed = false;
        }

        self.lost_counter = 0;
        self.waypoint_step = 0;
        let mut pos = self.position.lock();
        pos.phase = FlightPhase::Idle;
        pos.reset_ddc();
        self.phase_code.store(pos.phase.code(), Ordering::Relaxed);
        true
    }

    /// Whether the sequence is armed
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Reason the last arming attempt was refused
    pub fn arm_error(&self) -> &str {
        &self.arm_error
    }

    /// Waypoint handshake step currently being transmitted (0 = none)
    pub fn waypoint_step(&self) -> u8 {
        self.waypoint_step
    }

    /// Both links considered live for phase gating
    fn links_live(&self, platform: &PlatformState, telemetry: &TelemetryState) -> bool {
        !platform.platform_lost && (!self.config.telemetry.required || !telemetry.telemetry_lost)
    }

    /// Basic system check before the sequence may start
    fn pre_arm_checks(
        &self,
        platform: &PlatformState,
        telemetry: &TelemetryState,
    ) -> Result<(), String> {
        if platform.platform_lost {
            return Err("No communication with the platform".to_string());
        }
        if platform.gps.satellites() < self.config.gps.min_satellites {
            return Err("Not enough GPS satellites on the platform".to_string());
        }
        if platform.gps.ground_speed() > self.config.gps.max_platform_speed {
            return Err(format!(
                "The platform moves faster than {} km/h",
                self.config.gps.max_platform_speed
            ));
        }
        if self.config.telemetry.required {
            if telemetry.telemetry_lost {
                return Err("No drone telemetry".to_string());
            }
            if telemetry.error_status != 0 {
                return Err(format!("Drone error {}", telemetry.error_status));
            }
            if telemetry.gps.satellites() < self.config.gps.min_satellites {
                return Err("Not enough GPS satellites on the drone".to_string());
            }
        }
        Ok(())
    }

    /// Update the drone-platform distance and the prediction histories
    fn track_platform_gps(
        &mut self,
        platform: &PlatformState,
        telemetry: &TelemetryState,
        pos: &mut PositionState,
    ) {
        if !platform.platform_lost
            && platform.gps.satellites() > 0
            && !telemetry.telemetry_lost
            && telemetry.gps.satellites() > 0
        {
            pos.distance_m = geo::distance_m(
                &telemetry.gps,
                &platform.gps,
                self.config.gps.planet_radius_km,
            ) as i32;
        }

        // Record each distinct platform fix once
        if platform.gps.is_initialized() {
            let fix = (platform.gps.lat_int(), platform.gps.lon_int());
            if self.last_recorded_fix != Some(fix) {
                self.last_recorded_fix = Some(fix);
                self.predictor.push_fix(&platform.gps);
                self.predictor.update_heading();
                self.estimator.record_fix(&platform.gps);
            }
        }
    }

    /// Blend or adopt a marker pose and run the phase entries tied to it
    ///
    /// Returns true when this call entered stabilization.
    fn absorb_pose(
        &mut self,
        pose: &MarkerPose,
        telemetry: &TelemetryState,
        pos: &mut PositionState,
    ) -> bool {
        let filter = self.config.landing.input_filter;

        if matches!(pos.phase, FlightPhase::Stab | FlightPhase::Land) {
            pos.x = pos.x * filter + pose.x * (1.0 - filter);
            pos.y = pos.y * filter + pose.y * (1.0 - filter);
            pos.z = pos.z * filter + pose.z * (1.0 - filter);
            pos.yaw = pos.yaw * filter + pose.yaw * (1.0 - filter);
        } else {
            // Any other phase starts from a clean filter memory
            pos.x = pose.x;
            pos.y = pose.y;
            pos.z = pose.z;
            pos.yaw = pose.yaw;
        }

        if self.config.landing.allowed
            && pos.phase == FlightPhase::Land
            && pos.z <= self.config.landing.motors_off_altitude
            && !telemetry.takeoff_detected
        {
            log::warn!("Landed successfully! Turning off the motors.");
            self.sender.send(&LinkCommand::MotorsStop);
            pos.phase = FlightPhase::Done;
            log::info!("Landing sequence finished");
        } else if !matches!(
            pos.phase,
            FlightPhase::Done | FlightPhase::Stab | FlightPhase::Land
        ) {
            self.enter_stabilization(pos);
            return true;
        }
        false
    }

    /// Capture the current pose as the hold setpoint and switch to STAB
    fn enter_stabilization(&mut self, pos: &mut PositionState) {
        pos.setpoint_x = pos.x;
        pos.setpoint_y = pos.y;
        pos.setpoint_z = pos.z;
        pos.setpoint_abs_x = pos.x;
        pos.setpoint_abs_y = pos.y;
        pos.entry_z = pos.z;

        self.pid_x.set_setpoint(pos.setpoint_x);
        self.pid_y.set_setpoint(pos.setpoint_y);
        self.pid_z.set_setpoint(pos.setpoint_z);
        self.pid_yaw.set_setpoint(pos.setpoint_yaw);
        self.reset_pids();
        self.lost_counter = 0;

        log::warn!(
            "Marker in sight! Setpoints fixed at X={:.0} Y={:.0} Z={:.0}",
            pos.setpoint_x,
            pos.setpoint_y,
            pos.setpoint_z
        );
        pos.phase = FlightPhase::Stab;
    }

    /// One optical stabilization step: alignment, landing check, PID, DDC
    fn optical_correction(&mut self, pos: &mut PositionState) {
        let landing = &self.config.landing;

        // Setpoint alignment compensates platform motion between captures
        let alignment = landing.alignment_factor;
        pos.setpoint_x = pos.setpoint_x * alignment + pos.setpoint_abs_x * (1.0 - alignment);
        pos.setpoint_y = pos.setpoint_y * alignment + pos.setpoint_abs_y * (1.0 - alignment);
        self.pid_x.set_setpoint(pos.setpoint_x);
        self.pid_y.set_setpoint(pos.setpoint_y);

        // Descend only while the drone is actually above the pad
        if matches!(pos.phase, FlightPhase::Stab | FlightPhase::Land) {
            let within_tolerance = (pos.x - pos.setpoint_abs_x).abs() < landing.allowed_range_xy
                && (pos.y - pos.setpoint_abs_y).abs() < landing.allowed_range_xy
                && (pos.yaw - pos.setpoint_yaw).abs() < landing.allowed_range_yaw;

            if within_tolerance && landing.allowed {
                if pos.phase != FlightPhase::Land {
                    log::warn!("Landing conditions met, starting descent");
                    pos.phase = FlightPhase::Land;
                }
                if pos.setpoint_z > 1.0 {
                    pos.setpoint_z -= landing.decrement;
                }
                self.pid_z.set_setpoint(pos.setpoint_z);
            } else if pos.phase == FlightPhase::Land {
                // Drifted out of tolerance mid-descent
                pos.phase = FlightPhase::Stab;
            }
        }

        pos.ddc_x = DDC_NEUTRAL + self.pid_x.compute(pos.x) as i32;
        pos.ddc_y = DDC_NEUTRAL + self.pid_y.compute(pos.y) as i32;
        pos.ddc_z = DDC_NEUTRAL + self.pid_z.compute(pos.z) as i32;
        pos.ddc_yaw = DDC_NEUTRAL + self.pid_yaw.compute(pos.yaw) as i32;

        // Rotate the camera-frame X/Y corrections into body roll/pitch
        let yaw_sin = (-pos.yaw).to_radians().sin();
        let yaw_cos = (-pos.yaw).to_radians().cos();
        pos.ddc_roll = ((pos.ddc_x - DDC_NEUTRAL) as f64 * yaw_sin
            + (pos.ddc_y - DDC_NEUTRAL) as f64 * yaw_cos) as i32
            + DDC_NEUTRAL;
        pos.ddc_pitch = ((pos.ddc_x - DDC_NEUTRAL) as f64 * yaw_cos
            - (pos.ddc_y - DDC_NEUTRAL) as f64 * yaw_sin) as i32
            + DDC_NEUTRAL;

        self.sender.send(&LinkCommand::DirectControl {
            roll: pos.ddc_roll as i16,
            pitch: pos.ddc_pitch as i16,
            yaw: pos.ddc_yaw as i16,
            throttle: pos.ddc_z as i16,
        });
    }

    /// Loss-escalation ladder for frames without a marker
    fn escalate_marker_loss(
        &mut self,
        platform: &PlatformState,
        telemetry: &TelemetryState,
        pos: &mut PositionState,
    ) {
        match pos.phase {
            FlightPhase::Stab | FlightPhase::Land => {
                self.lost_counter += 1;
                log::warn!(
                    "The marker is lost! The previous position will be used for the next {} frames",
                    self.config.landing.allowed_lost_frames
                );
                pos.phase = FlightPhase::Prev;
            }
            FlightPhase::Prev => {
                self.lost_counter += 1;
                if self.lost_counter >= self.config.landing.allowed_lost_frames {
                    log::error!("The marker is completely lost! Aborting optical stabilization");
                    pos.reset_ddc();
                    self.sender.send(&LinkCommand::Abort);
                    pos.phase = FlightPhase::Lost;
                }
            }
            FlightPhase::Lost => {
                if self.links_live(platform, telemetry) {
                    self.sender.send(&LinkCommand::Idle);
                    log::warn!("Falling back to GPS waypoint flight");
                    pos.phase = FlightPhase::Waypoint;
                } else {
                    self.sender.send(&LinkCommand::Abort);
                }
            }
            FlightPhase::Takeoff | FlightPhase::Waypoint => {
                self.waypoint_handshake(platform, telemetry, pos);
            }
            FlightPhase::Idle | FlightPhase::Done => {
                self.sender.send(&LinkCommand::Idle);
            }
        }
    }

    /// Three-step waypoint handshake with the drone
    ///
    /// The drone acknowledges each waypoint kind through telemetry; the
    /// handshake keeps transmitting the current step until its ack arrives
    /// (frames are fire-and-forget, a lost one is simply resent).
    fn waypoint_handshake(
        &mut self,
        platform: &PlatformState,
        telemetry: &TelemetryState,
        pos: &mut PositionState,
    ) {
        if !telemetry.altitude_waypoint_acked {
            self.waypoint_step = 1;
            self.sender.send(&LinkCommand::PressureWaypoint {
                pressure: platform.pressure,
            });
        } else if !telemetry.gps_waypoint_acked {
            self.waypoint_step = 2;
            let fix = self.waypoint_fix(platform, pos);
            self.sender.send(&LinkCommand::GpsWaypoint {
                lat: fix.lat_int(),
                lon: fix.lon_int(),
            });
        } else if pos.phase == FlightPhase::Takeoff {
            if telemetry.takeoff_detected {
                log::info!("Takeoff detected, flying waypoints toward the platform");
                pos.phase = FlightPhase::Waypoint;
            } else {
                self.waypoint_step = 3;
                self.sender.send(&LinkCommand::StartSequence);
            }
        } else {
            // En route with both waypoints acked: keep the GPS waypoint
            // tracking the moving platform
            let fix = self.waypoint_fix(platform, pos);
            self.sender.send(&LinkCommand::GpsWaypoint {
                lat: fix.lat_int(),
                lon: fix.lon_int(),
            });
        }
    }

    /// Choose the fix to relay: raw platform GPS, or a prediction when the
    /// drone is too far out for the raw fix to be useful
    fn waypoint_fix(&mut self, platform: &PlatformState, pos: &PositionState) -> GpsCoordinate {
        let relay_too_imprecise = self.config.gps.prediction_enabled
            && pos.distance_m as f64 > self.config.gps.distance_threshold_m;

        if relay_too_imprecise {
            if let Some(estimate) = self.estimator.estimate() {
                return estimate;
            }
            if self.predictor.ready() {
                return self.predictor.predict();
            }
        }
        platform.gps
    }

    fn reset_pids(&mut self) {
        self.pid_x.reset();
        self.pid_y.reset();
        self.pid_z.reset();
        self.pid_yaw.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::decode;
    use crate::transport::MockTransport;
    use parking_lot::Mutex;
    use std::time::Instant;

    const SUFFIX: (u8, u8) = (0xEE, 0xEF);

    struct Harness {
        controller: PositionController,
        transport: MockTransport,
        position: Shared<PositionState>,
        platform: Shared<PlatformState>,
        telemetry: Shared<TelemetryState>,
    }

    fn harness() -> Harness {
        let mut config = AppConfig::defaults();
        config.landing.allowed_lost_frames = 3;

        let transport = MockTransport::new();
        let sender = Arc::new(LinkSender::new(
            vec![Box::new(transport.clone())],
            SUFFIX,
        ));
        let position: Shared<PositionState> = Arc::new(Mutex::new(PositionState::default()));
        let platform: Shared<PlatformState> = Arc::new(Mutex::new(PlatformState::default()));
        let telemetry: Shared<TelemetryState> = Arc::new(Mutex::new(TelemetryState::default()));
        let blackbox = Arc::new(Blackbox::new());
        let phase_code = Arc::new(AtomicU8::new(0));

        let controller = PositionController::new(
            config,
            sender,
            Arc::clone(&position),
            Arc::clone(&platform),
            Arc::clone(&telemetry),
            blackbox,
            phase_code,
        );

        Harness {
            controller,
            transport,
            position,
            platform,
            telemetry,
        }
    }

    /// Make both links live with healthy fixes
    fn make_links_live(h: &Harness) {
        {
            let mut platform = h.platform.lock();
            platform.platform_lost = false;
            platform.last_reply_time = Some(Instant::now());
            platform.gps.set_from_int(55_000_000, 37_000_000);
            platform.gps.set_satellites(9);
            platform.pressure = 101_325;
        }
        {
            let mut telemetry = h.telemetry.lock();
            telemetry.telemetry_lost = false;
            telemetry.last_frame_time = Some(Instant::now());
            telemetry.gps.set_from_int(55_000_100, 37_000_100);
            telemetry.gps.set_satellites(9);
        }
    }

    /// Decode all frames written to the mock transport
    fn sent_commands(transport: &MockTransport) -> Vec<u8> {
        let written = transport.get_written();
        written
            .chunks(12)
            .map(|chunk| {
                let mut frame = [0u8; 12];
                frame.copy_from_slice(chunk);
                decode(&frame).unwrap().0
            })
            .collect()
    }

    fn pose(x: f64, y: f64, z: f64, yaw: f64) -> Option<MarkerPose> {
        Some(MarkerPose { x, y, z, yaw })
    }

    #[test]
    fn test_idle_armed_with_pose_enters_stab() {
        let mut h = harness();
        make_links_live(&h);
        assert!(h.controller.set_armed(true));

        h.controller.proceed(pose(0.0, 0.0, 500.0, 0.0));

        let state = h.position.lock();
        assert_eq!(state.phase, FlightPhase::Stab);
        assert_eq!(state.setpoint_x, 0.0);
        assert_eq!(state.setpoint_y, 0.0);
        assert_eq!(state.setpoint_z, 500.0);
    }

    #[test]
    fn test_stab_sends_direct_control() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);
        h.controller.proceed(pose(0.0, 0.0, 500.0, 0.0));
        h.transport.clear_written();

        h.controller.proceed(pose(10.0, -5.0, 500.0, 0.0));

        let commands = sent_commands(&h.transport);
        assert_eq!(commands, vec![1]); // DIRECT_CONTROL
    }

    #[test]
    fn test_loss_escalation_emits_single_abort() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);
        h.controller.proceed(pose(0.0, 0.0, 500.0, 0.0));
        assert_eq!(h.position.lock().phase, FlightPhase::Stab);
        h.transport.clear_written();

        // allowed_lost_frames is 3: exactly three no-marker calls reach LOST
        h.controller.proceed(None);
        assert_eq!(h.position.lock().phase, FlightPhase::Prev);
        h.controller.proceed(None);
        assert_eq!(h.position.lock().phase, FlightPhase::Prev);
        h.controller.proceed(None);
        assert_eq!(h.position.lock().phase, FlightPhase::Lost);

        let aborts = sent_commands(&h.transport)
            .iter()
            .filter(|&&c| c == 6)
            .count();
        assert_eq!(aborts, 1);
    }

    #[test]
    fn test_marker_recovery_in_prev_reenters_stab() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);
        h.controller.proceed(pose(0.0, 0.0, 500.0, 0.0));
        h.controller.proceed(None);
        assert_eq!(h.position.lock().phase, FlightPhase::Prev);

        h.controller.proceed(pose(5.0, 5.0, 480.0, 0.0));
        let state = h.position.lock();
        assert_eq!(state.phase, FlightPhase::Stab);
        assert_eq!(state.setpoint_z, 480.0);
    }

    #[test]
    fn test_land_at_threshold_stops_motors() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);

        {
            let mut state = h.position.lock();
            state.phase = FlightPhase::Land;
            state.z = 5.0;
            state.setpoint_z = 5.0;
        }
        h.telemetry.lock().takeoff_detected = false;
        h.transport.clear_written();

        // Filtered altitude stays under motors_off_altitude (6.0)
        h.controller.proceed(pose(0.0, 0.0, 5.0, 0.0));

        let state = h.position.lock();
        assert_eq!(state.phase, FlightPhase::Done);
        let commands = sent_commands(&h.transport);
        assert!(commands.contains(&4)); // MOTORS_STOP
    }

    #[test]
    fn test_waypoint_handshake_pressure_first() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);
        h.position.lock().phase = FlightPhase::Waypoint;
        h.transport.clear_written();

        h.controller.proceed(None);

        let written = h.transport.get_written();
        let mut frame = [0u8; 12];
        frame.copy_from_slice(&written[..12]);
        let (command, payload) = decode(&frame).unwrap();
        assert_eq!(command, 2); // PRESSURE_WAYPOINT
        assert_eq!(
            i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
            101_325
        );
    }

    #[test]
    fn test_waypoint_uses_estimator_when_too_far() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);

        // Altitude waypoint acked, GPS waypoint pending
        h.telemetry.lock().altitude_waypoint_acked = true;

        // Drone far from the platform: beyond the 10 m threshold
        h.telemetry.lock().gps.set_from_int(55_010_000, 37_010_000);
        h.position.lock().phase = FlightPhase::Waypoint;

        // Warm the estimator with distinct fixes through proceed()
        for i in 0..6 {
            h.platform
                .lock()
                .gps
                .set_from_int(55_000_000 + i * 100, 37_000_000);
            h.controller.proceed(None);
        }
        assert!(h.controller.estimator.ready());

        h.transport.clear_written();
        h.platform.lock().gps.set_from_int(55_000_600, 37_000_000);
        h.controller.proceed(None);

        let written = h.transport.get_written();
        let mut frame = [0u8; 12];
        frame.copy_from_slice(&written[..12]);
        let (command, payload) = decode(&frame).unwrap();
        assert_eq!(command, 3); // GPS_WAYPOINT
        let lat = i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        // The estimator projects beyond the raw fix; the raw fix itself
        // would have been exactly 55_000_600
        assert_ne!(lat, 55_000_600);
    }

    #[test]
    fn test_waypoint_relays_raw_fix_when_close() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);
        {
            let mut telemetry = h.telemetry.lock();
            telemetry.altitude_waypoint_acked = true;
            // Drone a couple of meters out: under the 10 m threshold
            telemetry.gps.set_from_int(55_000_015, 37_000_015);
        }
        h.position.lock().phase = FlightPhase::Waypoint;
        h.transport.clear_written();

        h.controller.proceed(None);

        let written = h.transport.get_written();
        let mut frame = [0u8; 12];
        frame.copy_from_slice(&written[..12]);
        let (command, payload) = decode(&frame).unwrap();
        assert_eq!(command, 3);
        let lat = i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        assert_eq!(lat, 55_000_000);
    }

    #[test]
    fn test_takeoff_start_sequence_after_both_acks() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);
        {
            let mut telemetry = h.telemetry.lock();
            telemetry.altitude_waypoint_acked = true;
            telemetry.gps_waypoint_acked = true;
            telemetry.takeoff_detected = false;
        }
        h.position.lock().phase = FlightPhase::Takeoff;
        h.transport.clear_written();

        h.controller.proceed(None);
        assert_eq!(sent_commands(&h.transport), vec![5]); // START_SEQUENCE

        // Once airborne the phase falls through to WAYPOINT
        h.telemetry.lock().takeoff_detected = true;
        h.controller.proceed(None);
        assert_eq!(h.position.lock().phase, FlightPhase::Waypoint);
    }

    #[test]
    fn test_lost_with_live_links_hands_over_to_waypoints() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);
        h.position.lock().phase = FlightPhase::Lost;
        h.transport.clear_written();

        h.controller.proceed(None);

        assert_eq!(h.position.lock().phase, FlightPhase::Waypoint);
        assert_eq!(sent_commands(&h.transport), vec![0]); // IDLE
    }

    #[test]
    fn test_lost_with_dead_links_repeats_abort() {
        let mut h = harness();
        make_links_live(&h);
        h.controller.set_armed(true);
        h.platform.lock().platform_lost = true;
        h.position.lock().phase = FlightPhase::Lost;
        h.transport.clear_written();

        h.controller.proceed(None);
        h.controller.proceed(None);

        assert_eq!(h.position.lock().phase, FlightPhase::Lost);
        assert_eq!(sent_commands(&h.transport), vec![6, 6]);
    }

    #[test]
    fn test_arming_refused_when_platform_lost() {
        let mut h = harness();
        // Platform stays lost
        assert!(!h.controller.set_armed(true));
        assert!(!h.controller.is_armed());
        assert_eq!(h.controller.arm_error(), "No communication with the platform");
    }

    #[test]
    fn test_arming_edges_reset_phase_and_send_idle() {
        let mut h = harness();
        make_links_live(&h);
        h.position.lock().phase = FlightPhase::Stab;

        assert!(h.controller.set_armed(true));
        assert_eq!(h.position.lock().phase, FlightPhase::Idle);
        assert_eq!(sent_commands(&h.transport), vec![0]); // IDLE (not airborne)

        h.transport.clear_written();
        h.controller.set_armed(false);
        assert_eq!(sent_commands(&h.transport), vec![0]);
        assert_eq!(h.position.lock().phase, FlightPhase::Idle);
    }

    #[test]
    fn test_arming_airborne_drone_sends_abort() {
        let mut h = harness();
        make_links_live(&h);
        h.telemetry.lock().takeoff_detected = true;

        assert!(h.controller.set_armed(true));
        assert_eq!(sent_commands(&h.transport), vec![6]); // ABORT
    }

    #[test]
    fn test_disarmed_idle_keeps_sending_idle() {
        let mut h = harness();
        make_links_live(&h);

        h.controller.proceed(None);

        assert_eq!(h.position.lock().phase, FlightPhase::Idle);
        assert_eq!(sent_commands(&h.transport), vec![0]);
    }
}
