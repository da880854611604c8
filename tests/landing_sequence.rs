//! Full landing session against mock transports
//!
//! Drives the controller through an entire sequence the way a real session
//! runs it: arm, waypoint handshake, takeoff, marker acquisition, optical
//! stabilization, descent, touchdown. Telemetry acknowledgements are
//! simulated the way the drone firmware reports them.

use avataran::blackbox::Blackbox;
use avataran::config::AppConfig;
use avataran::controller::PositionController;
use avataran::link::{decode, LinkSender};
use avataran::state::{
    FlightPhase, MarkerPose, PlatformState, PositionState, Shared, TelemetryState,
};
use avataran::transport::MockTransport;
use parking_lot::Mutex;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::time::Instant;

const SUFFIX: (u8, u8) = (0xEE, 0xEF);

struct Session {
    controller: PositionController,
    transport: MockTransport,
    position: Shared<PositionState>,
    platform: Shared<PlatformState>,
    telemetry: Shared<TelemetryState>,
}

fn session() -> Session {
    let mut config = AppConfig::defaults();
    config.landing.allowed_lost_frames = 5;
    config.landing.decrement = 1.0;

    let transport = MockTransport::new();
    let sender = Arc::new(LinkSender::new(
        vec![Box::new(transport.clone())],
        SUFFIX,
    ));
    let position: Shared<PositionState> = Arc::new(Mutex::new(PositionState::default()));
    let platform: Shared<PlatformState> = Arc::new(Mutex::new(PlatformState::default()));
    let telemetry: Shared<TelemetryState> = Arc::new(Mutex::new(TelemetryState::default()));

    {
        let mut p = platform.lock();
        p.platform_lost = false;
        p.last_reply_time = Some(Instant::now());
        p.gps.set_from_int(55_000_000, 37_000_000);
        p.gps.set_satellites(10);
        p.pressure = 101_325;
    }
    {
        let mut t = telemetry.lock();
        t.telemetry_lost = false;
        t.last_frame_time = Some(Instant::now());
        t.gps.set_from_int(55_000_050, 37_000_050);
        t.gps.set_satellites(10);
    }

    let controller = PositionController::new(
        config,
        sender,
        Arc::clone(&position),
        Arc::clone(&platform),
        Arc::clone(&telemetry),
        Arc::new(Blackbox::new()),
        Arc::new(AtomicU8::new(0)),
    );

    Session {
        controller,
        transport,
        position,
        platform,
        telemetry,
    }
}

fn last_command(transport: &MockTransport) -> Option<u8> {
    let written = transport.get_written();
    if written.len() < 12 {
        return None;
    }
    let mut frame = [0u8; 12];
    frame.copy_from_slice(&written[written.len() - 12..]);
    Some(decode(&frame).expect("valid frame").0)
}

fn phase(session: &Session) -> FlightPhase {
    session.position.lock().phase
}

#[test]
fn full_session_from_arm_to_touchdown() {
    let mut s = session();

    // Arm on the ground: IDLE goes out, phase stays IDLE until a frame ticks
    assert!(s.controller.set_armed(true));
    assert_eq!(phase(&s), FlightPhase::Idle);
    assert_eq!(last_command(&s.transport), Some(0));

    // First no-marker tick: sequence starts, pressure waypoint goes out
    s.controller.proceed(None);
    assert_eq!(phase(&s), FlightPhase::Takeoff);
    assert_eq!(last_command(&s.transport), Some(2));

    // Drone acknowledges the altitude waypoint: GPS waypoint follows
    s.telemetry.lock().altitude_waypoint_acked = true;
    s.controller.proceed(None);
    assert_eq!(last_command(&s.transport), Some(3));

    // Drone acknowledges the GPS waypoint: takeoff command goes out
    s.telemetry.lock().gps_waypoint_acked = true;
    s.controller.proceed(None);
    assert_eq!(last_command(&s.transport), Some(5));

    // Airborne: the phase falls through to waypoint flight
    s.telemetry.lock().takeoff_detected = true;
    s.controller.proceed(None);
    assert_eq!(phase(&s), FlightPhase::Waypoint);

    // En route the GPS waypoint keeps tracking the platform
    s.controller.proceed(None);
    assert_eq!(last_command(&s.transport), Some(3));

    // Marker acquired above the pad: stabilization captures the setpoints
    s.controller.proceed(Some(MarkerPose {
        x: 100.0,
        y: 80.0,
        z: 20.0,
        yaw: 0.0,
    }));
    assert_eq!(phase(&s), FlightPhase::Stab);
    {
        let pos = s.position.lock();
        assert_eq!(pos.setpoint_x, 100.0);
        assert_eq!(pos.setpoint_y, 80.0);
        assert_eq!(pos.setpoint_z, 20.0);
    }

    // Hold above the pad: aligned within tolerance, the descent begins and
    // the altitude setpoint walks down while direct control streams out
    let mut reached_done = false;
    for _ in 0..120 {
        // The drone tracks its setpoint; its own landing detector clears
        // the takeoff flag close to the deck
        let z = s.position.lock().setpoint_z;
        if z < 7.0 {
            s.telemetry.lock().takeoff_detected = false;
        }
        s.controller.proceed(Some(MarkerPose {
            x: 100.0,
            y: 80.0,
            z,
            yaw: 0.0,
        }));
        if phase(&s) == FlightPhase::Done {
            reached_done = true;
            break;
        }
        assert_eq!(last_command(&s.transport), Some(1)); // DIRECT_CONTROL
    }

    assert!(reached_done, "descent never reached DONE");
    assert_eq!(last_command(&s.transport), Some(4)); // MOTORS_STOP

    // Terminal state: further frames only request telemetry
    s.controller.proceed(None);
    assert_eq!(last_command(&s.transport), Some(0));
    assert_eq!(phase(&s), FlightPhase::Done);
}

#[test]
fn marker_loss_mid_descent_aborts_then_recovers_to_waypoints() {
    let mut s = session();
    assert!(s.controller.set_armed(true));
    s.telemetry.lock().takeoff_detected = true;

    // Acquire the marker mid-flight
    s.position.lock().phase = FlightPhase::Waypoint;
    s.controller.proceed(Some(MarkerPose {
        x: 0.0,
        y: 0.0,
        z: 200.0,
        yaw: 0.0,
    }));
    assert_eq!(phase(&s), FlightPhase::Stab);

    // Lose it for the full allowance (5 frames)
    for _ in 0..4 {
        s.controller.proceed(None);
        assert_eq!(phase(&s), FlightPhase::Prev);
    }
    s.controller.proceed(None);
    assert_eq!(phase(&s), FlightPhase::Lost);
    assert_eq!(last_command(&s.transport), Some(6)); // ABORT

    // Links are live: the sequence degrades to GPS waypoint flight
    s.controller.proceed(None);
    assert_eq!(phase(&s), FlightPhase::Waypoint);
}
