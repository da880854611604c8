//! Application orchestration
//!
//! Wires the transports, state records and loops together: the telemetry
//! receive thread, the platform poll thread and the controller. Every loop
//! observes one shared stop flag once per iteration; no loop is preempted
//! mid-unit, a session abort lets each finish its current frame, poll
//! round-trip or decode step.

use crate::blackbox::Blackbox;
use crate::config::AppConfig;
use crate::controller::PositionController;
use crate::error::{Error, Result};
use crate::link::LinkSender;
use crate::platform::{spawn_platform_thread, PlatformPoller};
use crate::state::{PlatformState, PositionState, Shared, TelemetryState};
use crate::telemetry::spawn_telemetry_thread;
use crate::transport::{SerialTransport, Transport, UdpTransport};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Pace of the stand-in vision tick when no camera collaborator is attached
///
/// A real deployment drives the controller through [`App::controller`] once
/// per captured frame; headless runs still need the waypoint/escalation
/// logic ticking.
const FRAME_TICK: Duration = Duration::from_millis(33);

/// Serial open timeout shared by all links
const SERIAL_TIMEOUT: Duration = Duration::from_millis(10);

/// Main application: owns every component of a session
pub struct App {
    config: AppConfig,
    position: Shared<PositionState>,
    platform: Shared<PlatformState>,
    telemetry: Shared<TelemetryState>,
    controller: Arc<Mutex<PositionController>>,
    blackbox: Arc<Blackbox>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl App {
    /// Build a session from configuration
    ///
    /// Opening any configured transport is all-or-nothing: a transport that
    /// cannot be opened aborts startup (no partial-degraded sessions).
    pub fn new(config: AppConfig) -> Result<Self> {
        log::info!("Initializing landing controller");

        // Drone command link: broadcast to every configured transport
        let mut link_transports: Vec<Box<dyn Transport>> = Vec::new();
        if !config.link.serial_port.is_empty() {
            link_transports.push(Box::new(SerialTransport::open(
                &config.link.serial_port,
                config.link.serial_baud,
                SERIAL_TIMEOUT,
            )?));
        }
        if !config.link.udp_address.is_empty() {
            link_transports.push(Box::new(UdpTransport::open(
                &config.link.udp_address,
                SERIAL_TIMEOUT,
            )?));
        }
        if link_transports.is_empty() {
            return Err(Error::TransportUnavailable(
                "no drone link transport configured".into(),
            ));
        }
        log::info!("Drone link ready ({} transport(s))", link_transports.len());

        let suffix = (config.link.suffix_1, config.link.suffix_2);
        let sender = Arc::new(LinkSender::new(link_transports, suffix));

        let position: Shared<PositionState> = Arc::new(Mutex::new(PositionState::default()));
        let platform: Shared<PlatformState> = Arc::new(Mutex::new(PlatformState::default()));
        let telemetry: Shared<TelemetryState> = Arc::new(Mutex::new(TelemetryState::default()));
        let blackbox = Arc::new(Blackbox::new());
        let phase_code = Arc::new(AtomicU8::new(0));

        let controller = Arc::new(Mutex::new(PositionController::new(
            config.clone(),
            Arc::clone(&sender),
            Arc::clone(&position),
            Arc::clone(&platform),
            Arc::clone(&telemetry),
            Arc::clone(&blackbox),
            Arc::clone(&phase_code),
        )));

        let stop = Arc::new(AtomicBool::new(false));
        let mut threads = Vec::new();

        // Telemetry receive loop
        match Self::open_telemetry_transport(&config)? {
            Some(transport) => {
                threads.push(spawn_telemetry_thread(
                    transport,
                    Arc::clone(&telemetry),
                    suffix,
                    Duration::from_millis(config.telemetry.lost_timeout_ms),
                    Arc::clone(&stop),
                ));
            }
            None => {
                if config.telemetry.required {
                    return Err(Error::TransportUnavailable(
                        "telemetry is required but no telemetry transport is configured".into(),
                    ));
                }
                log::warn!("No telemetry transport configured, telemetry stays lost");
            }
        }

        // Platform poll loop
        let platform_transport = SerialTransport::open(
            &config.platform.serial_port,
            config.platform.serial_baud,
            SERIAL_TIMEOUT,
        )?;
        let poller = PlatformPoller::new(
            Box::new(platform_transport),
            Arc::clone(&platform),
            config.platform.clone(),
        );
        threads.push(spawn_platform_thread(
            poller,
            Arc::clone(&phase_code),
            Arc::clone(&stop),
        ));

        log::info!("Hardware initialized successfully");

        Ok(App {
            config,
            position,
            platform,
            telemetry,
            controller,
            blackbox,
            stop,
            threads,
        })
    }

    fn open_telemetry_transport(config: &AppConfig) -> Result<Option<Box<dyn Transport>>> {
        if !config.telemetry.serial_port.is_empty() {
            return Ok(Some(Box::new(SerialTransport::open(
                &config.telemetry.serial_port,
                config.telemetry.serial_baud,
                SERIAL_TIMEOUT,
            )?)));
        }
        if !config.telemetry.udp_address.is_empty() {
            return Ok(Some(Box::new(UdpTransport::listen(
                &config.telemetry.udp_address,
                SERIAL_TIMEOUT,
            )?)));
        }
        Ok(None)
    }

    /// Controller handle for the vision collaborator
    ///
    /// The camera loop calls `lock().proceed(...)` once per captured frame.
    pub fn controller(&self) -> Arc<Mutex<PositionController>> {
        Arc::clone(&self.controller)
    }

    /// Blackbox handle for the session logger collaborator
    pub fn blackbox(&self) -> Arc<Blackbox> {
        Arc::clone(&self.blackbox)
    }

    /// Snapshot accessors for display/API collaborators
    pub fn position_snapshot(&self) -> crate::state::PositionSnapshot {
        self.position.lock().snapshot()
    }

    /// Platform state snapshot
    pub fn platform_snapshot(&self) -> crate::state::PlatformSnapshot {
        self.platform.lock().snapshot()
    }

    /// Telemetry snapshot (also the JSON summary source)
    pub fn telemetry_snapshot(&self) -> crate::state::TelemetrySnapshot {
        self.telemetry.lock().snapshot()
    }

    /// Install the Ctrl-C handler flipping the stop flag
    pub fn install_signal_handler(&self) -> Result<()> {
        let stop = Arc::clone(&self.stop);
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal");
            stop.store(true, Ordering::Relaxed);
        })
        .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))
    }

    /// Run until the stop flag flips
    ///
    /// When no vision collaborator is attached the loop doubles as a
    /// stand-in frame tick, driving the controller with "no marker" so the
    /// waypoint handshake and loss escalation stay alive.
    pub fn run(&mut self) -> Result<()> {
        log::info!("Landing controller running, press Ctrl+C to stop");

        let mut last_stats = Instant::now();

        while !self.stop.load(Ordering::Relaxed) {
            {
                let mut controller = self.controller.lock();
                controller.proceed(None);
            }

            if last_stats.elapsed().as_secs() >= 10 {
                self.log_statistics();
                last_stats = Instant::now();
            }

            std::thread::sleep(FRAME_TICK);
        }

        self.shutdown();
        Ok(())
    }

    /// Log a periodic status line
    fn log_statistics(&self) {
        let position = self.position.lock();
        let platform = self.platform.lock();
        let telemetry = self.telemetry.lock();
        log::info!(
            "Phase {} | battery {:.1} V | altitude {} | platform {} ({} replies) | telemetry {} ({} frames)",
            position.phase.as_str(),
            telemetry.battery_voltage,
            telemetry.altitude,
            if platform.platform_lost { "lost" } else { "live" },
            platform.packets,
            if telemetry.telemetry_lost { "lost" } else { "live" },
            telemetry.packets,
        );
    }

    /// Stop all loops and leave the drone in a safe state
    fn shutdown(&mut self) {
        log::info!("Shutting down...");
        self.stop.store(true, Ordering::Relaxed);

        {
            let mut controller = self.controller.lock();
            controller.set_armed(false);
        }

        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }

        log::info!("Landing controller stopped");
    }

    /// Effective configuration of this session
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
