//! Landing platform communication
//!
//! One poll cycle runs per controller tick: illumination query, backlight
//! decision, camera exposure recompute, motion query, status push. Every
//! step is bounded by the same reply timeout; a timed-out step is skipped
//! for that tick, never retried within it. The platform lost flag derives
//! purely from elapsed time since the last valid reply.

mod protocol;

pub use protocol::{parse_value, PlatformClient};

use crate::config::PlatformConfig;
use crate::state::{PlatformState, Shared};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Exposure changes smaller than this are not re-applied to the camera
const EXPOSURE_APPLY_THRESHOLD: f64 = 0.2;

/// Derive camera exposure from an illumination reading
fn exposure_from_illumination(illumination: f64) -> f64 {
    -(((illumination - 760.0) / 130.0).exp() + 8.0)
}

/// Platform poll loop
pub struct PlatformPoller {
    client: PlatformClient,
    state: Shared<PlatformState>,
    config: PlatformConfig,
    timeout: Duration,
}

impl PlatformPoller {
    /// Create a poller over an open platform transport
    pub fn new(
        transport: Box<dyn Transport>,
        state: Shared<PlatformState>,
        config: PlatformConfig,
    ) -> Self {
        let timeout = Duration::from_millis(config.reply_timeout_ms);
        PlatformPoller {
            client: PlatformClient::new(transport),
            state,
            config,
            timeout,
        }
    }

    /// Run one full poll cycle, reporting `phase_code` to the platform
    pub fn poll_cycle(&mut self, phase_code: u8) {
        self.poll_illumination();
        self.poll_motion();
        self.push_status(phase_code);
    }

    /// Illumination query, backlight decision and exposure recompute
    fn poll_illumination(&mut self) {
        let reply = match self.client.exchange("L0\n", self.timeout) {
            Ok(Some(reply)) => reply,
            Ok(None) => return, // No data this tick, skip the update
            Err(e) => {
                log::error!("Platform illumination request failed: {}", e);
                return;
            }
        };

        let Some(illumination) = parse_value(&reply, 'L') else {
            log::warn!("Platform reply without illumination value: {:?}", reply);
            return;
        };

        let backlight = {
            let mut state = self.state.lock();
            state.illumination = illumination;
            state.mark_reply();

            // Hysteresis between the two thresholds keeps the light stable
            if illumination < self.config.light_enable_threshold && !state.backlight {
                state.backlight = true;
                Some(true)
            } else if illumination > self.config.light_disable_threshold && state.backlight {
                state.backlight = false;
                Some(false)
            } else {
                None
            }
        };

        if let Some(on) = backlight {
            let command = if on { "M3\n" } else { "M5\n" };
            log::info!("Platform backlight {}", if on { "on" } else { "off" });
            if let Err(e) = self.client.exchange(command, self.timeout) {
                log::error!("Platform backlight request failed: {}", e);
            }
        }

        // Re-apply exposure only on a meaningful change, the camera driver
        // does not take kindly to being reprogrammed every tick
        let exposure = exposure_from_illumination(illumination);
        let mut state = self.state.lock();
        if (exposure - state.camera_exposure).abs() > EXPOSURE_APPLY_THRESHOLD {
            log::debug!(
                "Camera exposure {:.2} -> {:.2} (illumination {:.1})",
                state.camera_exposure,
                exposure,
                illumination
            );
            state.camera_exposure = exposure;
        }
    }

    /// Speed and GPS query
    fn poll_motion(&mut self) {
        let reply = match self.client.exchange("L1\n", self.timeout) {
            Ok(Some(reply)) => reply,
            Ok(None) => return,
            Err(e) => {
                log::error!("Platform motion request failed: {}", e);
                return;
            }
        };

        let mut state = self.state.lock();

        if let Some(speed) = parse_value(&reply, 'S') {
            // Low-pass: GPS speed readings jitter hard at walking pace
            state.speed = state.speed * self.config.speed_filter
                + speed * (1.0 - self.config.speed_filter);
            state.gps.set_ground_speed(speed);
        }

        if let (Some(lat), Some(lon)) = (parse_value(&reply, 'A'), parse_value(&reply, 'O')) {
            state.gps.set_from_int(lat as i32, lon as i32);
        }
        if let Some(satellites) = parse_value(&reply, 'N') {
            state.gps.set_satellites(satellites as u8);
        }
        if let Some(pressure) = parse_value(&reply, 'P') {
            state.pressure = pressure as i32;
        }

        state.mark_reply();
    }

    /// Report the current flight phase
    fn push_status(&mut self, phase_code: u8) {
        let request = format!("L2 S{}\n", phase_code);
        match self.client.exchange(&request, self.timeout) {
            Ok(Some(_)) => self.state.lock().mark_reply(),
            Ok(None) => {}
            Err(e) => log::error!("Platform status push failed: {}", e),
        }
    }

    /// Flip the lost flag when the staleness window has elapsed
    fn check_staleness(&self) {
        let mut state = self.state.lock();
        if state.platform_lost {
            return;
        }
        let stale = match state.last_reply_time {
            Some(t) => t.elapsed() >= Duration::from_millis(self.config.lost_timeout_ms),
            None => true,
        };
        if stale {
            log::warn!("Platform communication lost!");
            state.platform_lost = true;
        }
    }

    /// Turn the backlight off and push a final idle status
    pub fn shutdown(&mut self) {
        log::info!("Turning off platform communication");
        let _ = self.client.exchange("M5\n", self.timeout);
        let _ = self.client.exchange("L2 S0\n", self.timeout);
        self.state.lock().backlight = false;
    }
}

/// Spawn the platform poll thread
///
/// `phase_code` is the controller-maintained phase byte pushed with each
/// status report.
pub fn spawn_platform_thread(
    mut poller: PlatformPoller,
    phase_code: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let interval = Duration::from_millis(poller.config.poll_interval_ms);

    thread::Builder::new()
        .name("platform".to_string())
        .spawn(move || {
            log::info!("Platform thread started");

            while !stop.load(Ordering::Relaxed) {
                let cycle_start = Instant::now();

                poller.check_staleness();
                poller.poll_cycle(phase_code.load(Ordering::Relaxed));

                let elapsed = cycle_start.elapsed();
                if elapsed < interval {
                    thread::sleep(interval - elapsed);
                }
            }

            poller.shutdown();
            log::info!("Platform thread stopped");
        })
        .expect("Failed to spawn platform thread")
}
