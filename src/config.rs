//! Configuration for the landing controller
//!
//! Loaded from a TOML file at startup. A malformed file or a missing required
//! section is a fatal startup error: the controller never starts in a
//! partially configured state.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub telemetry: TelemetryConfig,
    pub platform: PlatformConfig,
    pub pid: PidConfig,
    pub landing: LandingConfig,
    pub gps: GpsConfig,
    pub logging: LoggingConfig,
}

/// Drone command-link configuration
///
/// Frames are broadcast to every configured transport. Both may be active at
/// once: the duplication is a deliberate redundancy strategy, the drone
/// ignores repeated frames.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Serial port for the drone link (empty string disables)
    pub serial_port: String,
    /// Serial baud rate
    pub serial_baud: u32,
    /// UDP peer address for the drone link, e.g. "192.168.9.1:1337" (empty disables)
    pub udp_address: String,
    /// Frame suffix byte 1 (also telemetry sync byte 1)
    pub suffix_1: u8,
    /// Frame suffix byte 2 (also telemetry sync byte 2)
    pub suffix_2: u8,
}

/// Drone telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Serial port carrying the telemetry stream (empty string disables)
    pub serial_port: String,
    /// Serial baud rate
    pub serial_baud: u32,
    /// UDP listen address for telemetry, e.g. "0.0.0.0:1338" (empty disables)
    pub udp_address: String,
    /// Telemetry considered lost after this many milliseconds without a valid frame
    pub lost_timeout_ms: u64,
    /// Whether telemetry gates arming and landing (false allows bench runs
    /// with no drone telemetry wired up)
    pub required: bool,
}

/// Landing-platform link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// Serial port for the platform link
    pub serial_port: String,
    /// Serial baud rate
    pub serial_baud: u32,
    /// Interval between poll cycles in milliseconds
    pub poll_interval_ms: u64,
    /// Per-request reply timeout in milliseconds
    pub reply_timeout_ms: u64,
    /// Platform considered lost after this many milliseconds without a reply
    pub lost_timeout_ms: u64,
    /// Illumination below which the platform backlight is switched on
    pub light_enable_threshold: f64,
    /// Illumination above which the platform backlight is switched off
    pub light_disable_threshold: f64,
    /// Low-pass factor (0-1) applied to the platform speed reading
    pub speed_filter: f64,
}

/// Per-axis PID tables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PidConfig {
    pub x: PidAxisConfig,
    pub y: PidAxisConfig,
    pub z: PidAxisConfig,
    pub yaw: PidAxisConfig,
}

/// Gains and limits of one PID axis
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PidAxisConfig {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    /// Feed-forward gain applied to the setpoint
    pub f: f64,
    /// Invert the sense of the axis
    pub reversed: bool,
    /// Maximum output change per frame (0 disables)
    pub ramp: f64,
    /// Symmetric output clamp (0 disables)
    pub limit: f64,
}

/// Optical landing behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LandingConfig {
    /// Whether the final descent is allowed at all
    pub allowed: bool,
    /// Consecutive frames without the marker before the sequence aborts
    pub allowed_lost_frames: u32,
    /// Exponential filter factor (0-1) blending new marker poses into the
    /// filtered position; higher keeps more of the old value
    pub input_filter: f64,
    /// Exponential factor (0-1) blending the hold setpoint toward the
    /// platform's live absolute position
    pub alignment_factor: f64,
    /// Horizontal tolerance for starting/continuing the descent (marker units)
    pub allowed_range_xy: f64,
    /// Yaw tolerance for starting/continuing the descent (degrees)
    pub allowed_range_yaw: f64,
    /// Altitude setpoint decrement per frame while descending
    pub decrement: f64,
    /// Filtered altitude at or below which the motors are stopped
    pub motors_off_altitude: f64,
}

/// GPS relay and prediction behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GpsConfig {
    /// Use the estimator instead of the raw platform fix when the
    /// drone-platform distance exceeds `distance_threshold_m`
    pub prediction_enabled: bool,
    /// Distance in meters above which the raw fix is considered too imprecise
    pub distance_threshold_m: f64,
    /// Planet radius in kilometers for geodesic distances
    pub planet_radius_km: f64,
    /// Minimum satellites on both fixes before arming is allowed
    pub min_satellites: u8,
    /// Maximum platform ground speed in km/h at which arming is allowed
    pub max_platform_speed: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject configurations that cannot produce a working session
    fn validate(&self) -> Result<()> {
        use crate::error::Error;

        if self.link.serial_port.is_empty() && self.link.udp_address.is_empty() {
            return Err(Error::InvalidParameter(
                "no drone link transport configured (link.serial_port / link.udp_address)".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.landing.input_filter) {
            return Err(Error::InvalidParameter(
                "landing.input_filter must be within 0..=1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.landing.alignment_factor) {
            return Err(Error::InvalidParameter(
                "landing.alignment_factor must be within 0..=1".into(),
            ));
        }
        if self.landing.allowed_lost_frames == 0 {
            return Err(Error::InvalidParameter(
                "landing.allowed_lost_frames must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Defaults matching the reference ground station wiring
    pub fn defaults() -> Self {
        Self {
            link: LinkConfig {
                serial_port: "/dev/ttyUSB0".to_string(),
                serial_baud: 57600,
                udp_address: String::new(),
                suffix_1: 0xEE,
                suffix_2: 0xEF,
            },
            telemetry: TelemetryConfig {
                serial_port: "/dev/ttyUSB0".to_string(),
                serial_baud: 57600,
                udp_address: String::new(),
                lost_timeout_ms: 1000,
                required: true,
            },
            platform: PlatformConfig {
                serial_port: "/dev/ttyUSB1".to_string(),
                serial_baud: 57600,
                poll_interval_ms: 100,
                reply_timeout_ms: 200,
                lost_timeout_ms: 1000,
                light_enable_threshold: 300.0,
                light_disable_threshold: 600.0,
                speed_filter: 0.7,
            },
            pid: PidConfig {
                x: PidAxisConfig {
                    p: 0.3,
                    i: 0.003,
                    d: 1.0,
                    f: 0.0,
                    reversed: false,
                    ramp: 10.0,
                    limit: 300.0,
                },
                y: PidAxisConfig {
                    p: 0.3,
                    i: 0.003,
                    d: 1.0,
                    f: 0.0,
                    reversed: true,
                    ramp: 10.0,
                    limit: 300.0,
                },
                z: PidAxisConfig {
                    p: 0.6,
                    i: 0.005,
                    d: 2.0,
                    f: 0.0,
                    reversed: true,
                    ramp: 10.0,
                    limit: 200.0,
                },
                yaw: PidAxisConfig {
                    p: 1.5,
                    i: 0.002,
                    d: 0.5,
                    f: 0.0,
                    reversed: false,
                    ramp: 10.0,
                    limit: 150.0,
                },
            },
            landing: LandingConfig {
                allowed: true,
                allowed_lost_frames: 90,
                input_filter: 0.8,
                alignment_factor: 0.95,
                allowed_range_xy: 30.0,
                allowed_range_yaw: 10.0,
                decrement: 0.5,
                motors_off_altitude: 6.0,
            },
            gps: GpsConfig {
                prediction_enabled: true,
                distance_threshold_m: 10.0,
                planet_radius_km: 6371.0,
                min_satellites: 5,
                max_platform_speed: 60.0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.link.suffix_1, 0xEE);
        assert_eq!(config.landing.allowed_lost_frames, 90);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[link]"));
        assert!(toml_string.contains("[pid.x]"));
        assert!(toml_string.contains("[landing]"));

        let parsed: AppConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.platform.poll_interval_ms, config.platform.poll_interval_ms);
        assert_eq!(parsed.pid.y.reversed, config.pid.y.reversed);
    }

    #[test]
    fn test_bad_filter_factor_rejected() {
        let mut config = AppConfig::defaults();
        config.landing.input_filter = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_no_link_transport_rejected() {
        let mut config = AppConfig::defaults();
        config.link.serial_port.clear();
        config.link.udp_address.clear();
        assert!(config.validate().is_err());
    }
}
