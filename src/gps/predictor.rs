//! Dead-reckoning GPS predictor
//!
//! Fits a line through the previous and current fix, then extrapolates one
//! step of the same length along the same heading. Works in raw 1e-6 degree
//! integer units; at platform scales the latitude/longitude anisotropy is
//! below GPS noise.

use crate::geo::GpsCoordinate;

/// Two-fix linear extrapolator
#[derive(Debug, Default)]
pub struct GpsPredictor {
    last: GpsCoordinate,
    current: GpsCoordinate,
    heading: f64,
}

impl GpsPredictor {
    /// Create an empty predictor
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift the current fix into history and store a new current fix
    pub fn push_fix(&mut self, fix: &GpsCoordinate) {
        if self.current.is_initialized() {
            self.last = self.current;
        }
        self.current = *fix;
    }

    /// True once two fixes are available
    pub fn ready(&self) -> bool {
        self.last.is_initialized() && self.current.is_initialized()
    }

    /// Heading of the last-to-current step in radians
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Override the heading (e.g. from a compass reading)
    pub fn set_heading(&mut self, heading_radians: f64) {
        self.heading = heading_radians;
    }

    /// Recompute the heading from the stored fixes
    ///
    /// Keeps the previous heading when the fixes coincide, a stationary
    /// platform has no direction of travel.
    pub fn update_heading(&mut self) {
        if !self.ready() {
            return;
        }
        let d_lat = (self.last.lat_int() - self.current.lat_int()) as f64;
        let d_lon = (self.last.lon_int() - self.current.lon_int()) as f64;
        if d_lat != 0.0 || d_lon != 0.0 {
            self.heading = d_lat.atan2(d_lon) + std::f64::consts::FRAC_PI_2;
        }
    }

    /// Extrapolate one step beyond the current fix
    pub fn predict(&self) -> GpsCoordinate {
        let step = if self.ready() {
            let d_lat = (self.last.lat_int() - self.current.lat_int()) as f64;
            let d_lon = (self.last.lon_int() - self.current.lon_int()) as f64;
            (d_lat * d_lat + d_lon * d_lon).sqrt()
        } else {
            0.0
        };

        GpsCoordinate::from_int(
            self.current.lat_int() + (step * self.heading.cos()) as i32,
            self.current.lon_int() + (step * -self.heading.sin()) as i32,
        )
    }
}
