//! GPS coordinate value type
//!
//! Coordinates are stored as signed fixed-point integers in 1e-6 degree units
//! (the wire format of both the drone and platform links) with derived
//! floating-point degree views. Both views stay consistent after any mutator.

/// GPS fix with fixed-point and floating views kept in sync
///
/// A freshly created coordinate is uninitialized and distinguishable from an
/// actual fix at (0, 0): distance and prediction code must ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsCoordinate {
    lat_int: i32,
    lon_int: i32,
    lat_deg: f64,
    lon_deg: f64,
    satellites: u8,
    ground_speed: f64,
    ground_heading: f64,
    initialized: bool,
}

impl GpsCoordinate {
    /// Create an uninitialized coordinate
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinate from fixed-point integer units
    pub fn from_int(lat: i32, lon: i32) -> Self {
        let mut gps = Self::default();
        gps.set_from_int(lat, lon);
        gps
    }

    /// Store new coordinates from fixed-point integers (1e-6 degree units)
    ///
    /// Valid latitude range is -90_000_000..=90_000_000, longitude
    /// -180_000_000..=180_000_000.
    pub fn set_from_int(&mut self, lat: i32, lon: i32) {
        self.lat_int = lat;
        self.lon_int = lon;
        self.lat_deg = lat as f64 / 1_000_000.0;
        self.lon_deg = lon as f64 / 1_000_000.0;
        self.initialized = true;
    }

    /// Store new coordinates from floating degrees
    pub fn set_from_degrees(&mut self, lat: f64, lon: f64) {
        self.lat_deg = lat;
        self.lon_deg = lon;
        self.lat_int = (lat * 1_000_000.0) as i32;
        self.lon_int = (lon * 1_000_000.0) as i32;
        self.initialized = true;
    }

    /// Latitude in 1e-6 degree units
    pub fn lat_int(&self) -> i32 {
        self.lat_int
    }

    /// Longitude in 1e-6 degree units
    pub fn lon_int(&self) -> i32 {
        self.lon_int
    }

    /// Latitude in degrees
    pub fn lat_deg(&self) -> f64 {
        self.lat_deg
    }

    /// Longitude in degrees
    pub fn lon_deg(&self) -> f64 {
        self.lon_deg
    }

    /// True once a fix has been stored
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of visible satellites
    pub fn satellites(&self) -> u8 {
        self.satellites
    }

    /// Set number of visible satellites
    pub fn set_satellites(&mut self, satellites: u8) {
        self.satellites = satellites;
    }

    /// Ground speed in km/h
    pub fn ground_speed(&self) -> f64 {
        self.ground_speed
    }

    /// Set ground speed in km/h
    pub fn set_ground_speed(&mut self, speed: f64) {
        self.ground_speed = speed;
    }

    /// Ground heading in degrees
    pub fn ground_heading(&self) -> f64 {
        self.ground_heading
    }

    /// Set ground heading in degrees
    pub fn set_ground_heading(&mut self, heading: f64) {
        self.ground_heading = heading;
    }
}

/// Great-circle distance between two fixes in meters
///
/// Haversine over a sphere of `planet_radius_km`. Returns 0 when either fix
/// is uninitialized, so stale state never produces a phantom distance.
pub fn distance_m(a: &GpsCoordinate, b: &GpsCoordinate, planet_radius_km: f64) -> f64 {
    if !a.is_initialized() || !b.is_initialized() {
        return 0.0;
    }

    let lat_distance = (b.lat_deg() - a.lat_deg()).to_radians();
    let lon_distance = (b.lon_deg() - a.lon_deg()).to_radians();

    let h = (lat_distance / 2.0).sin() * (lat_distance / 2.0).sin()
        + a.lat_deg().to_radians().cos()
            * b.lat_deg().to_radians().cos()
            * (lon_distance / 2.0).sin()
            * (lon_distance / 2.0).sin();

    planet_radius_km * 2.0 * h.sqrt().atan2((1.0 - h).sqrt()) * 1000.0
}
