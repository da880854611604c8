//! Short-history GPS estimator
//!
//! Projects the platform's next fix from the recent history of true fixes.
//! Per axis, over consecutive fixes: the ratios between neighbours, their
//! window average, the deviation ("omega") of the latest ratio from that
//! average, the instantaneous per-step velocity, and the error of the
//! previous estimate against the true fix it predicted. The combination is
//! inherited behavior reproduced from flight-proven sessions; it has not
//! been re-derived from a motion model and should be validated against real
//! trajectories before being extended.
//!
//! Histories are bounded ring buffers: the estimator only ever looks at the
//! last few samples, old fixes are evicted.

use crate::geo::GpsCoordinate;
use std::collections::VecDeque;

/// Retained true/estimated fixes per axis
const HISTORY_CAPACITY: usize = 8;
/// True fixes required before an estimate is produced
const MIN_TRUE_SAMPLES: usize = 5;

/// One axis of the estimator (latitude or longitude, 1e-6 degree units)
#[derive(Debug, Default)]
struct Axis {
    truth: VecDeque<i32>,
    estimates: VecDeque<i32>,
    error: f64,
}

impl Axis {
    fn push_truth(&mut self, value: i32) {
        if self.truth.len() == HISTORY_CAPACITY {
            self.truth.pop_front();
        }
        self.truth.push_back(value);
    }

    fn push_estimate(&mut self, value: i32) {
        if self.estimates.len() == HISTORY_CAPACITY {
            self.estimates.pop_front();
        }
        self.estimates.push_back(value);
    }

    fn estimate(&mut self) -> i32 {
        let latest = self.truth[self.truth.len() - 1] as f64;

        // Error feedback: how far off was the previous estimate
        if let Some(last_estimate) = self.estimates.back() {
            self.error = latest - *last_estimate as f64;
        }

        // Ratios between consecutive true fixes and their window average.
        // A zero denominator (fix exactly on the equator or meridian) would
        // blow the ratio up; it contributes a neutral 1.0 instead.
        let mut ratios = Vec::with_capacity(self.truth.len() - 1);
        let mut sum = 0.0;
        for window in 0..self.truth.len() - 1 {
            let denominator = self.truth[window] as f64;
            let ratio = if denominator != 0.0 {
                self.truth[window + 1] as f64 / denominator
            } else {
                1.0
            };
            ratios.push(ratio);
            sum += ratio;
        }
        let average = sum / ratios.len() as f64;
        let omega = ratios.last().copied().unwrap_or(1.0) - average;

        // Instantaneous velocity: last step delta in 1e-6 degree units
        let len = self.truth.len();
        let alpha = (self.truth[len - 1] - self.truth[len - 2]) as f64;

        let estimate = (-alpha * omega + latest * average + self.error) as i32;
        self.push_estimate(estimate);
        estimate
    }
}

/// Ratio-history estimator over the platform's true fixes
#[derive(Debug, Default)]
pub struct GpsEstimator {
    lat: Axis,
    lon: Axis,
}

impl GpsEstimator {
    /// Create an empty estimator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a true fix to the history
    pub fn record_fix(&mut self, fix: &GpsCoordinate) {
        if !fix.is_initialized() {
            return;
        }
        self.lat.push_truth(fix.lat_int());
        self.lon.push_truth(fix.lon_int());
    }

    /// True once enough history has accumulated
    pub fn ready(&self) -> bool {
        self.lat.truth.len() >= MIN_TRUE_SAMPLES
    }

    /// Project the next fix; `None` until enough history has accumulated
    pub fn estimate(&mut self) -> Option<GpsCoordinate> {
        if !self.ready() {
            return None;
        }
        let lat = self.lat.estimate();
        let lon = self.lon.estimate();
        Some(GpsCoordinate::from_int(lat, lon))
    }

    /// Number of retained true fixes
    pub fn sample_count(&self) -> usize {
        self.lat.truth.len()
    }
}
