//! Platform GPS prediction
//!
//! Two mechanisms cover the gap when the raw platform fix is too imprecise
//! to relay as a waypoint:
//!
//! - [`GpsPredictor`]: dead reckoning from the last two fixes only
//! - [`GpsEstimator`]: short-history extrapolation requiring at least five
//!   true fixes
//!
//! The controller prefers the estimator once it is warmed up and falls back
//! to the predictor before that.

mod estimator;
mod predictor;

pub use estimator::GpsEstimator;
pub use predictor::GpsPredictor;
