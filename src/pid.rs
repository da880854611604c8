//! Per-axis PID controller
//!
//! Proportional-integral-derivative controller with a feed-forward term,
//! symmetric output clamp, output ramp limiting and direction reversal. One
//! instance per corrected axis (X, Y, Z, yaw). Derivative acts on the
//! measurement, not the error, so setpoint steps do not kick the output.

use crate::config::PidAxisConfig;

/// Single-axis PID controller
#[derive(Debug, Clone)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    kf: f64,
    /// Symmetric output clamp; 0 disables
    output_limit: f64,
    /// Max output change per call; 0 disables
    ramp: f64,
    setpoint: f64,
    error_sum: f64,
    last_actual: f64,
    last_output: f64,
    first_run: bool,
}

impl Pid {
    /// Create a controller with all gains zeroed
    pub fn new() -> Self {
        Pid {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            kf: 0.0,
            output_limit: 0.0,
            ramp: 0.0,
            setpoint: 0.0,
            error_sum: 0.0,
            last_actual: 0.0,
            last_output: 0.0,
            first_run: true,
        }
    }

    /// Create a controller from an axis configuration table
    pub fn from_config(config: &PidAxisConfig) -> Self {
        let mut pid = Pid::new();
        pid.set_gains(config.p, config.i, config.d, config.f);
        pid.set_output_limit(config.limit);
        pid.set_ramp(config.ramp);
        pid.set_reversed(config.reversed);
        pid
    }

    /// Set P, I, D and F gains
    ///
    /// Preserves the sign convention: if the controller was reversed, the new
    /// gains are reversed as well.
    pub fn set_gains(&mut self, p: f64, i: f64, d: f64, f: f64) {
        let sign = if self.kp < 0.0 || (self.kp == 0.0 && self.kd < 0.0) {
            -1.0
        } else {
            1.0
        };
        self.kp = p * sign;
        self.ki = i * sign;
        self.kd = d * sign;
        self.kf = f * sign;
    }

    /// Invert the sense of the controller
    pub fn set_reversed(&mut self, reversed: bool) {
        let currently_reversed = self.kp < 0.0 || (self.kp == 0.0 && self.kd < 0.0);
        if reversed != currently_reversed {
            self.kp = -self.kp;
            self.ki = -self.ki;
            self.kd = -self.kd;
            self.kf = -self.kf;
        }
    }

    /// Symmetric output clamp (0 disables)
    pub fn set_output_limit(&mut self, limit: f64) {
        self.output_limit = limit.abs();
    }

    /// Maximum output change per call (0 disables)
    pub fn set_ramp(&mut self, ramp: f64) {
        self.ramp = ramp.abs();
    }

    /// Target value for the controlled axis
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// Current setpoint
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Clear integrator and measurement memory
    pub fn reset(&mut self) {
        self.error_sum = 0.0;
        self.last_output = 0.0;
        self.first_run = true;
    }

    /// Compute the correction for the current measurement
    pub fn compute(&mut self, actual: f64) -> f64 {
        let error = self.setpoint - actual;

        let p_output = self.kp * error;
        let f_output = self.kf * self.setpoint;

        // Derivative on measurement; suppressed on the first call after reset
        let d_output = if self.first_run {
            0.0
        } else {
            -self.kd * (actual - self.last_actual)
        };
        self.last_actual = actual;

        // Integrate with anti-windup: the stored sum never represents more
        // authority than the output clamp allows
        self.error_sum += error;
        let mut i_output = self.ki * self.error_sum;
        if self.output_limit > 0.0 && self.ki != 0.0 {
            i_output = i_output.clamp(-self.output_limit, self.output_limit);
            self.error_sum = i_output / self.ki;
        }

        let mut output = p_output + i_output + d_output + f_output;

        if self.ramp > 0.0 && !self.first_run {
            output = output.clamp(self.last_output - self.ramp, self.last_output + self.ramp);
        }
        if self.output_limit > 0.0 {
            output = output.clamp(-self.output_limit, self.output_limit);
        }

        self.first_run = false;
        self.last_output = output;
        output
    }
}

impl Default for Pid {
    fn default() -> Self {
        Self::new()
    }
}
