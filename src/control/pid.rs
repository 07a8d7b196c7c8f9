//! PID controller for the heater loop
//!
//! Proportional-integral-derivative controller driving the liquid
//! reservoir temperature.  The heater relay is on/off, so the caller only
//! looks at the sign of the output.

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    setpoint: f32,
    integral: f32,
    prev_error: f32,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32, setpoint: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint,
            integral: 0.0,
            prev_error: 0.0,
            output_min: -100.0,
            output_max: 100.0,
        }
    }

    /// Symmetric output clamp; also bounds the integral term.
    pub fn with_output_limit(mut self, limit: f32) -> Self {
        self.output_min = -limit;
        self.output_max = limit;
        self
    }

    /// Update setpoint
    pub fn set_target(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Compute PID output given current measurement and elapsed seconds.
    pub fn compute(&mut self, measurement: f32, dt: f32) -> f32 {
        let error = self.setpoint - measurement;

        // Proportional
        let p = self.kp * error;

        // Integral, bounded so ki * integral stays inside the output clamp
        self.integral += error * dt;
        if self.ki > 0.0 {
            let bound = self.output_max / self.ki;
            self.integral = self.integral.clamp(-bound, bound);
        }
        let i = self.ki * self.integral;

        // Derivative
        let derivative = if dt > 0.0 {
            (error - self.prev_error) / dt
        } else {
            0.0
        };
        let d = self.kd * derivative;

        self.prev_error = error;

        let output = (p + i + d).clamp(self.output_min, self.output_max);

        // Anti-windup: if output is saturated, stop integrating
        if output >= self.output_max || output <= self.output_min {
            self.integral -= error * dt;
        }

        output
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}
