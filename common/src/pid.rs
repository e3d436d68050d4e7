use crate::types::PidGains;

/// Bound on the accumulated `error * dt`.
pub const INTEGRAL_LIMIT: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidTerms {
    pub error: f32,
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl PidTerms {
    pub fn output(&self) -> f32 {
        self.p + self.i + self.d
    }
}

/// Integral and previous error carried between control steps. Gains are
/// passed per call so that updates made over the serial link apply on the
/// next step.
#[derive(Debug, Clone, Default)]
pub struct PidController {
    integral: f32,
    last_error: f32,
}

impl PidController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn last_error(&self) -> f32 {
        self.last_error
    }

    pub fn compute(&mut self, gains: PidGains, setpoint: f32, measured: f32, dt: f32) -> f32 {
        self.step(gains, setpoint, measured, dt).output()
    }

    pub fn step(&mut self, gains: PidGains, setpoint: f32, measured: f32, dt: f32) -> PidTerms {
        let error = setpoint - measured;

        let p = gains.kp * error;

        self.integral = (self.integral + error * dt).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
        let i = gains.ki * self.integral;

        let d = if dt > 0.0 {
            gains.kd * (error - self.last_error) / dt
        } else {
            0.0
        };

        self.last_error = error;

        PidTerms { error, p, i, d }
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }
}
