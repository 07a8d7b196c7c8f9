//! System configuration parameters
//!
//! All tunable parameters for the incubator control engine, plus the
//! operator settings (setpoints and enable flags) that survive a restart.
//! Values can be overridden from a JSON file at startup.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Timing ---
    /// Control tick interval (milliseconds)
    pub control_interval_ms: u32,
    /// Telemetry log interval (milliseconds), coarser than the control tick
    pub telemetry_log_interval_ms: u32,
    /// Delay between the first unsaved settings change and the flush (milliseconds)
    pub settings_save_debounce_ms: u32,

    // --- Default setpoints ---
    pub temperature_setpoint_c: f32,
    pub humidity_setpoint_pct: f32,
    pub co2_setpoint_ppm: f32,
    pub o2_setpoint_pct: f32,

    // --- Temperature (PID) ---
    pub temp_kp: f32,
    pub temp_ki: f32,
    pub temp_kd: f32,
    /// Symmetric PID output clamp (±)
    pub temp_output_limit: f32,

    // --- Humidity (hysteresis) ---
    /// Half-width of the dead band around the setpoint (%RH)
    pub humidity_band_pct: f32,

    // --- CO2 (dual-solenoid injection) ---
    pub co2_pulse_ms: u32,
    /// Gap between the primary and secondary pulse
    pub co2_pause_ms: u32,
    pub co2_cooldown_ms: u32,
    /// Raw sensor units → ppm
    pub co2_raw_scale: f32,

    // --- O2 (argon displacement) ---
    pub o2_pulse_ms: u32,
    pub o2_cooldown_ms: u32,

    // --- Air pump (duty cycle) ---
    pub air_pump_on_ms: u32,
    pub air_pump_off_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timing
            control_interval_ms: 1000,        // 1 Hz
            telemetry_log_interval_ms: 10_000, // every 10 s
            settings_save_debounce_ms: 5000,

            // Setpoints
            temperature_setpoint_c: 37.0,
            humidity_setpoint_pct: 60.0,
            co2_setpoint_ppm: 1000.0,
            o2_setpoint_pct: 5.0,

            // Temperature PID
            temp_kp: 5.0,
            temp_ki: 0.1,
            temp_kd: 1.0,
            temp_output_limit: 100.0,

            // Humidity
            humidity_band_pct: 2.0,

            // CO2
            co2_pulse_ms: 100,
            co2_pause_ms: 1000,
            co2_cooldown_ms: 15_000,
            co2_raw_scale: 10.0,

            // O2
            o2_pulse_ms: 100,
            o2_cooldown_ms: 60_000,

            // Air pump
            air_pump_on_ms: 5000,
            air_pump_off_ms: 55_000,
        }
    }
}

impl SystemConfig {
    /// Reject values that would make a loop misbehave.
    ///
    /// Invalid ranges are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("control_interval_ms must be > 0"));
        }
        if self.telemetry_log_interval_ms < self.control_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "telemetry_log_interval_ms must not be shorter than the control tick",
            ));
        }
        let gains = [self.temp_kp, self.temp_ki, self.temp_kd];
        if gains.iter().any(|g| !g.is_finite() || *g < 0.0) {
            return Err(ConfigError::ValidationFailed("PID gains must be finite and >= 0"));
        }
        if !self.temp_output_limit.is_finite() || self.temp_output_limit <= 0.0 {
            return Err(ConfigError::ValidationFailed("temp_output_limit must be > 0"));
        }
        if !self.humidity_band_pct.is_finite() || self.humidity_band_pct < 0.0 {
            return Err(ConfigError::ValidationFailed("humidity_band_pct must be >= 0"));
        }
        if self.co2_pulse_ms == 0 || self.o2_pulse_ms == 0 {
            return Err(ConfigError::ValidationFailed("pulse durations must be > 0"));
        }
        if self.co2_cooldown_ms < self.co2_pulse_ms * 2 + self.co2_pause_ms {
            return Err(ConfigError::ValidationFailed(
                "co2_cooldown_ms must cover the whole injection sequence",
            ));
        }
        if self.o2_cooldown_ms < self.o2_pulse_ms {
            return Err(ConfigError::ValidationFailed("o2_cooldown_ms must cover the pulse"));
        }
        if !self.co2_raw_scale.is_finite() || self.co2_raw_scale <= 0.0 {
            return Err(ConfigError::ValidationFailed("co2_raw_scale must be > 0"));
        }
        if self.air_pump_on_ms == 0 {
            return Err(ConfigError::ValidationFailed("air_pump_on_ms must be > 0"));
        }
        Ok(())
    }

    /// Default operator settings derived from this configuration.
    pub fn default_settings(&self) -> ControlSettings {
        ControlSettings {
            temperature_setpoint: self.temperature_setpoint_c,
            humidity_setpoint: self.humidity_setpoint_pct,
            co2_setpoint: self.co2_setpoint_ppm,
            o2_setpoint: self.o2_setpoint_pct,
            ..ControlSettings::default()
        }
    }
}

/// Operator-facing settings captured from and restored into the manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub temperature_setpoint: f32,
    pub humidity_setpoint: f32,
    pub co2_setpoint: f32,
    pub o2_setpoint: f32,
    pub temperature_enabled: bool,
    pub humidity_enabled: bool,
    pub co2_enabled: bool,
    pub o2_enabled: bool,
    pub air_pump_enabled: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            temperature_setpoint: 37.0,
            humidity_setpoint: 60.0,
            co2_setpoint: 1000.0,
            o2_setpoint: 5.0,
            temperature_enabled: true,
            humidity_enabled: true,
            co2_enabled: true,
            o2_enabled: true,
            air_pump_enabled: true,
        }
    }
}

/// Errors from configuration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation; the text names the field.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
