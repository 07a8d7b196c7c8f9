//! Settings storage adapters.
//!
//! Implements [`SettingsPort`] twice:
//!
//! - [`JsonFileSettings`]: a JSON file on disk, written atomically
//!   (temp file + rename) so a crash mid-save never leaves a torn file.
//! - [`MemorySettings`]: in-memory store for tests and simulation.
//!
//! Both range-check setpoints before persisting, so a bad value can
//! never be written and come back on the next boot.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{SettingsError, SettingsPort};
use crate::config::ControlSettings;
use crate::control::Parameter;

fn validate_settings(s: &ControlSettings) -> Result<(), SettingsError> {
    let checks = [
        (Parameter::Temperature, s.temperature_setpoint, "temperature_setpoint out of range"),
        (Parameter::Humidity, s.humidity_setpoint, "humidity_setpoint out of range"),
        (Parameter::Co2, s.co2_setpoint, "co2_setpoint out of range"),
        (Parameter::O2, s.o2_setpoint, "o2_setpoint out of range"),
    ];
    for (parameter, value, msg) in checks {
        if parameter.validate_setpoint(value).is_err() {
            return Err(SettingsError::ValidationFailed(msg));
        }
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// JSON file
// ───────────────────────────────────────────────────────────────

pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsPort for JsonFileSettings {
    fn load(&self) -> Result<ControlSettings, SettingsError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(SettingsError::NotFound),
            Err(e) => {
                warn!("settings: read {} failed: {}", self.path.display(), e);
                return Err(SettingsError::IoError);
            }
        };
        let settings: ControlSettings =
            serde_json::from_slice(&bytes).map_err(|_| SettingsError::Corrupted)?;
        validate_settings(&settings)?;
        info!("settings: loaded from {}", self.path.display());
        Ok(settings)
    }

    fn save(&self, settings: &ControlSettings) -> Result<(), SettingsError> {
        validate_settings(settings)?;
        let bytes = serde_json::to_vec_pretty(settings).map_err(|_| SettingsError::IoError)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                warn!("settings: write {} failed: {}", self.path.display(), e);
                SettingsError::IoError
            })?;
        info!("settings: saved to {}", self.path.display());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySettings {
    stored: RefCell<Option<ControlSettings>>,
    saves: Cell<u32>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Option<ControlSettings> {
        *self.stored.borrow()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u32 {
        self.saves.get()
    }
}

impl SettingsPort for MemorySettings {
    fn load(&self) -> Result<ControlSettings, SettingsError> {
        self.stored.borrow().ok_or(SettingsError::NotFound)
    }

    fn save(&self, settings: &ControlSettings) -> Result<(), SettingsError> {
        validate_settings(settings)?;
        *self.stored.borrow_mut() = Some(*settings);
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}
