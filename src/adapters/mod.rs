//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements    | Connects to                    |
//! |-----------------|---------------|--------------------------------|
//! | `simulated`     | SensorPort    | First-order chamber model      |
//! |                 | (OutputPin)   | Simulated relay pins           |
//! | `log_sink`      | EventSink     | `log` records                  |
//! | `settings_file` | SettingsPort  | JSON file / in-memory store    |
//! | `time`          |               | Monotonic process clock        |
//! | `console`       |               | stdin lines → ControlLink      |
//!
//! The relay board itself is [`crate::drivers::relay::RelayBank`],
//! generic over any `embedded_hal` output pin.

pub mod console;
pub mod log_sink;
pub mod settings_file;
pub mod simulated;
pub mod time;
