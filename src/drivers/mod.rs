//! Relay output drivers.

pub mod relay;
