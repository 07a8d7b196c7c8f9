//! Incubator control engine.
//!
//! Regulates temperature, humidity, CO2 and O2 in an incubation chamber
//! and runs its air-exchange pump.  The pure-logic modules are exposed
//! for integration testing; hardware lives behind the port traits in
//! [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod runtime;
pub mod safety;
pub mod scheduler;
