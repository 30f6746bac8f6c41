//! primegauge server library entry.
//!
//! Wires config, the meter registry and the instrumented example resources
//! into an axum service. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod error;
pub mod obs;
pub mod ops;
pub mod resource;
pub mod router;
