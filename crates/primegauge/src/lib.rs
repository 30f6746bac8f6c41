//! Top-level facade crate for primegauge.
//!
//! Re-exports the core classification types and the server library so users
//! can depend on a single crate.

pub mod core {
    pub use primegauge_core::*;
}

pub mod server {
    pub use primegauge_server::*;
}

pub use primegauge_core::{is_prime, ParityQueue, PrimeGaugeError, Result, Verdict};
