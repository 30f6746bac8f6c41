//! primegauge core: the primality classification, the parity queue and the
//! error surface shared by the service crates.
//!
//! Nothing in here knows about HTTP or metrics; the server crate times and
//! counts these operations from the outside.
//!
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `PrimeGaugeError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod prime;
pub mod queue;

/// Shared result type.
pub use error::{PrimeGaugeError, Result};
pub use prime::{is_prime, Verdict};
pub use queue::ParityQueue;
