//! In-memory simulated network for NetPilot.
//!
//! [`SimNetwork`] implements [`netpilot_logic::host::Host`]: servers with
//! RAM, money and security, scripts that hold RAM until they complete,
//! a file store and a clock that only moves on `sleep`. Useful for running
//! the scheduler headless and for integration tests.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`formulas`] | Effect calculators and script durations |
//! | [`generation`] | Seeded random network construction |
//! | [`network`] | Servers, processes and the `Host` implementation |

pub mod formulas;
pub mod generation;
pub mod network;

pub use generation::{generate_network, NetworkConfig};
pub use network::{Process, ScriptKind, Server, SimNetwork};
