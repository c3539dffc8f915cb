//! Pure scheduling logic for NetPilot.
//!
//! This crate holds the policy that drives a simulated network of servers:
//! it walks the network, measures free RAM, and spreads weaken/grow/hack
//! threads over that RAM while tracking a small state machine per target.
//! Every interaction with the world goes through the [`host::Host`] trait,
//! so the same code runs against the in-memory simulator, a mock in unit
//! tests, or any future bridge to a live game.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`allocator`] | Greedy prefix-fill of thread requirements over a capacity map |
//! | [`capacity`] | Free/max RAM snapshot built from a traversal |
//! | [`config`] | Thresholds, script paths, intervals; validation |
//! | [`discovery`] | Traversal visitor collecting profitable targets |
//! | [`error`] | Tick-level error type |
//! | [`escalation`] | Traversal visitor opening ports and nuking servers |
//! | [`host`] | Host API trait and node snapshot |
//! | [`persistence`] | JSON codec for the target-state table |
//! | [`route`] | Connection route to a server, anchored at backdoors |
//! | [`scheduler`] | Tick loop: update, discover, sort, dispatch, share, persist |
//! | [`target`] | Per-target action state machine (Weaken → Grow → Hack) |
//! | [`traversal`] | Depth-first network walk with exclusions and parent links |

pub mod allocator;
pub mod capacity;
pub mod config;
pub mod discovery;
pub mod error;
pub mod escalation;
pub mod host;
pub mod persistence;
pub mod route;
pub mod scheduler;
pub mod target;
pub mod traversal;

#[cfg(test)]
pub(crate) mod mock;
