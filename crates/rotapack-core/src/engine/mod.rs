//! # Engine Module
//!
//! This module implements the stateful optimization layer of rotapack: the
//! simulated-annealing optimizer, the non-pairwise energy terms it drives, and
//! the node manager that aggregates the results of many runs.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Annealing and run parameters with validating builders
//! - **Optimizer** ([`annealer`]) - The Initializing → Annealing → Finalizing → Done state machine
//! - **Temperature Control** ([`schedule`]) - Cooling schedules and the Metropolis criterion
//! - **Non-Pairwise Terms** ([`annealable`]) - The adapter trait, built-in terms and their registry
//! - **Aggregation** ([`node_manager`]) - Per-partition top-K lists, early stop and discards
//! - **State Tracking** ([`state`]) - Best-assignment tracking, statistics and run outcomes
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - The engine error type every layer converges into

pub mod annealable;
pub mod annealer;
pub mod config;
pub mod error;
pub mod node_manager;
pub mod progress;
pub mod schedule;
pub mod state;
