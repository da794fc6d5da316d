//! # rotapack
//!
//! A combinatorial side-chain packing library: given per-position rotamer
//! candidates with precomputed one-body and pairwise energies, find low-energy
//! assignments by simulated annealing and aggregate many independent runs.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data: rotamer sets, assignments, the
//!   sparse interaction graph of precomputed energies, and the problem file loader.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer: the simulated-annealing
//!   optimizer with incremental energy bookkeeping, non-pairwise energy terms, the
//!   node manager that aggregates results, configuration and errors.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into a
//!   complete packing procedure that runs many trajectories and ranks their results.

pub mod core;
pub mod engine;
pub mod workflows;
