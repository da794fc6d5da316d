//! # Core Module
//!
//! This module provides the stateless building blocks of the packer: the discrete
//! rotamer candidates, the assignment representation, the precomputed interaction
//! energy graph, and the problem file loader.
//!
//! ## Architecture
//!
//! - **Candidates** ([`rotamers`]) - Per-position rotamer lists with a dense global indexing
//! - **State Representation** ([`models`]) - The assignment of one rotamer per position
//! - **Energy Tables** ([`energy`]) - One-body and sparse pairwise energies with O(degree) deltas
//! - **Problem Files** ([`io`]) - Loading complete packing problems from TOML
//!
//! Nothing in this module keeps mutable optimization state; the annealer and the
//! node manager in [`crate::engine`] build on top of these types.

pub mod energy;
pub mod io;
pub mod models;
pub mod rotamers;
