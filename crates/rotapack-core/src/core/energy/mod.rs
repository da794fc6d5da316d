//! # Energy Module
//!
//! Storage and incremental evaluation of rotamer energies.
//!
//! The [`graph::InteractionGraph`] holds the one-body energy of every rotamer and a
//! sparse set of pairwise matrices between interacting positions. It answers the
//! single hottest query of the packer, the energy change of one substitution, in
//! time proportional to the number of neighbours of the moving position.
//!
//! Pairwise energies are either written directly (e.g. from a problem file) or
//! pulled from a [`graph::PairwiseEnergySource`] supplied by the scoring layer.

pub mod graph;
