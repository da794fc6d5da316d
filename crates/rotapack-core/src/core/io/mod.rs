//! Provides input functionality for packing problems.
//!
//! A packing problem file describes the packable positions with their candidate
//! rotamers, the pairwise energy matrices between interacting positions, and the
//! non-pairwise energy terms that should take part in annealing. It is the
//! hand-off point between the scoring layer that computes energies and the packer
//! that optimizes over them.

pub mod problem;
