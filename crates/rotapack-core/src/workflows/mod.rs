//! # Workflows Module
//!
//! This module provides the high-level entry points of rotapack.
//!
//! ## Overview
//!
//! A workflow takes a complete [`PackingProblem`](crate::core::io::problem::PackingProblem)
//! and a [`PackConfig`](crate::engine::config::PackConfig), validates both, and drives the
//! engine from set-up to aggregated results with progress reporting along the way.
//!
//! - **Packing Workflow** ([`pack`]) - Many independent annealing runs, executed in
//!   parallel waves and aggregated into per-partition top-K lists with early stopping.

pub mod pack;
