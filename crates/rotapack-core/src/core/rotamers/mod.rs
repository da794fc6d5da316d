//! # Rotamers Module
//!
//! This module owns the discrete candidates that the packer chooses between.
//!
//! ## Overview
//!
//! Every packable position carries an ordered list of rotamers, each with a
//! precomputed one-body energy. The [`sets::RotamerSets`] collection indexes
//! these lists, maps (position, local index) pairs onto a dense global state
//! index, and remembers the native rotamer of each position so that a packing
//! run always has a valid starting assignment.
//!
//! ## Key Components
//!
//! - [`rotamer`] - The runtime rotamer type and its on-disk representation
//! - [`sets`] - The per-position rotamer collection with its Open/Finalized lifecycle
//!
//! ## Usage
//!
//! ```ignore
//! use rotapack::core::rotamers::{rotamer::Rotamer, sets::RotamerSets};
//!
//! let mut sets = RotamerSets::new();
//! sets.add_rotamers_for_position(0, "A:12", vec![Rotamer::new("LEU:1", 0.0).native()])?;
//! sets.finalize()?;
//! let global = sets.global_index(0, 0)?;
//! ```

pub mod rotamer;
pub mod sets;
