//! Plain value types shared by every layer of the packer.
//!
//! - [`assignment`] - The per-position rotamer choice that the annealer mutates

pub mod assignment;
