use super::rotamer::Rotamer;
use crate::core::models::assignment::Assignment;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RotamerSetError {
    #[error("Position {position} was given an empty rotamer list")]
    EmptyCandidateList { position: usize },

    #[error("Position {position} already has rotamers")]
    PositionAlreadyPopulated { position: usize },

    #[error("Position {position} has no rotamers; every position needs at least one")]
    MissingPosition { position: usize },

    #[error("Position {position} has {count} rotamers flagged as native; at most one is allowed")]
    MultipleNatives { position: usize, count: usize },

    #[error("Rotamer sets are finalized; no further rotamers can be added")]
    AlreadyFinalized,

    #[error("Rotamer sets must be finalized before global indices are available")]
    NotFinalized,

    #[error("{what} index {index} is out of range (size {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetsState {
    Open,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct PositionRotamers {
    pub label: String,
    rotamers: Vec<Rotamer>,
    native: usize,
}

impl PositionRotamers {
    pub fn rotamers(&self) -> &[Rotamer] {
        &self.rotamers
    }

    pub fn native_index(&self) -> usize {
        self.native
    }
}

/// Owns every enumerated rotamer of a packing run, indexed by position.
///
/// The collection starts `Open`; [`finalize`](Self::finalize) freezes the
/// per-position lists and builds the offset table that maps
/// (position, local index) to a dense global state index.
#[derive(Debug, Clone)]
pub struct RotamerSets {
    state: SetsState,
    positions: Vec<Option<PositionRotamers>>,
    offsets: Vec<usize>,
    owners: Vec<usize>,
}

impl Default for RotamerSets {
    fn default() -> Self {
        Self::new()
    }
}

impl RotamerSets {
    pub fn new() -> Self {
        Self {
            state: SetsState::Open,
            positions: Vec::new(),
            offsets: Vec::new(),
            owners: Vec::new(),
        }
    }

    pub fn state(&self) -> SetsState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == SetsState::Finalized
    }

    pub fn add_rotamers_for_position(
        &mut self,
        pos: usize,
        label: impl Into<String>,
        rotamers: Vec<Rotamer>,
    ) -> Result<(), RotamerSetError> {
        if self.is_finalized() {
            return Err(RotamerSetError::AlreadyFinalized);
        }
        if rotamers.is_empty() {
            return Err(RotamerSetError::EmptyCandidateList { position: pos });
        }
        if self.positions.get(pos).is_some_and(Option::is_some) {
            return Err(RotamerSetError::PositionAlreadyPopulated { position: pos });
        }

        let natives: Vec<usize> = rotamers
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_native)
            .map(|(i, _)| i)
            .collect();
        if natives.len() > 1 {
            return Err(RotamerSetError::MultipleNatives {
                position: pos,
                count: natives.len(),
            });
        }

        if self.positions.len() <= pos {
            self.positions.resize(pos + 1, None);
        }
        self.positions[pos] = Some(PositionRotamers {
            label: label.into(),
            native: natives.first().copied().unwrap_or(0),
            rotamers,
        });
        Ok(())
    }

    /// Freezes the collection and builds the global index tables.
    pub fn finalize(&mut self) -> Result<(), RotamerSetError> {
        if self.is_finalized() {
            return Err(RotamerSetError::AlreadyFinalized);
        }
        if let Some(position) = self.positions.iter().position(Option::is_none) {
            return Err(RotamerSetError::MissingPosition { position });
        }

        let mut offsets = Vec::with_capacity(self.positions.len());
        let mut owners = Vec::new();
        let mut total = 0;
        for (pos, entry) in self.positions.iter().enumerate() {
            let count = entry.as_ref().map_or(0, |p| p.rotamers.len());
            offsets.push(total);
            owners.extend(std::iter::repeat_n(pos, count));
            total += count;
        }

        self.offsets = offsets;
        self.owners = owners;
        self.state = SetsState::Finalized;
        Ok(())
    }

    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn num_rotamers(&self, pos: usize) -> usize {
        self.positions
            .get(pos)
            .and_then(Option::as_ref)
            .map_or(0, |p| p.rotamers.len())
    }

    pub fn total_rotamers(&self) -> usize {
        (0..self.num_positions()).map(|p| self.num_rotamers(p)).sum()
    }

    pub fn position(&self, pos: usize) -> Result<&PositionRotamers, RotamerSetError> {
        self.positions
            .get(pos)
            .and_then(Option::as_ref)
            .ok_or(RotamerSetError::OutOfRange {
                what: "Position",
                index: pos,
                len: self.positions.len(),
            })
    }

    pub fn label(&self, pos: usize) -> Option<&str> {
        self.position(pos).ok().map(|p| p.label.as_str())
    }

    pub fn rotamer(&self, pos: usize, local: usize) -> Result<&Rotamer, RotamerSetError> {
        let position = self.position(pos)?;
        position
            .rotamers
            .get(local)
            .ok_or(RotamerSetError::OutOfRange {
                what: "Rotamer",
                index: local,
                len: position.rotamers.len(),
            })
    }

    pub fn native_rotamer(&self, pos: usize) -> Result<usize, RotamerSetError> {
        self.position(pos).map(PositionRotamers::native_index)
    }

    /// The assignment that places the native rotamer at every position.
    pub fn native_assignment(&self) -> Result<Assignment, RotamerSetError> {
        (0..self.num_positions())
            .map(|pos| self.native_rotamer(pos))
            .collect::<Result<Vec<_>, _>>()
            .map(Assignment::new)
    }

    pub fn global_index(&self, pos: usize, local: usize) -> Result<usize, RotamerSetError> {
        if !self.is_finalized() {
            return Err(RotamerSetError::NotFinalized);
        }
        let count = self.num_rotamers(pos);
        if pos >= self.positions.len() {
            return Err(RotamerSetError::OutOfRange {
                what: "Position",
                index: pos,
                len: self.positions.len(),
            });
        }
        if local >= count {
            return Err(RotamerSetError::OutOfRange {
                what: "Rotamer",
                index: local,
                len: count,
            });
        }
        Ok(self.offsets[pos] + local)
    }

    /// Inverse of [`global_index`](Self::global_index).
    pub fn resolve(&self, global: usize) -> Result<(usize, usize), RotamerSetError> {
        if !self.is_finalized() {
            return Err(RotamerSetError::NotFinalized);
        }
        let pos = *self.owners.get(global).ok_or(RotamerSetError::OutOfRange {
            what: "Global state",
            index: global,
            len: self.owners.len(),
        })?;
        Ok((pos, global - self.offsets[pos]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PositionRotamers)> {
        self.positions
            .iter()
            .enumerate()
            .filter_map(|(pos, entry)| entry.as_ref().map(|p| (pos, p)))
    }
}
