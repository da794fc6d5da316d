use crate::core::models::assignment::Assignment;
use crate::core::rotamers::sets::RotamerSets;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("{what} index {index} is out of range (size {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Position {position} cannot interact with itself")]
    SelfInteraction { position: usize },

    #[error("Position {position} has no rotamers")]
    EmptyPosition { position: usize },

    #[error("Interaction graph is sized for {expected} positions but {found} were supplied")]
    PositionCountMismatch { expected: usize, found: usize },

    #[error(
        "Position {position} has {expected} rotamers in the rotamer sets but {found} in the interaction graph"
    )]
    RotamerCountMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("One-body energy of rotamer {rot} at position {pos} is not finite")]
    NonFiniteEnergy { pos: usize, rot: usize },

    #[error(
        "Pairwise energy between rotamer {rot_i} at position {pos_i} and rotamer {rot_j} at position {pos_j} is not finite"
    )]
    NonFinitePairwiseEnergy {
        pos_i: usize,
        rot_i: usize,
        pos_j: usize,
        rot_j: usize,
    },

    #[error("Pairwise matrix for edge ({pos_i}, {pos_j}) must be {rows}x{cols}")]
    MatrixShape {
        pos_i: usize,
        pos_j: usize,
        rows: usize,
        cols: usize,
    },
}

/// Supplies pairwise rotamer energies on demand.
///
/// This is the seam to the scoring layer: the graph asks for an energy only
/// for position pairs the source declares as neighbours.
pub trait PairwiseEnergySource {
    fn are_neighbors(&self, _pos_i: usize, _pos_j: usize) -> bool {
        true
    }

    fn pair_energy(&self, pos_i: usize, rot_i: usize, pos_j: usize, rot_j: usize) -> f64;
}

impl<F> PairwiseEnergySource for F
where
    F: Fn(usize, usize, usize, usize) -> f64,
{
    fn pair_energy(&self, pos_i: usize, rot_i: usize, pos_j: usize, rot_j: usize) -> f64 {
        self(pos_i, rot_i, pos_j, rot_j)
    }
}

#[derive(Debug, Clone)]
struct Edge {
    lower: usize,
    upper: usize,
    upper_count: usize,
    // Row-major over (rotamer at `lower`, rotamer at `upper`).
    energies: Vec<f64>,
}

impl Edge {
    #[inline]
    fn energy(&self, lower_rot: usize, upper_rot: usize) -> f64 {
        self.energies[lower_rot * self.upper_count + upper_rot]
    }

    fn max_magnitude(&self) -> f64 {
        self.energies.iter().fold(0.0_f64, |acc, e| acc.max(e.abs()))
    }
}

#[derive(Debug, Clone, Copy)]
struct Neighbor {
    other: usize,
    edge: usize,
    is_lower: bool,
}

/// Sparse store of one-body and pairwise rotamer energies.
///
/// Edges live in an arena and are referenced from per-position adjacency lists
/// by index, so the substitution delta touches only the neighbours of the
/// moving position.
#[derive(Debug, Clone)]
pub struct InteractionGraph {
    one_body: Vec<Vec<f64>>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<Neighbor>>,
    lookup: HashMap<(usize, usize), usize>,
}

impl InteractionGraph {
    /// Creates a graph with zero energies for the given rotamer counts.
    pub fn new(rotamer_counts: &[usize]) -> Result<Self, GraphError> {
        if let Some(position) = rotamer_counts.iter().position(|&n| n == 0) {
            return Err(GraphError::EmptyPosition { position });
        }
        Ok(Self {
            one_body: rotamer_counts.iter().map(|&n| vec![0.0; n]).collect(),
            edges: Vec::new(),
            adjacency: vec![Vec::new(); rotamer_counts.len()],
            lookup: HashMap::new(),
        })
    }

    /// Sizes the graph from the rotamer sets and copies their one-body energies.
    pub fn from_rotamer_sets(sets: &RotamerSets) -> Result<Self, GraphError> {
        let counts: Vec<usize> = (0..sets.num_positions())
            .map(|pos| sets.num_rotamers(pos))
            .collect();
        let mut graph = Self::new(&counts)?;
        for (pos, position) in sets.iter() {
            for (rot, rotamer) in position.rotamers().iter().enumerate() {
                graph.set_one_body_energy(pos, rot, rotamer.one_body_energy)?;
            }
        }
        Ok(graph)
    }

    pub fn num_positions(&self) -> usize {
        self.one_body.len()
    }

    pub fn num_rotamers(&self, pos: usize) -> usize {
        self.one_body.get(pos).map_or(0, Vec::len)
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn has_edge(&self, pos_i: usize, pos_j: usize) -> bool {
        self.lookup.contains_key(&ordered(pos_i, pos_j))
    }

    pub fn neighbors(&self, pos: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency
            .get(pos)
            .into_iter()
            .flat_map(|list| list.iter().map(|n| n.other))
    }

    /// Checks that this graph was built for exactly these rotamer sets.
    pub fn validate_against(&self, sets: &RotamerSets) -> Result<(), GraphError> {
        if sets.num_positions() != self.num_positions() {
            return Err(GraphError::PositionCountMismatch {
                expected: sets.num_positions(),
                found: self.num_positions(),
            });
        }
        for pos in 0..self.num_positions() {
            let expected = sets.num_rotamers(pos);
            let found = self.num_rotamers(pos);
            if expected != found {
                return Err(GraphError::RotamerCountMismatch {
                    position: pos,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Allocates storage for the pair; returns `true` if a new edge was created.
    pub fn add_edge(&mut self, pos_i: usize, pos_j: usize) -> Result<bool, GraphError> {
        self.check_position(pos_i)?;
        self.check_position(pos_j)?;
        if pos_i == pos_j {
            return Err(GraphError::SelfInteraction { position: pos_i });
        }
        let key = ordered(pos_i, pos_j);
        if self.lookup.contains_key(&key) {
            return Ok(false);
        }
        self.insert_edge(key.0, key.1, None);
        Ok(true)
    }

    pub fn set_one_body_energy(
        &mut self,
        pos: usize,
        rot: usize,
        value: f64,
    ) -> Result<(), GraphError> {
        self.check_rotamer(pos, rot)?;
        if !value.is_finite() {
            return Err(GraphError::NonFiniteEnergy { pos, rot });
        }
        self.one_body[pos][rot] = value;
        Ok(())
    }

    /// Stores a pairwise energy, creating the edge if needed.
    pub fn set_pairwise_energy(
        &mut self,
        pos_i: usize,
        rot_i: usize,
        pos_j: usize,
        rot_j: usize,
        value: f64,
    ) -> Result<(), GraphError> {
        self.check_rotamer(pos_i, rot_i)?;
        self.check_rotamer(pos_j, rot_j)?;
        if pos_i == pos_j {
            return Err(GraphError::SelfInteraction { position: pos_i });
        }
        if !value.is_finite() {
            return Err(GraphError::NonFinitePairwiseEnergy {
                pos_i,
                rot_i,
                pos_j,
                rot_j,
            });
        }
        self.add_edge(pos_i, pos_j)?;
        let edge_idx = self.lookup[&ordered(pos_i, pos_j)];
        let edge = &mut self.edges[edge_idx];
        let (lower_rot, upper_rot) = if pos_i < pos_j {
            (rot_i, rot_j)
        } else {
            (rot_j, rot_i)
        };
        edge.energies[lower_rot * edge.upper_count + upper_rot] = value;
        Ok(())
    }

    /// Stores a full matrix for the pair, rows indexed by rotamers of `pos_i`.
    pub fn set_pairwise_matrix(
        &mut self,
        pos_i: usize,
        pos_j: usize,
        matrix: &[Vec<f64>],
    ) -> Result<(), GraphError> {
        self.check_position(pos_i)?;
        self.check_position(pos_j)?;
        let rows = self.num_rotamers(pos_i);
        let cols = self.num_rotamers(pos_j);
        if matrix.len() != rows || matrix.iter().any(|row| row.len() != cols) {
            return Err(GraphError::MatrixShape {
                pos_i,
                pos_j,
                rows,
                cols,
            });
        }
        for (rot_i, row) in matrix.iter().enumerate() {
            for (rot_j, &value) in row.iter().enumerate() {
                self.set_pairwise_energy(pos_i, rot_i, pos_j, rot_j, value)?;
            }
        }
        Ok(())
    }

    pub fn get_one_body_energy(&self, pos: usize, rot: usize) -> Result<f64, GraphError> {
        self.check_rotamer(pos, rot)?;
        Ok(self.one_body[pos][rot])
    }

    /// Pairwise energy of two rotamers; pairs without an edge contribute zero.
    pub fn get_pairwise_energy(
        &self,
        pos_i: usize,
        rot_i: usize,
        pos_j: usize,
        rot_j: usize,
    ) -> Result<f64, GraphError> {
        self.check_rotamer(pos_i, rot_i)?;
        self.check_rotamer(pos_j, rot_j)?;
        if pos_i == pos_j {
            return Err(GraphError::SelfInteraction { position: pos_i });
        }
        Ok(match self.lookup.get(&ordered(pos_i, pos_j)) {
            Some(&idx) if pos_i < pos_j => self.edges[idx].energy(rot_i, rot_j),
            Some(&idx) => self.edges[idx].energy(rot_j, rot_i),
            None => 0.0,
        })
    }

    /// Energy change of replacing the rotamer at `pos` with `new_rot` in `assignment`.
    ///
    /// Runs in O(degree(pos)). Indices are caller contracts: they are checked
    /// with debug assertions and by slice bounds checks otherwise.
    #[inline]
    pub fn delta_energy_for_substitution(
        &self,
        pos: usize,
        new_rot: usize,
        assignment: &Assignment,
    ) -> f64 {
        debug_assert_eq!(assignment.len(), self.num_positions());
        debug_assert!(new_rot < self.num_rotamers(pos));

        let old_rot = assignment.rotamer_at(pos);
        let one_body = &self.one_body[pos];
        let mut delta = one_body[new_rot] - one_body[old_rot];

        for neighbor in &self.adjacency[pos] {
            let edge = &self.edges[neighbor.edge];
            let other_rot = assignment.rotamer_at(neighbor.other);
            delta += if neighbor.is_lower {
                edge.energy(new_rot, other_rot) - edge.energy(old_rot, other_rot)
            } else {
                edge.energy(other_rot, new_rot) - edge.energy(other_rot, old_rot)
            };
        }
        delta
    }

    /// Full recomputation: every one-body term plus every existing edge.
    pub fn total_energy(&self, assignment: &Assignment) -> f64 {
        debug_assert_eq!(assignment.len(), self.num_positions());
        let one_body: f64 = assignment
            .iter()
            .map(|(pos, rot)| self.one_body[pos][rot])
            .sum();
        let pairwise: f64 = self
            .edges
            .iter()
            .map(|e| e.energy(assignment.rotamer_at(e.lower), assignment.rotamer_at(e.upper)))
            .sum();
        one_body + pairwise
    }

    /// Builds edges from `source` for every neighbouring pair that has at least
    /// one entry larger than `cutoff` in magnitude. Returns the number of edges kept.
    ///
    /// A non-finite energy from the source fails the whole call and leaves the
    /// graph unchanged.
    #[instrument(skip_all, name = "populate_pairwise", fields(cutoff = cutoff))]
    pub fn populate_pairwise<S>(&mut self, source: &S, cutoff: f64) -> Result<usize, GraphError>
    where
        S: PairwiseEnergySource + Sync,
    {
        let n = self.num_positions();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .filter(|&(i, j)| source.are_neighbors(i, j))
            .collect();

        let compute = |&(i, j): &(usize, usize)| {
            let rows = self.num_rotamers(i);
            let cols = self.num_rotamers(j);
            let mut energies = Vec::with_capacity(rows * cols);
            for ri in 0..rows {
                for rj in 0..cols {
                    energies.push(source.pair_energy(i, ri, j, rj));
                }
            }
            (i, j, energies)
        };

        #[cfg(not(feature = "parallel"))]
        let matrices: Vec<_> = pairs.iter().map(compute).collect();

        #[cfg(feature = "parallel")]
        let matrices: Vec<_> = pairs.par_iter().map(compute).collect();

        for (i, j, energies) in &matrices {
            if let Some(idx) = energies.iter().position(|e| !e.is_finite()) {
                let cols = self.num_rotamers(*j);
                return Err(GraphError::NonFinitePairwiseEnergy {
                    pos_i: *i,
                    rot_i: idx / cols,
                    pos_j: *j,
                    rot_j: idx % cols,
                });
            }
        }

        let mut kept = 0;
        for (i, j, energies) in matrices {
            if energies.iter().any(|e| e.abs() > cutoff) {
                match self.lookup.get(&(i, j)) {
                    Some(&idx) => self.edges[idx].energies = energies,
                    None => self.insert_edge(i, j, Some(energies)),
                }
                kept += 1;
            }
        }
        debug!(
            candidate_pairs = pairs.len(),
            kept, "Populated pairwise energies."
        );
        Ok(kept)
    }

    /// Removes edges whose every entry is within `cutoff` of zero.
    pub fn drop_negligible_edges(&mut self, cutoff: f64) -> usize {
        let before = self.edges.len();
        let edges = std::mem::take(&mut self.edges);
        self.lookup.clear();
        self.adjacency.iter_mut().for_each(Vec::clear);
        for edge in edges {
            if edge.max_magnitude() > cutoff {
                let (lower, upper) = (edge.lower, edge.upper);
                self.insert_edge(lower, upper, Some(edge.energies));
            }
        }
        let dropped = before - self.edges.len();
        if dropped > 0 {
            debug!(dropped, remaining = self.edges.len(), "Dropped negligible edges.");
        }
        dropped
    }

    fn insert_edge(&mut self, lower: usize, upper: usize, energies: Option<Vec<f64>>) {
        let upper_count = self.num_rotamers(upper);
        let energies =
            energies.unwrap_or_else(|| vec![0.0; self.num_rotamers(lower) * upper_count]);
        let idx = self.edges.len();
        self.edges.push(Edge {
            lower,
            upper,
            upper_count,
            energies,
        });
        self.lookup.insert((lower, upper), idx);
        self.adjacency[lower].push(Neighbor {
            other: upper,
            edge: idx,
            is_lower: true,
        });
        self.adjacency[upper].push(Neighbor {
            other: lower,
            edge: idx,
            is_lower: false,
        });
    }

    fn check_position(&self, pos: usize) -> Result<(), GraphError> {
        if pos < self.num_positions() {
            Ok(())
        } else {
            Err(GraphError::OutOfRange {
                what: "Position",
                index: pos,
                len: self.num_positions(),
            })
        }
    }

    fn check_rotamer(&self, pos: usize, rot: usize) -> Result<(), GraphError> {
        self.check_position(pos)?;
        let len = self.num_rotamers(pos);
        if rot < len {
            Ok(())
        } else {
            Err(GraphError::OutOfRange {
                what: "Rotamer",
                index: rot,
                len,
            })
        }
    }
}

#[inline]
fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}
