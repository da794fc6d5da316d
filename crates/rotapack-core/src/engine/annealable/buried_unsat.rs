use super::{
    AnnealableEnergy, AnnealableEnergyError, TermWeights, check_assignment, parse_params,
};
use crate::core::models::assignment::Assignment;
use crate::core::rotamers::sets::RotamerSets;
use serde::Deserialize;
use std::collections::HashMap;

pub const NAME: &str = "buried-unsat";

/// Scale applied to the unsatisfied count before squaring.
const COUNT_SCALE: f64 = 5.0;

/// A hydrogen bond between two rotamers, each given as `(position, rotamer)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HBondPair {
    pub a: (usize, usize),
    pub b: (usize, usize),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct BuriedUnsatParams {
    weight: Option<f64>,
    #[serde(default)]
    hbonds: Vec<HBondPair>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    exposed: i64,
    satisfied: i64,
}

/// Penalty on buried polar groups left without a hydrogen-bond partner.
///
/// The count is `exposed - satisfied`, floored at zero, where `exposed` sums
/// the buried polar groups of the assigned rotamers and `satisfied` counts the
/// declared hydrogen bonds whose two rotamers are both assigned. The energy is
/// `weight * (5 * count)^2`, so it cannot be split into pairwise tables.
#[derive(Debug, Clone)]
pub struct BuriedUnsatPenalty {
    hbonds: Vec<HBondPair>,
    configured_weight: Option<f64>,
    weight: f64,
    exposed_per_rotamer: Vec<Vec<i64>>,
    partners: HashMap<(usize, usize), Vec<(usize, usize)>>,
    exposed: i64,
    satisfied: i64,
    pending: Option<Pending>,
}

impl BuriedUnsatPenalty {
    pub fn new(hbonds: Vec<HBondPair>) -> Self {
        Self {
            hbonds,
            configured_weight: None,
            weight: TermWeights::DEFAULT_WEIGHT,
            exposed_per_rotamer: Vec::new(),
            partners: HashMap::new(),
            exposed: 0,
            satisfied: 0,
            pending: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.configured_weight = Some(weight);
        self
    }

    pub fn from_params(params: &toml::Table) -> Result<Self, AnnealableEnergyError> {
        let p: BuriedUnsatParams = parse_params(NAME, params)?;
        if let Some(pair) = p.hbonds.iter().find(|h| h.a.0 == h.b.0) {
            return Err(AnnealableEnergyError::Parameters {
                term: NAME.to_string(),
                reason: format!(
                    "hydrogen bond between two rotamers of position {}",
                    pair.a.0
                ),
            });
        }
        let mut term = Self::new(p.hbonds);
        term.configured_weight = p.weight;
        Ok(term)
    }

    pub fn unsatisfied_count(&self) -> i64 {
        (self.exposed - self.satisfied).max(0)
    }

    fn penalty(&self, exposed: i64, satisfied: i64) -> f64 {
        let count = (exposed - satisfied).max(0) as f64;
        let scaled = COUNT_SCALE * count;
        self.weight * scaled * scaled
    }

    /// Hydrogen bonds from `(pos, rot)` to partners currently assigned at other positions.
    fn satisfied_with(&self, pos: usize, rot: usize, assignment: &Assignment) -> i64 {
        self.partners.get(&(pos, rot)).map_or(0, |partners| {
            partners
                .iter()
                .filter(|&&(q, r)| q != pos && assignment.get(q) == Some(r))
                .count() as i64
        })
    }
}

impl AnnealableEnergy for BuriedUnsatPenalty {
    fn name(&self) -> &str {
        NAME
    }

    fn set_up_for_packing(
        &mut self,
        assignment: &Assignment,
        rotamer_sets: &RotamerSets,
        weights: &TermWeights,
    ) -> Result<(), AnnealableEnergyError> {
        check_assignment(NAME, assignment, rotamer_sets)?;
        self.weight = weights.resolve(NAME, self.configured_weight);

        self.partners.clear();
        for pair in &self.hbonds {
            for (pos, rot) in [pair.a, pair.b] {
                if rot >= rotamer_sets.num_rotamers(pos) {
                    return Err(AnnealableEnergyError::SetUp {
                        term: NAME.to_string(),
                        reason: format!(
                            "hydrogen bond references rotamer {rot} of position {pos}, which does not exist"
                        ),
                    });
                }
            }
            self.partners.entry(pair.a).or_default().push(pair.b);
            self.partners.entry(pair.b).or_default().push(pair.a);
        }

        self.exposed_per_rotamer = (0..rotamer_sets.num_positions())
            .map(|pos| {
                rotamer_sets.position(pos).map_or_else(
                    |_| Vec::new(),
                    |p| {
                        p.rotamers()
                            .iter()
                            .map(|r| i64::from(r.properties.buried_polar_groups))
                            .collect()
                    },
                )
            })
            .collect();

        self.exposed = assignment
            .iter()
            .map(|(pos, rot)| self.exposed_per_rotamer[pos].get(rot).copied().unwrap_or(0))
            .sum();
        // Every bond is seen from both ends.
        self.satisfied = assignment
            .iter()
            .map(|(pos, rot)| self.satisfied_with(pos, rot, assignment))
            .sum::<i64>()
            / 2;
        self.pending = None;
        Ok(())
    }

    fn evaluate_substitution(
        &mut self,
        position: usize,
        candidate: usize,
        assignment: &Assignment,
    ) -> Result<f64, AnnealableEnergyError> {
        let fail = |reason: &str| AnnealableEnergyError::Evaluation {
            term: NAME.to_string(),
            position,
            rotamer: candidate,
            reason: reason.to_string(),
        };
        let per_rotamer = self
            .exposed_per_rotamer
            .get(position)
            .ok_or_else(|| fail("position out of range"))?;
        let new_exposed = *per_rotamer
            .get(candidate)
            .ok_or_else(|| fail("rotamer out of range"))?;
        let current = assignment
            .get(position)
            .ok_or_else(|| fail("assignment does not cover position"))?;
        let old_exposed = per_rotamer.get(current).copied().unwrap_or(0);

        let exposed = self.exposed - old_exposed + new_exposed;
        let satisfied = self.satisfied - self.satisfied_with(position, current, assignment)
            + self.satisfied_with(position, candidate, assignment);

        self.pending = Some(Pending { exposed, satisfied });
        Ok(self.penalty(exposed, satisfied) - self.penalty(self.exposed, self.satisfied))
    }

    fn commit_considered_substitution(&mut self) -> Result<(), AnnealableEnergyError> {
        let pending =
            self.pending
                .take()
                .ok_or_else(|| AnnealableEnergyError::NoPendingSubstitution {
                    term: NAME.to_string(),
                })?;
        self.exposed = pending.exposed;
        self.satisfied = pending.satisfied;
        Ok(())
    }

    fn current_energy(&self) -> f64 {
        self.penalty(self.exposed, self.satisfied)
    }
}
