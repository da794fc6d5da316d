use super::{
    AnnealableEnergy, AnnealableEnergyError, TermWeights, check_assignment, parse_params,
};
use crate::core::models::assignment::Assignment;
use crate::core::rotamers::sets::RotamerSets;
use serde::Deserialize;

pub const NAME: &str = "net-charge";

/// Shape of the penalty outside the allowed charge window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeTail {
    Constant,
    Linear,
    #[default]
    Quadratic,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct NetChargeParams {
    weight: Option<f64>,
    #[serde(default)]
    min_charge: f64,
    #[serde(default)]
    max_charge: f64,
    #[serde(default)]
    tail: ChargeTail,
}

/// Penalizes designs whose summed rotamer charge leaves `[min_charge, max_charge]`.
#[derive(Debug, Clone)]
pub struct NetChargePenalty {
    min_charge: f64,
    max_charge: f64,
    tail: ChargeTail,
    configured_weight: Option<f64>,
    weight: f64,
    charges: Vec<Vec<f64>>,
    current_charge: f64,
    pending_charge: Option<f64>,
}

impl NetChargePenalty {
    pub fn new(min_charge: f64, max_charge: f64, tail: ChargeTail) -> Self {
        Self {
            min_charge,
            max_charge,
            tail,
            configured_weight: None,
            weight: TermWeights::DEFAULT_WEIGHT,
            charges: Vec::new(),
            current_charge: 0.0,
            pending_charge: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.configured_weight = Some(weight);
        self
    }

    pub fn from_params(params: &toml::Table) -> Result<Self, AnnealableEnergyError> {
        let p: NetChargeParams = parse_params(NAME, params)?;
        if p.min_charge > p.max_charge {
            return Err(AnnealableEnergyError::Parameters {
                term: NAME.to_string(),
                reason: format!(
                    "min-charge {} exceeds max-charge {}",
                    p.min_charge, p.max_charge
                ),
            });
        }
        let mut term = Self::new(p.min_charge, p.max_charge, p.tail);
        term.configured_weight = p.weight;
        Ok(term)
    }

    pub fn current_charge(&self) -> f64 {
        self.current_charge
    }

    fn penalty(&self, charge: f64) -> f64 {
        let excess = if charge < self.min_charge {
            self.min_charge - charge
        } else if charge > self.max_charge {
            charge - self.max_charge
        } else {
            return 0.0;
        };
        let shaped = match self.tail {
            ChargeTail::Constant => 1.0,
            ChargeTail::Linear => excess,
            ChargeTail::Quadratic => excess * excess,
        };
        self.weight * shaped
    }
}

impl AnnealableEnergy for NetChargePenalty {
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
        self.charges = rotamer_sets
            .iter()
            .map(|(_, position)| {
                position
                    .rotamers()
                    .iter()
                    .map(|r| r.properties.charge)
                    .collect()
            })
            .collect();
        self.current_charge = assignment
            .iter()
            .map(|(pos, rot)| {
                self.charges
                    .get(pos)
                    .and_then(|c| c.get(rot))
                    .copied()
                    .unwrap_or(0.0)
            })
            .sum();
        self.pending_charge = None;
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
        let charges = self
            .charges
            .get(position)
            .ok_or_else(|| fail("position out of range"))?;
        let new = *charges
            .get(candidate)
            .ok_or_else(|| fail("rotamer out of range"))?;
        let old = assignment
            .get(position)
            .and_then(|rot| charges.get(rot))
            .copied()
            .ok_or_else(|| fail("assignment does not cover position"))?;

        let next_charge = self.current_charge - old + new;
        self.pending_charge = Some(next_charge);
        Ok(self.penalty(next_charge) - self.penalty(self.current_charge))
    }

    fn commit_considered_substitution(&mut self) -> Result<(), AnnealableEnergyError> {
        self.current_charge =
            self.pending_charge
                .take()
                .ok_or_else(|| AnnealableEnergyError::NoPendingSubstitution {
                    term: NAME.to_string(),
                })?;
        Ok(())
    }

    fn current_energy(&self) -> f64 {
        self.penalty(self.current_charge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rotamers::rotamer::{Rotamer, RotamerProperties};

    fn charged(name: &str, charge: f64) -> Rotamer {
        Rotamer::new(name, 0.0).with_properties(RotamerProperties {
            charge,
            buried_polar_groups: 0,
        })
    }

    fn sets() -> RotamerSets {
        let mut sets = RotamerSets::new();
        sets.add_rotamers_for_position(0, "A:1", vec![charged("n", 0.0), charged("k", 1.0)])
            .unwrap();
        sets.add_rotamers_for_position(1, "A:2", vec![charged("n", 0.0), charged("r", 1.0)])
            .unwrap();
        sets.finalize().unwrap();
        sets
    }

    #[test]
    fn evaluate_substitution_is_zero_inside_window() {
        let sets = sets();
        let a = Assignment::new(vec![0, 0]);
        let mut term = NetChargePenalty::new(-1.0, 1.0, ChargeTail::Quadratic);
        term.set_up_for_packing(&a, &sets, &TermWeights::new()).unwrap();
        assert_eq!(term.current_energy(), 0.0);
        assert_eq!(term.evaluate_substitution(0, 1, &a).unwrap(), 0.0);
    }

    #[test]
    fn evaluate_and_commit_track_charge_outside_window() {
        let sets = sets();
        let mut a = Assignment::new(vec![1, 0]);
        let mut term = NetChargePenalty::new(-1.0, 0.0, ChargeTail::Quadratic).with_weight(3.0);
        term.set_up_for_packing(&a, &sets, &TermWeights::new()).unwrap();
        assert_eq!(term.current_energy(), 3.0);

        // Charge 2.0 is two units above the window.
        assert_eq!(term.evaluate_substitution(1, 1, &a).unwrap(), 12.0 - 3.0);
        term.commit_considered_substitution().unwrap();
        a.substitute(1, 1);
        assert_eq!(term.current_charge(), 2.0);
        assert_eq!(term.current_energy(), 12.0);
    }

    #[test]
    fn tail_shapes_scale_differently() {
        let sets = sets();
        let a = Assignment::new(vec![1, 1]);
        for (tail, expected) in [
            (ChargeTail::Constant, 1.0),
            (ChargeTail::Linear, 2.0),
            (ChargeTail::Quadratic, 4.0),
        ] {
            let mut term = NetChargePenalty::new(0.0, 0.0, tail);
            term.set_up_for_packing(&a, &sets, &TermWeights::new()).unwrap();
            assert_eq!(term.current_energy(), expected, "{tail:?}");
        }
    }

    #[test]
    fn weight_table_overrides_configured_weight() {
        let sets = sets();
        let a = Assignment::new(vec![1, 1]);
        let mut weights = TermWeights::new();
        weights.set(NAME, 0.5);
        let mut term = NetChargePenalty::new(0.0, 0.0, ChargeTail::Linear).with_weight(10.0);
        term.set_up_for_packing(&a, &sets, &weights).unwrap();
        assert_eq!(term.current_energy(), 1.0);
    }

    #[test]
    fn commit_without_evaluation_fails() {
        let sets = sets();
        let a = Assignment::new(vec![0, 0]);
        let mut term = NetChargePenalty::new(0.0, 0.0, ChargeTail::Linear);
        term.set_up_for_packing(&a, &sets, &TermWeights::new()).unwrap();
        assert!(matches!(
            term.commit_considered_substitution(),
            Err(AnnealableEnergyError::NoPendingSubstitution { .. })
        ));
    }

    #[test]
    fn evaluate_out_of_range_candidate_fails() {
        let sets = sets();
        let a = Assignment::new(vec![0, 0]);
        let mut term = NetChargePenalty::new(0.0, 0.0, ChargeTail::Linear);
        term.set_up_for_packing(&a, &sets, &TermWeights::new()).unwrap();
        assert!(matches!(
            term.evaluate_substitution(0, 9, &a),
            Err(AnnealableEnergyError::Evaluation { position: 0, rotamer: 9, .. })
        ));
    }

    #[test]
    fn set_up_rejects_mismatched_assignment() {
        let sets = sets();
        let mut term = NetChargePenalty::new(0.0, 0.0, ChargeTail::Linear);
        let result = term.set_up_for_packing(&Assignment::new(vec![0]), &sets, &TermWeights::new());
        assert!(matches!(result, Err(AnnealableEnergyError::SetUp { .. })));
    }

    #[test]
    fn from_params_parses_kebab_case_table() {
        let params: toml::Table = toml::from_str(
            "weight = 2.0\nmin-charge = -2.0\nmax-charge = 1.0\ntail = \"linear\"",
        )
        .unwrap();
        let term = NetChargePenalty::from_params(&params).unwrap();
        assert_eq!(term.tail, ChargeTail::Linear);
        assert_eq!(term.configured_weight, Some(2.0));
        assert_eq!((term.min_charge, term.max_charge), (-2.0, 1.0));
    }

    #[test]
    fn from_params_rejects_inverted_window_and_unknown_keys() {
        let inverted: toml::Table = toml::from_str("min-charge = 1.0\nmax-charge = -1.0").unwrap();
        assert!(NetChargePenalty::from_params(&inverted).is_err());
        let unknown: toml::Table = toml::from_str("ph = 7.0").unwrap();
        assert!(NetChargePenalty::from_params(&unknown).is_err());
    }
}
