use super::buried_unsat::{self, BuriedUnsatPenalty};
use super::net_charge::{self, NetChargePenalty};
use super::{AnnealableEnergy, AnnealableEnergyError};
use crate::core::io::problem::TermSpec;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

pub type TermConstructor = Box<
    dyn Fn(&toml::Table) -> Result<Box<dyn AnnealableEnergy>, AnnealableEnergyError> + Send + Sync,
>;

/// Named constructors for non-pairwise energy terms.
///
/// Each packing run builds a fresh set of terms from the problem's
/// [`TermSpec`]s, so the registry itself holds no term state.
#[derive(Default)]
pub struct AnnealableEnergyRegistry {
    constructors: BTreeMap<String, TermConstructor>,
}

impl fmt::Debug for AnnealableEnergyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnealableEnergyRegistry")
            .field("terms", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AnnealableEnergyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(net_charge::NAME, |params| {
            Ok(Box::new(NetChargePenalty::from_params(params)?) as Box<dyn AnnealableEnergy>)
        });
        registry.register(buried_unsat::NAME, |params| {
            Ok(Box::new(BuriedUnsatPenalty::from_params(params)?) as Box<dyn AnnealableEnergy>)
        });
        registry
    }

    /// Registers `constructor` under `name`, returning `true` if it replaced an earlier entry.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> bool
    where
        F: Fn(&toml::Table) -> Result<Box<dyn AnnealableEnergy>, AnnealableEnergyError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(name.into(), Box::new(constructor))
            .is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn create(&self, spec: &TermSpec) -> Result<Box<dyn AnnealableEnergy>, AnnealableEnergyError> {
        let constructor = self
            .constructors
            .get(&spec.kind)
            .ok_or_else(|| AnnealableEnergyError::UnknownTerm(spec.kind.clone()))?;
        debug!(term = %spec.kind, "Creating non-pairwise energy term.");
        constructor(&spec.params)
    }

    pub fn create_all(
        &self,
        specs: &[TermSpec],
    ) -> Result<Vec<Box<dyn AnnealableEnergy>>, AnnealableEnergyError> {
        specs.iter().map(|spec| self.create(spec)).collect()
    }
}
