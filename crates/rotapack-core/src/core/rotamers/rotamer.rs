use serde::Deserialize;

/// Physical properties of a rotamer that non-pairwise energy terms read.
///
/// The packer itself never looks at these values; they are carried alongside
/// each rotamer so that terms such as the net-charge penalty or the buried
/// unsatisfied polar penalty can evaluate an assignment without reaching back
/// into the chemistry layer that enumerated the rotamers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotamerProperties {
    /// The net formal charge of the side chain in elementary charges.
    ///
    /// Summed over every position of an assignment to obtain the net charge
    /// of the designed region.
    pub charge: f64,
    /// The number of buried polar groups this rotamer exposes.
    ///
    /// Each of these groups needs a hydrogen-bond partner; groups that do not
    /// find one in the current assignment count as unsatisfied.
    pub buried_polar_groups: u32,
}

/// Represents rotamer data for a single candidate, suitable for deserialization from problem files.
///
/// This is the on-disk shape of a rotamer inside a `[[positions]]` table. It is
/// converted into the runtime [`Rotamer`] when a problem is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RotamerData {
    /// A human-readable identifier (e.g., "LEU:3" or "ASP:native").
    pub name: String,
    /// The one-body (context-independent) energy of this rotamer.
    ///
    /// This combines the rotamer's internal energy with its interaction
    /// against the fixed background of the structure.
    pub energy: f64,
    /// The net formal charge of the rotamer. Defaults to zero.
    #[serde(default)]
    pub charge: f64,
    /// The number of buried polar groups exposed by the rotamer. Defaults to zero.
    #[serde(default)]
    pub buried_polar_groups: u32,
    /// Marks the input conformation of the position.
    #[serde(default)]
    pub native: bool,
}

/// Represents one discrete candidate assignment at a packable position.
///
/// A rotamer is immutable once enumerated. Its identity inside a packing run is
/// the pair (position index, local rotamer index) assigned by the
/// [`RotamerSets`](super::sets::RotamerSets) that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotamer {
    /// A human-readable identifier used in reports and log messages.
    pub name: String,
    /// The one-body energy contribution of this rotamer.
    pub one_body_energy: f64,
    /// Properties consumed by non-pairwise energy terms.
    pub properties: RotamerProperties,
    /// Whether this rotamer is the input ("native") conformation of its position.
    ///
    /// The native rotamer is the initial choice of every annealing run and the
    /// fallback that guarantees each position has at least one candidate.
    pub is_native: bool,
}

impl Rotamer {
    pub fn new(name: impl Into<String>, one_body_energy: f64) -> Self {
        Self {
            name: name.into(),
            one_body_energy,
            properties: RotamerProperties::default(),
            is_native: false,
        }
    }

    pub fn with_properties(mut self, properties: RotamerProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn native(mut self) -> Self {
        self.is_native = true;
        self
    }
}

impl From<RotamerData> for Rotamer {
    fn from(data: RotamerData) -> Self {
        Self {
            name: data.name,
            one_body_energy: data.energy,
            properties: RotamerProperties {
                charge: data.charge,
                buried_polar_groups: data.buried_polar_groups,
            },
            is_native: data.native,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_non_native_rotamer_with_default_properties() {
        let rotamer = Rotamer::new("LEU:1", -1.5);
        assert_eq!(rotamer.name, "LEU:1");
        assert_eq!(rotamer.one_body_energy, -1.5);
        assert_eq!(rotamer.properties, RotamerProperties::default());
        assert!(!rotamer.is_native);
    }

    #[test]
    fn builder_methods_set_properties_and_native_flag() {
        let rotamer = Rotamer::new("ASP:2", 0.3)
            .with_properties(RotamerProperties {
                charge: -1.0,
                buried_polar_groups: 2,
            })
            .native();
        assert_eq!(rotamer.properties.charge, -1.0);
        assert_eq!(rotamer.properties.buried_polar_groups, 2);
        assert!(rotamer.is_native);
    }

    #[test]
    fn rotamer_data_deserializes_with_defaults() {
        let data: RotamerData = toml::from_str(r#"name = "SER:1"
energy = 0.25"#)
        .unwrap();
        let rotamer = Rotamer::from(data);
        assert_eq!(rotamer.name, "SER:1");
        assert_eq!(rotamer.one_body_energy, 0.25);
        assert_eq!(rotamer.properties.charge, 0.0);
        assert_eq!(rotamer.properties.buried_polar_groups, 0);
        assert!(!rotamer.is_native);
    }

    #[test]
    fn rotamer_data_reads_kebab_case_fields() {
        let data: RotamerData = toml::from_str(
            r#"name = "LYS:4"
energy = 1.0
charge = 1.0
buried-polar-groups = 3
native = true"#,
        )
        .unwrap();
        let rotamer = Rotamer::from(data);
        assert_eq!(rotamer.properties.charge, 1.0);
        assert_eq!(rotamer.properties.buried_polar_groups, 3);
        assert!(rotamer.is_native);
    }

    #[test]
    fn rotamer_data_rejects_unknown_fields() {
        let result: Result<RotamerData, _> = toml::from_str(
            r#"name = "LYS:4"
energy = 1.0
chi1 = 60.0"#,
        );
        assert!(result.is_err());
    }
}
