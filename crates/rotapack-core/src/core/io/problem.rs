use crate::core::energy::graph::{GraphError, InteractionGraph};
use crate::core::rotamers::rotamer::{Rotamer, RotamerData};
use crate::core::rotamers::sets::{RotamerSetError, RotamerSets};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Declaration of a non-pairwise energy term inside a problem file.
///
/// `kind` names a constructor in the annealable energy registry; every other
/// key of the table is handed to that constructor unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TermSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: toml::Table,
}

impl TermSpec {
    pub fn new(kind: impl Into<String>, params: toml::Table) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPosition {
    label: Option<String>,
    rotamers: Vec<RotamerData>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEdge {
    positions: [usize; 2],
    energies: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProblem {
    #[serde(default)]
    positions: Vec<RawPosition>,
    #[serde(default)]
    edges: Vec<RawEdge>,
    #[serde(default)]
    terms: Vec<TermSpec>,
}

#[derive(Debug, Error)]
pub enum ProblemLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Problem defines no positions")]
    NoPositions,
    #[error("Invalid rotamers for position '{label}': {source}")]
    Rotamers {
        label: String,
        source: RotamerSetError,
    },
    #[error("Invalid edge #{index}: {source}")]
    Edge { index: usize, source: GraphError },
    #[error("Invalid problem: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },
}

/// A complete packing problem: candidates, energies and non-pairwise term declarations.
///
/// The rotamer sets are left `Open`; the annealer finalizes them when a run starts.
#[derive(Debug, Clone)]
pub struct PackingProblem {
    pub rotamer_sets: RotamerSets,
    pub graph: InteractionGraph,
    pub terms: Vec<TermSpec>,
}

impl PackingProblem {
    pub fn read_from_path(path: &Path) -> Result<Self, ProblemLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProblemLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn read_from(reader: &mut impl Read) -> Result<Self, ProblemLoadError> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| ProblemLoadError::Io {
                path: "<reader>".to_string(),
                source: e,
            })?;
        Self::parse(&content, "<reader>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ProblemLoadError> {
        let raw: RawProblem = toml::from_str(content).map_err(|e| ProblemLoadError::Toml {
            path: origin.to_string(),
            source: e,
        })?;
        if raw.positions.is_empty() {
            return Err(ProblemLoadError::NoPositions);
        }

        let mut rotamer_sets = RotamerSets::new();
        for (pos, position) in raw.positions.into_iter().enumerate() {
            let label = position.label.unwrap_or_else(|| format!("pos{}", pos + 1));
            let rotamers: Vec<Rotamer> = position.rotamers.into_iter().map(Into::into).collect();
            rotamer_sets
                .add_rotamers_for_position(pos, label.clone(), rotamers)
                .map_err(|source| ProblemLoadError::Rotamers { label, source })?;
        }

        let mut graph = InteractionGraph::from_rotamer_sets(&rotamer_sets)?;
        for (index, edge) in raw.edges.iter().enumerate() {
            let [pos_i, pos_j] = edge.positions;
            graph
                .set_pairwise_matrix(pos_i, pos_j, &edge.energies)
                .map_err(|source| ProblemLoadError::Edge { index, source })?;
        }

        debug!(
            origin,
            positions = rotamer_sets.num_positions(),
            rotamers = rotamer_sets.total_rotamers(),
            edges = graph.num_edges(),
            terms = raw.terms.len(),
            "Parsed packing problem."
        );

        Ok(Self {
            rotamer_sets,
            graph,
            terms: raw.terms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::assignment::Assignment;
    use std::fs;

    const CHAIN_PROBLEM: &str = r#"
[[positions]]
label = "A:1"
rotamers = [
    { name = "a0", energy = 0.0, native = true },
    { name = "a1", energy = 5.0 },
]

[[positions]]
label = "A:2"
rotamers = [
    { name = "b0", energy = 0.0 },
    { name = "b1", energy = 3.0, charge = -1.0, buried-polar-groups = 1 },
]

[[positions]]
rotamers = [
    { name = "c0", energy = 0.0 },
    { name = "c1", energy = 1.0 },
]

[[edges]]
positions = [0, 1]
energies = [[0.0, 1.0], [1.0, 0.0]]

[[edges]]
positions = [2, 1]
energies = [[0.0, 1.0], [1.0, 0.0]]

[[terms]]
type = "net-charge"
min-charge = -1.0
max-charge = 1.0
"#;

    #[test]
    fn read_from_path_builds_sets_graph_and_terms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("problem.toml");
        fs::write(&path, CHAIN_PROBLEM).unwrap();

        let problem = PackingProblem::read_from_path(&path).unwrap();
        assert_eq!(problem.rotamer_sets.num_positions(), 3);
        assert!(!problem.rotamer_sets.is_finalized());
        assert_eq!(problem.rotamer_sets.label(2), Some("pos3"));
        assert_eq!(
            problem.rotamer_sets.rotamer(1, 1).unwrap().properties.charge,
            -1.0
        );
        assert_eq!(problem.graph.num_edges(), 2);

        let start = Assignment::new(vec![0, 0, 0]);
        assert_eq!(problem.graph.total_energy(&start), 0.0);
        assert_eq!(problem.graph.delta_energy_for_substitution(1, 1, &start), 5.0);

        assert_eq!(problem.terms.len(), 1);
        assert_eq!(problem.terms[0].kind, "net-charge");
        assert_eq!(
            problem.terms[0].params.get("max-charge").and_then(|v| v.as_float()),
            Some(1.0)
        );
    }

    #[test]
    fn read_from_reader_parses_content() {
        let mut reader = CHAIN_PROBLEM.as_bytes();
        let problem = PackingProblem::read_from(&mut reader).unwrap();
        assert_eq!(problem.rotamer_sets.total_rotamers(), 6);
    }

    #[test]
    fn missing_file_is_reported_as_io_error() {
        let result = PackingProblem::read_from_path(Path::new("/nonexistent/problem.toml"));
        assert!(matches!(result, Err(ProblemLoadError::Io { .. })));
    }

    #[test]
    fn empty_problem_is_rejected() {
        let mut reader = "".as_bytes();
        assert!(matches!(
            PackingProblem::read_from(&mut reader),
            Err(ProblemLoadError::NoPositions)
        ));
    }

    #[test]
    fn position_without_rotamers_is_rejected() {
        let mut reader = r#"
[[positions]]
label = "A:7"
rotamers = []
"#
        .as_bytes();
        let result = PackingProblem::read_from(&mut reader);
        assert!(matches!(
            result,
            Err(ProblemLoadError::Rotamers { ref label, source: RotamerSetError::EmptyCandidateList { .. } }) if label == "A:7"
        ));
    }

    #[test]
    fn badly_shaped_edge_is_rejected() {
        let mut reader = r#"
[[positions]]
rotamers = [{ name = "a", energy = 0.0 }]

[[positions]]
rotamers = [{ name = "b", energy = 0.0 }, { name = "c", energy = 0.0 }]

[[edges]]
positions = [0, 1]
energies = [[1.0]]
"#
        .as_bytes();
        let result = PackingProblem::read_from(&mut reader);
        assert!(matches!(
            result,
            Err(ProblemLoadError::Edge { index: 0, source: GraphError::MatrixShape { .. } })
        ));
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        let mut reader = r#"
solvent = "water"

[[positions]]
rotamers = [{ name = "a", energy = 0.0 }]
"#
        .as_bytes();
        assert!(matches!(
            PackingProblem::read_from(&mut reader),
            Err(ProblemLoadError::Toml { .. })
        ));
    }

    #[test]
    fn infinite_rotamer_energy_is_rejected() {
        let mut reader = r#"
[[positions]]
rotamers = [
    { name = "a", energy = inf, native = true },
    { name = "b", energy = 0.0 },
]
"#
        .as_bytes();
        assert!(matches!(
            PackingProblem::read_from(&mut reader),
            Err(ProblemLoadError::Graph { source: GraphError::NonFiniteEnergy { pos: 0, rot: 0 } })
        ));
    }

    #[test]
    fn nan_edge_energy_is_rejected() {
        let mut reader = r#"
[[positions]]
rotamers = [{ name = "a", energy = 0.0 }]

[[positions]]
rotamers = [{ name = "b", energy = 0.0 }, { name = "c", energy = 0.0 }]

[[edges]]
positions = [0, 1]
energies = [[1.0, nan]]
"#
        .as_bytes();
        assert!(matches!(
            PackingProblem::read_from(&mut reader),
            Err(ProblemLoadError::Edge {
                index: 0,
                source: GraphError::NonFinitePairwiseEnergy { pos_i: 0, rot_i: 0, pos_j: 1, rot_j: 1 }
            })
        ));
    }
}
