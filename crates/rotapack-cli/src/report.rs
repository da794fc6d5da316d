use crate::error::{CliError, Result};
use rotapack::core::rotamers::sets::RotamerSets;
use rotapack::workflows::pack::PackingResult;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct AssignedRotamer {
    pub position: String,
    pub rotamer: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct ReportEntry {
    pub rank: usize,
    pub job_id: usize,
    pub result_id: usize,
    pub partition: usize,
    pub score: f64,
    pub token: String,
    pub rotamers: Vec<AssignedRotamer>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct DiscardedEntry {
    pub job_id: usize,
    pub result_id: usize,
}

/// On-disk summary of a packing workflow.
///
/// The base seed is written as a string because TOML integers are signed
/// 64-bit.
#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct PackingReport {
    pub initial_energy: f64,
    pub base_seed: String,
    pub stopped_early: bool,
    pub runs_submitted: usize,
    pub runs_completed: usize,
    pub runs_failed: usize,
    pub results: Vec<ReportEntry>,
    pub discarded: Vec<DiscardedEntry>,
}

impl PackingReport {
    pub fn new(result: &PackingResult, sets: &RotamerSets) -> Result<Self> {
        let results = result
            .results
            .iter()
            .map(|packed| {
                let rotamers = packed
                    .assignment
                    .iter()
                    .map(|(pos, rot)| {
                        let rotamer = sets
                            .rotamer(pos, rot)
                            .map_err(|e| CliError::Other(anyhow::anyhow!(e)))?;
                        Ok(AssignedRotamer {
                            position: sets
                                .label(pos)
                                .map(str::to_string)
                                .unwrap_or_else(|| format!("pos{}", pos + 1)),
                            rotamer: rotamer.name.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ReportEntry {
                    rank: packed.rank,
                    job_id: packed.record.global_job_id,
                    result_id: packed.record.local_result_id,
                    partition: packed.record.partition,
                    score: packed.record.score,
                    token: format!("{:016x}", packed.record.token),
                    rotamers,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            initial_energy: result.initial_energy,
            base_seed: result.base_seed.to_string(),
            stopped_early: result.stopped_early,
            runs_submitted: result.runs_submitted,
            runs_completed: result.runs_completed,
            runs_failed: result.runs_failed,
            results,
            discarded: result
                .discarded
                .iter()
                .map(|&(job_id, result_id)| DiscardedEntry { job_id, result_id })
                .collect(),
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Other(e.into()))
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
