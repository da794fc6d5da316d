//! Aggregation of many independent packing runs.
//!
//! The [`NodeManager`] hands out job ids, receives one or more scored results
//! per finished job, and keeps the best `K_p` results of each partition. Every
//! result that falls out of a top-K list is queued on a discard list so the
//! caller can release whatever backs it. Once every partition has received its
//! configured threshold of results the manager reports an early stop, after
//! which callers should not submit further jobs.
//!
//! Registration order decides ties, so results must be registered from a
//! single thread (or behind a lock) in a stable order for reproducible output.

mod storage;

use storage::{Insertion, PartitionStore};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeManagerError {
    #[error("Node manager needs at least one partition")]
    NoPartitions,
    #[error("Expected {expected} per-partition {what} values, found {found}")]
    PartitionCountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Partition {partition} is out of range (have {num_partitions})")]
    PartitionOutOfRange {
        partition: usize,
        num_partitions: usize,
    },
    #[error("Score for job {global_job_id} result {local_result_id} is not a finite number")]
    InvalidScore {
        global_job_id: usize,
        local_result_id: usize,
    },
}

/// One scored result of a finished job. Lower scores are better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRecord {
    pub global_job_id: usize,
    pub local_result_id: usize,
    pub score: f64,
    pub partition: usize,
    pub token: u64,
}

impl ResultRecord {
    pub fn id(&self) -> (usize, usize) {
        (self.global_job_id, self.local_result_id)
    }
}

/// The placeholder id of an empty slot; never reported as discarded.
const EMPTY_RESULT: (usize, usize) = (0, 0);

#[derive(Debug, Clone)]
pub struct NodeManager {
    job_offset: usize,
    num_jobs_total: usize,
    num_jobs_submitted: usize,
    num_jobs_completed: usize,
    num_results_total: usize,
    num_results_received: usize,
    num_results_to_keep_for_part: Vec<usize>,
    num_results_received_for_part: Vec<usize>,
    result_threshold_per_part: Vec<usize>,
    return_results_depth_first: bool,
    max_num_results_with_same_token_per_partition: usize,
    stores: Vec<PartitionStore>,
    job_results_that_should_be_discarded: Vec<(usize, usize)>,
    stopped_early: bool,
}

impl NodeManager {
    /// An empty `result_threshold_per_part` disables early stopping.
    pub fn new(
        job_offset: usize,
        num_jobs_total: usize,
        num_partitions: usize,
        num_results_to_keep_for_part: Vec<usize>,
        result_threshold_per_part: Vec<usize>,
        return_results_depth_first: bool,
    ) -> Result<Self, NodeManagerError> {
        if num_partitions == 0 {
            return Err(NodeManagerError::NoPartitions);
        }
        if num_results_to_keep_for_part.len() != num_partitions {
            return Err(NodeManagerError::PartitionCountMismatch {
                what: "keep count",
                expected: num_partitions,
                found: num_results_to_keep_for_part.len(),
            });
        }
        if !result_threshold_per_part.is_empty() && result_threshold_per_part.len() != num_partitions
        {
            return Err(NodeManagerError::PartitionCountMismatch {
                what: "result threshold",
                expected: num_partitions,
                found: result_threshold_per_part.len(),
            });
        }

        for (part, keep) in num_results_to_keep_for_part.iter().enumerate() {
            debug!(partition = part, keep, "Configured partition.");
        }

        Ok(Self {
            job_offset,
            num_jobs_total,
            num_jobs_submitted: 0,
            num_jobs_completed: 0,
            num_results_total: 0,
            num_results_received: 0,
            stores: num_results_to_keep_for_part
                .iter()
                .map(|&keep| PartitionStore::new(keep))
                .collect(),
            num_results_to_keep_for_part,
            num_results_received_for_part: vec![0; num_partitions],
            result_threshold_per_part,
            return_results_depth_first,
            max_num_results_with_same_token_per_partition: 0,
            job_results_that_should_be_discarded: Vec::new(),
            stopped_early: false,
        })
    }

    /// A manager with a single partition.
    pub fn simple(
        job_offset: usize,
        num_jobs_total: usize,
        num_results_to_keep: usize,
        result_threshold: Option<usize>,
        return_results_depth_first: bool,
    ) -> Result<Self, NodeManagerError> {
        Self::new(
            job_offset,
            num_jobs_total,
            1,
            vec![num_results_to_keep],
            result_threshold.into_iter().collect(),
            return_results_depth_first,
        )
    }

    /// Splits `num_results_to_keep` (and the optional total threshold) as evenly
    /// as possible over the partitions; lower partitions take the remainder.
    pub fn evenly_partitioned(
        job_offset: usize,
        num_jobs_total: usize,
        num_results_to_keep: usize,
        num_partitions: usize,
        result_threshold: Option<usize>,
        return_results_depth_first: bool,
    ) -> Result<Self, NodeManagerError> {
        if num_partitions == 0 {
            return Err(NodeManagerError::NoPartitions);
        }
        Self::new(
            job_offset,
            num_jobs_total,
            num_partitions,
            split_evenly(num_results_to_keep, num_partitions),
            result_threshold
                .map(|t| split_evenly(t, num_partitions))
                .unwrap_or_default(),
            return_results_depth_first,
        )
    }

    pub fn register_result(
        &mut self,
        global_job_id: usize,
        local_result_id: usize,
        score: f64,
        partition: usize,
        token: u64,
    ) -> Result<(), NodeManagerError> {
        let num_partitions = self.num_partitions();
        if partition >= num_partitions {
            return Err(NodeManagerError::PartitionOutOfRange {
                partition,
                num_partitions,
            });
        }
        if !score.is_finite() {
            return Err(NodeManagerError::InvalidScore {
                global_job_id,
                local_result_id,
            });
        }

        self.num_results_received += 1;
        self.num_results_received_for_part[partition] += 1;

        let record = ResultRecord {
            global_job_id,
            local_result_id,
            score,
            partition,
            token,
        };
        let superseded = match self.stores[partition]
            .insert(record, self.max_num_results_with_same_token_per_partition)
        {
            Insertion::Kept { evicted } => evicted.map(|r| r.id()),
            Insertion::Rejected => Some(record.id()),
        };
        if let Some(id) = superseded.filter(|&id| id != EMPTY_RESULT) {
            self.job_results_that_should_be_discarded.push(id);
        }

        if !self.stopped_early && self.ready_to_finish_early() {
            info!(
                received = self.num_results_received,
                "Every partition reached its result threshold; stopping early."
            );
            self.stopped_early = true;
        }
        Ok(())
    }

    fn ready_to_finish_early(&self) -> bool {
        !self.result_threshold_per_part.is_empty()
            && self
                .num_results_received_for_part
                .iter()
                .zip(&self.result_threshold_per_part)
                .all(|(received, threshold)| received >= threshold)
    }

    /// Drops every kept result; job and result counters are preserved.
    pub fn clear(&mut self) {
        for store in &mut self.stores {
            store.clear();
        }
    }

    /// Returns the next 1-based local job id, or `None` once submission is done.
    pub fn get_next_local_jobid(&mut self) -> Option<usize> {
        if self.done_submitting() {
            return None;
        }
        self.num_jobs_submitted += 1;
        Some(self.num_jobs_submitted)
    }

    pub fn done_submitting(&self) -> bool {
        self.stopped_early || self.num_jobs_submitted >= self.num_jobs_total
    }

    pub fn note_job_completed(&mut self, global_job_id: usize, num_results: usize) {
        debug!(global_job_id, num_results, "Job completed.");
        self.num_jobs_completed += 1;
        self.num_results_total += num_results;
    }

    pub fn all_results_are_in(&self) -> bool {
        self.num_jobs_completed >= self.num_jobs_total
            || (self.stopped_early && self.num_jobs_completed >= self.num_jobs_submitted)
    }

    /// Kept results in traversal order: partition by partition when depth-first,
    /// otherwise rank by rank across partitions.
    pub fn results_to_keep(&self) -> Vec<ResultRecord> {
        if self.return_results_depth_first {
            self.stores
                .iter()
                .flat_map(|s| s.records().iter().copied())
                .collect()
        } else {
            let deepest = self.stores.iter().map(|s| s.records().len()).max().unwrap_or(0);
            (0..deepest)
                .flat_map(|rank| {
                    self.stores
                        .iter()
                        .filter_map(move |s| s.records().get(rank).copied())
                })
                .collect()
        }
    }

    /// The `n`-th (1-based) kept result id in [`results_to_keep`](Self::results_to_keep) order.
    pub fn get_nth_job_result_id(&self, n: usize) -> Option<(usize, usize)> {
        n.checked_sub(1)
            .and_then(|idx| self.results_to_keep().get(idx).map(ResultRecord::id))
    }

    /// Moves every queued discard into `list`.
    pub fn append_job_results_that_should_be_discarded(&mut self, list: &mut Vec<(usize, usize)>) {
        list.append(&mut self.job_results_that_should_be_discarded);
    }

    pub fn set_max_num_results_with_same_token_per_partition(&mut self, limit: usize) {
        self.max_num_results_with_same_token_per_partition = limit;
    }

    pub fn max_num_results_with_same_token_per_partition(&self) -> usize {
        self.max_num_results_with_same_token_per_partition
    }

    pub fn set_num_jobs(&mut self, num_jobs: usize) {
        self.num_jobs_total = num_jobs;
    }

    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }

    pub fn job_offset(&self) -> usize {
        self.job_offset
    }

    pub fn num_jobs(&self) -> usize {
        self.num_jobs_total
    }

    pub fn num_jobs_submitted(&self) -> usize {
        self.num_jobs_submitted
    }

    pub fn num_jobs_completed(&self) -> usize {
        self.num_jobs_completed
    }

    pub fn num_results_total(&self) -> usize {
        self.num_results_total
    }

    pub fn num_results_received(&self) -> usize {
        self.num_results_received
    }

    pub fn num_results_received_for_part(&self, partition: usize) -> Option<usize> {
        self.num_results_received_for_part.get(partition).copied()
    }

    pub fn num_results_to_keep(&self) -> usize {
        self.num_results_to_keep_for_part.iter().sum()
    }

    pub fn num_results_to_keep_for_part(&self, partition: usize) -> Option<usize> {
        self.num_results_to_keep_for_part.get(partition).copied()
    }

    pub fn num_partitions(&self) -> usize {
        self.stores.len()
    }
}

fn split_evenly(total: usize, parts: usize) -> Vec<usize> {
    let base = total / parts;
    let remainder = total % parts;
    (0..parts)
        .map(|p| base + usize::from(p < remainder))
        .collect()
}
