use super::ResultRecord;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Insertion {
    /// The record was kept; `evicted` is the record it pushed out, if any.
    Kept { evicted: Option<ResultRecord> },
    /// The record did not make the cut and is itself superseded.
    Rejected,
}

/// Best-first list of at most `capacity` records for one partition.
///
/// Records with equal scores stay in registration order, so on ties the
/// earlier record survives an eviction.
#[derive(Debug, Clone)]
pub(crate) struct PartitionStore {
    capacity: usize,
    records: Vec<ResultRecord>,
}

impl PartitionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// `max_same_token == 0` means any number of records may share a token.
    pub fn insert(&mut self, record: ResultRecord, max_same_token: usize) -> Insertion {
        if self.capacity == 0 {
            return Insertion::Rejected;
        }

        if max_same_token > 0 {
            let same_token: Vec<usize> = self
                .records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.token == record.token)
                .map(|(i, _)| i)
                .collect();
            if same_token.len() >= max_same_token {
                // Records are sorted, so the last same-token index is the worst of them.
                let worst = same_token[same_token.len() - 1];
                if record.score >= self.records[worst].score {
                    return Insertion::Rejected;
                }
                let evicted = self.records.remove(worst);
                self.insert_sorted(record);
                return Insertion::Kept {
                    evicted: Some(evicted),
                };
            }
        }

        let at = self.records.partition_point(|r| r.score <= record.score);
        if at >= self.capacity {
            return Insertion::Rejected;
        }
        self.records.insert(at, record);
        let evicted = if self.records.len() > self.capacity {
            self.records.pop()
        } else {
            None
        };
        Insertion::Kept { evicted }
    }

    fn insert_sorted(&mut self, record: ResultRecord) {
        let at = self.records.partition_point(|r| r.score <= record.score);
        self.records.insert(at, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(job: usize, score: f64, token: u64) -> ResultRecord {
        ResultRecord {
            global_job_id: job,
            local_result_id: 1,
            score,
            partition: 0,
            token,
        }
    }

    fn jobs(store: &PartitionStore) -> Vec<usize> {
        store.records().iter().map(|r| r.global_job_id).collect()
    }

    #[test]
    fn insert_keeps_best_first_and_evicts_worst() {
        let mut store = PartitionStore::new(2);
        assert_eq!(store.insert(rec(1, 3.0, 0), 0), Insertion::Kept { evicted: None });
        assert_eq!(store.insert(rec(2, 1.0, 0), 0), Insertion::Kept { evicted: None });
        assert_eq!(
            store.insert(rec(3, 2.0, 0), 0),
            Insertion::Kept {
                evicted: Some(rec(1, 3.0, 0))
            }
        );
        assert_eq!(jobs(&store), vec![2, 3]);
        assert_eq!(store.insert(rec(4, 5.0, 0), 0), Insertion::Rejected);
    }

    #[test]
    fn insert_keeps_first_registered_on_ties() {
        let mut store = PartitionStore::new(1);
        store.insert(rec(1, 1.0, 0), 0);
        assert_eq!(store.insert(rec(2, 1.0, 0), 0), Insertion::Rejected);
        assert_eq!(jobs(&store), vec![1]);

        let mut store = PartitionStore::new(3);
        store.insert(rec(1, 1.0, 0), 0);
        store.insert(rec(2, 1.0, 0), 0);
        store.insert(rec(3, 0.5, 0), 0);
        assert_eq!(jobs(&store), vec![3, 1, 2]);
    }

    #[test]
    fn insert_limits_records_sharing_a_token() {
        let mut store = PartitionStore::new(5);
        store.insert(rec(1, 2.0, 7), 1);
        assert_eq!(
            store.insert(rec(2, 1.0, 7), 1),
            Insertion::Kept {
                evicted: Some(rec(1, 2.0, 7))
            }
        );
        assert_eq!(store.insert(rec(3, 1.5, 7), 1), Insertion::Rejected);
        store.insert(rec(4, 3.0, 8), 1);
        assert_eq!(jobs(&store), vec![2, 4]);
    }

    #[test]
    fn clear_empties_store() {
        let mut store = PartitionStore::new(2);
        store.insert(rec(1, 0.0, 0), 0);
        store.clear();
        assert!(store.records().is_empty());
    }
}
