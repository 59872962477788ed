//! Keyed job storage with an insertion-ordered index.

use std::collections::HashMap;
use std::sync::RwLock;

use ytmp3_models::{Job, JobId};

/// The single source of truth for job state.
///
/// Records are keyed by [`JobId`]; a separate index preserves submission
/// order, which is also FIFO dispatch order. The index and the record map are
/// guarded independently: `remove` takes the id out of the index first and
/// deletes the record second, so a `get`/`list` racing a concurrent `remove`
/// may observe a dangling id. `list` tolerates that by skipping ids whose
/// record is already gone.
///
/// There is no partial-field update: writers read the whole record, modify
/// it, and `put` it back. Two writers to the same id resolve as
/// subsequent-write-wins.
#[derive(Debug, Default)]
pub struct JobStore {
    index: RwLock<Vec<JobId>>,
    records: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append jobs to the store in the given order.
    pub fn append(&self, jobs: impl IntoIterator<Item = Job>) {
        for job in jobs {
            let id = job.id.clone();
            self.records
                .write()
                .expect("job records lock poisoned")
                .insert(id.clone(), job);
            self.index.write().expect("job index lock poisoned").push(id);
        }
    }

    /// Fetch a single job record.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.records
            .read()
            .expect("job records lock poisoned")
            .get(id)
            .cloned()
    }

    /// Snapshot all jobs in index (submission) order.
    ///
    /// Ids whose record was removed since the index was read are skipped.
    pub fn list(&self) -> Vec<Job> {
        let ids: Vec<JobId> = self
            .index
            .read()
            .expect("job index lock poisoned")
            .clone();

        let records = self.records.read().expect("job records lock poisoned");
        ids.iter().filter_map(|id| records.get(id).cloned()).collect()
    }

    /// Overwrite a job record in full.
    ///
    /// The id must already be present in the index; putting an unknown id
    /// stores a record that `list` will never surface, so callers re-insert
    /// through `append` instead.
    pub fn put(&self, id: &JobId, job: Job) {
        self.records
            .write()
            .expect("job records lock poisoned")
            .insert(id.clone(), job);
    }

    /// Remove a job from the index and delete its record.
    ///
    /// Returns whether the record existed. The two writes are separate
    /// critical sections; see the type-level docs for the observable race.
    pub fn remove(&self, id: &JobId) -> bool {
        self.index
            .write()
            .expect("job index lock poisoned")
            .retain(|existing| existing != id);

        self.records
            .write()
            .expect("job records lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Number of indexed jobs.
    pub fn len(&self) -> usize {
        self.index.read().expect("job index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytmp3_models::JobStatus;

    fn job(url: &str) -> Job {
        Job::new(url, "192k")
    }

    #[test]
    fn list_preserves_submission_order() {
        let store = JobStore::new();
        let jobs: Vec<Job> = (0..5).map(|i| job(&format!("https://e.com/{i}"))).collect();
        let ids: Vec<JobId> = jobs.iter().map(|j| j.id.clone()).collect();
        store.append(jobs);

        let listed: Vec<JobId> = store.list().into_iter().map(|j| j.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn put_overwrites_whole_record() {
        let store = JobStore::new();
        let mut j = job("https://e.com/a");
        let id = j.id.clone();
        store.append([j.clone()]);

        j.begin_fetching();
        j.begin_downloading("Title");
        store.put(&id, j);

        let fetched = store.get(&id).unwrap();
        assert_eq!(fetched.status, JobStatus::Downloading);
        assert_eq!(fetched.title, "Title");
    }

    #[test]
    fn remove_drops_record_and_index_entry() {
        let store = JobStore::new();
        let j = job("https://e.com/a");
        let id = j.id.clone();
        store.append([j]);

        assert!(store.remove(&id));
        assert!(store.get(&id).is_none());
        assert!(store.list().is_empty());
        assert!(!store.remove(&id));
    }

    #[test]
    fn list_skips_dangling_index_entries() {
        let store = JobStore::new();
        let kept = job("https://e.com/kept");
        let dangling = job("https://e.com/dangling");
        let dangling_id = dangling.id.clone();
        store.append([kept.clone(), dangling]);

        // Simulate the window inside remove() where the record is gone but a
        // concurrent reader holds an index snapshot still naming the id.
        store
            .records
            .write()
            .unwrap()
            .remove(&dangling_id);

        let listed = store.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);
    }

    #[test]
    fn concurrent_writers_to_distinct_ids_do_not_interfere() {
        use std::sync::Arc;

        let store = Arc::new(JobStore::new());
        let a = job("https://e.com/a");
        let b = job("https://e.com/b");
        let (id_a, id_b) = (a.id.clone(), b.id.clone());
        store.append([a, b]);

        let handles: Vec<_> = [(id_a.clone(), "A"), (id_b.clone(), "B")]
            .into_iter()
            .map(|(id, title)| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut j = store.get(&id).unwrap();
                        j.title = title.to_string();
                        store.put(&id, j);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.get(&id_a).unwrap().title, "A");
        assert_eq!(store.get(&id_b).unwrap().title, "B");
        assert_eq!(store.len(), 2);
    }
}
