//! Concurrent store of scan task records
//!
//! Each record sits behind its own lock, so writers for one task never block
//! readers or writers of another. The map shard lock is only held long enough
//! to clone the entry handles.

use crate::record::{TaskRecord, TaskSummary};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use whiterabbit_core::{Error, Result, ScanOptions, TaskId, TaskState};

/// Handles kept for one task
#[derive(Clone)]
struct TaskEntry {
    record: Arc<RwLock<TaskRecord>>,
    state_tx: Arc<watch::Sender<TaskState>>,
    cancel: Arc<Notify>,
}

/// Tasks grouped for listing
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskListing {
    pub active: Vec<TaskSummary>,
    pub completed: Vec<TaskSummary>,
}

/// Registry of all scan tasks, keyed by task id
pub struct TaskRegistry {
    tasks: DashMap<TaskId, TaskEntry>,
    capacity: Option<usize>,
    count: AtomicUsize,
}

impl TaskRegistry {
    /// Create an unbounded registry
    pub fn new() -> Self {
        Self::with_capacity_limit(None)
    }

    /// Create a registry that refuses new tasks beyond `capacity` records
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            tasks: DashMap::new(),
            capacity,
            count: AtomicUsize::new(0),
        }
    }

    /// Insert a new queued record and return its id
    pub fn create(
        &self,
        tool: impl Into<String>,
        target: impl Into<String>,
        options: ScanOptions,
    ) -> Result<TaskId> {
        let target = target.into();
        self.reserve_slot(&target)?;

        let id = TaskId::generate();
        let record = TaskRecord::new(id.clone(), tool, target, options);
        let (state_tx, _) = watch::channel(TaskState::Queued);
        self.tasks.insert(
            id.clone(),
            TaskEntry {
                record: Arc::new(RwLock::new(record)),
                state_tx: Arc::new(state_tx),
                cancel: Arc::new(Notify::new()),
            },
        );

        tracing::debug!(task_id = %id, "task registered");
        Ok(id)
    }

    /// Atomically reserve room for one more record
    fn reserve_slot(&self, target: &str) -> Result<()> {
        let Some(capacity) = self.capacity else {
            self.count.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        };
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current >= capacity {
                return Err(Error::submission(
                    target,
                    format!("task registry is full ({capacity} tasks), purge finished tasks first"),
                ));
            }
            if self
                .count
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    fn entry(&self, id: &TaskId) -> Result<TaskEntry> {
        self.tasks
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found(id.as_str()))
    }

    /// Whether a task with this id exists
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Number of records currently stored
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// A consistent copy of one record
    pub fn get(&self, id: &TaskId) -> Result<TaskRecord> {
        self.read(id, TaskRecord::clone)
    }

    /// Run `f` against a consistent view of one record without copying it
    pub fn read<R>(&self, id: &TaskId, f: impl FnOnce(&TaskRecord) -> R) -> Result<R> {
        let entry = self.entry(id)?;
        let record = entry.record.read();
        Ok(f(&record))
    }

    /// Apply `f` to one record under its write lock.
    ///
    /// State changes made by `f` are published to `wait_for_terminal` callers.
    pub fn mutate<R>(&self, id: &TaskId, f: impl FnOnce(&mut TaskRecord) -> R) -> Result<R> {
        let entry = self.entry(id)?;
        let (result, state) = {
            let mut record = entry.record.write();
            let result = f(&mut record);
            (result, record.state())
        };
        entry.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        Ok(result)
    }

    /// Summaries of every task, split into active and finished, oldest first
    pub fn list(&self, include_completed: bool) -> TaskListing {
        let entries: Vec<TaskEntry> = self.tasks.iter().map(|e| e.value().clone()).collect();

        let mut listing = TaskListing::default();
        for entry in entries {
            let summary = entry.record.read().summary();
            if summary.state.is_terminal() {
                if include_completed {
                    listing.completed.push(summary);
                }
            } else {
                listing.active.push(summary);
            }
        }
        listing.active.sort_by_key(|s| s.submitted_at);
        listing.completed.sort_by_key(|s| s.submitted_at);
        listing
    }

    /// Ask the worker of a task to stop.
    ///
    /// Returns `false` when the task has already finished.
    pub fn request_cancel(&self, id: &TaskId) -> Result<bool> {
        let entry = self.entry(id)?;
        if entry.record.read().state().is_terminal() {
            return Ok(false);
        }
        entry.cancel.notify_one();
        Ok(true)
    }

    /// Signal the worker waits on for cancellation
    pub(crate) fn cancel_signal(&self, id: &TaskId) -> Result<Arc<Notify>> {
        Ok(self.entry(id)?.cancel)
    }

    /// Wait until a task reaches a terminal state and return that state
    pub async fn wait_for_terminal(&self, id: &TaskId) -> Result<TaskState> {
        let mut rx = self.entry(id)?.state_tx.subscribe();
        let state = rx
            .wait_for(|state| state.is_terminal())
            .await
            .map_err(|_| Error::runtime(id.as_str(), "task was removed while waiting"))?;
        Ok(*state)
    }

    /// Remove completed tasks, and failed ones too when `include_failed` is
    /// set. Returns how many records were dropped.
    pub fn purge(&self, include_failed: bool) -> usize {
        let finished: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|entry| match entry.record.read().state() {
                TaskState::Completed => true,
                TaskState::Failed => include_failed,
                TaskState::Queued | TaskState::Running => false,
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in finished {
            if self.tasks.remove(&id).is_some() {
                self.count.fetch_sub(1, Ordering::AcqRel);
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "purged finished tasks");
        }
        removed
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FailureKind;

    #[test]
    fn test_create_and_get() {
        let registry = TaskRegistry::new();
        let id = registry
            .create("sqlmap", "http://example.com", ScanOptions::new())
            .unwrap();

        let record = registry.get(&id).unwrap();
        assert_eq!(record.id(), &id);
        assert_eq!(record.state(), TaskState::Queued);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = TaskRegistry::new();
        let a = registry.create("sqlmap", "a", ScanOptions::new()).unwrap();
        let b = registry.create("sqlmap", "a", ScanOptions::new()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let registry = TaskRegistry::new();
        let err = registry.get(&TaskId::from("missing")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(registry.mutate(&TaskId::from("missing"), |_| ()).is_err());
    }

    #[test]
    fn test_capacity_limit_rejects_submission() {
        let registry = TaskRegistry::with_capacity_limit(Some(1));
        let id = registry.create("sqlmap", "a", ScanOptions::new()).unwrap();
        let err = registry
            .create("sqlmap", "b", ScanOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::Submission { .. }));

        // Purging a finished task frees its slot.
        registry
            .mutate(&id, |record| {
                record.start("cmd").unwrap();
                record.fail(FailureKind::Runtime, "x", None).unwrap();
            })
            .unwrap();
        assert_eq!(registry.purge(false), 0);
        assert_eq!(registry.purge(true), 1);
        assert!(registry.create("sqlmap", "b", ScanOptions::new()).is_ok());
    }

    #[test]
    fn test_list_splits_active_and_completed() {
        let registry = TaskRegistry::new();
        let running = registry.create("sqlmap", "a", ScanOptions::new()).unwrap();
        let done = registry.create("sqlmap", "b", ScanOptions::new()).unwrap();
        registry
            .mutate(&running, |r| r.start("cmd").unwrap())
            .unwrap();
        registry
            .mutate(&done, |r| {
                r.start("cmd").unwrap();
                r.complete(0).unwrap();
            })
            .unwrap();

        let listing = registry.list(true);
        assert_eq!(listing.active.len(), 1);
        assert_eq!(listing.active[0].task_id, running);
        assert_eq!(listing.completed.len(), 1);
        assert_eq!(listing.completed[0].task_id, done);

        let listing = registry.list(false);
        assert!(listing.completed.is_empty());
    }

    #[test]
    fn test_request_cancel_on_finished_task() {
        let registry = TaskRegistry::new();
        let id = registry.create("sqlmap", "a", ScanOptions::new()).unwrap();
        assert!(registry.request_cancel(&id).unwrap());
        registry
            .mutate(&id, |r| {
                r.start("cmd").unwrap();
                r.complete(0).unwrap();
            })
            .unwrap();
        assert!(!registry.request_cancel(&id).unwrap());
    }

    #[tokio::test]
    async fn test_wait_for_terminal() {
        let registry = Arc::new(TaskRegistry::new());
        let id = registry.create("sqlmap", "a", ScanOptions::new()).unwrap();

        let waiter = {
            let registry = registry.clone();
            let id = id.clone();
            tokio::spawn(async move { registry.wait_for_terminal(&id).await })
        };

        registry.mutate(&id, |r| r.start("cmd").unwrap()).unwrap();
        registry.mutate(&id, |r| r.complete(0).unwrap()).unwrap();

        let state = waiter.await.unwrap().unwrap();
        assert_eq!(state, TaskState::Completed);
    }

    #[test]
    fn test_concurrent_writers_on_distinct_tasks() {
        let registry = Arc::new(TaskRegistry::new());
        let ids: Vec<TaskId> = (0..8)
            .map(|i| {
                registry
                    .create("sqlmap", format!("t{i}"), ScanOptions::new())
                    .unwrap()
            })
            .collect();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for n in 0..200 {
                        registry
                            .mutate(&id, |r| {
                                r.append_line(format!("line {n}"), "", Default::default())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for id in &ids {
            let lines = registry.read(id, |r| r.output_buffer().len()).unwrap();
            assert_eq!(lines, 200);
        }
    }
}
