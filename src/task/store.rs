//! In-memory task store with atomic read-modify-write semantics.
//!
//! [`TaskStore`] is the single shared mutable resource in the system: one
//! writer (the coordinator driving a task) and arbitrarily many concurrent
//! readers (polling clients).  All mutation goes through [`TaskStore::update`],
//! which rejects writes to frozen (terminal) records — that rejection is the
//! stale-write suppression point for late progress callbacks.
//!
//! The map lives behind `Arc<RwLock<…>>` with short critical sections; the
//! lock is never held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::record::TaskRecord;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors surfaced by store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced task id is unknown or was evicted.
    #[error("task {0} not found")]
    NotFound(Uuid),

    /// The record is already terminal and frozen; the attempted mutation was
    /// rejected.  Callers treating this as a stale write may discard it;
    /// anything else reaching this is a logic fault and should be logged.
    #[error("task {0} is already finished and cannot be modified")]
    TaskFinished(Uuid),

    /// The active-task cap was reached; the create was rejected.
    #[error("too many active tasks")]
    Saturated,
}

// ---------------------------------------------------------------------------
// TaskStore
// ---------------------------------------------------------------------------

/// Thread-safe map from task id to [`TaskRecord`].
///
/// Cheap to clone (`Arc` clone) and injectable, so the coordinator and the
/// API handlers are testable in isolation against the same instance.
#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<HashMap<Uuid, TaskRecord>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record for `prompt` and return a snapshot of it.
    ///
    /// The returned record carries the newly allocated task id; ids are
    /// UUIDv4 and never reused.
    pub fn create(&self, prompt: &str) -> TaskRecord {
        let record = TaskRecord::new(prompt.to_owned());
        let snapshot = record.clone();
        self.inner
            .write()
            .unwrap()
            .insert(record.id, record);
        snapshot
    }

    /// Insert a fresh record only while fewer than `max_active` tasks are
    /// non-terminal.  Counting and inserting share one critical section, so
    /// concurrent creates cannot race past the cap.
    pub fn create_bounded(
        &self,
        prompt: &str,
        max_active: usize,
    ) -> Result<TaskRecord, StoreError> {
        let mut map = self.inner.write().unwrap();
        let active = map.values().filter(|r| !r.status.is_terminal()).count();
        if active >= max_active {
            return Err(StoreError::Saturated);
        }

        let record = TaskRecord::new(prompt.to_owned());
        let snapshot = record.clone();
        map.insert(record.id, record);
        Ok(snapshot)
    }

    /// Snapshot of the current record.
    pub fn get(&self, id: Uuid) -> Result<TaskRecord, StoreError> {
        self.inner
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Apply `mutator` to the record atomically and return the new snapshot.
    ///
    /// Fails with [`StoreError::TaskFinished`] when the record is already
    /// terminal — terminal records are frozen and a late write must never
    /// land on them.  When the mutator itself moves the record into a
    /// terminal state, `finished_at` is stamped here so the eviction sweeper
    /// sees a uniform timestamp.
    pub fn update<F>(&self, id: Uuid, mutator: F) -> Result<TaskRecord, StoreError>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut map = self.inner.write().unwrap();
        let record = map.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if record.status.is_terminal() {
            return Err(StoreError::TaskFinished(id));
        }

        mutator(record);

        if record.status.is_terminal() && record.finished_at.is_none() {
            record.finished_at = Some(Utc::now());
        }

        Ok(record.clone())
    }

    /// Flip the cooperative cancellation flag.
    ///
    /// A terminal record is left untouched and reported as such so the API
    /// can treat a second DELETE as an idempotent no-op.
    pub fn request_cancel(&self, id: Uuid) -> Result<TaskRecord, StoreError> {
        let mut map = self.inner.write().unwrap();
        let record = map.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !record.status.is_terminal() {
            record.cancel_requested = true;
        }

        Ok(record.clone())
    }

    /// Remove the record.  Deleting an unknown id is not an error.
    pub fn delete(&self, id: Uuid) {
        self.inner.write().unwrap().remove(&id);
    }

    /// Snapshots of every tracked record, newest first.
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> =
            self.inner.read().unwrap().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Number of non-terminal tasks; the API uses this to enforce the
    /// `max_active_tasks` bound.
    pub fn active_count(&self) -> usize {
        self.inner
            .read()
            .unwrap()
            .values()
            .filter(|r| !r.status.is_terminal())
            .count()
    }

    /// Remove terminal records whose `finished_at` is older than
    /// `retention`; returns how many were removed.  Non-terminal records are
    /// never evicted.
    pub fn evict_finished(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut map = self.inner.write().unwrap();
        let before = map.len();
        map.retain(|_, record| match (record.status.is_terminal(), record.finished_at) {
            (true, Some(finished)) => finished > cutoff,
            _ => true,
        });
        before - map.len()
    }

    /// Spawn the background sweeper: every `interval` it evicts finished
    /// records older than `retention`.  Runs for the life of the process.
    pub fn spawn_sweeper(
        &self,
        retention: Duration,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick completes immediately
            loop {
                ticker.tick().await;
                let removed = store.evict_finished(retention);
                if removed > 0 {
                    log::debug!("sweeper: evicted {removed} finished task(s)");
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[test]
    fn create_then_get_returns_same_record() {
        let store = TaskStore::new();
        let created = store.create("Hello world");

        let fetched = store.get(created.id).expect("task exists");
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.prompt, "Hello world");
        assert_eq!(fetched.status, TaskStatus::Started);
        assert_eq!(fetched.progress, 0);
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.get(id), Err(StoreError::NotFound(id)));
    }

    /// The cap counts only non-terminal records, and counting + inserting
    /// happen under one lock.
    #[test]
    fn create_bounded_enforces_the_cap() {
        let store = TaskStore::new();
        let first = store.create_bounded("a", 1).expect("below cap");

        let rejected = store.create_bounded("b", 1).unwrap_err();
        assert_eq!(rejected, StoreError::Saturated);

        // Finishing the first task frees its slot.
        store
            .update(first.id, |r| r.status = TaskStatus::Completed)
            .unwrap();
        assert!(store.create_bounded("b", 1).is_ok());
    }

    #[test]
    fn update_applies_mutation_atomically() {
        let store = TaskStore::new();
        let task = store.create("x");

        let updated = store
            .update(task.id, |r| {
                r.status = TaskStatus::GeneratingText;
                r.progress = 5;
                r.message = Some("Generating reply text".into());
            })
            .expect("update succeeds");

        assert_eq!(updated.status, TaskStatus::GeneratingText);
        assert_eq!(updated.progress, 5);
        assert_eq!(store.get(task.id).unwrap().progress, 5);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        let result = store.update(id, |r| r.progress = 50);
        assert_eq!(result, Err(StoreError::NotFound(id)));
    }

    /// Terminal records are frozen: any further update attempt is rejected
    /// and the record is left byte-for-byte unchanged.
    #[test]
    fn update_after_terminal_is_rejected() {
        let store = TaskStore::new();
        let task = store.create("x");

        store
            .update(task.id, |r| {
                r.status = TaskStatus::Failed;
                r.error = Some("boom".into());
            })
            .unwrap();

        let result = store.update(task.id, |r| r.progress = 99);
        assert_eq!(result, Err(StoreError::TaskFinished(task.id)));

        let frozen = store.get(task.id).unwrap();
        assert_eq!(frozen.status, TaskStatus::Failed);
        assert_eq!(frozen.error.as_deref(), Some("boom"));
        assert_eq!(frozen.progress, 0);
    }

    #[test]
    fn terminal_update_stamps_finished_at() {
        let store = TaskStore::new();
        let task = store.create("x");
        assert!(store.get(task.id).unwrap().finished_at.is_none());

        store
            .update(task.id, |r| r.status = TaskStatus::Completed)
            .unwrap();

        assert!(store.get(task.id).unwrap().finished_at.is_some());
    }

    // ---- cancellation flag ---

    #[test]
    fn request_cancel_flags_running_task() {
        let store = TaskStore::new();
        let task = store.create("x");

        let flagged = store.request_cancel(task.id).unwrap();
        assert!(flagged.cancel_requested);
        // Status is untouched — only the coordinator owns transitions.
        assert_eq!(flagged.status, TaskStatus::Started);
    }

    #[test]
    fn request_cancel_on_terminal_task_is_noop() {
        let store = TaskStore::new();
        let task = store.create("x");
        store
            .update(task.id, |r| r.status = TaskStatus::Completed)
            .unwrap();

        let record = store.request_cancel(task.id).unwrap();
        assert!(!record.cancel_requested);
        assert_eq!(record.status, TaskStatus::Completed);
    }

    #[test]
    fn request_cancel_unknown_id_is_not_found() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.request_cancel(id), Err(StoreError::NotFound(id)));
    }

    // ---- delete ---

    #[test]
    fn delete_is_idempotent() {
        let store = TaskStore::new();
        let task = store.create("x");

        store.delete(task.id);
        assert_eq!(store.get(task.id), Err(StoreError::NotFound(task.id)));

        // Second delete must not panic or error.
        store.delete(task.id);
    }

    // ---- list / active_count ---

    #[test]
    fn list_returns_all_records() {
        let store = TaskStore::new();
        store.create("a");
        store.create("b");
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn active_count_ignores_terminal_records() {
        let store = TaskStore::new();
        let a = store.create("a");
        store.create("b");

        store
            .update(a.id, |r| r.status = TaskStatus::Cancelled)
            .unwrap();

        assert_eq!(store.active_count(), 1);
    }

    // ---- eviction ---

    #[test]
    fn evict_removes_old_terminal_records_only() {
        let store = TaskStore::new();
        let done = store.create("done");
        let running = store.create("running");

        store
            .update(done.id, |r| r.status = TaskStatus::Completed)
            .unwrap();

        // Zero retention: anything finished is immediately eligible.
        let removed = store.evict_finished(Duration::seconds(0));
        assert_eq!(removed, 1);
        assert_eq!(store.get(done.id), Err(StoreError::NotFound(done.id)));
        assert!(store.get(running.id).is_ok());
    }

    #[test]
    fn evict_respects_retention_window() {
        let store = TaskStore::new();
        let done = store.create("done");
        store
            .update(done.id, |r| r.status = TaskStatus::Failed)
            .unwrap();

        // A generous window keeps the freshly finished record.
        let removed = store.evict_finished(Duration::hours(1));
        assert_eq!(removed, 0);
        assert!(store.get(done.id).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_on_its_interval() {
        let store = TaskStore::new();
        let done = store.create("done");
        store
            .update(done.id, |r| r.status = TaskStatus::Completed)
            .unwrap();

        let handle = store.spawn_sweeper(
            Duration::seconds(0),
            std::time::Duration::from_secs(1),
        );

        // Let the first interval elapse under the paused clock.
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.get(done.id), Err(StoreError::NotFound(done.id)));
        handle.abort();
    }

    // ---- concurrency smoke ---

    #[test]
    fn store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TaskStore>();
    }

    #[test]
    fn clones_share_the_same_map() {
        let store = TaskStore::new();
        let store2 = store.clone();

        let task = store.create("shared");
        assert!(store2.get(task.id).is_ok());
    }
}
