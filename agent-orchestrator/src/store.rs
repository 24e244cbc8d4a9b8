//! In-memory execution store
//!
//! The store owns the canonical copy of every execution. Each execution sits
//! behind its own mutex, so updates to one execution are atomic while
//! updates to different executions never wait on each other. The map lock
//! is only held to look entries up, append, or evict.

use agent_orchestrator_sdk::{Execution, OrchestratorError, OrchestratorResult};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

type Entry = Arc<Mutex<Execution>>;

#[derive(Default)]
struct StoreInner {
    executions: HashMap<Uuid, Entry>,
    /// Append order, oldest first
    order: VecDeque<Uuid>,
}

/// Registry of executions keyed by execution id
#[derive(Default)]
pub struct ExecutionStore {
    inner: RwLock<StoreInner>,
    capacity: Option<usize>,
}

impl ExecutionStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that evicts the oldest finished executions beyond `capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Add a new execution; returns the ids evicted to make room
    ///
    /// Running executions are never evicted, so a store full of running
    /// executions grows past its capacity until some of them finish.
    pub fn append(&self, execution: Execution) -> Vec<Uuid> {
        let id = execution.id;
        let mut inner = self.write();

        if inner
            .executions
            .insert(id, Arc::new(Mutex::new(execution)))
            .is_some()
        {
            inner.order.retain(|existing| *existing != id);
        }
        inner.order.push_back(id);

        let mut evicted = Vec::new();
        if let Some(capacity) = self.capacity {
            while inner.executions.len() > capacity {
                let oldest_finished = inner.order.iter().position(|candidate| {
                    *candidate != id
                        && inner
                            .executions
                            .get(candidate)
                            .map(|entry| lock(entry).is_terminal())
                            .unwrap_or(true)
                });
                let Some(position) = oldest_finished else {
                    break;
                };
                if let Some(victim) = inner.order.remove(position) {
                    inner.executions.remove(&victim);
                    evicted.push(victim);
                }
            }
        }

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Evicted finished executions");
        }
        evicted
    }

    /// Apply `mutator` to one execution atomically
    ///
    /// Unknown ids are a `StoreConflict`.
    pub fn update<F, R>(&self, id: &Uuid, mutator: F) -> OrchestratorResult<R>
    where
        F: FnOnce(&mut Execution) -> R,
    {
        let entry = self.entry(id)?;
        let mut execution = lock(&entry);
        Ok(mutator(&mut execution))
    }

    /// `update` for mutators that can themselves fail
    pub fn try_update<F, R>(&self, id: &Uuid, mutator: F) -> OrchestratorResult<R>
    where
        F: FnOnce(&mut Execution) -> OrchestratorResult<R>,
    {
        self.update(id, mutator)?
    }

    /// Snapshot of one execution
    pub fn get(&self, id: &Uuid) -> Option<Execution> {
        let entry = self.read().executions.get(id).cloned()?;
        let execution = lock(&entry).clone();
        Some(execution)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.read().executions.contains_key(id)
    }

    /// Snapshots of the `limit` most recently started executions, newest first
    pub fn list_recent(&self, limit: usize) -> Vec<Execution> {
        let entries: Vec<Entry> = {
            let inner = self.read();
            inner
                .order
                .iter()
                .rev()
                .take(limit)
                .filter_map(|id| inner.executions.get(id).cloned())
                .collect()
        };
        entries.iter().map(|entry| lock(entry).clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: &Uuid) -> OrchestratorResult<Entry> {
        self.read()
            .executions
            .get(id)
            .cloned()
            .ok_or(OrchestratorError::StoreConflict(*id))
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock(entry: &Entry) -> MutexGuard<'_, Execution> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}
