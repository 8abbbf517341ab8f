//! Driver over any [`KeyValueCache`]. With [`MemoryCache`] this is the
//! in-process default; with [`FileCache`] the schedule survives restarts
//! without a Redis deployment.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cronwork_core::TaskRecord;
use serde_json::Value;
use tracing::debug;

use crate::kv::{KeyValueCache, MemoryCache};
use crate::{DriverError, Result, ScheduleDriver, StateMap, keys};

pub struct CacheDriver {
    cache: Arc<dyn KeyValueCache>,
}

impl CacheDriver {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub fn cache(&self) -> Arc<dyn KeyValueCache> {
        Arc::clone(&self.cache)
    }
}

#[async_trait]
impl ScheduleDriver for CacheDriver {
    async fn update_task_state(&self, task_id: &str, metadata: StateMap) -> Result<()> {
        self.cache
            .set(&keys::state_key(task_id), Value::Object(metadata), None)
    }

    async fn get_task_state(&self, task_id: &str) -> Result<Option<StateMap>> {
        match self.cache.get(&keys::state_key(task_id))? {
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(DriverError::Configuration(format!(
                "task state for {task_id} is not an object: {other}"
            ))),
            None => Ok(None),
        }
    }

    async fn store_tasks(&self, tasks: &[TaskRecord]) -> Result<()> {
        let compiled = serde_json::to_value(tasks)?;
        debug!(count = tasks.len(), "compiled task list stored");
        self.cache.set(keys::TASKS, compiled, None)
    }

    async fn load_tasks(&self) -> Result<Option<Vec<TaskRecord>>> {
        match self.cache.get(keys::TASKS)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn push(&self, task: &TaskRecord) -> Result<()> {
        let record = serde_json::to_value(task)?;
        // Append under the cache's update lock so concurrent pushers never
        // overwrite each other's entries.
        self.cache.update(keys::PENDING, &|current| {
            let mut pending = match current {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            pending.push(record.clone());
            Value::Array(pending)
        })?;
        debug!(task_id = %task.id, "task pushed to pending queue");
        Ok(())
    }

    async fn pop_pending_tasks(&self) -> Result<Vec<TaskRecord>> {
        match self.cache.pull(keys::PENDING)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(DriverError::from))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    async fn forget(&self, task_id: &str) -> Result<()> {
        self.cache.delete(&keys::state_key(task_id))?;
        self.cache.delete(&keys::lock_key(task_id))
    }

    async fn try_acquire(&self, task_id: &str, ttl: Duration) -> Result<bool> {
        self.cache
            .add(&keys::lock_key(task_id), Value::Bool(true), Some(ttl))
    }

    async fn release(&self, task_id: &str) -> Result<()> {
        self.cache.delete(&keys::lock_key(task_id))
    }
}

impl std::fmt::Debug for CacheDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDriver").finish_non_exhaustive()
    }
}
