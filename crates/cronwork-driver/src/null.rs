//! No-op driver. Every write is discarded, every read comes back empty and
//! every lease is granted, so callers never need a `None`-driver branch.

use std::time::Duration;

use async_trait::async_trait;
use cronwork_core::TaskRecord;

use crate::{Result, ScheduleDriver, StateMap};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullDriver;

impl NullDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScheduleDriver for NullDriver {
    async fn update_task_state(&self, _task_id: &str, _metadata: StateMap) -> Result<()> {
        Ok(())
    }

    async fn get_task_state(&self, _task_id: &str) -> Result<Option<StateMap>> {
        Ok(None)
    }

    async fn store_tasks(&self, _tasks: &[TaskRecord]) -> Result<()> {
        Ok(())
    }

    async fn load_tasks(&self) -> Result<Option<Vec<TaskRecord>>> {
        Ok(None)
    }

    async fn push(&self, _task: &TaskRecord) -> Result<()> {
        Ok(())
    }

    async fn pop_pending_tasks(&self) -> Result<Vec<TaskRecord>> {
        Ok(Vec::new())
    }

    async fn forget(&self, _task_id: &str) -> Result<()> {
        Ok(())
    }

    async fn try_acquire(&self, _task_id: &str, _ttl: Duration) -> Result<bool> {
        Ok(true)
    }

    async fn release(&self, _task_id: &str) -> Result<()> {
        Ok(())
    }
}
