//! Redis-backed driver for cross-process deployments. The pending queue is
//! a Redis list, so pushes from one process surface in another process's
//! drain, and the lease is a `SET NX EX` key that Redis itself expires.

use std::time::Duration;

use async_trait::async_trait;
use cronwork_core::TaskRecord;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::{DriverError, Result, ScheduleDriver, StateMap, keys};

#[derive(Clone)]
pub struct RedisDriver {
    conn: ConnectionManager,
}

impl RedisDriver {
    /// Connect through a reconnecting manager, matching the long-lived
    /// worker lifetime.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!(%url, "redis driver connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl ScheduleDriver for RedisDriver {
    async fn update_task_state(&self, task_id: &str, metadata: StateMap) -> Result<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(&metadata)?;
        let _: () = conn.set(keys::state_key(task_id), raw).await?;
        Ok(())
    }

    async fn get_task_state(&self, task_id: &str) -> Result<Option<StateMap>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::state_key(task_id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn store_tasks(&self, tasks: &[TaskRecord]) -> Result<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(tasks)?;
        let _: () = conn.set(keys::TASKS, raw).await?;
        debug!(count = tasks.len(), "compiled task list stored");
        Ok(())
    }

    async fn load_tasks(&self) -> Result<Option<Vec<TaskRecord>>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::TASKS).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn push(&self, task: &TaskRecord) -> Result<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(task)?;
        let _: () = conn.rpush(keys::PENDING, raw).await?;
        debug!(task_id = %task.id, "task pushed to pending queue");
        Ok(())
    }

    async fn pop_pending_tasks(&self) -> Result<Vec<TaskRecord>> {
        let mut conn = self.conn.clone();
        let mut drained = Vec::new();
        loop {
            let raw: Option<String> = conn.lpop(keys::PENDING, None).await?;
            match raw {
                Some(raw) => drained.push(serde_json::from_str(&raw)?),
                None => break,
            }
        }
        Ok(drained)
    }

    async fn forget(&self, task_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&[keys::state_key(task_id), keys::lock_key(task_id)])
            .await?;
        Ok(())
    }

    async fn try_acquire(&self, task_id: &str, ttl: Duration) -> Result<bool> {
        if ttl.is_zero() {
            return Err(DriverError::Configuration(
                "lease ttl must be at least one second".to_string(),
            ));
        }
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(keys::lock_key(task_id))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release(&self, task_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys::lock_key(task_id)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisDriver").finish_non_exhaustive()
    }
}
