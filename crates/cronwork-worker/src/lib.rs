//! `cronwork-worker` — the long-running execution loop.
//!
//! A [`Worker`] polls its schedule on a fixed tick, runs every due task plus
//! the drained pending queue, takes lock leases where a task asks for them,
//! and publishes lifecycle events on the manager's bus. One failing task
//! never takes the loop down; errors are logged and the next tick proceeds.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cronwork_core::{CronEvaluator, InvocationRegistry, ScheduleError, Task, TaskOutcome};
use cronwork_scheduler::ScheduleManager;
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Default poll interval. Half a second keeps 6-field expressions honest
/// while staying far below the 5-field minute resolution.
pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

pub struct Worker {
    manager: ScheduleManager,
    evaluator: CronEvaluator,
    registry: Arc<InvocationRegistry>,
    tick: Duration,
}

impl Worker {
    pub fn new(manager: ScheduleManager, registry: Arc<InvocationRegistry>) -> Self {
        Self {
            manager,
            evaluator: CronEvaluator::utc(),
            registry,
            tick: DEFAULT_TICK,
        }
    }

    pub fn evaluator(mut self, evaluator: CronEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn manager(&self) -> &ScheduleManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ScheduleManager {
        &mut self.manager
    }

    /// Poll until `shutdown` flips to `true`. Each cycle's duration is
    /// subtracted from the tick so slow tasks do not stretch the schedule.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        info!(tick_ms = self.tick.as_millis() as u64, "worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let cycle_start = tokio::time::Instant::now();

            if let Err(e) = self.run_cycle(Utc::now()).await {
                error!(error = %e, "schedule cycle failed");
            }

            let delay = self.tick.saturating_sub(cycle_start.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("worker stopped");
        Ok(())
    }

    /// One poll: run every due registered task, then drain and run the
    /// pending queue. Pending tasks were requested explicitly so they skip
    /// due evaluation and last-run bookkeeping.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<(), WorkerError> {
        for index in 0..self.manager.all().len() {
            let task = self.manager.all()[index].clone();

            let due = match task.is_due(&self.evaluator, now) {
                Ok(due) => due,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "skipping task with bad expression");
                    continue;
                }
            };
            if !due {
                continue;
            }

            if !self.acquire(&task).await {
                debug!(task_id = %task.id, "lease held elsewhere, skipping run");
                continue;
            }

            // Accepted for this window whatever the outcome, so an error
            // does not retrigger on the very next tick.
            self.manager.all_mut()[index].mark_as_run(now);

            self.run_task(&task, now).await;
            self.release(&task).await;
        }

        let pending = self.manager.get_pending_tasks().await?;
        for task in pending {
            debug!(task_id = %task.id, "running pending task");
            self.run_task(&task, now).await;
        }

        Ok(())
    }

    async fn run_task(&self, task: &Task, now: DateTime<Utc>) {
        task.dispatch_starting(self.manager.bus());

        match task.execute(&self.registry).await {
            Ok(outcome) => {
                if !outcome.is_success() {
                    let error = ScheduleError::Execution(format!(
                        "command exited with status {}",
                        outcome.exit_code()
                    ));
                    warn!(task_id = %task.id, exit_code = outcome.exit_code(), "task failed");
                    task.dispatch_failed(self.manager.bus(), &error);
                } else {
                    debug!(task_id = %task.id, "task finished");
                }
                self.record_state(task, now, Some(&outcome)).await;
                task.dispatch_finished(self.manager.bus(), outcome);
            }
            Err(error) => {
                error!(task_id = %task.id, error = %error, "task raised an error");
                task.dispatch_failed(self.manager.bus(), &error);
                self.record_state(task, now, None).await;
            }
        }
    }

    async fn acquire(&self, task: &Task) -> bool {
        if !task.without_overlapping && !task.on_one_server {
            return true;
        }
        match self
            .manager
            .driver()
            .try_acquire(&task.id, Duration::from_secs(task.ttl))
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "lease acquisition failed, skipping run");
                false
            }
        }
    }

    /// Overlap leases release as soon as the run ends. Single-server leases
    /// stay held so other hosts keep skipping until the TTL expires.
    async fn release(&self, task: &Task) {
        if !task.without_overlapping || task.on_one_server {
            return;
        }
        if let Err(e) = self.manager.driver().release(&task.id).await {
            warn!(task_id = %task.id, error = %e, "lease release failed");
        }
    }

    async fn record_state(&self, task: &Task, now: DateTime<Utc>, outcome: Option<&TaskOutcome>) {
        let mut state = serde_json::Map::new();
        state.insert("last_run".to_string(), json!(now.to_rfc3339()));
        match outcome {
            Some(outcome) => {
                state.insert("exit_code".to_string(), json!(outcome.exit_code()));
                state.insert(
                    "status".to_string(),
                    json!(if outcome.is_success() {
                        "success"
                    } else {
                        "failed"
                    }),
                );
            }
            None => {
                state.insert("status".to_string(), json!("error"));
            }
        }

        if let Err(e) = self
            .manager
            .driver()
            .update_task_state(&task.id, state)
            .await
        {
            warn!(task_id = %task.id, error = %e, "state update failed");
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("tick", &self.tick)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
