use std::sync::Arc;

use chrono::{DateTime, Utc};
use cronwork_core::{
    CronEvaluator, EventBus, EventKind, Result, ScheduleError, Task, TaskEvent, TaskRecord,
};
use cronwork_driver::{DriverError, ScheduleDriver};
use serde_json::Value;
use tracing::{debug, info};

use crate::source::TaskSource;

/// Central registry tying tasks, the event bus and the persistence driver
/// together. One manager per process.
pub struct ScheduleManager {
    tasks: Vec<Task>,
    bus: EventBus,
    driver: Arc<dyn ScheduleDriver>,
    debug_mode: bool,
}

impl ScheduleManager {
    /// Empty manager for programmatic registration.
    pub fn new(driver: Arc<dyn ScheduleDriver>) -> Self {
        Self {
            tasks: Vec::new(),
            bus: EventBus::new(),
            driver,
            debug_mode: false,
        }
    }

    /// Build the task list for this process.
    ///
    /// Debug mode scans the source on every boot so edits show up without a
    /// recompile step; it is an error to ask for debug mode without a source.
    /// Production mode reads the compiled list `schedule:optimize` stored,
    /// falling back to an empty schedule when none was ever written.
    pub async fn boot(
        driver: Arc<dyn ScheduleDriver>,
        source: Option<&dyn TaskSource>,
        debug_mode: bool,
    ) -> Result<Self> {
        let tasks = if debug_mode {
            let source = source.ok_or_else(|| {
                ScheduleError::Configuration(
                    "debug mode requires a task source to scan".to_string(),
                )
            })?;
            source.scan()?
        } else {
            match driver.load_tasks().await.map_err(driver_error)? {
                Some(records) => records.into_iter().map(Task::from).collect(),
                None => Vec::new(),
            }
        };

        info!(count = tasks.len(), debug_mode, "schedule booted");

        Ok(Self {
            tasks,
            bus: EventBus::new(),
            driver,
            debug_mode,
        })
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    // --- registration ------------------------------------------------------

    /// Register a shell command task and return it for fluent configuration.
    pub fn command(&mut self, command: &str) -> &mut Task {
        self.add(Task::command(command))
    }

    /// Register a process-local callable task.
    pub fn call<F>(&mut self, callback: F, name: Option<&str>) -> &mut Task
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        self.add(Task::call(callback, name))
    }

    /// Register an invocation task resolved through the registry at run time.
    pub fn job(&mut self, target: &str, method: &str, args: Value) -> &mut Task {
        self.add(Task::invocation(target, method, args))
    }

    pub fn add(&mut self, task: Task) -> &mut Task {
        debug!(task_id = %task.id, expression = %task.expression, "task registered");
        self.tasks.push(task);
        let last = self.tasks.len() - 1;
        &mut self.tasks[last]
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn all_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    // --- due evaluation ----------------------------------------------------

    /// Owned snapshot of everything that should run now: due registered
    /// tasks plus the whole drained pending queue. Pending tasks were
    /// requested explicitly and run regardless of their expression.
    pub async fn get_due_tasks(
        &mut self,
        evaluator: &CronEvaluator,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        let mut due = Vec::new();
        for task in &self.tasks {
            if task.is_due(evaluator, now)? {
                due.push(task.clone());
            }
        }
        due.extend(self.get_pending_tasks().await?);
        Ok(due)
    }

    /// Drain the pending queue into owned tasks.
    pub async fn get_pending_tasks(&self) -> Result<Vec<Task>> {
        let records = self
            .driver
            .pop_pending_tasks()
            .await
            .map_err(driver_error)?;
        Ok(records.into_iter().map(Task::from).collect())
    }

    // --- persistence -------------------------------------------------------

    /// Queue a one-off run of a task for the next worker cycle, possibly in
    /// another process. Callable tasks cannot cross the wire and fail with
    /// [`ScheduleError::NonPortableAction`].
    pub async fn push(&self, task: &Task) -> Result<()> {
        let record = TaskRecord::try_from(task)?;
        self.driver.push(&record).await.map_err(driver_error)
    }

    /// Serialize every registered task for the compiled schedule. Callables
    /// are rejected rather than silently dropped.
    pub fn compile(&self) -> Result<Vec<TaskRecord>> {
        self.tasks.iter().map(TaskRecord::try_from).collect()
    }

    /// Store the compiled schedule so production boots skip scanning.
    pub async fn optimize(&self) -> Result<()> {
        let records = self.compile()?;
        self.driver
            .store_tasks(&records)
            .await
            .map_err(driver_error)?;
        info!(count = records.len(), "compiled schedule stored");
        Ok(())
    }

    pub async fn forget(&self, task_id: &str) -> Result<()> {
        self.driver.forget(task_id).await.map_err(driver_error)
    }

    pub fn driver(&self) -> Arc<dyn ScheduleDriver> {
        Arc::clone(&self.driver)
    }

    // --- events ------------------------------------------------------------

    pub fn listen<F>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.bus.listen(kind, callback);
    }

    pub fn dispatch(&self, event: &TaskEvent) {
        self.bus.dispatch(event);
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl std::fmt::Debug for ScheduleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleManager")
            .field("tasks", &self.tasks.len())
            .field("debug_mode", &self.debug_mode)
            .finish_non_exhaustive()
    }
}

fn driver_error(error: DriverError) -> ScheduleError {
    ScheduleError::Driver(error.to_string())
}
