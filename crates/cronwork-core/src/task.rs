use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::cron::CronEvaluator;
use crate::error::{Result, ScheduleError};
use crate::event::{EventBus, EventKind, TaskEvent, TaskInfo};
use crate::invoke::InvocationRegistry;

/// Default lock lease duration in seconds.
pub const DEFAULT_TTL: u64 = 3600;

/// Every-minute expression assigned to manually registered tasks until a
/// fluent frequency builder replaces it.
pub const DEFAULT_EXPRESSION: &str = "* * * * *";

pub type CallableFn = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

type BeforeCallback = Arc<dyn Fn() -> Result<()> + Send + Sync>;
type SuccessCallback = Arc<dyn Fn(&TaskOutcome) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(&ScheduleError) + Send + Sync>;
type AfterCallback = Arc<dyn Fn() + Send + Sync>;

/// What a task does when it fires.
///
/// `Command` and `Invocation` are data-describable and survive the pending
/// queue across processes. `Callable` is a process-local registration path:
/// pushing one through a driver fails with
/// [`ScheduleError::NonPortableAction`].
#[derive(Clone)]
pub enum TaskAction {
    Command(String),
    Invocation {
        target: String,
        method: String,
        args: Value,
    },
    Callable(CallableFn),
}

impl fmt::Debug for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskAction::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
            TaskAction::Invocation { target, method, .. } => f
                .debug_struct("Invocation")
                .field("target", target)
                .field("method", method)
                .finish(),
            TaskAction::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Serializable action form used by [`TaskRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRecord {
    Command {
        command: String,
    },
    Invocation {
        target: String,
        method: String,
        args: Value,
    },
}

/// Result envelope returned by [`Task::execute`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TaskOutcome {
    /// Full stdout/stderr capture plus the real process exit status.
    Command {
        output: String,
        error: String,
        exit_code: i32,
    },
    /// Whatever a callable or invocation handler returned.
    Value(Value),
}

impl TaskOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskOutcome::Command { exit_code, .. } => *exit_code,
            TaskOutcome::Value(_) => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// A schedulable unit of work: identity, cron expression, action, callback
/// hooks, and last-run bookkeeping.
#[derive(Clone)]
pub struct Task {
    pub id: String,
    pub action: TaskAction,
    pub expression: String,
    pub tags: Vec<String>,
    pub without_overlapping: bool,
    pub on_one_server: bool,
    pub ttl: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub metadata: serde_json::Map<String, Value>,
    before_callbacks: Vec<BeforeCallback>,
    success_callbacks: Vec<SuccessCallback>,
    failure_callbacks: Vec<FailureCallback>,
    after_callbacks: Vec<AfterCallback>,
    starting_kind: Option<EventKind>,
    finished_kind: Option<EventKind>,
    failed_kind: Option<EventKind>,
}

impl Task {
    pub fn new(action: TaskAction, expression: &str, name: Option<&str>) -> Self {
        let id = match name {
            Some(name) => name.to_string(),
            None => fingerprint(&action),
        };

        Self {
            id,
            action,
            expression: expression.to_string(),
            tags: Vec::new(),
            without_overlapping: true,
            on_one_server: false,
            ttl: DEFAULT_TTL,
            last_run: None,
            metadata: serde_json::Map::new(),
            before_callbacks: Vec::new(),
            success_callbacks: Vec::new(),
            failure_callbacks: Vec::new(),
            after_callbacks: Vec::new(),
            starting_kind: None,
            finished_kind: None,
            failed_kind: None,
        }
    }

    /// Shell-command task with the default every-minute expression.
    pub fn command(command: &str) -> Self {
        Self::new(
            TaskAction::Command(command.to_string()),
            DEFAULT_EXPRESSION,
            None,
        )
    }

    /// Process-local callable task. Its id is unique to this process.
    pub fn call<F>(callback: F, name: Option<&str>) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(
            TaskAction::Callable(Arc::new(callback)),
            DEFAULT_EXPRESSION,
            name,
        )
    }

    /// Invocation task resolved through an [`InvocationRegistry`] at
    /// execution time.
    pub fn invocation(target: &str, method: &str, args: Value) -> Self {
        Self::new(
            TaskAction::Invocation {
                target: target.to_string(),
                method: method.to_string(),
                args,
            },
            DEFAULT_EXPRESSION,
            None,
        )
    }

    // --- fluent configuration ----------------------------------------------

    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn without_overlapping(&mut self, flag: bool) -> &mut Self {
        self.without_overlapping = flag;
        self
    }

    pub fn on_one_server(&mut self, flag: bool) -> &mut Self {
        self.on_one_server = flag;
        self
    }

    pub fn ttl(&mut self, seconds: u64) -> &mut Self {
        self.ttl = seconds;
        self
    }

    pub fn set_metadata(&mut self, key: &str, value: Value) -> &mut Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn on_start<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.before_callbacks.push(Arc::new(callback));
        self
    }

    pub fn on_success<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&TaskOutcome) + Send + Sync + 'static,
    {
        self.success_callbacks.push(Arc::new(callback));
        self
    }

    pub fn on_failure<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&ScheduleError) + Send + Sync + 'static,
    {
        self.failure_callbacks.push(Arc::new(callback));
        self
    }

    pub fn after<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.after_callbacks.push(Arc::new(callback));
        self
    }

    /// Override the bus kind used when dispatching one event category.
    pub fn starting_event(&mut self, kind: EventKind) -> &mut Self {
        self.starting_kind = Some(kind);
        self
    }

    pub fn finished_event(&mut self, kind: EventKind) -> &mut Self {
        self.finished_kind = Some(kind);
        self
    }

    pub fn failed_event(&mut self, kind: EventKind) -> &mut Self {
        self.failed_kind = Some(kind);
        self
    }

    // --- due evaluation ----------------------------------------------------

    /// True when the cron expression matches `now` and no run has been
    /// accepted in the same precision window. The window is one minute for
    /// 5-field expressions and one second for the 6-field form, so polling
    /// faster than the expression's resolution never fires twice.
    pub fn is_due(&self, evaluator: &CronEvaluator, now: DateTime<Utc>) -> Result<bool> {
        if !evaluator.is_due(&self.expression, now)? {
            return Ok(false);
        }

        if let Some(last_run) = self.last_run {
            let window = if self.expression.split_whitespace().count() == 6 {
                "%Y-%m-%d %H:%M:%S"
            } else {
                "%Y-%m-%d %H:%M"
            };
            if last_run.format(window).to_string() == now.format(window).to_string() {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Record an accepted run. Callers invoke this exactly once per due
    /// execution; the single-pass runner intentionally skips it.
    pub fn mark_as_run(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
    }

    // --- execution ---------------------------------------------------------

    /// Run the action with the full callback lifecycle:
    /// before, then success xor failure, then after.
    ///
    /// A shell command that exits non-zero fires the failure callbacks but
    /// still returns its envelope; only a raised action (or a failing
    /// before-callback, which propagates like any other execution failure)
    /// returns `Err`.
    pub async fn execute(&self, registry: &InvocationRegistry) -> Result<TaskOutcome> {
        debug!(task_id = %self.id, "executing task");

        for callback in &self.before_callbacks {
            if let Err(error) = callback() {
                return Err(self.fail(error));
            }
        }

        let result = match &self.action {
            TaskAction::Command(command) => run_command(command).await,
            TaskAction::Invocation {
                target,
                method,
                args,
            } => registry.invoke(target, method, args).map(TaskOutcome::Value),
            TaskAction::Callable(callback) => callback().map(TaskOutcome::Value),
        };

        match result {
            Ok(outcome) if outcome.is_success() => {
                for callback in &self.success_callbacks {
                    callback(&outcome);
                }
                self.run_after_callbacks();
                Ok(outcome)
            }
            Ok(outcome) => {
                // Exit-code failure reports through the envelope, not Err.
                let error = ScheduleError::Execution(format!(
                    "command exited with status {}",
                    outcome.exit_code()
                ));
                for callback in &self.failure_callbacks {
                    callback(&error);
                }
                self.run_after_callbacks();
                Ok(outcome)
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    fn fail(&self, error: ScheduleError) -> ScheduleError {
        for callback in &self.failure_callbacks {
            callback(&error);
        }
        self.run_after_callbacks();
        error
    }

    fn run_after_callbacks(&self) {
        for callback in &self.after_callbacks {
            callback();
        }
    }

    // --- events ------------------------------------------------------------

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id.clone(),
            expression: self.expression.clone(),
            tags: self.tags.clone(),
        }
    }

    pub fn dispatch_starting(&self, bus: &EventBus) {
        let event = TaskEvent::Starting { task: self.info() };
        let kind = self.starting_kind.clone().unwrap_or(EventKind::Starting);
        bus.dispatch_as(&kind, &event);
    }

    pub fn dispatch_finished(&self, bus: &EventBus, result: TaskOutcome) {
        let event = TaskEvent::Finished {
            task: self.info(),
            result,
        };
        let kind = self.finished_kind.clone().unwrap_or(EventKind::Finished);
        bus.dispatch_as(&kind, &event);
    }

    pub fn dispatch_failed(&self, bus: &EventBus, error: &ScheduleError) {
        let event = TaskEvent::Failed {
            task: self.info(),
            error: error.to_string(),
        };
        let kind = self.failed_kind.clone().unwrap_or(EventKind::Failed);
        bus.dispatch_as(&kind, &event);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("expression", &self.expression)
            .field("tags", &self.tags)
            .field("without_overlapping", &self.without_overlapping)
            .field("on_one_server", &self.on_one_server)
            .field("ttl", &self.ttl)
            .field("last_run", &self.last_run)
            .finish()
    }
}

/// Run a shell command capturing both pipes fully. `output()` drains stdout
/// and stderr concurrently, so arbitrarily large output cannot deadlock.
async fn run_command(command: &str) -> Result<TaskOutcome> {
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .map_err(|e| ScheduleError::Execution(format!("failed to spawn '{command}': {e}")))?;

    Ok(TaskOutcome::Command {
        output: String::from_utf8_lossy(&output.stdout)
            .trim_end()
            .to_string(),
        error: String::from_utf8_lossy(&output.stderr)
            .trim_end()
            .to_string(),
        // Terminated by signal on unix leaves no code.
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Stable fingerprint for identity. Command and invocation actions hash
/// deterministically; callables get a token unique to this process, which is
/// a documented limitation of the registration path.
fn fingerprint(action: &TaskAction) -> String {
    match action {
        TaskAction::Command(command) => digest(command.as_bytes()),
        TaskAction::Invocation {
            target,
            method,
            args,
        } => {
            let payload = format!("{target}::{method}::{args}");
            digest(payload.as_bytes())
        }
        TaskAction::Callable(_) => format!("closure-{}", Uuid::new_v4()),
    }
}

fn digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    hex::encode(&hash[..16])
}

/// Serde mirror of a task: everything that survives the wire. Callback hooks
/// and callable actions do not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub action: ActionRecord,
    pub expression: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub without_overlapping: bool,
    #[serde(default)]
    pub on_one_server: bool,
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u64 {
    DEFAULT_TTL
}

impl TryFrom<&Task> for TaskRecord {
    type Error = ScheduleError;

    fn try_from(task: &Task) -> Result<Self> {
        let action = match &task.action {
            TaskAction::Command(command) => ActionRecord::Command {
                command: command.clone(),
            },
            TaskAction::Invocation {
                target,
                method,
                args,
            } => ActionRecord::Invocation {
                target: target.clone(),
                method: method.clone(),
                args: args.clone(),
            },
            TaskAction::Callable(_) => {
                return Err(ScheduleError::NonPortableAction(task.id.clone()));
            }
        };

        Ok(Self {
            id: task.id.clone(),
            action,
            expression: task.expression.clone(),
            tags: task.tags.clone(),
            without_overlapping: task.without_overlapping,
            on_one_server: task.on_one_server,
            ttl: task.ttl,
        })
    }
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        let action = match record.action {
            ActionRecord::Command { command } => TaskAction::Command(command),
            ActionRecord::Invocation {
                target,
                method,
                args,
            } => TaskAction::Invocation {
                target,
                method,
                args,
            },
        };

        let mut task = Task::new(action, &record.expression, Some(&record.id));
        task.tags = record.tags;
        task.without_overlapping = record.without_overlapping;
        task.on_one_server = record.on_one_server;
        task.ttl = record.ttl;
        task
    }
}
