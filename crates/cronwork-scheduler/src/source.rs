//! Where task definitions come from. A [`TaskSource`] is scanned at boot in
//! debug mode and by `schedule:optimize`; production boots skip scanning and
//! read the compiled list the driver stored.

use std::path::{Path, PathBuf};

use cronwork_core::{
    ActionRecord, DEFAULT_EXPRESSION, DEFAULT_TTL, Result, ScheduleError, Task, TaskRecord,
};
use serde::Deserialize;
use tracing::debug;

pub trait TaskSource: Send + Sync {
    fn scan(&self) -> Result<Vec<Task>>;
}

/// Fixed list of records, mostly useful in tests and embedded setups.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    records: Vec<TaskRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<TaskRecord>) -> Self {
        Self { records }
    }
}

impl TaskSource for StaticSource {
    fn scan(&self) -> Result<Vec<Task>> {
        Ok(self.records.iter().cloned().map(Task::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    tasks: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    /// Optional stable name; omitted entries get a fingerprint id.
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    action: ActionRecord,
    #[serde(default = "default_expression")]
    expression: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_true")]
    without_overlapping: bool,
    #[serde(default)]
    on_one_server: bool,
    #[serde(default = "default_ttl")]
    ttl: u64,
}

fn default_expression() -> String {
    DEFAULT_EXPRESSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u64 {
    DEFAULT_TTL
}

/// JSON manifest on disk, the declarative registration path:
///
/// ```json
/// {
///   "tasks": [
///     { "name": "reports", "type": "command", "command": "php artisan reports",
///       "expression": "0 2 * * *", "tags": ["reports"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TaskSource for ManifestSource {
    fn scan(&self) -> Result<Vec<Task>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            ScheduleError::Configuration(format!(
                "cannot read task manifest {}: {e}",
                self.path.display()
            ))
        })?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), count = manifest.tasks.len(), "manifest scanned");

        Ok(manifest.tasks.into_iter().map(entry_to_task).collect())
    }
}

fn entry_to_task(entry: ManifestEntry) -> Task {
    let action = match entry.action {
        ActionRecord::Command { command } => cronwork_core::TaskAction::Command(command),
        ActionRecord::Invocation {
            target,
            method,
            args,
        } => cronwork_core::TaskAction::Invocation {
            target,
            method,
            args,
        },
    };

    let mut task = Task::new(action, &entry.expression, entry.name.as_deref());
    task.tags = entry.tags;
    task.without_overlapping = entry.without_overlapping;
    task.on_one_server = entry.on_one_server;
    task.ttl = entry.ttl;
    task
}
