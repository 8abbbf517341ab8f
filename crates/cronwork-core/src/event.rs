use std::collections::HashMap;
use std::fmt;

use crate::task::TaskOutcome;

/// Bus key for listener registration. The three built-in kinds form a closed
/// set; `Custom` exists only for tasks that override the kind used for one of
/// their event categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Starting,
    Finished,
    Failed,
    Custom(String),
}

/// Cheap snapshot of the originating task carried by every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: String,
    pub expression: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum TaskEvent {
    Starting { task: TaskInfo },
    Finished { task: TaskInfo, result: TaskOutcome },
    Failed { task: TaskInfo, error: String },
}

impl TaskEvent {
    /// The built-in kind for this event category.
    pub fn kind(&self) -> EventKind {
        match self {
            TaskEvent::Starting { .. } => EventKind::Starting,
            TaskEvent::Finished { .. } => EventKind::Finished,
            TaskEvent::Failed { .. } => EventKind::Failed,
        }
    }

    pub fn task(&self) -> &TaskInfo {
        match self {
            TaskEvent::Starting { task }
            | TaskEvent::Finished { task, .. }
            | TaskEvent::Failed { task, .. } => task,
        }
    }
}

type Listener = Box<dyn Fn(&TaskEvent) + Send + Sync>;

/// Publish/subscribe bus keyed by [`EventKind`]. Listeners fire synchronously
/// in registration order; kinds with no listeners are silently dropped.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<F>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.listeners.entry(kind).or_default().push(Box::new(callback));
    }

    /// Dispatch under the event's built-in kind.
    pub fn dispatch(&self, event: &TaskEvent) {
        self.dispatch_as(&event.kind(), event);
    }

    /// Dispatch under an explicit kind, used by per-task overrides.
    pub fn dispatch_as(&self, kind: &EventKind, event: &TaskEvent) {
        if let Some(listeners) = self.listeners.get(kind) {
            for listener in listeners {
                listener(event);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&EventKind, usize> =
            self.listeners.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}
