//! Logical key namespace shared by every driver variant.

/// Full cached task list written by `schedule:optimize`.
pub const TASKS: &str = "schedule:tasks";

/// Pending ad-hoc queue.
pub const PENDING: &str = "schedule:pending";

const STATE_PREFIX: &str = "schedule:state:";
const LOCK_PREFIX: &str = "schedule:lock:";

pub fn state_key(task_id: &str) -> String {
    format!("{STATE_PREFIX}{task_id}")
}

pub fn lock_key(task_id: &str) -> String {
    format!("{LOCK_PREFIX}{task_id}")
}
