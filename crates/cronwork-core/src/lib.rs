//! `cronwork-core` — cron evaluation, the task entity, and the event bus.
//!
//! # Overview
//!
//! A [`Task`] pairs an action (shell command, registry invocation, or
//! process-local callable) with a cron expression. [`CronEvaluator`] decides
//! due-ness against an absolute instant, including the 6-field
//! seconds-resolution extension; [`EventBus`] carries the Starting /
//! Finished / Failed lifecycle events to listeners.
//!
//! Frequency builders (`every_minute`, `daily_at`, `mondays`, ...) mutate a
//! task's expression in place before the first poll observes it.

pub mod cron;
pub mod error;
pub mod event;
pub mod frequency;
pub mod invoke;
pub mod task;

pub use cron::CronEvaluator;
pub use error::{InvocationError, Result, ScheduleError};
pub use event::{EventBus, EventKind, TaskEvent, TaskInfo};
pub use frequency::{CronPosition, splice_into_position};
pub use invoke::InvocationRegistry;
pub use task::{
    ActionRecord, CallableFn, DEFAULT_EXPRESSION, DEFAULT_TTL, Task, TaskAction, TaskOutcome,
    TaskRecord,
};
