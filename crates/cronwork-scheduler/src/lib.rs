//! `cronwork-scheduler` — schedule assembly and lifecycle.
//!
//! The [`ScheduleManager`] owns the registered tasks, the event bus and the
//! persistence driver. Task definitions reach it either programmatically or
//! through a [`TaskSource`]; production deployments compile the source once
//! with [`ScheduleManager::optimize`] and boot from the stored list.

pub mod manager;
pub mod source;

pub use manager::ScheduleManager;
pub use source::{ManifestSource, StaticSource, TaskSource};
