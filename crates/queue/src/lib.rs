//! Background execution for the federation engine.
//!
//! - [`task_queue`]: bounded worker pool for work enqueued by request paths
//!   (eager deliveries, inbound dispatch, outbound acks).
//! - [`scheduler`]: periodic maintenance (retry sweep, stale expiration,
//!   health recompute).
//!
//! Both stop on a shutdown signal without abandoning work already started.

pub mod scheduler;
pub mod task_queue;

pub use scheduler::{
    FederationMaintenance, MaintenanceExecutor, MaintenanceJob, Scheduler, SchedulerConfig,
};
pub use task_queue::{JobQueue, JobSender, QueueHandle, TaskContext, TaskRunner};
