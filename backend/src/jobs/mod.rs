// Background Jobs Service
//
// This module provides the scheduled background work for the FieldOps
// platform. Jobs are scheduled using tokio-cron-scheduler and run
// automatically at specified intervals.

pub mod recurrence;
pub mod scheduler;
pub mod work_generation;

pub use scheduler::{JobConfig, JobError, JobExecutionLog, JobResult, JobScheduler, JobStatus};
pub use work_generation::{RecurringWorkJob, WorkGenerationResult};
