//! Jobs: named groups of tasks whose counters are collected together.
//!
//! The registry only talks to jobs through [`JobHandle`] and creates them through a
//! [`JobFactory`]; [`CgroupJob`] is the default implementation.
mod cgroup;
mod error;
mod id;
mod stats;

pub use cgroup::{CgroupJob, CgroupJobFactory};
pub use error::{Error, Result};
pub use id::JobID;
pub use stats::JobStats;

use crate::config::JobConfig;
use crate::taskstats::TaskStatsSource;

/// A monitored job.
pub trait JobHandle {
    /// Updates the job's counters, querying `source` once per tracked task.
    fn refresh(&mut self, source: &dyn TaskStatsSource) -> Result<()>;

    /// Returns the counters of the last refresh without side effects.
    fn snapshot(&self) -> JobStats;
}

/// Creates the job collaborator for a newly tracked job id.
pub trait JobFactory {
    type Job: JobHandle;

    fn create(&self, job_id: JobID, config: JobConfig) -> Self::Job;
}
