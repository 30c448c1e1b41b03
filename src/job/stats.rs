use super::JobID;
use crate::taskstats::TaskCounters;

/// Point-in-time statistics of one job, as returned by [`super::JobHandle::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    job_id: JobID,
    /// Number of tasks that reported counters during the last refresh.
    tasks: usize,
    counters: TaskCounters,
}

impl JobStats {
    pub fn new(job_id: JobID, tasks: usize, counters: TaskCounters) -> Self {
        Self {
            job_id,
            tasks,
            counters,
        }
    }

    /// Statistics of a job that has not been refreshed yet.
    pub fn empty(job_id: JobID) -> Self {
        Self::new(job_id, 0, TaskCounters::default())
    }

    pub fn job_id(&self) -> &JobID {
        &self.job_id
    }

    pub fn tasks(&self) -> usize {
        self.tasks
    }

    pub fn counters(&self) -> &TaskCounters {
        &self.counters
    }
}
