//! The taskstats input backend.
//!
//! Wires the configuration, the taskstats [`Client`] and the job [`Registry`] together
//! and exposes what the collector loop needs once per sampling cycle.

use std::sync::Arc;

use crate::config::Config;
use crate::job::{CgroupJobFactory, JobFactory, JobStats};
use crate::registry::{self, Registry};
use crate::taskstats::{self, Client, Request, TaskCounters, TaskStatsSource};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to taskstats: {0}")]
    Connect(#[source] taskstats::Error),
    #[error(transparent)]
    Registry(#[from] registry::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One sampling cycle's worth of job statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Sample {
    /// Timestamp (in UNIX epoch seconds)
    timestamp: u64,
    jobs: Vec<JobStats>,
}

impl Sample {
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn jobs(&self) -> &[JobStats] {
        &self.jobs
    }
}

pub struct Backend<F: JobFactory = CgroupJobFactory, S = Client> {
    registry: Registry<F, S>,
}

impl Backend {
    /// Connects to the kernel's taskstats family and registers the configured jobs.
    ///
    /// # Errors
    ///
    /// Fails if taskstats is unavailable or no job is defined.
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::connect().map_err(Error::Connect)?;
        log::debug!("taskstats family id: {}", client.family_id());
        Self::with_parts(config, Arc::new(client), CgroupJobFactory)
    }
}

impl<F, S> Backend<F, S>
where
    F: JobFactory,
    S: TaskStatsSource,
{
    pub fn with_parts(config: Config, source: Arc<S>, factory: F) -> Result<Self> {
        Ok(Self {
            registry: Registry::new(config, source, factory)?,
        })
    }

    pub fn name(&self) -> &'static str {
        "taskstats"
    }

    pub fn registry(&self) -> &Registry<F, S> {
        &self.registry
    }

    pub fn build_request(&self, tid: u32) -> Request {
        self.registry.build_request(tid)
    }

    pub fn get_task_stats(&self, request: Request) -> taskstats::Result<Option<TaskCounters>> {
        self.registry.get_task_stats(request)
    }

    pub fn update_job_list(&self) -> Result<()> {
        Ok(self.registry.update_job_list()?)
    }

    pub fn pull(&self) -> Result<Vec<JobStats>> {
        Ok(self.registry.pull()?)
    }

    /// Reconciles the job list, then pulls every job.
    pub fn sample(&self, timestamp: u64) -> Result<Sample> {
        self.update_job_list()?;
        let jobs = self.pull()?;
        Ok(Sample { timestamp, jobs })
    }
}
