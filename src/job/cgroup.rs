use std::io::{self, BufRead};
use std::path::Path;

use crate::config::JobConfig;
use crate::fsutil;
use crate::taskstats::{TaskCounters, TaskStatsSource};

use super::{Error, JobFactory, JobHandle, JobID, JobStats, Result};

/// Files listing the thread ids of a cgroup: v1 hierarchies first, then v2.
const TASK_FILES: [&str; 2] = ["tasks", "cgroup.threads"];

/// A job whose tasks are the threads of one or more cgroups.
#[derive(Debug)]
pub struct CgroupJob {
    job_id: JobID,
    config: JobConfig,
    stats: JobStats,
}

impl CgroupJob {
    pub fn new(job_id: JobID, config: JobConfig) -> Self {
        let stats = JobStats::empty(job_id.clone());
        Self {
            job_id,
            config,
            stats,
        }
    }

    pub fn job_id(&self) -> &JobID {
        &self.job_id
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }
}

impl JobHandle for CgroupJob {
    /// Queries every task of every configured cgroup and sums the counters of the tasks
    /// that reported data.
    fn refresh(&mut self, source: &dyn TaskStatsSource) -> Result<()> {
        let mut counters = TaskCounters::default();
        let mut tasks = 0;

        for cgroup in self.config.cgroups() {
            for tid in read_task_ids(cgroup)? {
                if let Some(task) = source.task_stats(tid)? {
                    counters += task;
                    tasks += 1;
                }
            }
        }

        log::trace!("job {} refreshed with {} tasks", self.job_id, tasks);
        self.stats = JobStats::new(self.job_id.clone(), tasks, counters);
        Ok(())
    }

    fn snapshot(&self) -> JobStats {
        self.stats.clone()
    }
}

/// Creates a [`CgroupJob`] for every job the registry starts tracking.
#[derive(Debug, Default, Clone, Copy)]
pub struct CgroupJobFactory;

impl JobFactory for CgroupJobFactory {
    type Job = CgroupJob;

    fn create(&self, job_id: JobID, config: JobConfig) -> Self::Job {
        CgroupJob::new(job_id, config)
    }
}

/// Reads the thread ids of the cgroup at `path`.
///
/// A cgroup without any task list (typically because it was removed after the last
/// scan) has no tasks.
fn read_task_ids(path: &Path) -> Result<Vec<u32>> {
    for name in TASK_FILES {
        let file = path.join(name);
        match fsutil::open_file_reader(&file) {
            Ok(reader) => {
                return parse_task_ids(reader).map_err(|source| Error::ReadTasks {
                    path: file,
                    source,
                });
            }
            Err(err) if err.source.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        }
    }

    log::debug!("no task list found in cgroup `{}`", path.display());
    Ok(Vec::new())
}

fn parse_task_ids(reader: impl BufRead) -> io::Result<Vec<u32>> {
    let mut tids = Vec::new();
    for line in reader.lines() {
        if let Ok(tid) = line?.trim().parse::<u32>() {
            tids.push(tid);
        }
    }
    Ok(tids)
}
