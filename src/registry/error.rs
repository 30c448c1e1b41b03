use crate::fsutil;
use crate::job::{self, JobID};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("job must be defined: no job ids and no cgroup root configured")]
    JobMustBeDefined,
    #[error("failed to scan job cgroups: {0}")]
    ScanRoot(#[from] fsutil::DirReadError),
    #[error("failed refreshing job `{job_id}`: {source}")]
    Job {
        job_id: JobID,
        #[source]
        source: job::Error,
    },
}

impl Error {
    /// Whether the error must end the sampling cycle even when job failures are
    /// isolated.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Job { source, .. } => source.is_privilege_error(),
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
