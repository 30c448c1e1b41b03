use std::path::PathBuf;

use crate::{fsutil, taskstats};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid job id: {0}")]
    InvalidJobID(String),
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),
    #[error("failed to read task ids from `{path}`: {source}")]
    ReadTasks {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    TaskStats(#[from] taskstats::Error),
}

impl Error {
    /// Whether the error stems from missing privileges, which no retry can fix.
    pub fn is_privilege_error(&self) -> bool {
        matches!(self, Error::TaskStats(taskstats::Error::NoEnoughPrivilege))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
