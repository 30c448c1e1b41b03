//! Configuration of the monitor.
//!
//! The shared [`Config`] is read once from the environment. Every job receives its own
//! [`JobConfig`], derived from the shared one by overriding named fields.
//!
//! | Variable                         | Meaning                                          |
//! |----------------------------------|--------------------------------------------------|
//! | `TASKSTATS_JOB_IDS`              | comma-separated explicit job ids                 |
//! | `TASKSTATS_CGROUP_ROOT`          | directory scanned for job cgroups                |
//! | `TASKSTATS_JOB_ID_REGEX`         | pattern extracting a job id from an entry name   |
//! | `TASKSTATS_CGROUPS`              | comma-separated cgroups of explicit jobs         |
//! | `TASKSTATS_JOB_CGROUPS`          | per-job cgroups, `id=path[:path],...`            |
//! | `TASKSTATS_INTERVAL_SECS`        | sampling interval in seconds                     |
//! | `TASKSTATS_ISOLATE_JOB_FAILURES` | keep pulling other jobs when one fails           |
mod error;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

pub use error::{Error, Result};

use crate::job::JobID;

pub const DEFAULT_JOB_ID_PATTERN: &str = r"_(\d+)$";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

const JOB_IDS_VAR: &str = "TASKSTATS_JOB_IDS";
const CGROUP_ROOT_VAR: &str = "TASKSTATS_CGROUP_ROOT";
const JOB_ID_REGEX_VAR: &str = "TASKSTATS_JOB_ID_REGEX";
const CGROUPS_VAR: &str = "TASKSTATS_CGROUPS";
const JOB_CGROUPS_VAR: &str = "TASKSTATS_JOB_CGROUPS";
const INTERVAL_VAR: &str = "TASKSTATS_INTERVAL_SECS";
const ISOLATE_VAR: &str = "TASKSTATS_ISOLATE_JOB_FAILURES";

/// Options of a single job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobConfig {
    cgroups: Vec<PathBuf>,
}

impl JobConfig {
    /// Returns a copy with the cgroup list replaced.
    pub fn with_cgroups(mut self, cgroups: Vec<PathBuf>) -> Self {
        self.cgroups = cgroups;
        self
    }

    pub fn cgroups(&self) -> &[PathBuf] {
        &self.cgroups
    }
}

/// Shared configuration of the monitor.
#[derive(Debug, Clone)]
pub struct Config {
    job_ids: Vec<JobID>,
    cgroup_root: Option<PathBuf>,
    job_id_pattern: Regex,
    job: JobConfig,
    job_overrides: HashMap<JobID, JobConfig>,
    interval: Duration,
    isolate_job_failures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job_ids: Vec::new(),
            cgroup_root: None,
            job_id_pattern: default_pattern(),
            job: JobConfig::default(),
            job_overrides: HashMap::new(),
            interval: DEFAULT_INTERVAL,
            isolate_job_failures: false,
        }
    }
}

fn default_pattern() -> Regex {
    Regex::new(DEFAULT_JOB_ID_PATTERN).expect("default job id pattern to be valid")
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    ///
    /// Unset and empty variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] for invalid job ids, patterns, or numbers.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Config::default();

        if let Some(ids) = get(JOB_IDS_VAR) {
            config.job_ids = split_list(&ids)
                .map(|id| parse_job_id(JOB_IDS_VAR, id))
                .collect::<Result<_>>()?;
        }

        config.cgroup_root = get(CGROUP_ROOT_VAR).map(|root| PathBuf::from(root.trim()));

        if let Some(pattern) = get(JOB_ID_REGEX_VAR) {
            config = config.with_job_id_pattern(&pattern)?;
        }

        if let Some(cgroups) = get(CGROUPS_VAR) {
            config.job = config
                .job
                .with_cgroups(split_list(&cgroups).map(PathBuf::from).collect());
        }

        if let Some(overrides) = get(JOB_CGROUPS_VAR) {
            for entry in split_list(&overrides) {
                let Some((id, paths)) = entry.split_once('=') else {
                    return Err(Error::InvalidValue {
                        key: JOB_CGROUPS_VAR,
                        value: entry.to_owned(),
                    });
                };
                let cgroups = paths
                    .split(':')
                    .map(str::trim)
                    .filter(|path| !path.is_empty())
                    .map(PathBuf::from)
                    .collect();
                let job_id = parse_job_id(JOB_CGROUPS_VAR, id.trim())?;
                config = config.with_job_cgroups(job_id, cgroups);
            }
        }

        if let Some(secs) = get(INTERVAL_VAR) {
            let secs = secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| Error::InvalidValue {
                    key: INTERVAL_VAR,
                    value: secs.clone(),
                })?;
            config.interval = Duration::from_secs(secs);
        }

        if let Some(flag) = get(ISOLATE_VAR) {
            config.isolate_job_failures = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(Error::InvalidValue {
                        key: ISOLATE_VAR,
                        value: flag,
                    });
                }
            };
        }

        Ok(config)
    }

    pub fn with_job_ids(mut self, job_ids: Vec<JobID>) -> Self {
        self.job_ids = job_ids;
        self
    }

    pub fn with_cgroup_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cgroup_root = Some(root.into());
        self
    }

    /// Replaces the job id pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` is not a valid regular expression.
    pub fn with_job_id_pattern(mut self, pattern: &str) -> Result<Self> {
        self.job_id_pattern = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(self)
    }

    pub fn with_cgroups(mut self, cgroups: Vec<PathBuf>) -> Self {
        self.job = self.job.with_cgroups(cgroups);
        self
    }

    /// Gives the explicitly configured job `job_id` its own cgroups.
    pub fn with_job_cgroups(mut self, job_id: JobID, cgroups: Vec<PathBuf>) -> Self {
        let job = self.job.clone().with_cgroups(cgroups);
        self.job_overrides.insert(job_id, job);
        self
    }

    pub fn with_isolated_job_failures(mut self, isolate: bool) -> Self {
        self.isolate_job_failures = isolate;
        self
    }

    pub fn job_ids(&self) -> &[JobID] {
        &self.job_ids
    }

    pub fn cgroup_root(&self) -> Option<&Path> {
        self.cgroup_root.as_deref()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn isolate_job_failures(&self) -> bool {
        self.isolate_job_failures
    }

    /// The options every job starts from.
    pub fn job_config(&self) -> JobConfig {
        self.job.clone()
    }

    /// The options of an explicitly configured job: its override if one was given,
    /// otherwise a copy of the shared job options.
    pub fn job_config_for(&self, job_id: &JobID) -> JobConfig {
        self.job_overrides
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| self.job_config())
    }

    /// Extracts a job id from a directory entry name.
    ///
    /// The first capture group of the pattern is the id; a pattern without groups uses
    /// the whole match. Empty or invalid ids yield `None`.
    pub fn match_job_id(&self, name: &str) -> Option<JobID> {
        let captures = self.job_id_pattern.captures(name)?;
        let matched = if self.job_id_pattern.captures_len() > 1 {
            captures.get(1)?
        } else {
            captures.get(0)?
        };
        if matched.as_str().is_empty() {
            return None;
        }
        JobID::new(matched.as_str()).ok()
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn parse_job_id(key: &'static str, id: &str) -> Result<JobID> {
    JobID::new(id).map_err(|source| Error::InvalidJobID { key, source })
}
