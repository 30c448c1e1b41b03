//! Registry of monitored jobs.
//!
//! The registry keeps the set of tracked jobs in sync with the cgroup root directory
//! and pulls the statistics of every tracked job once per sampling cycle.
//!
//! # Lifecycle
//!
//! - Explicitly configured job ids are registered on construction and never removed.
//! - [`Registry::update_job_list`] registers jobs whose directory appeared under the
//!   root and drops jobs whose directory disappeared. A job that disappears and comes
//!   back starts over with a fresh collaborator.
mod error;

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::sync::Arc;

use dashmap::DashMap;

pub use error::{Error, Result};

use crate::config::{Config, JobConfig};
use crate::error::ResultOkLogExt;
use crate::fsutil;
use crate::job::{JobFactory, JobHandle, JobID, JobStats};
use crate::taskstats::{self, Request, TaskCounters, TaskStatsSource};

/// A tracked job together with the options it was created with.
#[derive(Debug)]
pub struct JobEntry<J> {
    job_id: JobID,
    job: J,
    config: JobConfig,
}

impl<J> JobEntry<J> {
    pub fn job_id(&self) -> &JobID {
        &self.job_id
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }
}

/// Tracks jobs and collects their stats.
pub struct Registry<F: JobFactory, S> {
    config: Config,
    source: Arc<S>,
    factory: F,
    pinned: HashSet<JobID>,
    jobs: DashMap<JobID, JobEntry<F::Job>>,
}

impl<F, S> Registry<F, S>
where
    F: JobFactory,
    S: TaskStatsSource,
{
    /// Creates the registry and registers every explicitly configured job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobMustBeDefined`] if the configuration names neither job ids
    /// nor a cgroup root.
    pub fn new(config: Config, source: Arc<S>, factory: F) -> Result<Self> {
        if config.job_ids().is_empty() && config.cgroup_root().is_none() {
            return Err(Error::JobMustBeDefined);
        }

        let registry = Self {
            pinned: config.job_ids().iter().cloned().collect(),
            jobs: DashMap::with_capacity(config.job_ids().len()),
            config,
            source,
            factory,
        };
        for job_id in registry.config.job_ids() {
            let job_config = registry.config.job_config_for(job_id);
            registry.register_job(job_id.clone(), job_config);
        }

        Ok(registry)
    }

    /// Synchronizes the tracked jobs with the entries of the cgroup root.
    ///
    /// Does nothing if no cgroup root is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanRoot`] if the root directory cannot be listed.
    pub fn update_job_list(&self) -> Result<()> {
        let Some(root) = self.config.cgroup_root() else {
            return Ok(());
        };

        let mut observed: HashMap<JobID, OsString> = HashMap::new();
        for name in fsutil::read_dir_names(root)? {
            let Some(job_id) = name.to_str().and_then(|n| self.config.match_job_id(n)) else {
                continue;
            };
            observed.insert(job_id, name);
        }

        let current: HashSet<JobID> = observed.keys().cloned().collect();
        let tracked: HashSet<JobID> = self.jobs.iter().map(|e| e.key().clone()).collect();
        log::debug!("ids of jobs to monitor: {:?}", current);

        let added: Vec<JobID> = current.difference(&tracked).cloned().collect();
        let removed: Vec<JobID> = tracked
            .difference(&current)
            .filter(|job_id| !self.pinned.contains(*job_id))
            .cloned()
            .collect();

        for job_id in added {
            let cgroup = root.join(&observed[&job_id]);
            let job_config = self.config.job_config().with_cgroups(vec![cgroup]);
            self.register_job(job_id, job_config);
        }
        for job_id in removed {
            self.remove_job(&job_id);
        }

        Ok(())
    }

    /// Refreshes every tracked job and returns their snapshots, in no particular order.
    ///
    /// # Errors
    ///
    /// The first failing job aborts the pull with [`Error::Job`]. With isolated job
    /// failures configured, failing jobs are logged and left out instead; privilege
    /// errors still abort.
    pub fn pull(&self) -> Result<Vec<JobStats>> {
        let source: &dyn TaskStatsSource = self.source.as_ref();
        let isolate = self.config.isolate_job_failures();
        let mut out = Vec::with_capacity(self.jobs.len());

        for mut entry in self.jobs.iter_mut() {
            let JobEntry { job_id, job, .. } = entry.value_mut();
            let refreshed = job.refresh(source).map_err(|source| Error::Job {
                job_id: job_id.clone(),
                source,
            });
            match refreshed {
                Err(err) if !isolate || err.is_fatal() => return Err(err),
                refreshed => {
                    if refreshed.ok_log("skipping job in this cycle").is_some() {
                        out.push(job.snapshot());
                    }
                }
            }
        }

        Ok(out)
    }

    /// Builds a taskstats request for `tid` through the registry's source.
    pub fn build_request(&self, tid: u32) -> Request {
        self.source.build_request(tid)
    }

    /// Sends a request built with [`Registry::build_request`].
    pub fn get_task_stats(&self, request: Request) -> taskstats::Result<Option<TaskCounters>> {
        self.source.query(request)
    }

    pub fn job_ids(&self) -> Vec<JobID> {
        self.jobs.iter().map(|e| e.key().clone()).collect()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    /// Returns the options the job `job_id` was created with.
    pub fn job_config(&self, job_id: &str) -> Option<JobConfig> {
        self.jobs.get(job_id).map(|entry| entry.config().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn register_job(&self, job_id: JobID, config: JobConfig) {
        log::info!(
            "monitoring job {} (cgroups: {:?})",
            job_id,
            config.cgroups()
        );
        let job = self.factory.create(job_id.clone(), config.clone());
        self.jobs.insert(
            job_id.clone(),
            JobEntry {
                job_id,
                job,
                config,
            },
        );
    }

    fn remove_job(&self, job_id: &JobID) {
        if self.jobs.remove(job_id).is_some() {
            log::info!("job {} ended, no longer monitored", job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use super::*;
    use crate::job;
    use crate::taskstats::mock::StaticSource;

    /// A job whose refresh outcome is scripted by its id.
    #[derive(Debug)]
    struct FakeJob {
        job_id: JobID,
        refreshes: usize,
    }

    impl JobHandle for FakeJob {
        fn refresh(&mut self, source: &dyn TaskStatsSource) -> job::Result<()> {
            match self.job_id.as_ref() {
                "broken" => Err(job::Error::InvalidJobID("broken".to_owned())),
                "denied" => {
                    source.task_stats(1)?;
                    Ok(())
                }
                _ => {
                    self.refreshes += 1;
                    Ok(())
                }
            }
        }

        fn snapshot(&self) -> JobStats {
            JobStats::new(self.job_id.clone(), self.refreshes, TaskCounters::default())
        }
    }

    #[derive(Debug, Default)]
    struct FakeFactory {
        created: Mutex<Vec<(JobID, JobConfig)>>,
    }

    impl JobFactory for &FakeFactory {
        type Job = FakeJob;

        fn create(&self, job_id: JobID, config: JobConfig) -> FakeJob {
            self.created.lock().unwrap().push((job_id.clone(), config));
            FakeJob {
                job_id,
                refreshes: 0,
            }
        }
    }

    fn id(raw: &str) -> JobID {
        JobID::new(raw).unwrap()
    }

    fn sorted_ids<F: JobFactory, S: TaskStatsSource>(registry: &Registry<F, S>) -> Vec<String> {
        let mut ids: Vec<String> = registry
            .job_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        ids.sort();
        ids
    }

    fn registry_for<'a>(
        config: Config,
        factory: &'a FakeFactory,
    ) -> Registry<&'a FakeFactory, StaticSource> {
        Registry::new(config, Arc::new(StaticSource::default()), factory).unwrap()
    }

    fn mkdirs(root: &Path, names: &[&str]) {
        for name in names {
            std::fs::create_dir(root.join(name)).unwrap();
        }
    }

    #[test]
    fn test_new_without_jobs_fails() {
        let factory = FakeFactory::default();
        let result = Registry::new(
            Config::default(),
            Arc::new(StaticSource::default()),
            &factory,
        );
        assert!(matches!(result, Err(Error::JobMustBeDefined)));
    }

    #[test]
    fn test_single_explicit_job() {
        let factory = FakeFactory::default();
        let config = Config::default()
            .with_job_ids(vec![id("job1")])
            .with_cgroups(vec![PathBuf::from("/cg")]);
        let registry = registry_for(config, &factory);

        assert_eq!(sorted_ids(&registry), vec!["job1"]);
        assert_eq!(
            registry.job_config("job1").unwrap().cgroups(),
            &[PathBuf::from("/cg")]
        );

        let stats = registry.pull().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].job_id(), &id("job1"));
        assert_eq!(stats[0].tasks(), 1);
    }

    #[test]
    fn test_multiple_explicit_jobs_get_own_configs() {
        let factory = FakeFactory::default();
        let config = Config::default()
            .with_job_ids(vec![id("a"), id("b")])
            .with_cgroups(vec![PathBuf::from("/shared")])
            .with_job_cgroups(id("b"), vec![PathBuf::from("/b")]);
        let registry = registry_for(config, &factory);

        assert_eq!(sorted_ids(&registry), vec!["a", "b"]);
        assert_eq!(
            registry.job_config("a").unwrap().cgroups(),
            &[PathBuf::from("/shared")]
        );
        assert_eq!(
            registry.job_config("b").unwrap().cgroups(),
            &[PathBuf::from("/b")]
        );
        assert_eq!(factory.created.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_update_job_list_without_root_is_noop() {
        let factory = FakeFactory::default();
        let registry = registry_for(Config::default().with_job_ids(vec![id("x")]), &factory);
        registry.update_job_list().unwrap();
        assert_eq!(sorted_ids(&registry), vec!["x"]);
    }

    #[test]
    fn test_update_job_list_tracks_matching_entries() {
        let root = tempfile::tempdir().unwrap();
        mkdirs(root.path(), &["oar.alice_12", "oar.bob_7", "cpuset.cpus", "oar.carol_"]);

        let factory = FakeFactory::default();
        let config = Config::default()
            .with_cgroup_root(root.path())
            .with_cgroups(vec![PathBuf::from("/shared")]);
        let registry = registry_for(config, &factory);
        assert!(registry.is_empty());

        registry.update_job_list().unwrap();
        assert_eq!(sorted_ids(&registry), vec!["12", "7"]);
        assert_eq!(
            registry.job_config("12").unwrap().cgroups(),
            &[root.path().join("oar.alice_12")]
        );
        assert_eq!(
            registry.job_config("7").unwrap().cgroups(),
            &[root.path().join("oar.bob_7")]
        );

        registry.update_job_list().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(factory.created.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_update_job_list_collapses_duplicate_ids() {
        let root = tempfile::tempdir().unwrap();
        mkdirs(root.path(), &["a_12", "b_12"]);

        let factory = FakeFactory::default();
        let registry = registry_for(Config::default().with_cgroup_root(root.path()), &factory);

        registry.update_job_list().unwrap();
        assert_eq!(sorted_ids(&registry), vec!["12"]);
        let cgroups = registry.job_config("12").unwrap().cgroups().to_vec();
        assert_eq!(cgroups.len(), 1);
        assert!(
            cgroups[0] == root.path().join("a_12") || cgroups[0] == root.path().join("b_12"),
            "unexpected cgroup {:?}",
            cgroups[0]
        );
        assert_eq!(factory.created.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_update_job_list_removes_and_recreates_jobs() {
        let root = tempfile::tempdir().unwrap();
        mkdirs(root.path(), &["oar.alice_12", "oar.bob_7"]);

        let factory = FakeFactory::default();
        let registry = registry_for(Config::default().with_cgroup_root(root.path()), &factory);
        registry.update_job_list().unwrap();
        registry.pull().unwrap();

        std::fs::remove_dir(root.path().join("oar.bob_7")).unwrap();
        registry.update_job_list().unwrap();
        assert_eq!(sorted_ids(&registry), vec!["12"]);

        std::fs::create_dir(root.path().join("oar.bob_7")).unwrap();
        registry.update_job_list().unwrap();
        assert_eq!(sorted_ids(&registry), vec!["12", "7"]);
        assert_eq!(factory.created.lock().unwrap().len(), 3);

        let mut stats = registry.pull().unwrap();
        stats.sort_by(|a, b| a.job_id().cmp(b.job_id()));
        assert_eq!(stats[0].job_id(), &id("12"));
        assert_eq!(stats[0].tasks(), 2);
        assert_eq!(stats[1].job_id(), &id("7"));
        assert_eq!(stats[1].tasks(), 1);
    }

    #[test]
    fn test_update_job_list_keeps_explicit_jobs() {
        let root = tempfile::tempdir().unwrap();
        mkdirs(root.path(), &["job_1"]);

        let factory = FakeFactory::default();
        let config = Config::default()
            .with_job_ids(vec![id("pinned")])
            .with_cgroup_root(root.path());
        let registry = registry_for(config, &factory);

        registry.update_job_list().unwrap();
        assert_eq!(sorted_ids(&registry), vec!["1", "pinned"]);

        std::fs::remove_dir(root.path().join("job_1")).unwrap();
        registry.update_job_list().unwrap();
        assert_eq!(sorted_ids(&registry), vec!["pinned"]);
    }

    #[test]
    fn test_update_job_list_missing_root_fails() {
        let factory = FakeFactory::default();
        let registry = registry_for(
            Config::default().with_cgroup_root("/definitely/does/not/exist"),
            &factory,
        );
        let err = registry.update_job_list().unwrap_err();
        assert!(matches!(err, Error::ScanRoot(_)));
    }

    #[test]
    fn test_pull_aborts_on_failing_job() {
        let factory = FakeFactory::default();
        let config = Config::default().with_job_ids(vec![id("ok"), id("broken")]);
        let registry = registry_for(config, &factory);

        let err = registry.pull().unwrap_err();
        match err {
            Error::Job { job_id, .. } => assert_eq!(job_id, id("broken")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pull_isolates_failing_job() {
        let factory = FakeFactory::default();
        let config = Config::default()
            .with_job_ids(vec![id("ok"), id("broken")])
            .with_isolated_job_failures(true);
        let registry = registry_for(config, &factory);

        let stats = registry.pull().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].job_id(), &id("ok"));
    }

    #[test]
    fn test_pull_privilege_error_is_never_isolated() {
        let factory = FakeFactory::default();
        let config = Config::default()
            .with_job_ids(vec![id("denied")])
            .with_isolated_job_failures(true);
        let registry =
            Registry::new(config, Arc::new(StaticSource::denied()), &factory).unwrap();

        let err = registry.pull().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_per_task_call_goes_through_source() {
        let factory = FakeFactory::default();
        let source = Arc::new(StaticSource::new([(
            9,
            TaskCounters {
                ac_stime: 3,
                ..Default::default()
            },
        )]));
        let config = Config::default().with_job_ids(vec![id("a")]);
        let registry = Registry::new(config, Arc::clone(&source), &factory).unwrap();

        let request = registry.build_request(9);
        assert_eq!(request.tid(), 9);
        let counters = registry.get_task_stats(request).unwrap().unwrap();
        assert_eq!(counters.ac_stime, 3);
        assert_eq!(registry.get_task_stats(registry.build_request(10)).unwrap(), None);
        assert_eq!(source.queried(), vec![9, 10]);
    }
}
