//! Taskstats Monitor: collects per-job resource usage from the kernel's taskstats
//! interface.
//!
//! Jobs are groups of tasks, typically one per cgroup. They are either configured
//! explicitly or discovered by matching the entries of a cgroup root directory against
//! a pattern. Every task of every job is queried over generic netlink once per sampling
//! interval, and the per-job sums are written to stdout as JSON lines.
use std::io::Write;
use std::sync::Arc;

pub mod backend;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod job;
pub mod registry;
pub mod taskstats;

/// Runs the Taskstats Monitor.
///
/// Reads the configuration from the environment, connects to taskstats, and samples
/// all jobs on every tick of the configured interval.
///
/// # Returns
///
/// Only returns on error; the sampling loop runs until the process is stopped.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration, or neither job ids nor a cgroup root configured.
/// - Kernels without taskstats support.
/// - Missing privileges to query taskstats.
/// - A taskstats reply with an unsupported version.
/// - I/O errors when scanning the cgroup root or writing samples.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    let interval = config.interval();
    log::debug!("Configuration: {:?}", config);

    let backend = Arc::new(backend::Backend::new(config)?);
    log::info!(
        "Started {} backend with {} jobs",
        backend.name(),
        backend.registry().len()
    );

    let mut interval = tokio::time::interval(interval);
    loop {
        interval.tick().await;
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs();
        log::trace!("Sampling jobs@{timestamp}");

        let backend = Arc::clone(&backend);
        let sample = tokio::task::spawn_blocking(move || {
            let before = std::time::Instant::now();
            let sample = backend.sample(timestamp);
            let took = before.elapsed();
            log::trace!("sample() took {} nanoseconds", took.as_nanos());
            sample
        })
        .await??;

        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer(&mut stdout, &sample)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }
}
