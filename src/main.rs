/// Entry point for the Taskstats Monitor.
///
/// This binary samples the taskstats counters of every monitored job and writes one JSON
/// line per sampling interval to stdout. Querying tasks of other users requires
/// `CAP_NET_ADMIN`.
///
/// # Errors
///
/// Returns an error if initialization or a sampling cycle fails (e.g., missing
/// privileges, no job defined, or a kernel without taskstats support).
///
/// # Examples
///
/// ```bash
/// TASKSTATS_CGROUP_ROOT=/dev/cpuset/oar RUST_LOG=info cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    taskstats_monitor::run().await
}
