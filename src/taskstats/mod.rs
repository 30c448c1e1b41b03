//! Client for the kernel's taskstats interface.
//!
//! Taskstats is a generic netlink family that reports per-task accounting data. This
//! module only uses its synchronous side: one `TASKSTATS_CMD_GET` request for a task
//! id, answered by exactly one reply carrying a nested attribute tree.
//!
//! # Key Components
//!
//! - [`Client`]: Owns the netlink channel and the resolved family id.
//! - [`Request`]: A single-use GET request for one task id.
//! - [`TaskStatsSource`]: The per-task request/response seam jobs query through.
//! - [`CountersDecoder`]: Turns the raw stats buffer into [`TaskCounters`].
//!
//! # Platform Requirements
//!
//! - Linux with `CONFIG_TASKSTATS`.
//! - `CAP_NET_ADMIN` to query tasks of other users.
mod client;
mod controller;
mod counters;
mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod netlink;
mod socket;

pub use client::{Client, Request, TaskStatsSource};
pub use controller::resolve_family;
pub use counters::{CountersDecoder, DecodeError, TaskCounters, TaskStatsDecoder};
pub use error::{Error, Result};
pub use socket::{NetlinkSocket, Transport};

/// Name the taskstats family is registered under.
pub const TASKSTATS_FAMILY_NAME: &str = "TASKSTATS";
pub const TASKSTATS_GENL_VERSION: u8 = 1;

pub const TASKSTATS_CMD_GET: u8 = 1;
pub const TASKSTATS_CMD_ATTR_PID: u16 = 1;

pub const TASKSTATS_TYPE_PID: u16 = 1;
pub const TASKSTATS_TYPE_STATS: u16 = 3;
pub const TASKSTATS_TYPE_AGGR_PID: u16 = 4;

/// The only `struct taskstats` version this crate decodes.
pub const TASKSTATS_VERSION: u16 = 4;
/// Smallest stats payload that holds every decoded field.
pub const TASKSTATS_MIN_SIZE: usize = 272;
