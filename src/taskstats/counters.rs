//! Decoding of the kernel's `struct taskstats` payload.
//!
//! Only the fixed part shared by every reply of the supported version is decoded: the
//! first [`TASKSTATS_MIN_SIZE`] bytes, laid out in host byte order with the natural
//! alignment of `linux/taskstats.h`. Fields appended by later kernels are ignored.
//!
//! # Example
//!
//! ```rust
//! use taskstats_monitor::taskstats::{CountersDecoder, TaskStatsDecoder, TASKSTATS_MIN_SIZE};
//!
//! let mut raw = vec![0u8; TASKSTATS_MIN_SIZE];
//! raw[..2].copy_from_slice(&4u16.to_ne_bytes());
//! raw[152..160].copy_from_slice(&1500u64.to_ne_bytes());
//!
//! let counters = TaskStatsDecoder.decode(&raw, 4).unwrap();
//! assert_eq!(counters.ac_utime, 1500);
//! ```

use std::ops::AddAssign;

use super::{TASKSTATS_MIN_SIZE, TASKSTATS_VERSION};

/// Errors raised by a [`CountersDecoder`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("cannot decode taskstats version {0}")]
    UnsupportedVersion(u16),
    #[error("taskstats buffer of {len} bytes is shorter than {min}")]
    Truncated { len: usize, min: usize },
}

/// Turns a raw taskstats buffer into a [`TaskCounters`] record.
pub trait CountersDecoder {
    fn decode(&self, raw: &[u8], version: u16) -> Result<TaskCounters, DecodeError>;
}

/// Resource usage counters of a single task, or the sum over several tasks.
///
/// Times are in microseconds unless suffixed otherwise; delay totals are in nanoseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct TaskCounters {
    /// Number of delay values recorded while waiting for a CPU.
    pub cpu_count: u64,
    /// Total delay waiting for a CPU (ns).
    pub cpu_delay_total: u64,
    /// Number of synchronous block I/O delays.
    pub blkio_count: u64,
    /// Total delay waiting for synchronous block I/O (ns).
    pub blkio_delay_total: u64,
    /// Number of swap-in delays.
    pub swapin_count: u64,
    /// Total delay waiting for swap-in (ns).
    pub swapin_delay_total: u64,
    /// Wall-clock running time (ns).
    pub cpu_run_real_total: u64,
    /// Virtual running time (ns).
    pub cpu_run_virtual_total: u64,
    /// Elapsed time since task start.
    pub ac_etime: u64,
    /// User CPU time.
    pub ac_utime: u64,
    /// System CPU time.
    pub ac_stime: u64,
    /// Minor page faults.
    pub ac_minflt: u64,
    /// Major page faults.
    pub ac_majflt: u64,
    /// Accumulated RSS usage (MB-usec).
    pub coremem: u64,
    /// Accumulated virtual memory usage (MB-usec).
    pub virtmem: u64,
    /// High-water RSS usage (KB).
    pub hiwater_rss: u64,
    /// High-water virtual memory usage (KB).
    pub hiwater_vm: u64,
    /// Bytes read through any read syscall.
    pub read_char: u64,
    /// Bytes written through any write syscall.
    pub write_char: u64,
    pub read_syscalls: u64,
    pub write_syscalls: u64,
    /// Bytes fetched from the storage layer.
    pub read_bytes: u64,
    /// Bytes sent to the storage layer.
    pub write_bytes: u64,
    /// Dirtied bytes that were truncated before writeback.
    pub cancelled_write_bytes: u64,
}

impl AddAssign for TaskCounters {
    /// Sums every counter, except the high-water marks which keep the maximum.
    fn add_assign(&mut self, rhs: Self) {
        self.cpu_count += rhs.cpu_count;
        self.cpu_delay_total += rhs.cpu_delay_total;
        self.blkio_count += rhs.blkio_count;
        self.blkio_delay_total += rhs.blkio_delay_total;
        self.swapin_count += rhs.swapin_count;
        self.swapin_delay_total += rhs.swapin_delay_total;
        self.cpu_run_real_total += rhs.cpu_run_real_total;
        self.cpu_run_virtual_total += rhs.cpu_run_virtual_total;
        self.ac_etime += rhs.ac_etime;
        self.ac_utime += rhs.ac_utime;
        self.ac_stime += rhs.ac_stime;
        self.ac_minflt += rhs.ac_minflt;
        self.ac_majflt += rhs.ac_majflt;
        self.coremem += rhs.coremem;
        self.virtmem += rhs.virtmem;
        self.hiwater_rss = self.hiwater_rss.max(rhs.hiwater_rss);
        self.hiwater_vm = self.hiwater_vm.max(rhs.hiwater_vm);
        self.read_char += rhs.read_char;
        self.write_char += rhs.write_char;
        self.read_syscalls += rhs.read_syscalls;
        self.write_syscalls += rhs.write_syscalls;
        self.read_bytes += rhs.read_bytes;
        self.write_bytes += rhs.write_bytes;
        self.cancelled_write_bytes += rhs.cancelled_write_bytes;
    }
}

/// Decoder for taskstats version 4.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskStatsDecoder;

impl CountersDecoder for TaskStatsDecoder {
    fn decode(&self, raw: &[u8], version: u16) -> Result<TaskCounters, DecodeError> {
        if version != TASKSTATS_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        if raw.len() < TASKSTATS_MIN_SIZE {
            return Err(DecodeError::Truncated {
                len: raw.len(),
                min: TASKSTATS_MIN_SIZE,
            });
        }

        let field = |offset: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&raw[offset..offset + 8]);
            u64::from_ne_bytes(bytes)
        };

        // Offsets follow the aligned layout of `struct taskstats`; `ac_comm`, the
        // 32 bit identity fields and `ac_btime` (80..144) are skipped.
        Ok(TaskCounters {
            cpu_count: field(16),
            cpu_delay_total: field(24),
            blkio_count: field(32),
            blkio_delay_total: field(40),
            swapin_count: field(48),
            swapin_delay_total: field(56),
            cpu_run_real_total: field(64),
            cpu_run_virtual_total: field(72),
            ac_etime: field(144),
            ac_utime: field(152),
            ac_stime: field(160),
            ac_minflt: field(168),
            ac_majflt: field(176),
            coremem: field(184),
            virtmem: field(192),
            hiwater_rss: field(200),
            hiwater_vm: field(208),
            read_char: field(216),
            write_char: field(224),
            read_syscalls: field(232),
            write_syscalls: field(240),
            read_bytes: field(248),
            write_bytes: field(256),
            cancelled_write_bytes: field(264),
        })
    }
}
