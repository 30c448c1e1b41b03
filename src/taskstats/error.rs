use super::counters::DecodeError;
use super::netlink::ParseError;

/// Errors returned by the taskstats client.
///
/// "No data" outcomes (task gone, nothing reported, short reply) are not errors; they
/// are returned as `Ok(None)` by [`super::Client::query`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "not enough privileges to query taskstats (CAP_NET_ADMIN is required, try running as root)"
    )]
    NoEnoughPrivilege,
    #[error("generic netlink family `{0}` not found, is taskstats enabled in the kernel?")]
    FamilyNotFound(&'static str),
    #[error("netlink transport failure: {0}")]
    Transport(#[from] std::io::Error),
    #[error("malformed netlink reply: {0}")]
    MalformedReply(#[from] ParseError),
    #[error("per-process taskstats reply without a stats attribute")]
    MissingStats,
    #[error("unsupported taskstats version {found}, expected {expected}")]
    UnsupportedVersion { found: u16, expected: u16 },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
