use super::counters::{CountersDecoder, TaskCounters, TaskStatsDecoder};
use super::netlink::{self, Attributes, GenlMessage, NLM_F_REQUEST};
use super::socket::{NetlinkSocket, Transport};
use super::{
    Error, Result, TASKSTATS_CMD_ATTR_PID, TASKSTATS_CMD_GET, TASKSTATS_FAMILY_NAME,
    TASKSTATS_GENL_VERSION, TASKSTATS_MIN_SIZE, TASKSTATS_TYPE_AGGR_PID, TASKSTATS_TYPE_STATS,
    TASKSTATS_VERSION,
};

/// A `TASKSTATS_CMD_GET` request for one task id.
///
/// Requests are consumed by [`Client::query`] and cannot be resent.
#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    tid: u32,
    message: GenlMessage,
}

impl Request {
    pub fn new(family_id: u16, tid: u32) -> Self {
        let message = GenlMessage::new(
            family_id,
            TASKSTATS_CMD_GET,
            TASKSTATS_GENL_VERSION,
            NLM_F_REQUEST,
        )
        .with_u32_attr(TASKSTATS_CMD_ATTR_PID, tid);
        Self { tid, message }
    }

    pub fn tid(&self) -> u32 {
        self.tid
    }

    /// The encoded attribute section (the single PID attribute).
    pub fn attrs(&self) -> &[u8] {
        self.message.attrs()
    }

    pub fn encode(&self) -> Vec<u8> {
        self.message.encode()
    }
}

/// The per-task request/response call jobs use to read their tasks' counters.
pub trait TaskStatsSource {
    /// Builds a request for `tid` without sending it.
    fn build_request(&self, tid: u32) -> Request;

    /// Performs one request/reply exchange.
    ///
    /// Returns `Ok(None)` when there is no data for the task this cycle.
    fn query(&self, request: Request) -> Result<Option<TaskCounters>>;

    fn task_stats(&self, tid: u32) -> Result<Option<TaskCounters>> {
        self.query(self.build_request(tid))
    }
}

/// Taskstats client owning the netlink channel and the resolved family id.
///
/// The family id is resolved once on construction and reused for every query.
#[derive(Debug)]
pub struct Client<T = NetlinkSocket, D = TaskStatsDecoder> {
    transport: T,
    family_id: u16,
    decoder: D,
}

impl Client {
    /// Opens a generic netlink socket and resolves the taskstats family.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be opened or the kernel lacks taskstats support
    /// ([`Error::FamilyNotFound`]).
    pub fn connect() -> Result<Self> {
        let transport = NetlinkSocket::connect()?;
        Self::with_transport(transport, TaskStatsDecoder)
    }
}

impl<T, D> Client<T, D>
where
    T: Transport,
    D: CountersDecoder,
{
    /// Builds a client over an arbitrary transport, resolving the family id through it.
    pub fn with_transport(transport: T, decoder: D) -> Result<Self> {
        let family_id = super::resolve_family(&transport, TASKSTATS_FAMILY_NAME)?;
        Ok(Self {
            transport,
            family_id,
            decoder,
        })
    }

    pub fn family_id(&self) -> u16 {
        self.family_id
    }

    pub fn build_request(&self, tid: u32) -> Request {
        Request::new(self.family_id, tid)
    }

    /// Sends `request` and decodes the per-process counters from the reply.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the task no longer exists, the reply carries no per-process
    /// aggregate, or the stats payload is shorter than [`TASKSTATS_MIN_SIZE`].
    ///
    /// # Errors
    ///
    /// - [`Error::NoEnoughPrivilege`] if the kernel rejects the query with `EPERM`.
    /// - [`Error::MissingStats`] if the aggregate lacks its stats attribute.
    /// - [`Error::UnsupportedVersion`] if the payload is not version [`TASKSTATS_VERSION`].
    /// - Transport, parse and decoder errors unchanged.
    pub fn query(&self, request: Request) -> Result<Option<TaskCounters>> {
        let tid = request.tid();
        let attrs = match self.exchange(request) {
            Ok(attrs) => attrs,
            Err(Error::Transport(err)) if err.raw_os_error() == Some(libc::ESRCH) => {
                log::trace!("task {tid} exited before its stats could be read");
                return Ok(None);
            }
            Err(Error::Transport(err)) if err.raw_os_error() == Some(libc::EPERM) => {
                return Err(Error::NoEnoughPrivilege);
            }
            Err(err) => return Err(err),
        };

        let top = Attributes::parse(&attrs)?;
        let Some(aggregate) = top.get(TASKSTATS_TYPE_AGGR_PID) else {
            log::trace!("no per-process stats reported for task {tid}");
            return Ok(None);
        };
        let raw = Attributes::parse(aggregate)?
            .get(TASKSTATS_TYPE_STATS)
            .ok_or(Error::MissingStats)?;

        if raw.len() < TASKSTATS_MIN_SIZE {
            log::trace!("short taskstats reply for task {tid}: {} bytes", raw.len());
            return Ok(None);
        }

        let version = u16::from_ne_bytes([raw[0], raw[1]]);
        if version != TASKSTATS_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                expected: TASKSTATS_VERSION,
            });
        }

        Ok(Some(self.decoder.decode(raw, version)?))
    }

    /// Sends one request and returns the attribute section of its reply. Error frames
    /// are turned into [`Error::Transport`] carrying the kernel's errno.
    fn exchange(&self, request: Request) -> Result<Vec<u8>> {
        self.transport.send(&request.encode())?;
        let reply = self.transport.recv()?;
        let (_, _, attrs) = netlink::parse_reply(&reply)?.into_result()?;
        Ok(attrs)
    }
}

impl<T, D> TaskStatsSource for Client<T, D>
where
    T: Transport,
    D: CountersDecoder,
{
    fn build_request(&self, tid: u32) -> Request {
        Client::<T, D>::build_request(self, tid)
    }

    fn query(&self, request: Request) -> Result<Option<TaskCounters>> {
        Client::<T, D>::query(self, request)
    }
}
