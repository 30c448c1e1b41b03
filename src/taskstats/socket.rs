use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Size of the receive buffer; comfortably larger than one taskstats reply.
const RECV_BUFFER_SIZE: usize = 16 * 1024;

/// A request/reply channel to the generic netlink bus.
///
/// Implementations send exactly one frame and hand back exactly one reply frame. Error
/// frames are decoded by the caller, so only genuine transport failures surface here.
pub trait Transport {
    fn send(&self, frame: &[u8]) -> io::Result<()>;
    fn recv(&self) -> io::Result<Vec<u8>>;
}

/// A `NETLINK_GENERIC` socket bound to a kernel-assigned port.
#[derive(Debug)]
pub struct NetlinkSocket {
    fd: OwnedFd,
}

impl NetlinkSocket {
    /// Opens and binds the socket.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket cannot be created or bound, e.g. on kernels
    /// built without netlink support.
    pub fn connect() -> io::Result<Self> {
        // SAFETY: plain syscall, the returned descriptor is checked before use.
        let raw = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                libc::NETLINK_GENERIC,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a freshly created, valid descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: `sockaddr_nl` is plain old data; all-zero is a valid value.
        let mut addr: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;

        // SAFETY: `addr` outlives the call and the length matches its type.
        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { fd })
    }
}

impl Transport for NetlinkSocket {
    fn send(&self, frame: &[u8]) -> io::Result<()> {
        loop {
            // SAFETY: the pointer and length describe the borrowed `frame` slice.
            let ret = unsafe {
                libc::send(
                    self.fd.as_raw_fd(),
                    frame.as_ptr() as *const libc::c_void,
                    frame.len(),
                    0,
                )
            };
            if ret >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn recv(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            // SAFETY: the pointer and length describe the owned `buf`.
            let ret = unsafe {
                libc::recv(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    0,
                )
            };
            if ret >= 0 {
                buf.truncate(ret as usize);
                return Ok(buf);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}
