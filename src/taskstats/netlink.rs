//! Generic netlink framing.
//!
//! Encodes request messages (`nlmsghdr` + `genlmsghdr` + attributes) and decodes the
//! single reply frame the kernel sends back, including the nested attribute tree of a
//! taskstats reply. All integers are in host byte order, as the kernel expects.

use std::io;

pub const NLMSG_HDRLEN: usize = 16;
pub const GENL_HDRLEN: usize = 4;
pub const NLA_HDRLEN: usize = 4;

pub const NLMSG_ERROR: u16 = 2;
pub const NLM_F_REQUEST: u16 = 1;

const NLA_F_NESTED: u16 = 1 << 15;
const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Rounds `len` up to the 4 byte netlink alignment.
#[inline]
pub const fn align(len: usize) -> usize {
    (len + 3) & !3
}

/// Errors raised while decoding a reply frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("reply truncated: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
    #[error("invalid message length {length} for a buffer of {available} bytes")]
    MessageLength { length: usize, available: usize },
    #[error("invalid attribute length {length} at offset {offset}")]
    AttributeLength { length: usize, offset: usize },
    #[error("unexpected acknowledgement where a reply was expected")]
    UnexpectedAck,
    #[error("invalid error code {0} in error frame")]
    ErrorCode(i32),
}

/// A generic netlink message that can be encoded into a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenlMessage {
    family: u16,
    flags: u16,
    cmd: u8,
    version: u8,
    attrs: Vec<u8>,
}

impl GenlMessage {
    pub fn new(family: u16, cmd: u8, version: u8, flags: u16) -> Self {
        Self {
            family,
            flags,
            cmd,
            version,
            attrs: Vec::new(),
        }
    }

    /// Appends an attribute carrying the raw `payload`.
    pub fn with_attr(mut self, tag: u16, payload: &[u8]) -> Self {
        encode_attr(&mut self.attrs, tag, payload);
        self
    }

    pub fn with_u32_attr(self, tag: u16, value: u32) -> Self {
        self.with_attr(tag, &value.to_ne_bytes())
    }

    pub fn family(&self) -> u16 {
        self.family
    }

    pub fn cmd(&self) -> u8 {
        self.cmd
    }

    /// The encoded attribute section of the message.
    pub fn attrs(&self) -> &[u8] {
        &self.attrs
    }

    /// Encodes the complete frame. Sequence number and port id are left at zero; the
    /// kernel fills in the sender port.
    pub fn encode(&self) -> Vec<u8> {
        let len = NLMSG_HDRLEN + GENL_HDRLEN + self.attrs.len();
        let mut buf = Vec::with_capacity(len);
        buf.extend_from_slice(&(len as u32).to_ne_bytes());
        buf.extend_from_slice(&self.family.to_ne_bytes());
        buf.extend_from_slice(&self.flags.to_ne_bytes());
        buf.extend_from_slice(&0u32.to_ne_bytes());
        buf.extend_from_slice(&0u32.to_ne_bytes());
        buf.push(self.cmd);
        buf.push(self.version);
        buf.extend_from_slice(&0u16.to_ne_bytes());
        buf.extend_from_slice(&self.attrs);
        buf
    }
}

/// Appends one `nlattr` (header, payload and alignment padding) to `buf`.
pub fn encode_attr(buf: &mut Vec<u8>, tag: u16, payload: &[u8]) {
    let len = NLA_HDRLEN + payload.len();
    buf.extend_from_slice(&(len as u16).to_ne_bytes());
    buf.extend_from_slice(&tag.to_ne_bytes());
    buf.extend_from_slice(payload);
    buf.resize(buf.len() + (align(len) - len), 0);
}

/// A decoded reply frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// `NLMSG_ERROR` with a non-zero code, carried as a positive errno.
    Error(i32),
    /// A generic netlink message; holds the attribute section only.
    Message { msg_type: u16, cmd: u8, attrs: Vec<u8> },
}

impl Reply {
    /// Converts an error frame into the equivalent [`io::Error`].
    pub fn into_result(self) -> io::Result<(u16, u8, Vec<u8>)> {
        match self {
            Reply::Error(errno) => Err(io::Error::from_raw_os_error(errno)),
            Reply::Message {
                msg_type,
                cmd,
                attrs,
            } => Ok((msg_type, cmd, attrs)),
        }
    }
}

/// Decodes the first netlink message in `buf`.
pub fn parse_reply(buf: &[u8]) -> Result<Reply, ParseError> {
    ensure_len(buf, NLMSG_HDRLEN)?;
    let length = read_u32(buf, 0) as usize;
    if length < NLMSG_HDRLEN || length > buf.len() {
        return Err(ParseError::MessageLength {
            length,
            available: buf.len(),
        });
    }
    let msg_type = read_u16(buf, 4);
    let body = &buf[NLMSG_HDRLEN..length];

    if msg_type == NLMSG_ERROR {
        ensure_len(body, 4)?;
        let code = read_u32(body, 0) as i32;
        if code == 0 {
            return Err(ParseError::UnexpectedAck);
        }
        let errno = code.checked_neg().ok_or(ParseError::ErrorCode(code))?;
        return Ok(Reply::Error(errno));
    }

    ensure_len(body, GENL_HDRLEN)?;
    Ok(Reply::Message {
        msg_type,
        cmd: body[0],
        attrs: body[GENL_HDRLEN..].to_vec(),
    })
}

/// One level of a netlink attribute tree.
///
/// Payloads borrow from the reply buffer; a nested attribute is parsed on demand with
/// [`Attributes::parse`] on its payload.
#[derive(Debug, Default)]
pub struct Attributes<'a> {
    entries: Vec<(u16, &'a [u8])>,
}

impl<'a> Attributes<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, ParseError> {
        let mut entries = Vec::new();
        let mut offset = 0;
        while buf.len() - offset >= NLA_HDRLEN {
            let length = read_u16(buf, offset) as usize;
            let tag = read_u16(buf, offset + 2) & NLA_TYPE_MASK;
            if length < NLA_HDRLEN || offset + length > buf.len() {
                return Err(ParseError::AttributeLength { length, offset });
            }
            entries.push((tag, &buf[offset + NLA_HDRLEN..offset + length]));
            offset = (offset + align(length)).min(buf.len());
        }
        Ok(Self { entries })
    }

    /// Returns the payload of the first attribute with the given tag.
    pub fn get(&self, tag: u16) -> Option<&'a [u8]> {
        self.entries
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, payload)| *payload)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[inline]
fn ensure_len(buf: &[u8], needed: usize) -> Result<(), ParseError> {
    if buf.len() < needed {
        return Err(ParseError::Truncated {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

#[inline]
fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_ne_bytes([buf[offset], buf[offset + 1]])
}

#[inline]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Builds an `NLMSG_ERROR` frame for the given errno.
#[cfg(test)]
pub(crate) fn encode_error(errno: i32) -> Vec<u8> {
    let len = NLMSG_HDRLEN + 4 + NLMSG_HDRLEN;
    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(&(len as u32).to_ne_bytes());
    buf.extend_from_slice(&NLMSG_ERROR.to_ne_bytes());
    buf.extend_from_slice(&0u16.to_ne_bytes());
    buf.extend_from_slice(&[0; 8]);
    buf.extend_from_slice(&(-errno).to_ne_bytes());
    buf.extend_from_slice(&[0; NLMSG_HDRLEN]);
    buf
}
