use super::netlink::{self, Attributes, GenlMessage, NLM_F_REQUEST};
use super::socket::Transport;
use super::{Error, Result};

/// Fixed id of the generic netlink controller family.
const GENL_ID_CTRL: u16 = 0x10;
const CTRL_CMD_GETFAMILY: u8 = 3;
const CTRL_ATTR_FAMILY_ID: u16 = 1;
const CTRL_ATTR_FAMILY_NAME: u16 = 2;
const CTRL_VERSION: u8 = 1;

/// Resolves the numeric id of the generic netlink family called `name`.
///
/// # Errors
///
/// Returns [`Error::FamilyNotFound`] if the kernel does not know the family, and
/// transport or parse errors otherwise.
pub fn resolve_family<T: Transport>(transport: &T, name: &'static str) -> Result<u16> {
    let mut family_name = Vec::with_capacity(name.len() + 1);
    family_name.extend_from_slice(name.as_bytes());
    family_name.push(0);

    let request = GenlMessage::new(GENL_ID_CTRL, CTRL_CMD_GETFAMILY, CTRL_VERSION, NLM_F_REQUEST)
        .with_attr(CTRL_ATTR_FAMILY_NAME, &family_name);
    transport.send(&request.encode())?;
    let reply = transport.recv()?;

    let (_, _, attrs) = match netlink::parse_reply(&reply)?.into_result() {
        Ok(message) => message,
        Err(err) if err.raw_os_error() == Some(libc::ENOENT) => {
            return Err(Error::FamilyNotFound(name));
        }
        Err(err) => return Err(err.into()),
    };

    let attrs = Attributes::parse(&attrs)?;
    match attrs.get(CTRL_ATTR_FAMILY_ID) {
        Some(&[lo, hi, ..]) => {
            let family_id = u16::from_ne_bytes([lo, hi]);
            log::debug!("resolved generic netlink family {name} to id {family_id}");
            Ok(family_id)
        }
        _ => Err(Error::FamilyNotFound(name)),
    }
}

/// Builds the controller's reply announcing `family_id`.
#[cfg(test)]
pub(crate) fn encode_family_reply(family_id: u16) -> Vec<u8> {
    GenlMessage::new(GENL_ID_CTRL, 1, CTRL_VERSION, 0)
        .with_attr(CTRL_ATTR_FAMILY_ID, &family_id.to_ne_bytes())
        .with_attr(CTRL_ATTR_FAMILY_NAME, b"TASKSTATS\0")
        .encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taskstats::mock::MockTransport;

    #[test]
    fn test_resolve_family_id() {
        let transport = MockTransport::with_replies(vec![Ok(encode_family_reply(0x1c))]);
        let family_id = resolve_family(&transport, "TASKSTATS").unwrap();
        assert_eq!(family_id, 0x1c);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let (_, _, attrs) = netlink::parse_reply(&sent[0])
            .unwrap()
            .into_result()
            .unwrap();
        let attrs = Attributes::parse(&attrs).unwrap();
        assert_eq!(attrs.get(CTRL_ATTR_FAMILY_NAME), Some(&b"TASKSTATS\0"[..]));
    }

    #[test]
    fn test_resolve_unknown_family() {
        let transport = MockTransport::with_replies(vec![Ok(netlink::encode_error(libc::ENOENT))]);
        let err = resolve_family(&transport, "TASKSTATS").unwrap_err();
        assert!(matches!(err, Error::FamilyNotFound("TASKSTATS")));
    }

    #[test]
    fn test_resolve_reply_without_family_id() {
        let reply = GenlMessage::new(GENL_ID_CTRL, 1, CTRL_VERSION, 0)
            .with_attr(CTRL_ATTR_FAMILY_NAME, b"TASKSTATS\0")
            .encode();
        let transport = MockTransport::with_replies(vec![Ok(reply)]);
        let err = resolve_family(&transport, "TASKSTATS").unwrap_err();
        assert!(matches!(err, Error::FamilyNotFound(_)));
    }
}
