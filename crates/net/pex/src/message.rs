use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::PexError;

/// Most addresses carried by one [`PexMessage::Addrs`].
pub const MAX_ADDRS: usize = 250;

/// Messages exchanged on the PEX channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PexMessage {
    /// Ask the peer for addresses it knows.
    Request,
    /// Addresses known to the sender.
    Addrs(Vec<SocketAddr>),
}

impl PexMessage {
    pub fn encode(&self) -> Result<Vec<u8>, PexError> {
        if let Self::Addrs(addrs) = self
            && addrs.len() > MAX_ADDRS
        {
            return Err(PexError::TooManyAddrs(addrs.len()));
        }
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PexError> {
        let msg: Self = postcard::from_bytes(bytes)?;
        if let Self::Addrs(addrs) = &msg
            && addrs.len() > MAX_ADDRS
        {
            return Err(PexError::TooManyAddrs(addrs.len()));
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_addrs_limit() {
        let addrs: Vec<SocketAddr> = (0..=MAX_ADDRS as u16)
            .map(|port| SocketAddr::from(([8, 8, 8, 8], port + 1)))
            .collect();

        assert_matches!(
            PexMessage::Addrs(addrs.clone()).encode(),
            Err(PexError::TooManyAddrs(251))
        );

        // a peer that ignores the limit is rejected on decode
        let oversized = postcard::to_allocvec(&PexMessage::Addrs(addrs)).unwrap();
        assert_matches!(
            PexMessage::decode(&oversized),
            Err(PexError::TooManyAddrs(251))
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_matches!(PexMessage::decode(&[0xff, 0xff]), Err(PexError::Codec(_)));
        assert_matches!(PexMessage::decode(&[]), Err(PexError::Codec(_)));
    }

    #[test]
    fn test_request_is_one_byte() {
        assert_eq!(PexMessage::Request.encode().unwrap(), vec![0]);
        assert_eq!(PexMessage::decode(&[0]).unwrap(), PexMessage::Request);
    }
}
