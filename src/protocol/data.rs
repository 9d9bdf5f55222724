//! Forwarded data datagrams.

use crate::addr::Eid;
use crate::protocol::error::ProtocolError;
use crate::protocol::MSG_DATA;

/// An opaque datagram in transit to an endpoint.
///
/// The destination endpoint rides in front of the payload so a receiving
/// router can deliver locally or forward onward; everything after it is
/// untouched application data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshData {
    /// Destination endpoint.
    pub dest: Eid,
    /// Opaque payload.
    pub payload: Vec<u8>,
}

/// Minimum payload size after the message type byte.
const MESH_DATA_MIN_SIZE: usize = 16;

impl MeshData {
    /// Create a data datagram.
    pub fn new(dest: Eid, payload: Vec<u8>) -> Self {
        Self { dest, payload }
    }

    /// Encode as wire format (includes msg_type byte).
    ///
    /// Format: `[0x00][dest:16][payload...]`
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + MESH_DATA_MIN_SIZE + self.payload.len());

        buf.push(MSG_DATA);
        buf.extend_from_slice(&self.dest.octets());
        buf.extend_from_slice(&self.payload);

        buf
    }

    /// Decode from wire format (after msg_type byte has been consumed).
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < MESH_DATA_MIN_SIZE {
            return Err(ProtocolError::MessageTooShort {
                expected: MESH_DATA_MIN_SIZE,
                got: payload.len(),
            });
        }

        let mut dest_bytes = [0u8; 16];
        dest_bytes.copy_from_slice(&payload[..16]);
        let dest = Eid::from_octets(dest_bytes);

        Ok(Self {
            dest,
            payload: payload[16..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_roundtrip() {
        let eid: Eid = "2003::42".parse().unwrap();
        let data = MeshData::new(eid, b"ping payload".to_vec());

        let encoded = data.encode();
        assert_eq!(encoded[0], MSG_DATA);

        let decoded = MeshData::decode(&encoded[1..]).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_empty_payload_allowed() {
        let eid: Eid = "2003::42".parse().unwrap();
        let data = MeshData::new(eid, Vec::new());

        let decoded = MeshData::decode(&data.encode()[1..]).unwrap();
        assert_eq!(decoded.dest, eid);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_data_too_short() {
        let err = MeshData::decode(&[0u8; 15]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MessageTooShort {
                expected: 16,
                got: 15
            }
        ));
    }
}
