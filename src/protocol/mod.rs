//! Wire messages exchanged between routers.
//!
//! Three message shapes ride the fabric: opaque forwarded data, address
//! queries, and address notifications. Every frame starts with a one-byte
//! message type; [`MeshMessage::decode`] turns a frame into a tagged
//! variant exactly once at the receive boundary, and handlers dispatch on
//! the variant rather than re-inspecting bytes.
//!
//! Queries are multicast to the realm-local all-routers group and answered
//! by unicast notifications; notifications with a zero cycle id are
//! unsolicited announcements. Data frames carry the destination endpoint
//! in front of the untouched payload.

mod data;
mod error;
mod resolution;

pub use data::MeshData;
pub use error::ProtocolError;
pub use resolution::{AddressNotification, AddressQuery};

/// Message type byte: forwarded data datagram.
pub const MSG_DATA: u8 = 0x00;

/// Message type byte: address query.
pub const MSG_ADDR_QUERY: u8 = 0x01;

/// Message type byte: address notification.
pub const MSG_ADDR_NOTIFY: u8 = 0x02;

/// Well-known endpoint label for address queries (log/diagnostic use).
pub const URI_ADDRESS_QUERY: &str = "a/aq";

/// Well-known endpoint label for address notifications (log/diagnostic use).
pub const URI_ADDRESS_NOTIFY: &str = "a/an";

/// A decoded mesh frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshMessage {
    /// Forwarded data datagram.
    Data(MeshData),
    /// Address query.
    Query(AddressQuery),
    /// Address notification.
    Notify(AddressNotification),
}

impl MeshMessage {
    /// Decode a full frame (message type byte plus payload).
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let (&msg_type, payload) = frame.split_first().ok_or(ProtocolError::MessageTooShort {
            expected: 1,
            got: 0,
        })?;

        match msg_type {
            MSG_DATA => Ok(Self::Data(MeshData::decode(payload)?)),
            MSG_ADDR_QUERY => Ok(Self::Query(AddressQuery::decode(payload)?)),
            MSG_ADDR_NOTIFY => Ok(Self::Notify(AddressNotification::decode(payload)?)),
            other => Err(ProtocolError::InvalidMessageType(other)),
        }
    }

    /// Encode to a full frame.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Data(msg) => msg.encode(),
            Self::Query(msg) => msg.encode(),
            Self::Notify(msg) => msg.encode(),
        }
    }
}
